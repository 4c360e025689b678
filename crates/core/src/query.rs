//! Clinician query drafts.

use serde::Serialize;

use crate::{ModelError, ModelResult};

/// A clinician query message, constructed client-side and sent once via
/// `POST episodes/{id}/queries`. Not retained after dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDraft {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl QueryDraft {
    /// Build a draft, rejecting empty recipient, subject, or body.
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> ModelResult<Self> {
        let draft = QueryDraft {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        };
        if draft.to.trim().is_empty() {
            return Err(ModelError::InvalidInput("query recipient cannot be empty".into()));
        }
        if draft.subject.trim().is_empty() {
            return Err(ModelError::InvalidInput("query subject cannot be empty".into()));
        }
        if draft.body.trim().is_empty() {
            return Err(ModelError::InvalidInput("query body cannot be empty".into()));
        }
        Ok(draft)
    }
}
