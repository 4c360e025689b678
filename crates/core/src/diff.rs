//! Code diff reconciliation.
//!
//! Two backend endpoints produce diff-shaped payloads: the live
//! re-suggestion diff (`episodes/{id}/code-diff`, PascalCase entry keys)
//! and the upload comparison (`episodes/compare-upload`, camelCase or
//! PascalCase). Both normalize here into one canonical [`DiffResult`] in a
//! single serde pass; no other module inspects raw diff JSON.
//!
//! The dual-casing tolerance is a deliberate compatibility shim for the
//! two response flavours and must be kept even if one endpoint changes.

use serde::{Deserialize, Serialize};

use crate::ModelResult;

/// A single diagnosis or procedure code.
///
/// Missing fields take defined defaults: empty strings for code and
/// description, `false` for the primary flag (procedures never carry it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeEntry {
    #[serde(default, alias = "Code")]
    pub code: String,

    #[serde(default, alias = "Description")]
    pub description: String,

    #[serde(default, alias = "IsPrimary")]
    pub is_primary: bool,
}

/// The "old" (prior/coder-supplied) and "new" (current/system-suggested)
/// code sets for one axis (diagnoses or procedures).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSets {
    #[serde(default, alias = "Old")]
    pub old: Vec<CodeEntry>,

    #[serde(default, alias = "New")]
    pub new: Vec<CodeEntry>,
}

impl CodeSets {
    /// Codes present in `new` but not in `old`, by code string.
    fn added(&self) -> Vec<String> {
        self.new
            .iter()
            .filter(|entry| !self.old.iter().any(|old| old.code == entry.code))
            .map(|entry| entry.code.clone())
            .collect()
    }

    /// Codes present in `old` but not in `new`, by code string.
    fn removed(&self) -> Vec<String> {
        self.old
            .iter()
            .filter(|entry| !self.new.iter().any(|new| new.code == entry.code))
            .map(|entry| entry.code.clone())
            .collect()
    }
}

/// Added/removed code strings per axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deltas {
    #[serde(default, alias = "DxAdded")]
    pub dx_added: Vec<String>,

    #[serde(default, alias = "DxRemoved")]
    pub dx_removed: Vec<String>,

    #[serde(default, alias = "PxAdded")]
    pub px_added: Vec<String>,

    #[serde(default, alias = "PxRemoved")]
    pub px_removed: Vec<String>,
}

/// Canonical comparison between a prior and a current code set.
///
/// Ephemeral: computed per request, never cached across requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    /// Diagnoses, old vs new.
    pub dx: CodeSets,
    /// Procedures, old vs new.
    pub px: CodeSets,
    pub deltas: Deltas,
    /// Identifier of the revertible audit snapshot, when the backend
    /// offers one (live diffs do; upload comparisons may not).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_id: Option<String>,
    /// Free-text preview of the uploaded narrative, upload comparisons
    /// only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative_preview: Option<String>,
}

/// Wire mirror of [`DiffResult`]; deltas may be absent and are then
/// derived from the code sets.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDiffResult {
    #[serde(default, alias = "Dx")]
    dx: CodeSets,
    #[serde(default, alias = "Px")]
    px: CodeSets,
    #[serde(default, alias = "Deltas")]
    deltas: Option<Deltas>,
    #[serde(default, alias = "AuditId")]
    audit_id: Option<String>,
    #[serde(default, alias = "NarrativePreview")]
    narrative_preview: Option<String>,
}

impl DiffResult {
    /// Normalize a raw diff payload from either endpoint flavour.
    ///
    /// Idempotent: feeding a canonical result back through produces the
    /// same value.
    pub fn from_value(value: serde_json::Value) -> ModelResult<Self> {
        let raw: RawDiffResult = serde_json::from_value(value)?;
        let deltas = raw.deltas.unwrap_or_else(|| Deltas {
            dx_added: raw.dx.added(),
            dx_removed: raw.dx.removed(),
            px_added: raw.px.added(),
            px_removed: raw.px.removed(),
        });

        Ok(DiffResult {
            dx: raw.dx,
            px: raw.px,
            deltas,
            audit_id: raw.audit_id,
            narrative_preview: raw.narrative_preview,
        })
    }
}
