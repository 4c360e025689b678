//! Episode workflow controller.
//!
//! Owns the loaded episode list, the active filter, and the most recently
//! loaded code diff. Every state transition is gated by role × status
//! through [`ccr_types::permitted_actions`] before any network call, and
//! every mutation is followed by an unconditional re-fetch of the episode
//! list — the displayed state is always the backend's latest view, never
//! an optimistic local projection. That trades responsiveness for
//! correctness under concurrent edits; the backend is the sole arbiter of
//! final state.

use reqwest::Method;
use serde_json::Value;

use ccr_core::{
    DiffResult, Episode, EpisodeDraft, EpisodePage, ListFilter, ModelError, QueryDraft,
};
use ccr_types::{permitted_actions, EpisodeStatus, Role, WorkflowAction};

use crate::auth::{Account, IdentityProvider};
use crate::config::ClientConfig;
use crate::gateway::{ApiClient, ClientError};

/// Notes sent with approve when the reviewer supplies none.
pub const DEFAULT_APPROVE_NOTES: &str = "Looks good";
/// Notes sent with reject when the reviewer supplies none.
pub const DEFAULT_REJECT_NOTES: &str = "Needs more detail";

/// Errors raised by workflow operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{action:?} requires the {role} role")]
    MissingRole { action: WorkflowAction, role: Role },

    #[error("{action:?} is not available while the episode is {status}")]
    InvalidStatus {
        action: WorkflowAction,
        status: EpisodeStatus,
    },

    #[error("episode {0} is not in the current page; refresh the list first")]
    UnknownEpisode(String),

    /// Revert attempted without a previously loaded, revertible diff.
    #[error("no code diff loaded; load an episode's diff before reverting")]
    NoDiffLoaded,

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

struct LoadedDiff {
    episode_id: String,
    diff: DiffResult,
}

/// Role-gated workflow execution over the episode list.
pub struct WorkflowController {
    api: ApiClient,
    filter: ListFilter,
    episodes: Vec<Episode>,
    total: u64,
    loaded_diff: Option<LoadedDiff>,
}

impl WorkflowController {
    pub fn new(config: ClientConfig, provider: Box<dyn IdentityProvider>) -> Self {
        WorkflowController {
            api: ApiClient::new(config, provider),
            filter: ListFilter::default(),
            episodes: Vec::new(),
            total: 0,
            loaded_diff: None,
        }
    }

    // ------------------------------------------------------------------
    // Session passthroughs
    // ------------------------------------------------------------------

    pub fn sign_in(&mut self) -> Result<(), ClientError> {
        self.api.broker_mut().sign_in().map_err(ClientError::from)
    }

    pub fn sign_out(&mut self) {
        self.api.broker_mut().sign_out();
    }

    pub fn active_account(&self) -> Option<&Account> {
        self.api.broker().active_account()
    }

    pub fn config(&self) -> &ClientConfig {
        self.api.config()
    }

    // ------------------------------------------------------------------
    // List state
    // ------------------------------------------------------------------

    pub fn filter(&self) -> &ListFilter {
        &self.filter
    }

    /// Replace the filter. Callers re-run [`Self::refresh`] afterwards;
    /// any identity, filter, or pagination change invalidates the list.
    pub fn set_filter(&mut self, filter: ListFilter) {
        self.filter = filter;
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// The most recently loaded live diff, if any.
    pub fn current_diff(&self) -> Option<&DiffResult> {
        self.loaded_diff.as_ref().map(|loaded| &loaded.diff)
    }

    /// Re-fetch the episode list with the current filter, accepting both
    /// backend response shapes. The status filter is re-applied to the
    /// fetched page.
    pub async fn refresh(&mut self) -> Result<(), WorkflowError> {
        let pairs = self.filter.query_pairs();
        let value = self
            .api
            .call("episodes", &pairs, None, None)
            .await?
            .unwrap_or(Value::Null);
        let page = EpisodePage::from_value(value)?;

        let filter = self.filter.clone();
        let items: Vec<Episode> = page
            .items
            .into_iter()
            .filter(|episode| filter.status_matches(episode))
            .collect();
        tracing::info!(count = items.len(), total = page.total, "episode list refreshed");

        self.episodes = items;
        self.total = page.total;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Suggestion and creation
    // ------------------------------------------------------------------

    /// Request suggested codes for a draft without creating an episode.
    pub async fn suggest(&mut self, draft: &EpisodeDraft) -> Result<Value, WorkflowError> {
        let body = serde_json::to_value(draft).map_err(ModelError::from)?;
        let value = self
            .api
            .call("episodes/suggest", &[], Some(body), None)
            .await?;
        Ok(value.unwrap_or(Value::Null))
    }

    /// Create an episode from a draft, then re-fetch the list.
    pub async fn create(&mut self, draft: &EpisodeDraft) -> Result<(), WorkflowError> {
        let body = serde_json::to_value(draft).map_err(ModelError::from)?;
        self.api.call("episodes", &[], Some(body), None).await?;
        self.refresh().await
    }

    // ------------------------------------------------------------------
    // State transitions
    // ------------------------------------------------------------------

    /// Submit a Draft episode for review. Requires the Coder role.
    pub async fn submit(&mut self, episode_id: &str) -> Result<(), WorkflowError> {
        self.ensure_transition(WorkflowAction::Submit, episode_id)?;
        self.api
            .call(
                &format!("episodes/{episode_id}/submit"),
                &[],
                None,
                Some(Method::POST),
            )
            .await?;
        self.refresh().await
    }

    /// Approve a Submitted episode. Requires the Reviewer role.
    pub async fn approve(
        &mut self,
        episode_id: &str,
        notes: Option<&str>,
    ) -> Result<(), WorkflowError> {
        self.ensure_transition(WorkflowAction::Approve, episode_id)?;
        let notes = notes.unwrap_or(DEFAULT_APPROVE_NOTES);
        self.api
            .call(
                &format!("episodes/{episode_id}/approve"),
                &[("notes".to_owned(), notes.to_owned())],
                None,
                Some(Method::POST),
            )
            .await?;
        self.refresh().await
    }

    /// Reject a Submitted episode. Requires the Reviewer role.
    pub async fn reject(
        &mut self,
        episode_id: &str,
        notes: Option<&str>,
    ) -> Result<(), WorkflowError> {
        self.ensure_transition(WorkflowAction::Reject, episode_id)?;
        let notes = notes.unwrap_or(DEFAULT_REJECT_NOTES);
        self.api
            .call(
                &format!("episodes/{episode_id}/reject"),
                &[("notes".to_owned(), notes.to_owned())],
                None,
                Some(Method::POST),
            )
            .await?;
        self.refresh().await
    }

    // ------------------------------------------------------------------
    // Diff and revert
    // ------------------------------------------------------------------

    /// Load the live code diff for an episode. Needs an authenticated
    /// session (the gateway enforces that) but no role.
    pub async fn load_diff(&mut self, episode_id: &str) -> Result<&DiffResult, WorkflowError> {
        let value = self
            .api
            .call(&format!("episodes/{episode_id}/code-diff"), &[], None, None)
            .await?
            .unwrap_or(Value::Null);
        let diff = DiffResult::from_value(value)?;

        let loaded = self.loaded_diff.insert(LoadedDiff {
            episode_id: episode_id.to_owned(),
            diff,
        });
        Ok(&loaded.diff)
    }

    /// Restore the episode's codes to the "old" snapshot of the most
    /// recently loaded diff, then clear the diff view and re-fetch the
    /// list. Requires the Reviewer role. Fails with
    /// [`WorkflowError::NoDiffLoaded`] before any network call when no
    /// revertible diff has been loaded.
    pub async fn revert(&mut self) -> Result<(), WorkflowError> {
        let (episode_id, audit_id) = match &self.loaded_diff {
            Some(loaded) => match &loaded.diff.audit_id {
                Some(audit_id) => (loaded.episode_id.clone(), audit_id.clone()),
                None => return Err(WorkflowError::NoDiffLoaded),
            },
            None => return Err(WorkflowError::NoDiffLoaded),
        };
        self.ensure_role(WorkflowAction::Revert, Role::Reviewer)?;

        self.api
            .call(
                &format!("episodes/{episode_id}/revert"),
                &[("auditId".to_owned(), audit_id)],
                None,
                Some(Method::POST),
            )
            .await?;
        self.loaded_diff = None;
        self.refresh().await
    }

    /// Upload a document (and optional coder codes) for comparison. The
    /// result is returned, not retained: upload comparisons carry no
    /// revertible snapshot.
    pub async fn compare_upload(
        &mut self,
        file_name: &str,
        bytes: Vec<u8>,
        codes: Option<String>,
    ) -> Result<DiffResult, WorkflowError> {
        let value = self
            .api
            .compare_upload(file_name, bytes, codes)
            .await?
            .unwrap_or(Value::Null);
        Ok(DiffResult::from_value(value)?)
    }

    // ------------------------------------------------------------------
    // Query drafting
    // ------------------------------------------------------------------

    /// Dispatch a clinician query for an episode. Requires the Coder role
    /// at any status. Fire-and-forget: no retry, the draft is not
    /// retained.
    pub async fn create_query(
        &mut self,
        episode_id: &str,
        draft: &QueryDraft,
    ) -> Result<(), WorkflowError> {
        self.ensure_role(WorkflowAction::Query, Role::Coder)?;
        let body = serde_json::to_value(draft).map_err(ModelError::from)?;
        self.api
            .call(
                &format!("episodes/{episode_id}/queries"),
                &[],
                Some(body),
                Some(Method::POST),
            )
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Gating
    // ------------------------------------------------------------------

    /// Roles in effect for gating. Bypass mode carries no identity, so
    /// role gating is disabled along with authentication; the backend
    /// still has the final word.
    fn effective_roles(&self) -> Result<Vec<Role>, WorkflowError> {
        if self.api.config().bypass_auth {
            return Ok(vec![Role::Coder, Role::Reviewer]);
        }
        match self.api.broker().active_account() {
            Some(account) => Ok(account.roles()),
            None => Err(WorkflowError::Client(ClientError::NotSignedIn)),
        }
    }

    /// Gate a status transition on role × current status, using the
    /// episode's status as loaded in the current page.
    fn ensure_transition(
        &self,
        action: WorkflowAction,
        episode_id: &str,
    ) -> Result<(), WorkflowError> {
        let episode = self
            .episodes
            .iter()
            .find(|episode| episode.id == episode_id)
            .ok_or_else(|| WorkflowError::UnknownEpisode(episode_id.to_owned()))?;
        let status = episode.status;

        let roles = self.effective_roles()?;
        if permitted_actions(&roles, status).contains(&action) {
            return Ok(());
        }
        match required_role(action) {
            Some(role) if !roles.contains(&role) => {
                Err(WorkflowError::MissingRole { action, role })
            }
            _ => Err(WorkflowError::InvalidStatus { action, status }),
        }
    }

    /// Gate a status-independent action on a single role.
    fn ensure_role(&self, action: WorkflowAction, role: Role) -> Result<(), WorkflowError> {
        let roles = self.effective_roles()?;
        if roles.contains(&role) {
            Ok(())
        } else {
            Err(WorkflowError::MissingRole { action, role })
        }
    }
}

fn required_role(action: WorkflowAction) -> Option<Role> {
    match action {
        WorkflowAction::Submit | WorkflowAction::Query => Some(Role::Coder),
        WorkflowAction::Approve | WorkflowAction::Reject | WorkflowAction::Revert => {
            Some(Role::Reviewer)
        }
        WorkflowAction::Diff => None,
    }
}
