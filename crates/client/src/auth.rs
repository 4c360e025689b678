//! Identity provider seam and token broker.
//!
//! The interactive/silent authentication protocol itself is an external
//! collaborator consumed through the [`IdentityProvider`] trait. The
//! [`TokenBroker`] layers the client's contract on top of it:
//! silent-first token acquisition with exactly one interactive fallback,
//! popup-first sign-in with a redirect fallback, and an explicit active
//! account (last login wins) instead of ambient global state.

use ccr_types::Role;

use crate::config::ClientConfig;

/// An opaque signed-in identity with its role claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    /// Raw role claim strings from the identity token.
    pub role_claims: Vec<String>,
}

impl Account {
    /// Recognized roles parsed from the claim strings. Unknown claims are
    /// ignored.
    pub fn roles(&self) -> Vec<Role> {
        self.role_claims
            .iter()
            .filter_map(|claim| Role::from_claim(claim))
            .collect()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles().contains(&role)
    }
}

/// A short-lived credential bound to an account and scope set.
///
/// Never persisted; re-acquired per outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        AccessToken(token.into())
    }

    /// The bearer credential itself. Deliberately not `Display` so tokens
    /// do not end up in log output by accident.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

/// Errors raised by sign-in and token acquisition.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No active account when one is required.
    #[error("not signed in")]
    NotSignedIn,

    /// Silent acquisition cannot proceed without user interaction.
    #[error("authentication requires interaction")]
    AuthRequired,

    /// Silent acquisition cannot proceed without user consent.
    #[error("consent required for the requested scopes")]
    ConsentRequired,

    /// The popup sign-in flow is unusable (for example a blocked window).
    #[error("sign-in popup was blocked")]
    PopupBlocked,

    /// The user cancelled the interactive flow.
    #[error("sign-in was cancelled")]
    UserCancelled,

    /// Another interactive flow is already running.
    #[error("an interactive sign-in is already in progress")]
    InteractionInProgress,

    /// Any other identity-provider failure; fatal to the calling
    /// operation.
    #[error("identity provider error: {0}")]
    Provider(String),
}

impl AuthError {
    /// Whether a silent acquisition failure calls for one interactive
    /// fallback attempt.
    fn requires_interaction(&self) -> bool {
        matches!(self, AuthError::AuthRequired | AuthError::ConsentRequired)
    }
}

/// Capability boundary to the external identity provider.
///
/// Interactive flows block on the user; implementations decide what
/// "popup" and "redirect" mean for their surface (a browser window, a
/// device-code prompt, an environment lookup in dev).
pub trait IdentityProvider: Send + Sync {
    /// Acquire a token for the given account and scopes without user
    /// interaction.
    fn acquire_token_silent(
        &self,
        account: &Account,
        scopes: &[String],
    ) -> Result<AccessToken, AuthError>;

    /// Lightweight interactive sign-in flow.
    fn login_popup(&self, scopes: &[String]) -> Result<Account, AuthError>;

    /// Full-page interactive sign-in flow, used when the popup flow is
    /// unusable.
    fn login_redirect(&self, scopes: &[String]) -> Result<Account, AuthError>;

    /// End the provider-side session for the account.
    fn sign_out(&self, account: &Account) -> Result<(), AuthError>;
}

/// Session and token state for one signed-in identity.
///
/// The active account is explicit state owned here, passed into the
/// gateway and workflow controller rather than read from a global.
pub struct TokenBroker {
    provider: Box<dyn IdentityProvider>,
    config: ClientConfig,
    active: Option<Account>,
    interaction_in_progress: bool,
}

impl TokenBroker {
    pub fn new(provider: Box<dyn IdentityProvider>, config: ClientConfig) -> Self {
        TokenBroker {
            provider,
            config,
            active: None,
            interaction_in_progress: false,
        }
    }

    /// The currently active account, if any.
    pub fn active_account(&self) -> Option<&Account> {
        self.active.as_ref()
    }

    /// Interactive sign-in, popup-first.
    ///
    /// A blocked popup or user cancellation falls back to the full-page
    /// redirect flow. If an interaction is already in progress the
    /// attempt is a silent no-op, not an error — this prevents duplicate
    /// popups but does not guarantee the second request's success.
    /// On success the resulting account becomes the active account.
    pub fn sign_in(&mut self) -> Result<(), AuthError> {
        if self.config.bypass_auth || self.interaction_in_progress {
            return Ok(());
        }

        let scopes = self.config.login_scopes();
        self.interaction_in_progress = true;
        let outcome = match self.provider.login_popup(&scopes) {
            Ok(account) => Ok(account),
            Err(AuthError::PopupBlocked) | Err(AuthError::UserCancelled) => {
                self.provider.login_redirect(&scopes)
            }
            Err(AuthError::InteractionInProgress) => {
                self.interaction_in_progress = false;
                return Ok(());
            }
            Err(e) => Err(e),
        };
        self.interaction_in_progress = false;

        let account = outcome?;
        tracing::info!(username = %account.username, "signed in");
        self.active = Some(account);
        Ok(())
    }

    /// Best-effort sign-out: the provider failure is logged, never
    /// surfaced, and the active account is always cleared.
    pub fn sign_out(&mut self) {
        if let Some(account) = self.active.take() {
            if let Err(e) = self.provider.sign_out(&account) {
                tracing::warn!(error = %e, "provider sign-out failed");
            }
        }
    }

    /// Acquire an access token for the configured API scopes.
    ///
    /// Silent acquisition is attempted first. A failure classified as
    /// requiring interaction triggers exactly one interactive sign-in for
    /// the same scopes, then one silent retry against the resulting
    /// active account. Any other failure propagates unchanged.
    pub fn acquire(&mut self) -> Result<AccessToken, AuthError> {
        let account = self.active.clone().ok_or(AuthError::NotSignedIn)?;
        let scopes = self.config.token_scopes();

        match self.provider.acquire_token_silent(&account, &scopes) {
            Ok(token) => Ok(token),
            Err(e) if e.requires_interaction() => {
                tracing::debug!(error = %e, "silent acquisition needs interaction");
                self.interaction_in_progress = true;
                let signed_in = self.provider.login_popup(&scopes);
                self.interaction_in_progress = false;

                let account = signed_in?;
                let token = self.provider.acquire_token_silent(&account, &scopes)?;
                // Last login wins.
                self.active = Some(account);
                Ok(token)
            }
            Err(e) => Err(e),
        }
    }
}

/// Development identity provider backed by environment variables.
///
/// Reads the bearer token from `CCR_ACCESS_TOKEN` and the account from
/// `CCR_USERNAME` / `CCR_ROLES` (comma-separated claims). Silent
/// acquisition fails with [`AuthError::AuthRequired`] when no token is
/// set; interactive flows fail as cancelled when no username is set.
/// The real interactive protocol stays behind this trait and out of
/// scope.
#[derive(Debug, Default)]
pub struct EnvIdentityProvider;

impl EnvIdentityProvider {
    fn account_from_env(&self) -> Option<Account> {
        let username = std::env::var("CCR_USERNAME").ok()?;
        let role_claims = std::env::var("CCR_ROLES")
            .map(|roles| {
                roles
                    .split(',')
                    .map(|claim| claim.trim().to_owned())
                    .filter(|claim| !claim.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Some(Account {
            username,
            role_claims,
        })
    }
}

impl IdentityProvider for EnvIdentityProvider {
    fn acquire_token_silent(
        &self,
        _account: &Account,
        _scopes: &[String],
    ) -> Result<AccessToken, AuthError> {
        match std::env::var("CCR_ACCESS_TOKEN") {
            Ok(token) if !token.trim().is_empty() => Ok(AccessToken::new(token)),
            _ => Err(AuthError::AuthRequired),
        }
    }

    fn login_popup(&self, _scopes: &[String]) -> Result<Account, AuthError> {
        self.account_from_env().ok_or(AuthError::UserCancelled)
    }

    fn login_redirect(&self, scopes: &[String]) -> Result<Account, AuthError> {
        self.login_popup(scopes)
    }

    fn sign_out(&self, _account: &Account) -> Result<(), AuthError> {
        Ok(())
    }
}
