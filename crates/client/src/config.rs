//! Environment-provided client configuration.
//!
//! Configuration is read once at startup into an explicit struct and
//! passed down; nothing else in the client reads the environment.
//!
//! Recognized variables:
//! - `API_BASE`: request target root (default `https://localhost:7249`)
//! - `API_SCOPE`: token audience scope; empty or unset means "no API
//!   scope configured" and token requests fall back to the base OIDC
//!   scopes
//! - `BYPASS_AUTH`: when `true` (case-insensitive), skip all token
//!   acquisition and authorization headers
//! - `OIDC_CLIENT_ID`, `OIDC_TENANT_ID`, `OIDC_REDIRECT_URI`: handed to
//!   the identity provider, opaque to this client

use std::env;

/// Default backend root, matching the local development backend.
const DEFAULT_API_BASE: &str = "https://localhost:7249";

/// Base OIDC scopes requested on every sign-in.
const OIDC_BASE_SCOPES: [&str; 2] = ["openid", "profile"];

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request target root, without a trailing slash.
    pub api_base: String,
    /// Token audience scope for the backend API, when configured.
    pub api_scope: Option<String>,
    /// When true, all token logic is disabled and requests go out bare.
    pub bypass_auth: bool,
    pub client_id: Option<String>,
    pub tenant_id: Option<String>,
    pub redirect_uri: Option<String>,
}

impl ClientConfig {
    /// Read configuration from the environment.
    pub fn from_env() -> Self {
        let api_base = env::var("API_BASE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_owned());
        let api_scope = env::var("API_SCOPE")
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty());
        let bypass_auth = env::var("BYPASS_AUTH")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if api_scope.is_none() && !bypass_auth {
            tracing::warn!(
                "API_SCOPE is not set; sign-in will work with OIDC but API calls may fail"
            );
        }

        ClientConfig {
            api_base: api_base.trim_end_matches('/').to_owned(),
            api_scope,
            bypass_auth,
            client_id: env::var("OIDC_CLIENT_ID").ok(),
            tenant_id: env::var("OIDC_TENANT_ID").ok(),
            redirect_uri: env::var("OIDC_REDIRECT_URI").ok(),
        }
    }

    /// Scopes requested on interactive sign-in: the base OIDC scopes plus
    /// the API scope when one is configured.
    pub fn login_scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = OIDC_BASE_SCOPES.iter().map(|s| (*s).to_owned()).collect();
        if let Some(scope) = &self.api_scope {
            scopes.push(scope.clone());
        }
        scopes
    }

    /// Scopes requested on token acquisition: the API scope alone when
    /// configured, else the base OIDC scopes.
    pub fn token_scopes(&self) -> Vec<String> {
        match &self.api_scope {
            Some(scope) => vec![scope.clone()],
            None => OIDC_BASE_SCOPES.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    /// Absolute URL for a backend path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    /// Static, browser-navigated CSV export link.
    pub fn export_csv_url(&self) -> String {
        self.endpoint("export/episodes.csv")
    }

    /// Static, browser-navigated JSON export link.
    pub fn export_json_url(&self) -> String {
        self.endpoint("export/episodes.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_scope(scope: Option<&str>) -> ClientConfig {
        ClientConfig {
            api_base: "https://api.example.org".to_owned(),
            api_scope: scope.map(str::to_owned),
            bypass_auth: false,
            client_id: None,
            tenant_id: None,
            redirect_uri: None,
        }
    }

    #[test]
    fn login_scopes_append_api_scope_when_configured() {
        let config = config_with_scope(Some("api://ccr/.default"));
        assert_eq!(
            config.login_scopes(),
            vec!["openid", "profile", "api://ccr/.default"]
        );
        assert_eq!(config_with_scope(None).login_scopes(), vec!["openid", "profile"]);
    }

    #[test]
    fn token_scopes_prefer_api_scope() {
        let config = config_with_scope(Some("api://ccr/.default"));
        assert_eq!(config.token_scopes(), vec!["api://ccr/.default"]);
        assert_eq!(config_with_scope(None).token_scopes(), vec!["openid", "profile"]);
    }

    #[test]
    fn endpoint_joins_without_duplicate_slashes() {
        let mut config = config_with_scope(None);
        config.api_base = "https://api.example.org".to_owned();
        assert_eq!(
            config.endpoint("episodes/1/submit"),
            "https://api.example.org/episodes/1/submit"
        );
        assert_eq!(
            config.endpoint("/episodes"),
            "https://api.example.org/episodes"
        );
    }

    #[test]
    fn export_links_are_static_urls() {
        let config = config_with_scope(None);
        assert_eq!(
            config.export_csv_url(),
            "https://api.example.org/export/episodes.csv"
        );
        assert_eq!(
            config.export_json_url(),
            "https://api.example.org/export/episodes.json"
        );
    }
}
