//! Authorized HTTP calls against the backend REST surface.
//!
//! One entry point, [`ApiClient::call`], carries every JSON endpoint:
//! method defaulting (POST with a body, GET without, explicit override
//! for bodiless POST actions), bearer authorization via the token broker
//! unless bypass mode is active, 204 handling, and mapping of any non-2xx
//! response to a typed [`ClientError::Http`]. File uploads go through
//! [`ApiClient::compare_upload`] with multipart encoding but the same
//! authorization and error-mapping rules.

use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::auth::{AccessToken, AuthError, IdentityProvider, TokenBroker};
use crate::config::ClientConfig;

/// Errors raised by backend calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An authorized call was attempted with no active account.
    #[error("not signed in")]
    NotSignedIn,

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Any non-2xx backend response.
    #[error("{}", status_line(.status, .status_text, .body))]
    Http {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Gateway over the backend REST API.
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    broker: TokenBroker,
}

impl ApiClient {
    pub fn new(config: ClientConfig, provider: Box<dyn IdentityProvider>) -> Self {
        ApiClient {
            http: reqwest::Client::new(),
            broker: TokenBroker::new(provider, config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn broker(&self) -> &TokenBroker {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut TokenBroker {
        &mut self.broker
    }

    /// Call a JSON endpoint.
    ///
    /// The method defaults to POST when a body is supplied and GET
    /// otherwise; pass `method` to override (bodiless POST actions such
    /// as submit/approve/reject). A 204 response yields `None` with no
    /// parse attempt.
    pub async fn call(
        &mut self,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
        method: Option<Method>,
    ) -> Result<Option<Value>, ClientError> {
        let url = self.config.endpoint(path);
        let method = resolve_method(body.is_some(), method);
        tracing::debug!(%method, %url, "backend call");

        let mut request = self
            .http
            .request(method, &url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = self.bearer_for_call()? {
            request = request.bearer_auth(token.secret());
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let status_text = reason_phrase(status);
        let text = response.text().await?;
        classify_response(status.as_u16(), &status_text, &text)
    }

    /// Upload a document (and optional coder-supplied codes, JSON or CSV,
    /// interpreted only by the backend) for comparison against the
    /// system-suggested codes.
    pub async fn compare_upload(
        &mut self,
        file_name: &str,
        bytes: Vec<u8>,
        codes: Option<String>,
    ) -> Result<Option<Value>, ClientError> {
        let url = self.config.endpoint("episodes/compare-upload");
        tracing::debug!(%url, file = %file_name, "upload comparison");

        let mut form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_owned()),
        );
        if let Some(codes) = codes.filter(|c| !c.trim().is_empty()) {
            form = form.text("codes", codes);
        }

        let mut request = self.http.post(&url);
        if let Some(token) = self.bearer_for_call()? {
            request = request.bearer_auth(token.secret());
        }

        let response = request.multipart(form).send().await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let status_text = reason_phrase(status);
        let text = response.text().await?;
        classify_response(status.as_u16(), &status_text, &text)
    }

    /// Bearer token for the next request, or `None` under bypass mode.
    ///
    /// Absence of an active account is a fatal precondition for
    /// authorized calls.
    fn bearer_for_call(&mut self) -> Result<Option<AccessToken>, ClientError> {
        if self.config.bypass_auth {
            return Ok(None);
        }
        if self.broker.active_account().is_none() {
            return Err(ClientError::NotSignedIn);
        }
        Ok(Some(self.broker.acquire()?))
    }
}

/// Status line for error display: `"<status> <statusText>: <body>"`,
/// with the body suffix omitted when empty.
fn status_line(status: &u16, status_text: &str, body: &str) -> String {
    if body.is_empty() {
        format!("{status} {status_text}")
    } else {
        format!("{status} {status_text}: {body}")
    }
}

/// POST when a body is supplied, GET otherwise, unless overridden.
fn resolve_method(has_body: bool, method: Option<Method>) -> Method {
    match method {
        Some(method) => method,
        None if has_body => Method::POST,
        None => Method::GET,
    }
}

fn reason_phrase(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or_default().to_owned()
}

/// Map a received status and body to the call result: non-2xx becomes a
/// typed failure carrying the body text, an empty 2xx body becomes
/// `None`, anything else is parsed as JSON.
fn classify_response(
    status: u16,
    status_text: &str,
    body: &str,
) -> Result<Option<Value>, ClientError> {
    if !(200..300).contains(&status) {
        return Err(ClientError::Http {
            status,
            status_text: status_text.to_owned(),
            body: body.to_owned(),
        });
    }
    if body.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(body)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Account;

    fn config(bypass: bool) -> ClientConfig {
        ClientConfig {
            api_base: "https://api.example.org".to_owned(),
            api_scope: Some("api://ccr/.default".to_owned()),
            bypass_auth: bypass,
            client_id: None,
            tenant_id: None,
            redirect_uri: None,
        }
    }

    struct FixedTokenProvider;

    impl IdentityProvider for FixedTokenProvider {
        fn acquire_token_silent(
            &self,
            _account: &Account,
            _scopes: &[String],
        ) -> Result<AccessToken, AuthError> {
            Ok(AccessToken::new("tok-fixed"))
        }
        fn login_popup(&self, _scopes: &[String]) -> Result<Account, AuthError> {
            Err(AuthError::UserCancelled)
        }
        fn login_redirect(&self, _scopes: &[String]) -> Result<Account, AuthError> {
            Err(AuthError::UserCancelled)
        }
        fn sign_out(&self, _account: &Account) -> Result<(), AuthError> {
            Ok(())
        }
    }

    #[test]
    fn method_defaults_follow_body_presence() {
        assert_eq!(resolve_method(true, None), Method::POST);
        assert_eq!(resolve_method(false, None), Method::GET);
        assert_eq!(resolve_method(false, Some(Method::POST)), Method::POST);
        assert_eq!(resolve_method(true, Some(Method::PUT)), Method::PUT);
    }

    #[test]
    fn successful_json_body_is_parsed() {
        let result = classify_response(200, "OK", r#"{"items":[],"total":0}"#)
            .expect("success")
            .expect("some value");
        assert_eq!(result["total"], 0);
    }

    #[test]
    fn empty_success_body_yields_none() {
        assert!(classify_response(200, "OK", "").expect("success").is_none());
    }

    #[test]
    fn non_2xx_maps_to_typed_http_error() {
        let err = classify_response(409, "Conflict", "episode already submitted")
            .expect_err("failure");
        match err {
            ClientError::Http {
                status,
                status_text,
                body,
            } => {
                assert_eq!(status, 409);
                assert_eq!(status_text, "Conflict");
                assert_eq!(body, "episode already submitted");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[test]
    fn http_error_display_matches_status_line_plus_body() {
        let err = classify_response(500, "Internal Server Error", "boom").expect_err("failure");
        assert_eq!(err.to_string(), "500 Internal Server Error: boom");

        let err = classify_response(401, "Unauthorized", "").expect_err("failure");
        assert_eq!(err.to_string(), "401 Unauthorized");
    }

    #[test]
    fn malformed_success_body_is_a_json_error() {
        let err = classify_response(200, "OK", "not json").expect_err("bad body");
        assert!(matches!(err, ClientError::Json(_)));
    }

    #[test]
    fn bypass_mode_never_attaches_a_bearer_token() {
        let mut client = ApiClient::new(config(true), Box::new(FixedTokenProvider));
        let token = client.bearer_for_call().expect("bypass ok");
        assert!(token.is_none());
    }

    #[test]
    fn authorized_call_without_account_is_not_signed_in() {
        let mut client = ApiClient::new(config(false), Box::new(FixedTokenProvider));
        let err = client.bearer_for_call().expect_err("no account");
        assert!(matches!(err, ClientError::NotSignedIn));
    }

    #[test]
    fn authorized_call_with_account_carries_a_token() {
        struct PopupProvider;
        impl IdentityProvider for PopupProvider {
            fn acquire_token_silent(
                &self,
                _account: &Account,
                _scopes: &[String],
            ) -> Result<AccessToken, AuthError> {
                Ok(AccessToken::new("tok-1"))
            }
            fn login_popup(&self, _scopes: &[String]) -> Result<Account, AuthError> {
                Ok(Account {
                    username: "coder@x".to_owned(),
                    role_claims: vec!["Coder".to_owned()],
                })
            }
            fn login_redirect(&self, _scopes: &[String]) -> Result<Account, AuthError> {
                self.login_popup(_scopes)
            }
            fn sign_out(&self, _account: &Account) -> Result<(), AuthError> {
                Ok(())
            }
        }

        let mut client = ApiClient::new(config(false), Box::new(PopupProvider));
        client.broker_mut().sign_in().expect("sign in");
        let token = client.bearer_for_call().expect("token").expect("present");
        assert_eq!(token.secret(), "tok-1");
    }
}
