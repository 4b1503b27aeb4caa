//! Code-for-token exchange.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use keyward_config::ClientRegistration;

use crate::error::FailureReason;

/// Successful token endpoint response.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Serialize)]
struct TokenExchangeForm<'a> {
    grant_type: &'static str,
    code: &'a str,
    redirect_uri: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
}

/// Error body from the token endpoint: either the server's envelope or a
/// plain OAuth error object.
#[derive(Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Exchange `code` at `token_url`. Exactly one request is sent.
pub async fn exchange_code(
    http: &reqwest::Client,
    token_url: Url,
    timeout: Duration,
    registration: &ClientRegistration,
    code: &str,
    code_verifier: Option<&str>,
) -> std::result::Result<TokenResponse, FailureReason> {
    let form = TokenExchangeForm {
        grant_type: "authorization_code",
        code,
        redirect_uri: &registration.redirect_uri,
        client_id: &registration.client_id,
        client_secret: &registration.client_secret,
        code_verifier,
    };

    let response = http
        .post(token_url)
        .form(&form)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| FailureReason::Network(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| FailureReason::Network(e.to_string()))?;

    if !status.is_success() {
        let reason = match serde_json::from_str::<TokenErrorBody>(&body) {
            Ok(err) => FailureReason::TokenExchangeRejected {
                status: status.as_u16(),
                error: [err.error, err.error_description, err.message]
                    .into_iter()
                    .flatten()
                    .find(|s| !s.is_empty())
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            },
            Err(_) => FailureReason::TokenExchangeFailed(format!("HTTP {}", status.as_u16())),
        };
        warn!(status = status.as_u16(), reason = reason.code(), "Token exchange rejected");
        return Err(reason);
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| FailureReason::TokenExchangeFailed(format!("malformed token response: {}", e)))?;
    if token.access_token.is_empty() {
        return Err(FailureReason::TokenExchangeFailed(
            "empty access_token".to_string(),
        ));
    }

    debug!(token_type = %token.token_type, expires_in = ?token.expires_in, "Token issued");
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registration() -> ClientRegistration {
        ClientRegistration::new("cid", "csecret", "http://127.0.0.1:3000/cb")
    }

    async fn exchange(server: &MockServer, verifier: Option<&str>) -> Result<TokenResponse, FailureReason> {
        let url = Url::parse(&format!("{}/oauth/token", server.uri())).unwrap();
        exchange_code(
            &reqwest::Client::new(),
            url,
            Duration::from_secs(5),
            &registration(),
            "abc",
            verifier,
        )
        .await
    }

    #[tokio::test]
    async fn test_form_encoded_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains("client_secret=csecret"))
            .and(body_string_contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A3000%2Fcb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-1",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = exchange(&server, None).await.unwrap();
        assert_eq!(token.access_token, "at-1");
        assert_eq!(token.expires_in(), Some(Duration::from_secs(3600)));

        let body = String::from_utf8(server.received_requests().await.unwrap()[0].body.clone()).unwrap();
        assert!(!body.contains("code_verifier"));
    }

    #[tokio::test]
    async fn test_verifier_sent_when_present() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("code_verifier=v123"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "t"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        assert!(exchange(&server, Some("v123")).await.is_ok());
    }

    #[tokio::test]
    async fn test_envelope_error_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "success": false,
                "message": "Invalid authorization code",
                "error": "invalid authorization code"
            })))
            .mount(&server)
            .await;

        assert_eq!(
            exchange(&server, None).await.unwrap_err(),
            FailureReason::TokenExchangeRejected {
                status: 400,
                error: "invalid authorization code".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unparseable_error_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        assert_eq!(
            exchange(&server, None).await.unwrap_err(),
            FailureReason::TokenExchangeFailed("HTTP 502".to_string())
        );
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "x"})))
            .mount(&server)
            .await;

        assert!(matches!(
            exchange(&server, None).await.unwrap_err(),
            FailureReason::TokenExchangeFailed(_)
        ));
    }
}
