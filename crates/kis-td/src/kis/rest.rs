//! REST transport for the KIS open API.
//!
//! Owns the HTTP client, attaches headers, and unwraps the broker's response
//! envelope:
//!
//! ```json
//! { "rt_cd": "0", "msg_cd": "APBK0013", "msg1": "...", "output": { ... } }
//! ```
//!
//! `rt_cd == "0"` is success; anything else becomes [`KisError::Remote`].
//!
//! # Endpoints outside the router
//!
//! | Operation     | Method | Path             |
//! |---------------|--------|------------------|
//! | Issue token   | POST   | `/oauth2/tokenP` |
//! | Hashkey       | POST   | `/uapi/hashkey`  |

use std::time::Duration;

use async_trait::async_trait;
use kis_core::error::{KisError, Result};
use serde_json::{Value, json};
use tracing::debug;

use super::auth::{AppCredentials, HEADER_HASHKEY, HEADER_TR_CONT, Signer};
use super::router::RoutingDecision;
use super::token::{IssuedToken, TokenExchange};

pub const TOKEN_PATH: &str = "/oauth2/tokenP";
pub const HASHKEY_PATH: &str = "/uapi/hashkey";

/// A decoded response plus the continuation header.
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub body: Value,
    /// `tr_cont` response header, trimmed.
    pub tr_cont: Option<String>,
}

/// HTTP client bound to one base URL and one set of app credentials.
pub struct RestClient {
    /// Shared HTTP client (carries the request timeout).
    http: reqwest::Client,
    /// REST base URL without trailing slash.
    base_url: String,
    credentials: AppCredentials,
}

impl RestClient {
    /// Build a client whose every request times out after `timeout`.
    pub fn new(base_url: impl Into<String>, credentials: AppCredentials, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KisError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    // -----------------------------------------------------------------------
    // Routed calls
    // -----------------------------------------------------------------------

    /// `GET` a routed query endpoint.
    pub async fn get(
        &self,
        access_token: &str,
        decision: &RoutingDecision,
        query: &[(&str, String)],
        tr_cont: Option<&str>,
    ) -> Result<RestResponse> {
        let mut req = self
            .credentials
            .apply(self.http.get(self.url(decision.endpoint_path())), access_token, decision.tr_id())
            .query(query);
        if let Some(flag) = tr_cont {
            req = req.header(HEADER_TR_CONT, flag);
        }

        debug!("[kis-rest] GET {} tr_id={}", decision.endpoint_path(), decision.tr_id());
        let resp = req
            .send()
            .await
            .map_err(|e| KisError::Transport(format!("GET {} failed: {e}", decision.endpoint_path())))?;
        read_envelope(resp).await
    }

    /// `POST` a JSON body to a routed write endpoint.
    pub async fn post(
        &self,
        access_token: &str,
        decision: &RoutingDecision,
        body: &Value,
        hashkey: Option<&str>,
    ) -> Result<RestResponse> {
        let mut req = self
            .credentials
            .apply(self.http.post(self.url(decision.endpoint_path())), access_token, decision.tr_id())
            .json(body);
        if let Some(hash) = hashkey {
            req = req.header(HEADER_HASHKEY, hash);
        }

        debug!("[kis-rest] POST {} tr_id={}", decision.endpoint_path(), decision.tr_id());
        let resp = req
            .send()
            .await
            .map_err(|e| KisError::Transport(format!("POST {} failed: {e}", decision.endpoint_path())))?;
        read_envelope(resp).await
    }

    // -----------------------------------------------------------------------
    // Token / hashkey
    // -----------------------------------------------------------------------

    /// Exchange the app key/secret for an access token.
    ///
    /// Unlike every other call the key material travels in the body.
    pub async fn issue_token(&self, app_key: &str, app_secret: &str) -> Result<IssuedToken> {
        let body = json!({
            "grant_type": "client_credentials",
            "appkey": app_key,
            "appsecret": app_secret,
        });
        let resp = self
            .http
            .post(self.url(TOKEN_PATH))
            .json(&body)
            .send()
            .await
            .map_err(|e| KisError::Auth(format!("token request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| KisError::Auth(format!("token response unreadable: {e}")))?;
        if !status.is_success() {
            return Err(KisError::Auth(format!("token request returned HTTP {status}: {}", snippet(&text))));
        }
        let body: Value = serde_json::from_str(&text)
            .map_err(|e| KisError::Auth(format!("malformed token response: {e}")))?;
        parse_issued_token(&body)
    }

    /// Obtain the hashkey for a request body.
    pub async fn hashkey(&self, payload: &Value) -> Result<String> {
        let resp = self
            .credentials
            .apply_app(self.http.post(self.url(HASHKEY_PATH)))
            .json(payload)
            .send()
            .await
            .map_err(|e| KisError::Signing(format!("hashkey request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(KisError::Signing(format!("hashkey request returned HTTP {status}")));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| KisError::Signing(format!("malformed hashkey response: {e}")))?;
        body.get("HASH")
            .and_then(Value::as_str)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .ok_or_else(|| KisError::Signing("HASH not found in response".into()))
    }
}

#[async_trait]
impl TokenExchange for RestClient {
    async fn exchange(&self, app_key: &str, app_secret: &str) -> Result<IssuedToken> {
        self.issue_token(app_key, app_secret).await
    }
}

#[async_trait]
impl Signer for RestClient {
    async fn sign(&self, payload: &Value) -> Result<String> {
        self.hashkey(payload).await
    }
}

// ---------------------------------------------------------------------------
// Envelope helpers
// ---------------------------------------------------------------------------

async fn read_envelope(resp: reqwest::Response) -> Result<RestResponse> {
    let status = resp.status();
    let tr_cont = resp
        .headers()
        .get(HEADER_TR_CONT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let text = resp
        .text()
        .await
        .map_err(|e| KisError::Transport(format!("response body unreadable: {e}")))?;

    let body = decode_envelope(status.as_u16(), &text)?;
    Ok(RestResponse { body, tr_cont })
}

/// Map an HTTP status and body text onto the error taxonomy.
///
/// A business envelope takes precedence over the HTTP status, since the
/// broker reports many business failures with a 5xx status.
pub fn decode_envelope(status: u16, text: &str) -> Result<Value> {
    let success = (200..300).contains(&status);
    let body: Value = match serde_json::from_str(text) {
        Ok(body) => body,
        Err(_) if !success => {
            return Err(KisError::Transport(format!("HTTP {status}: {}", snippet(text))));
        }
        Err(e) => return Err(KisError::Transport(format!("malformed response body: {e}"))),
    };

    let rt_cd = body.get("rt_cd").and_then(Value::as_str).map(str::to_string);
    match rt_cd.as_deref() {
        Some("0") if success => Ok(body),
        Some(rt_cd) if rt_cd != "0" => {
            let code = body
                .get("msg_cd")
                .and_then(Value::as_str)
                .unwrap_or(rt_cd)
                .trim()
                .to_string();
            let message = body
                .get("msg1")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string();
            Err(KisError::Remote { code, message })
        }
        _ if !success => Err(KisError::Transport(format!("HTTP {status}: {}", snippet(text)))),
        _ => Ok(body),
    }
}

fn parse_issued_token(body: &Value) -> Result<IssuedToken> {
    let access_token = body
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| KisError::Auth("access_token not found in response".into()))?
        .to_string();
    let ttl_secs = body
        .get("expires_in")
        .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
        .ok_or_else(|| KisError::Auth("expires_in not found in response".into()))?;
    Ok(IssuedToken { access_token, ttl_secs })
}

/// First 200 chars of a body, for error messages.
fn snippet(text: &str) -> &str {
    let end = text.char_indices().nth(200).map(|(i, _)| i).unwrap_or(text.len());
    &text[..end]
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(base_url: &str) -> RestClient {
        RestClient::new(base_url, AppCredentials::new("key", "secret", "P"), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn envelope_success() {
        let body = decode_envelope(200, r#"{"rt_cd": "0", "output": {"last": "1"}}"#).unwrap();
        assert_eq!(body["output"]["last"], "1");
    }

    #[test]
    fn envelope_business_error_wins_over_status() {
        let err = decode_envelope(500, r#"{"rt_cd": "1", "msg_cd": "APBK0656", "msg1": "no such order "}"#)
            .unwrap_err();
        assert_eq!(
            err,
            KisError::Remote { code: "APBK0656".into(), message: "no such order".into() }
        );
    }

    #[test]
    fn envelope_http_error_without_business_code() {
        assert!(matches!(decode_envelope(502, "<html>bad gateway</html>"), Err(KisError::Transport(_))));
        assert!(matches!(decode_envelope(200, "not json"), Err(KisError::Transport(_))));
        assert!(matches!(decode_envelope(500, r#"{"rt_cd": "0"}"#), Err(KisError::Transport(_))));
    }

    #[test]
    fn token_ttl_accepts_string_or_number() {
        let t = parse_issued_token(&json!({"access_token": "abc", "expires_in": 86400})).unwrap();
        assert_eq!(t.ttl_secs, 86_400);
        let t = parse_issued_token(&json!({"access_token": "abc", "expires_in": "3600"})).unwrap();
        assert_eq!(t.ttl_secs, 3_600);
        assert!(matches!(parse_issued_token(&json!({"expires_in": 1})), Err(KisError::Auth(_))));
    }

    #[tokio::test]
    async fn issue_token_posts_credentials_in_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_partial_json(json!({
                "grant_type": "client_credentials",
                "appkey": "key",
                "appsecret": "secret"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "eyJ0eXAi",
                "token_type": "Bearer",
                "expires_in": 86400
            })))
            .expect(1)
            .mount(&server)
            .await;

        let issued = client(&server.uri()).issue_token("key", "secret").await.unwrap();
        assert_eq!(issued, IssuedToken { access_token: "eyJ0eXAi".into(), ttl_secs: 86_400 });
    }

    #[tokio::test]
    async fn issue_token_http_failure_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string(r#"{"error_code":"EGW00133"}"#))
            .mount(&server)
            .await;

        let err = client(&server.uri()).issue_token("key", "secret").await.unwrap_err();
        assert!(matches!(err, KisError::Auth(ref m) if m.contains("403")));
    }

    #[tokio::test]
    async fn hashkey_returns_hash_and_sends_app_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(HASHKEY_PATH))
            .and(header("appkey", "key"))
            .and(header("appsecret", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"HASH": "8f3a"})))
            .mount(&server)
            .await;

        let hash = client(&server.uri()).sign(&json!({"PDNO": "AAPL"})).await.unwrap();
        assert_eq!(hash, "8f3a");
    }

    #[tokio::test]
    async fn hashkey_without_hash_is_signing_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(HASHKEY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"BODY": {}})))
            .mount(&server)
            .await;

        let err = client(&server.uri()).hashkey(&json!({})).await.unwrap_err();
        assert!(matches!(err, KisError::Signing(_)));
    }
}
