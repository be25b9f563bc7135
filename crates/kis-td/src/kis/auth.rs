//! Authentication headers and request signing.
//!
//! Every trading call carries the same header set:
//!
//! | Header          | Value                         |
//! |-----------------|-------------------------------|
//! | `content-type`  | `application/json`            |
//! | `authorization` | `Bearer <access token>`       |
//! | `appkey`        | application key               |
//! | `appsecret`     | application secret            |
//! | `tr_id`         | transaction identifier        |
//! | `custtype`      | `P` individual / `B` corporate|
//!
//! Live regular-session writes additionally send a `hashkey` header: a
//! signature of the JSON body issued by the broker's `/uapi/hashkey`
//! endpoint. The signature is computed remotely, so [`Signer`] is only a
//! contract; [`RestClient`](super::rest::RestClient) implements it.

use async_trait::async_trait;
use kis_core::error::Result;
use reqwest::RequestBuilder;

pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_APP_KEY: &str = "appkey";
pub const HEADER_APP_SECRET: &str = "appsecret";
pub const HEADER_TR_ID: &str = "tr_id";
pub const HEADER_CUST_TYPE: &str = "custtype";
pub const HEADER_HASHKEY: &str = "hashkey";
/// Continuation flag, sent as `N` on follow-up pages and returned by the
/// broker as `M`/`F` (more) or `D`/`E` (done).
pub const HEADER_TR_CONT: &str = "tr_cont";

/// Produces a signature for a request body.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign `payload`. Failures should be
    /// [`KisError::Signing`](kis_core::error::KisError::Signing).
    async fn sign(&self, payload: &serde_json::Value) -> Result<String>;
}

/// Application credentials attached to every request.
#[derive(Clone)]
pub struct AppCredentials {
    pub app_key: String,
    pub app_secret: String,
    pub cust_type: String,
}

impl AppCredentials {
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>, cust_type: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            cust_type: cust_type.into(),
        }
    }

    /// Attach the app key and secret only (token and hashkey calls).
    pub fn apply_app(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(HEADER_APP_KEY, &self.app_key)
            .header(HEADER_APP_SECRET, &self.app_secret)
    }

    /// Attach the full trading header set.
    pub fn apply(&self, req: RequestBuilder, access_token: &str, tr_id: &str) -> RequestBuilder {
        self.apply_app(req)
            .header(HEADER_CONTENT_TYPE, CONTENT_TYPE_JSON)
            .header(HEADER_AUTHORIZATION, format!("Bearer {access_token}"))
            .header(HEADER_TR_ID, tr_id)
            .header(HEADER_CUST_TYPE, &self.cust_type)
    }
}

// Secrets stay out of debug output.
impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_key", &kis_core::logging::redact(&self.app_key))
            .field("app_secret", &"<redacted>")
            .field("cust_type", &self.cust_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_sets_trading_headers() {
        let creds = AppCredentials::new("PSkey", "sekret", "P");
        let req = creds
            .apply(reqwest::Client::new().get("http://localhost/x"), "tok", "TTTS3012R")
            .build()
            .unwrap();
        let headers = req.headers();
        assert_eq!(headers[HEADER_CONTENT_TYPE], CONTENT_TYPE_JSON);
        assert_eq!(headers[HEADER_AUTHORIZATION], "Bearer tok");
        assert_eq!(headers[HEADER_APP_KEY], "PSkey");
        assert_eq!(headers[HEADER_APP_SECRET], "sekret");
        assert_eq!(headers[HEADER_TR_ID], "TTTS3012R");
        assert_eq!(headers[HEADER_CUST_TYPE], "P");
        assert!(headers.get(HEADER_HASHKEY).is_none());
    }

    #[test]
    fn debug_hides_secret() {
        let creds = AppCredentials::new("PSabcdefghijkl", "sekret", "P");
        let out = format!("{creds:?}");
        assert!(!out.contains("sekret"));
        assert!(!out.contains("PSabcdefghijkl"));
    }
}
