//! Configuration parsing for the KIS toolkit.
//!
//! All settings come from a single JSON file, read once at process start into
//! an immutable [`AppConfig`]. The upper-case keys of the broker's sample
//! config (`APP_KEY`, `CANO`, `URL_BASE`, ...) are accepted as aliases.
//!
//! # Example config
//!
//! ```json
//! {
//!   "module": { "module_name": "kis-runner", "log_path": "/tmp/log" },
//!   "app_key": "PSxxxxxxxx",
//!   "app_secret": "xxxxxxxx",
//!   "cano": "12345678",
//!   "product_code": "01",
//!   "mode": "paper",
//!   "session": { "timezone": "Asia/Seoul", "day_start_hour": 10, "day_end_hour": 18 },
//!   "history": { "max_pages": 10, "page_interval_ms": 100 }
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::enums::TradingMode;
use crate::error::{KisError, Result};
use crate::time_util::SessionWindow;

/// Environment variable overriding [`AppConfig::app_key`].
pub const ENV_APP_KEY: &str = "KIS_APP_KEY";
/// Environment variable overriding [`AppConfig::app_secret`].
pub const ENV_APP_SECRET: &str = "KIS_APP_SECRET";

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Module metadata (name, log path).
    #[serde(default)]
    pub module: ModuleMeta,

    /// Application key issued by the broker.
    #[serde(default, alias = "APP_KEY")]
    pub app_key: String,

    /// Application secret issued by the broker.
    #[serde(default, alias = "APP_SECRET")]
    pub app_secret: String,

    /// First 8 digits of the account number.
    #[serde(default, alias = "CANO")]
    pub cano: String,

    /// Last 2 digits of the account number (account product code).
    #[serde(default = "default_product_code", alias = "ACNT_PRDT_CD")]
    pub product_code: String,

    /// Live or paper trading.
    #[serde(default)]
    pub mode: TradingMode,

    /// REST base URL; defaults by [`mode`](Self::mode).
    #[serde(default, alias = "URL_BASE")]
    pub base_url: Option<String>,

    /// Customer type header: `P` individual, `B` corporate.
    #[serde(default = "default_cust_type", alias = "custtype")]
    pub cust_type: String,

    /// Where the access token is cached between runs.
    #[serde(default = "default_token_path")]
    pub token_path: String,

    /// Timeout applied to every outbound request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Day-session window.
    #[serde(default)]
    pub session: SessionWindow,

    /// Pagination limits for history queries.
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Module metadata block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

/// Pagination limits for history queries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryConfig {
    /// Hard ceiling on pages fetched per query.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Pause between consecutive page requests, in milliseconds.
    #[serde(default = "default_page_interval")]
    pub page_interval_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            page_interval_ms: default_page_interval(),
        }
    }
}

impl AppConfig {
    /// A config with only the required fields set; everything else defaulted.
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        cano: impl Into<String>,
        mode: TradingMode,
    ) -> Self {
        Self {
            module: ModuleMeta::default(),
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            cano: cano.into(),
            product_code: default_product_code(),
            mode,
            base_url: None,
            cust_type: default_cust_type(),
            token_path: default_token_path(),
            request_timeout_secs: default_request_timeout(),
            session: SessionWindow::default(),
            history: HistoryConfig::default(),
        }
    }

    /// The REST base URL, without a trailing slash.
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.mode.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    /// Returns the module name, defaulting to `kis`.
    pub fn module_name(&self) -> String {
        self.module.module_name.clone().unwrap_or_else(|| "kis".into())
    }

    /// Returns the log path.
    pub fn log_path(&self) -> Option<String> {
        self.module.log_path.clone()
    }

    /// Replace the key/secret with the `KIS_APP_KEY` / `KIS_APP_SECRET`
    /// environment variables when they are set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_APP_KEY).ok(),
            std::env::var(ENV_APP_SECRET).ok(),
        );
    }

    fn apply_overrides(&mut self, app_key: Option<String>, app_secret: Option<String>) {
        if let Some(key) = app_key.filter(|k| !k.is_empty()) {
            self.app_key = key;
        }
        if let Some(secret) = app_secret.filter(|s| !s.is_empty()) {
            self.app_secret = secret;
        }
    }

    /// Check that credentials and account identifiers are present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("app_key", &self.app_key),
            ("app_secret", &self.app_secret),
            ("cano", &self.cano),
            ("product_code", &self.product_code),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(KisError::Config(format!("{name} is missing")));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(KisError::Config("request_timeout_secs must be positive".into()));
        }
        self.session.validate()
    }
}

/// Load and parse a JSON config file, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| KisError::Config(format!("cannot read {}: {e}", path.display())))?;
    let mut config: AppConfig = serde_json::from_str(&content)
        .map_err(|e| KisError::Config(format!("cannot parse {}: {e}", path.display())))?;
    config.apply_env_overrides();
    Ok(config)
}

// ---------------------------------------------------------------------------
// Defaults (used by serde)
// ---------------------------------------------------------------------------

fn default_product_code() -> String {
    "01".into()
}

fn default_cust_type() -> String {
    "P".into()
}

fn default_token_path() -> String {
    "token.json".into()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_max_pages() -> u32 {
    10
}

fn default_page_interval() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"app_key": "k", "app_secret": "s", "cano": "12345678"}"#,
        )
        .unwrap();
        assert_eq!(config.mode, TradingMode::Live);
        assert_eq!(config.product_code, "01");
        assert_eq!(config.cust_type, "P");
        assert_eq!(config.token_path, "token.json");
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.history, HistoryConfig::default());
        assert_eq!(config.effective_base_url(), "https://openapi.koreainvestment.com:9443");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn accepts_upper_case_aliases() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "APP_KEY": "k",
                "APP_SECRET": "s",
                "CANO": "12345678",
                "ACNT_PRDT_CD": "22",
                "URL_BASE": "https://openapivts.koreainvestment.com:29443/",
                "mode": "paper"
            }"#,
        )
        .unwrap();
        assert_eq!(config.product_code, "22");
        assert_eq!(config.mode, TradingMode::Paper);
        assert_eq!(config.effective_base_url(), "https://openapivts.koreainvestment.com:29443");
    }

    #[test]
    fn validate_reports_missing_secret() {
        let config = AppConfig::new("k", "", "12345678", TradingMode::Live);
        assert_eq!(
            config.validate(),
            Err(KisError::Config("app_secret is missing".into()))
        );
    }

    #[test]
    fn overrides_replace_only_non_empty_values() {
        let mut config = AppConfig::new("file-key", "file-secret", "12345678", TradingMode::Live);
        config.apply_overrides(Some("env-key".into()), Some(String::new()));
        assert_eq!(config.app_key, "env-key");
        assert_eq!(config.app_secret, "file-secret");
    }

    #[test]
    fn load_config_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"app_key": "k", "app_secret": "s", "cano": "1", "session": {{"day_start_hour": 9}}}}"#
        )
        .unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.session.day_start_hour, 9);
        assert_eq!(config.session.day_end_hour, 18);
    }

    #[test]
    fn load_config_maps_parse_failure_to_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(load_config(file.path()), Err(KisError::Config(_))));
    }
}
