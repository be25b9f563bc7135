//! KIS overseas-stock trading module.
//!
//! Implements the [`TdModule`](crate::TdModule) trait against the Korea
//! Investment & Securities open API, for both the live and the paper server.
//!
//! # Architecture
//!
//! ```text
//! KisTd
//! ├── Router         (operation × mode × session → tr_id, endpoint, signing)
//! ├── TokenManager   (cached bearer token, refreshed 60s before expiry)
//! ├── RestClient     (headers, envelope decoding, token + hashkey calls)
//! └── HistoryPages   (continuation-key pagination for listings)
//! ```
//!
//! Calls are sequential: each operation acquires a token, resolves a route,
//! optionally signs the body, and issues one request (or one per page).

pub mod auth;
pub mod pagination;
pub mod rest;
pub mod router;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kis_core::config::AppConfig;
use kis_core::enums::{Market, OperationKind, Side};
use kis_core::error::{KisError, Result};
use kis_core::trading::*;
use serde_json::{Map, Value};
use tracing::{info, warn};

use self::auth::{AppCredentials, Signer};
use self::pagination::HistoryPages;
use self::rest::RestClient;
use self::router::{Endpoint, Router, RoutingDecision};
use self::token::{Credential, CredentialStore, FileCredentialStore, TokenManager};

/// Amend/cancel selector (`RVSE_CNCL_DVSN_CD`).
const AMEND_CODE: &str = "01";
const CANCEL_CODE: &str = "02";

/// KIS trading module.
pub struct KisTd {
    /// Validated configuration.
    config: AppConfig,
    rest: Arc<RestClient>,
    /// Hashkey provider; the REST client unless replaced.
    signer: Arc<dyn Signer>,
    tokens: TokenManager,
    router: Router,
    /// Wall clock, used for session selection and token expiry.
    clock: fn() -> DateTime<Utc>,
}

impl KisTd {
    /// Create a module that persists its token to `config.token_path`.
    pub fn new(config: AppConfig) -> Result<Self> {
        let store = FileCredentialStore::new(&config.token_path);
        Self::with_store(config, Box::new(store))
    }

    /// Create a module with an explicit credential store.
    ///
    /// # Errors
    ///
    /// [`KisError::Config`] if the configuration is incomplete, the session
    /// window is invalid, or the HTTP client cannot be built.
    pub fn with_store(config: AppConfig, store: Box<dyn CredentialStore>) -> Result<Self> {
        config.validate()?;
        let router = Router::new(config.session.clone())?;

        let credentials = AppCredentials::new(&config.app_key, &config.app_secret, &config.cust_type);
        let rest = Arc::new(RestClient::new(
            config.effective_base_url(),
            credentials,
            Duration::from_secs(config.request_timeout_secs),
        )?);
        let tokens = TokenManager::new(&config.app_key, &config.app_secret, store, rest.clone());

        info!(
            "[kis-td] {} mode, base_url={}, account={}-{}",
            config.mode,
            rest.base_url(),
            config.cano,
            config.product_code
        );
        Ok(Self {
            signer: rest.clone(),
            config,
            rest,
            tokens,
            router,
            clock: Utc::now,
        })
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the hashkey provider.
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = signer;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Route `operation` for the current mode and session.
    pub fn routing_decision(
        &self,
        operation: OperationKind,
        intent: Option<&OrderIntent>,
    ) -> Result<RoutingDecision> {
        self.router
            .resolve(operation, self.config.mode, (self.clock)(), intent)
    }

    /// Today, in the session timezone.
    pub fn today(&self) -> DateRange {
        DateRange::single_day(self.config.session.local_date((self.clock)()))
    }

    /// Raw pages of the filled-orders listing for `range`.
    pub fn history_pages(&self, range: DateRange) -> Result<HistoryPages<'_>> {
        let decision = self.routing_decision(OperationKind::FilledOrders, None)?;
        let mut query = self.account_params();
        query.extend([
            ("PDNO", "%".to_string()),
            ("ORD_STRT_DT", range.start_param()),
            ("ORD_END_DT", range.end_param()),
            ("SLL_BUY_DVSN", "00".to_string()),
            ("CCLD_NCCS_DVSN", "00".to_string()),
            ("OVRS_EXCG_CD", "%".to_string()),
            ("SORT_SQN", "DS".to_string()),
            ("ORD_DT", String::new()),
            ("ORD_GNO_BRNO", String::new()),
            ("ODNO", String::new()),
        ]);
        Ok(self.pages(decision, query))
    }

    fn pages(&self, decision: RoutingDecision, query: Vec<(&'static str, String)>) -> HistoryPages<'_> {
        HistoryPages::new(
            &self.rest,
            &self.tokens,
            decision,
            query,
            self.config.history.max_pages,
            Duration::from_millis(self.config.history.page_interval_ms),
            self.clock,
        )
    }

    fn account_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("CANO", self.config.cano.clone()),
            ("ACNT_PRDT_CD", self.config.product_code.clone()),
        ]
    }

    async fn access_token(&self) -> Result<String> {
        let now = (self.clock)().timestamp();
        Ok(self.tokens.acquire_at(now).await?.access_token)
    }

    /// Single-page GET returning the decoded body.
    async fn query(
        &self,
        operation: OperationKind,
        query: &[(&str, String)],
    ) -> Result<Value> {
        let decision = self.routing_decision(operation, None)?;
        let token = self.access_token().await?;
        Ok(self.rest.get(&token, &decision, query, None).await?.body)
    }

    async fn price_output(&self, operation: OperationKind, symbol: &str, market: Market) -> Result<Value> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(KisError::Validation("symbol is empty".into()));
        }
        let params = [
            ("AUTH", String::new()),
            ("EXCD", market.quote_code().to_string()),
            ("SYMB", symbol.to_string()),
        ];
        let mut body = self.query(operation, &params).await?;
        match body.get_mut("output").map(Value::take) {
            Some(output) if output.is_object() => Ok(output),
            _ => Err(KisError::Transport(format!("{symbol}: response has no output"))),
        }
    }

    /// Route, build, sign and submit an order-type write.
    async fn submit(&self, operation: OperationKind, intent: &OrderIntent) -> Result<OrderAck> {
        let decision = self.routing_decision(operation, Some(intent))?;
        if let Some(reason) = decision.downgrade_reason {
            warn!(
                "[kis-td] {} {}: {} requested, sending LIMIT ({reason})",
                intent.side, intent.symbol, intent.order_type
            );
        }

        let body = self.order_body(&decision, intent);
        let token = self.access_token().await?;
        let hashkey = if decision.requires_signing {
            let hash = self.signer.sign(&body).await.map_err(|e| match e {
                KisError::Signing(_) => e,
                other => KisError::Signing(other.to_string()),
            })?;
            Some(hash)
        } else {
            None
        };

        let resp = self
            .rest
            .post(&token, &decision, &body, hashkey.as_deref())
            .await?;
        let ack = parse_ack(&resp.body)?;
        info!(
            "[kis-td] {:?} accepted: {} {} x{} @ {:.2} tr_id={} → odno={}",
            operation,
            intent.side,
            intent.symbol,
            intent.quantity,
            intent.rounded_price(),
            decision.tr_id(),
            ack.order_no
        );
        Ok(ack)
    }

    fn order_body(&self, decision: &RoutingDecision, intent: &OrderIntent) -> Value {
        let mut body = Map::new();
        let mut put = |key: &str, value: String| {
            body.insert(key.to_string(), Value::String(value));
        };
        put("CANO", self.config.cano.clone());
        put("ACNT_PRDT_CD", self.config.product_code.clone());
        put("OVRS_EXCG_CD", intent.market.order_code().to_string());
        put("PDNO", intent.symbol.trim().to_string());
        put("ORD_QTY", intent.quantity.to_string());

        match decision.operation {
            OperationKind::PlaceOrder => {
                let order_type = decision.effective_order_type.unwrap_or(intent.order_type);
                put("ORD_DVSN", order_type.code().to_string());
                put("OVRS_ORD_UNPR", format!("{:.2}", intent.rounded_price()));
            }
            OperationKind::AmendOrder => {
                put("ORGN_ODNO", intent.original_ref().unwrap_or_default().to_string());
                put("RVSE_CNCL_DVSN_CD", AMEND_CODE.to_string());
                put("OVRS_ORD_UNPR", format!("{:.2}", intent.rounded_price()));
            }
            _ => {
                put("ORGN_ODNO", intent.original_ref().unwrap_or_default().to_string());
                put("RVSE_CNCL_DVSN_CD", CANCEL_CODE.to_string());
                put("OVRS_ORD_UNPR", "0".to_string());
            }
        }
        put("ORD_SVR_DVSN_CD", "0".to_string());
        // Day-session amend/cancel only.
        if decision.endpoint == Endpoint::DaytimeAmendCancel {
            put("CTAC_TLNO", String::new());
            put("MGCO_APTM_ODNO", String::new());
        }
        Value::Object(body)
    }

    async fn order_rows(&self, mut pages: HistoryPages<'_>, price_field: &str) -> Result<Vec<OrderRow>> {
        let mut rows = Vec::new();
        for page in pages.collect_all().await? {
            rows.extend(output_rows(&page, "output").filter_map(|v| parse_order_row(v, price_field)));
        }
        Ok(rows)
    }
}

#[async_trait]
impl crate::TdModule for KisTd {
    async fn login(&self) -> Result<Credential> {
        let now = (self.clock)().timestamp();
        let credential = self.tokens.acquire_at(now).await?;
        info!(
            "[kis-td] login complete, token valid for {}s",
            credential.remaining_secs(now)
        );
        Ok(credential)
    }

    async fn quote(&self, symbol: &str, market: Market) -> Result<Quote> {
        let output = self.price_output(OperationKind::Quote, symbol, market).await?;
        Ok(Quote {
            symbol: symbol.trim().to_string(),
            last: num_f64(&output, "last"),
            base: num_f64(&output, "base"),
            rate: num_f64(&output, "rate"),
            volume: num_u64(&output, "tvol"),
        })
    }

    async fn quote_detail(&self, symbol: &str, market: Market) -> Result<Value> {
        self.price_output(OperationKind::QuoteDetail, symbol, market).await
    }

    async fn balance(&self) -> Result<Balance> {
        let mut params = self.account_params();
        params.extend([
            ("OVRS_EXCG_CD", Market::Nasdaq.order_code().to_string()),
            ("TR_CRCY_CD", "USD".to_string()),
            ("CTX_AREA_FK200", String::new()),
            ("CTX_AREA_NK200", String::new()),
        ]);
        let body = self.query(OperationKind::Balance, &params).await?;
        Ok(parse_balance(&body))
    }

    async fn pending_orders(&self) -> Result<Vec<OrderRow>> {
        let decision = self.routing_decision(OperationKind::PendingOrders, None)?;
        let mut query = self.account_params();
        query.extend([
            ("OVRS_EXCG_CD", Market::Nasdaq.order_code().to_string()),
            ("SORT_SQN", "DS".to_string()),
        ]);
        self.order_rows(self.pages(decision, query), "ft_ord_unpr3").await
    }

    async fn filled_orders(&self, range: DateRange) -> Result<Vec<OrderRow>> {
        let rows = self.order_rows(self.history_pages(range)?, "ft_ccld_unpr3").await?;
        info!(
            "[kis-td] {} order(s) between {} and {}",
            rows.len(),
            range.start,
            range.end
        );
        Ok(rows)
    }

    async fn place_order(&self, intent: &OrderIntent) -> Result<OrderAck> {
        self.submit(OperationKind::PlaceOrder, intent).await
    }

    async fn amend_order(&self, intent: &OrderIntent) -> Result<OrderAck> {
        self.submit(OperationKind::AmendOrder, intent).await
    }

    async fn cancel_order(&self, intent: &OrderIntent) -> Result<OrderAck> {
        self.submit(OperationKind::CancelOrder, intent).await
    }
}

// ---------------------------------------------------------------------------
// JSON → typed helpers
// ---------------------------------------------------------------------------

/// Numeric field that the broker may send as a string (`"187.2300"`).
fn num_f64(v: &Value, key: &str) -> f64 {
    v.get(key)
        .and_then(|n| match n {
            Value::String(s) => s.trim().parse().ok(),
            other => other.as_f64(),
        })
        .unwrap_or(0.0)
}

fn num_u64(v: &Value, key: &str) -> u64 {
    num_f64(v, key).max(0.0) as u64
}

fn text(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Rows of `key`, which is an array for listings and an object otherwise.
fn output_rows<'v>(body: &'v Value, key: &str) -> impl Iterator<Item = &'v Value> {
    let rows: &[Value] = match body.get(key) {
        Some(Value::Array(rows)) => rows,
        Some(row @ Value::Object(_)) => std::slice::from_ref(row),
        _ => &[],
    };
    rows.iter()
}

fn parse_balance(body: &Value) -> Balance {
    let holdings = output_rows(body, "output1")
        .filter(|row| num_f64(row, "ovrs_cblc_qty") > 0.0)
        .map(|row| Holding {
            symbol: text(row, "ovrs_pdno").unwrap_or_default(),
            name: text(row, "ovrs_item_name").unwrap_or_default(),
            quantity: num_f64(row, "ovrs_cblc_qty"),
            orderable_quantity: num_f64(row, "ord_psbl_qty"),
            avg_price: num_f64(row, "pchs_avg_pric"),
            current_price: num_f64(row, "now_pric2"),
            profit_rate: num_f64(row, "evlu_pfls_rt"),
            profit_amount: num_f64(row, "frcr_evlu_pfls_amt"),
        })
        .collect();

    let summary = output_rows(body, "output2").next().map(|s| BalanceSummary {
        purchase_amount: num_f64(s, "frcr_pchs_amt1"),
        realized_pnl: num_f64(s, "ovrs_tot_pfls"),
        realized_rate: num_f64(s, "rlzt_erng_rt"),
        total_pnl: num_f64(s, "tot_evlu_pfls_amt"),
        total_rate: num_f64(s, "tot_pftrt"),
    });
    Balance { holdings, summary }
}

fn parse_order_row(v: &Value, price_field: &str) -> Option<OrderRow> {
    Some(OrderRow {
        order_no: text(v, "odno")?,
        symbol: text(v, "pdno").unwrap_or_default(),
        side: v
            .get("sll_buy_dvsn_cd")
            .and_then(Value::as_str)
            .and_then(|c| Side::from_code(c.trim())),
        quantity: num_u64(v, "ft_ord_qty"),
        filled_quantity: num_u64(v, "ft_ccld_qty"),
        unfilled_quantity: num_u64(v, "nccs_qty"),
        price: num_f64(v, price_field),
        status: text(v, "prcs_stat_name"),
        reject_reason: text(v, "rjct_rson_name"),
        order_date: text(v, "ord_dt"),
        order_time: text(v, "ord_tmd"),
    })
}

fn parse_ack(body: &Value) -> Result<OrderAck> {
    body.get("output")
        .and_then(|o| text(o, "ODNO").or_else(|| text(o, "odno")))
        .map(|order_no| OrderAck { order_no })
        .ok_or_else(|| KisError::Transport("order response has no order number".into()))
}
