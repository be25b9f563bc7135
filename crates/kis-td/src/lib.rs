//! # kis-td
//!
//! Trading (order execution and account queries) for KIS overseas stocks.
//!
//! The broker module implements the [`TdModule`] trait, which provides a
//! uniform interface for quotes, account queries and order management. The
//! lifecycle is: construct → [`login`](TdModule::login) → operations.
//!
//! ## Accounts
//!
//! | Mode  | Server                                      | Orders          |
//! |-------|---------------------------------------------|-----------------|
//! | Live  | `openapi.koreainvestment.com:9443`          | day + night     |
//! | Paper | `openapivts.koreainvestment.com:29443`      | LIMIT only      |

pub mod kis;

use async_trait::async_trait;
use kis_core::enums::Market;
use kis_core::error::Result;
use kis_core::trading::*;

pub use kis::KisTd;
pub use kis::token::Credential;

/// Trait implemented by trading modules.
///
/// # Lifecycle
///
/// 1. Construct via the broker-specific `new(config)`.
/// 2. Optionally call [`login`](TdModule::login) to obtain the access token
///    up front; every other operation acquires it on demand.
/// 3. Query with [`quote`](TdModule::quote), [`balance`](TdModule::balance)
///    and friends; trade with [`place_order`](TdModule::place_order),
///    [`amend_order`](TdModule::amend_order) and
///    [`cancel_order`](TdModule::cancel_order).
#[async_trait]
pub trait TdModule: Send + Sync {
    /// Obtain a usable access token, issuing one if the cached token is
    /// missing or about to expire.
    async fn login(&self) -> Result<Credential>;

    /// Current price of `symbol`.
    async fn quote(&self, symbol: &str, market: Market) -> Result<Quote>;

    /// Detailed price information, as returned by the broker.
    async fn quote_detail(&self, symbol: &str, market: Market) -> Result<serde_json::Value>;

    /// Holdings and account summary.
    async fn balance(&self) -> Result<Balance>;

    /// Orders not yet (fully) filled.
    async fn pending_orders(&self) -> Result<Vec<OrderRow>>;

    /// Order history for `range`, following continuation pages.
    async fn filled_orders(&self, range: DateRange) -> Result<Vec<OrderRow>>;

    /// Submit a new order. The order type may be downgraded to LIMIT.
    async fn place_order(&self, intent: &OrderIntent) -> Result<OrderAck>;

    /// Change the price or quantity of `intent.original_order_ref`.
    ///
    /// Returns the newly assigned order number.
    async fn amend_order(&self, intent: &OrderIntent) -> Result<OrderAck>;

    /// Cancel `intent.original_order_ref`.
    async fn cancel_order(&self, intent: &OrderIntent) -> Result<OrderAck>;
}
