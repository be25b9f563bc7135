//! Request routing: which transaction identifier, endpoint and security step
//! a call needs, given the operation, trading mode and session.
//!
//! The broker multiplexes many server-side behaviors behind a handful of
//! endpoints, selected by a `tr_id` header. The identifier varies along three
//! axes (live/paper, day/night session, buy/sell/query), so the selection is
//! kept in one exhaustive table validated at construction.
//!
//! | Operation        | Mode  | Session | Side | tr_id           | Endpoint                       |
//! |------------------|-------|---------|------|-----------------|--------------------------------|
//! | Quote            | any   | any     | -    | `HHDFS00000300` | `quotations/price`             |
//! | QuoteDetail      | any   | any     | -    | `HHDFS76200200` | `quotations/price-detail`      |
//! | Balance          | live  | any     | -    | `TTTS3012R`     | `trading/inquire-balance`      |
//! | PendingOrders    | live  | any     | -    | `TTTS3018R`     | `trading/inquire-nccs`         |
//! | FilledOrders     | live  | any     | -    | `TTTS3035R`     | `trading/inquire-ccnl`         |
//! | PlaceOrder       | live  | day     | buy  | `TTTS6036U`     | `trading/daytime-order`        |
//! | PlaceOrder       | live  | day     | sell | `TTTS6037U`     | `trading/daytime-order`        |
//! | PlaceOrder       | live  | night   | buy  | `TTTT1002U`     | `trading/order`                |
//! | PlaceOrder       | live  | night   | sell | `TTTT1006U`     | `trading/order`                |
//! | Amend/Cancel     | live  | day     | -    | `TTTS6038U`     | `trading/daytime-order-rvsecncl` |
//! | Amend/Cancel     | live  | night   | -    | `TTTT1004U`     | `trading/order-rvsecncl`       |
//!
//! Paper mode swaps the `T` prefix for `V` on queries, and sends every write
//! to the regular-session paper identifiers (`VTTT1002U`, `VTTT1001U`,
//! `VTTT1004U`) since the paper server has no daytime market.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kis_core::enums::{OperationKind, OrderType, Session, Side, TradingMode};
use kis_core::error::{KisError, Result};
use kis_core::time_util::SessionWindow;
use kis_core::trading::OrderIntent;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Transaction identifiers and endpoints
// ---------------------------------------------------------------------------

/// Closed set of transaction identifiers (`tr_id` header values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransactionId {
    QuotePrice,
    QuotePriceDetail,
    BalanceLive,
    BalancePaper,
    PendingLive,
    PendingPaper,
    FilledLive,
    FilledPaper,
    DaytimeBuy,
    DaytimeSell,
    DaytimeAmendCancel,
    BuyLive,
    SellLive,
    AmendCancelLive,
    BuyPaper,
    SellPaper,
    AmendCancelPaper,
}

impl TransactionId {
    /// Wire code sent in the `tr_id` header.
    pub fn code(self) -> &'static str {
        match self {
            Self::QuotePrice => "HHDFS00000300",
            Self::QuotePriceDetail => "HHDFS76200200",
            Self::BalanceLive => "TTTS3012R",
            Self::BalancePaper => "VTTS3012R",
            Self::PendingLive => "TTTS3018R",
            Self::PendingPaper => "VTTS3018R",
            Self::FilledLive => "TTTS3035R",
            Self::FilledPaper => "VTTS3035R",
            Self::DaytimeBuy => "TTTS6036U",
            Self::DaytimeSell => "TTTS6037U",
            Self::DaytimeAmendCancel => "TTTS6038U",
            Self::BuyLive => "TTTT1002U",
            Self::SellLive => "TTTT1006U",
            Self::AmendCancelLive => "TTTT1004U",
            Self::BuyPaper => "VTTT1002U",
            Self::SellPaper => "VTTT1001U",
            Self::AmendCancelPaper => "VTTT1004U",
        }
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// REST endpoints addressed through the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Endpoint {
    Price,
    PriceDetail,
    InquireBalance,
    InquirePending,
    InquireFilled,
    Order,
    DaytimeOrder,
    AmendCancel,
    DaytimeAmendCancel,
}

impl Endpoint {
    /// Path relative to the base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Price => "/uapi/overseas-price/v1/quotations/price",
            Self::PriceDetail => "/uapi/overseas-price/v1/quotations/price-detail",
            Self::InquireBalance => "/uapi/overseas-stock/v1/trading/inquire-balance",
            Self::InquirePending => "/uapi/overseas-stock/v1/trading/inquire-nccs",
            Self::InquireFilled => "/uapi/overseas-stock/v1/trading/inquire-ccnl",
            Self::Order => "/uapi/overseas-stock/v1/trading/order",
            Self::DaytimeOrder => "/uapi/overseas-stock/v1/trading/daytime-order",
            Self::AmendCancel => "/uapi/overseas-stock/v1/trading/order-rvsecncl",
            Self::DaytimeAmendCancel => "/uapi/overseas-stock/v1/trading/daytime-order-rvsecncl",
        }
    }

    /// `true` for the day-session order endpoints.
    pub fn is_daytime(self) -> bool {
        matches!(self, Self::DaytimeOrder | Self::DaytimeAmendCancel)
    }
}

// ---------------------------------------------------------------------------
// Routing table
// ---------------------------------------------------------------------------

/// Lookup key. `side` is set only for operations whose identifier depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub operation: OperationKind,
    pub mode: TradingMode,
    pub session: Session,
    pub side: Option<Side>,
}

/// One table row.
#[derive(Debug, Clone, Copy)]
pub struct RouteEntry {
    pub key: RouteKey,
    pub transaction_id: TransactionId,
    pub endpoint: Endpoint,
}

const fn route(
    operation: OperationKind,
    mode: TradingMode,
    session: Session,
    side: Option<Side>,
    transaction_id: TransactionId,
    endpoint: Endpoint,
) -> RouteEntry {
    RouteEntry {
        key: RouteKey { operation, mode, session, side },
        transaction_id,
        endpoint,
    }
}

use Endpoint as E;
use OperationKind as Op;
use Session::{Day, Night};
use TradingMode::{Live, Paper};
use TransactionId as T;

const BUY: Option<Side> = Some(Side::Buy);
const SELL: Option<Side> = Some(Side::Sell);

/// The broker's full routing table.
pub const STANDARD_ROUTES: &[RouteEntry] = &[
    // -- Quotations (mode and session independent) --
    route(Op::Quote, Live, Day, None, T::QuotePrice, E::Price),
    route(Op::Quote, Live, Night, None, T::QuotePrice, E::Price),
    route(Op::Quote, Paper, Day, None, T::QuotePrice, E::Price),
    route(Op::Quote, Paper, Night, None, T::QuotePrice, E::Price),
    route(Op::QuoteDetail, Live, Day, None, T::QuotePriceDetail, E::PriceDetail),
    route(Op::QuoteDetail, Live, Night, None, T::QuotePriceDetail, E::PriceDetail),
    route(Op::QuoteDetail, Paper, Day, None, T::QuotePriceDetail, E::PriceDetail),
    route(Op::QuoteDetail, Paper, Night, None, T::QuotePriceDetail, E::PriceDetail),
    // -- Account queries --
    route(Op::Balance, Live, Day, None, T::BalanceLive, E::InquireBalance),
    route(Op::Balance, Live, Night, None, T::BalanceLive, E::InquireBalance),
    route(Op::Balance, Paper, Day, None, T::BalancePaper, E::InquireBalance),
    route(Op::Balance, Paper, Night, None, T::BalancePaper, E::InquireBalance),
    route(Op::PendingOrders, Live, Day, None, T::PendingLive, E::InquirePending),
    route(Op::PendingOrders, Live, Night, None, T::PendingLive, E::InquirePending),
    route(Op::PendingOrders, Paper, Day, None, T::PendingPaper, E::InquirePending),
    route(Op::PendingOrders, Paper, Night, None, T::PendingPaper, E::InquirePending),
    route(Op::FilledOrders, Live, Day, None, T::FilledLive, E::InquireFilled),
    route(Op::FilledOrders, Live, Night, None, T::FilledLive, E::InquireFilled),
    route(Op::FilledOrders, Paper, Day, None, T::FilledPaper, E::InquireFilled),
    route(Op::FilledOrders, Paper, Night, None, T::FilledPaper, E::InquireFilled),
    // -- Orders --
    route(Op::PlaceOrder, Live, Day, BUY, T::DaytimeBuy, E::DaytimeOrder),
    route(Op::PlaceOrder, Live, Day, SELL, T::DaytimeSell, E::DaytimeOrder),
    route(Op::PlaceOrder, Live, Night, BUY, T::BuyLive, E::Order),
    route(Op::PlaceOrder, Live, Night, SELL, T::SellLive, E::Order),
    route(Op::PlaceOrder, Paper, Day, BUY, T::BuyPaper, E::Order),
    route(Op::PlaceOrder, Paper, Day, SELL, T::SellPaper, E::Order),
    route(Op::PlaceOrder, Paper, Night, BUY, T::BuyPaper, E::Order),
    route(Op::PlaceOrder, Paper, Night, SELL, T::SellPaper, E::Order),
    // -- Amend / cancel --
    route(Op::AmendOrder, Live, Day, None, T::DaytimeAmendCancel, E::DaytimeAmendCancel),
    route(Op::AmendOrder, Live, Night, None, T::AmendCancelLive, E::AmendCancel),
    route(Op::AmendOrder, Paper, Day, None, T::AmendCancelPaper, E::AmendCancel),
    route(Op::AmendOrder, Paper, Night, None, T::AmendCancelPaper, E::AmendCancel),
    route(Op::CancelOrder, Live, Day, None, T::DaytimeAmendCancel, E::DaytimeAmendCancel),
    route(Op::CancelOrder, Live, Night, None, T::AmendCancelLive, E::AmendCancel),
    route(Op::CancelOrder, Paper, Day, None, T::AmendCancelPaper, E::AmendCancel),
    route(Op::CancelOrder, Paper, Night, None, T::AmendCancelPaper, E::AmendCancel),
];

/// Validated `RouteKey → (tr_id, endpoint)` map covering every key exactly once.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    routes: HashMap<RouteKey, (TransactionId, Endpoint)>,
}

impl RoutingTable {
    /// Build the table from [`STANDARD_ROUTES`].
    pub fn standard() -> Result<Self> {
        Self::from_entries(STANDARD_ROUTES)
    }

    /// Build and validate a table.
    ///
    /// # Errors
    ///
    /// [`KisError::Config`] for a duplicate key, a side on an unsided
    /// operation, or any key left unmapped.
    pub fn from_entries(entries: &[RouteEntry]) -> Result<Self> {
        let mut routes = HashMap::with_capacity(entries.len());
        for entry in entries {
            let key = entry.key;
            if key.side.is_some() != key.operation.is_sided() {
                return Err(KisError::Config(format!("route {key:?} has an invalid side")));
            }
            if routes
                .insert(key, (entry.transaction_id, entry.endpoint))
                .is_some()
            {
                return Err(KisError::Config(format!("route {key:?} is mapped twice")));
            }
        }

        let table = Self { routes };
        for key in all_keys() {
            table.lookup(&key)?;
        }
        Ok(table)
    }

    /// Look up one key.
    pub fn lookup(&self, key: &RouteKey) -> Result<(TransactionId, Endpoint)> {
        self.routes
            .get(key)
            .copied()
            .ok_or_else(|| KisError::Config(format!("no route for {key:?}")))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Every key a total table must cover.
fn all_keys() -> impl Iterator<Item = RouteKey> {
    OperationKind::ALL.into_iter().flat_map(|operation| {
        let sides: &'static [Option<Side>] =
            if operation.is_sided() { &[BUY, SELL] } else { &[None] };
        TradingMode::ALL.into_iter().flat_map(move |mode| {
            Session::ALL.into_iter().flat_map(move |session| {
                sides.iter().map(move |&side| RouteKey { operation, mode, session, side })
            })
        })
    })
}

// ---------------------------------------------------------------------------
// Routing decision
// ---------------------------------------------------------------------------

/// Why an order type was replaced by [`OrderType::Limit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DowngradeReason {
    /// The paper server accepts only limit orders.
    PaperTrading,
    /// Auction-relative orders cannot be delivered in the day session.
    DaySession,
}

impl std::fmt::Display for DowngradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PaperTrading => f.write_str("paper trading accepts only LIMIT orders"),
            Self::DaySession => f.write_str("open/close orders are unavailable in the day session"),
        }
    }
}

/// Everything the transport needs to address one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    pub operation: OperationKind,
    pub session: Session,
    pub transaction_id: TransactionId,
    pub endpoint: Endpoint,
    /// A hashkey must be obtained for the body and sent as a header.
    pub requires_signing: bool,
    /// Order type to send; `None` for queries.
    pub effective_order_type: Option<OrderType>,
    pub downgrade_reason: Option<DowngradeReason>,
}

impl RoutingDecision {
    pub fn tr_id(&self) -> &'static str {
        self.transaction_id.code()
    }

    pub fn endpoint_path(&self) -> &'static str {
        self.endpoint.path()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Pure resolver over a validated [`RoutingTable`].
#[derive(Debug, Clone)]
pub struct Router {
    table: RoutingTable,
    window: SessionWindow,
}

impl Router {
    /// Router over the standard table.
    pub fn new(window: SessionWindow) -> Result<Self> {
        Ok(Self::with_table(RoutingTable::standard()?, window))
    }

    pub fn with_table(table: RoutingTable, window: SessionWindow) -> Self {
        Self { table, window }
    }

    /// Session in effect at `now`.
    pub fn session_at(&self, now: DateTime<Utc>) -> Session {
        self.window.session_at(now)
    }

    /// Resolve a call at `now`. See [`resolve_in_session`](Self::resolve_in_session).
    pub fn resolve(
        &self,
        operation: OperationKind,
        mode: TradingMode,
        now: DateTime<Utc>,
        intent: Option<&OrderIntent>,
    ) -> Result<RoutingDecision> {
        self.resolve_in_session(operation, mode, self.session_at(now), intent)
    }

    /// Resolve a call for an explicit session.
    ///
    /// # Errors
    ///
    /// [`KisError::Validation`] when a write operation has no intent, a
    /// non-positive quantity, a negative or non-finite price, an empty
    /// symbol, or (amend/cancel) no original-order reference.
    pub fn resolve_in_session(
        &self,
        operation: OperationKind,
        mode: TradingMode,
        session: Session,
        intent: Option<&OrderIntent>,
    ) -> Result<RoutingDecision> {
        let intent = if operation.is_write() {
            Some(validate_intent(operation, intent)?)
        } else {
            None
        };

        let side = if operation.is_sided() { intent.map(|i| i.side) } else { None };
        let (transaction_id, endpoint) =
            self.table.lookup(&RouteKey { operation, mode, session, side })?;

        let (effective_order_type, downgrade_reason) = match intent {
            Some(intent) => apply_downgrade(intent.order_type, mode, session),
            None => (None, None),
        };

        Ok(RoutingDecision {
            operation,
            session,
            transaction_id,
            endpoint,
            requires_signing: operation.is_write()
                && mode == TradingMode::Live
                && session == Session::Night,
            effective_order_type,
            downgrade_reason,
        })
    }
}

/// Uniform downgrade policy for every write operation.
fn apply_downgrade(
    requested: OrderType,
    mode: TradingMode,
    session: Session,
) -> (Option<OrderType>, Option<DowngradeReason>) {
    if !requested.is_auction() {
        return (Some(requested), None);
    }
    if mode == TradingMode::Paper {
        (Some(OrderType::Limit), Some(DowngradeReason::PaperTrading))
    } else if session == Session::Day {
        (Some(OrderType::Limit), Some(DowngradeReason::DaySession))
    } else {
        (Some(requested), None)
    }
}

fn validate_intent(operation: OperationKind, intent: Option<&OrderIntent>) -> Result<&OrderIntent> {
    let intent = intent
        .ok_or_else(|| KisError::Validation(format!("{operation:?} requires an order intent")))?;
    if intent.symbol.trim().is_empty() {
        return Err(KisError::Validation("symbol is empty".into()));
    }
    if intent.quantity == 0 {
        return Err(KisError::Validation("quantity must be positive".into()));
    }
    if !intent.limit_price.is_finite() || intent.limit_price < 0.0 {
        return Err(KisError::Validation(format!(
            "limit price {} must be a non-negative number",
            intent.limit_price
        )));
    }
    if matches!(operation, OperationKind::AmendOrder | OperationKind::CancelOrder)
        && intent.original_ref().is_none()
    {
        return Err(KisError::Validation(format!(
            "{operation:?} requires the original order number"
        )));
    }
    Ok(intent)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use kis_core::enums::Market;

    use super::*;

    fn router() -> Router {
        Router::new(SessionWindow::default()).unwrap()
    }

    fn buy(order_type: OrderType) -> OrderIntent {
        OrderIntent::limit(Side::Buy, "AAPL", 1, 50.0, Market::Nasdaq).with_order_type(order_type)
    }

    fn seoul(h: u32) -> DateTime<Utc> {
        chrono_tz::Asia::Seoul
            .with_ymd_and_hms(2024, 3, 4, h, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn standard_table_is_total() {
        let table = RoutingTable::standard().unwrap();
        assert_eq!(table.len(), 36);
        assert!(!table.is_empty());
        assert_eq!(all_keys().count(), 36);
    }

    #[test]
    fn duplicate_and_missing_routes_are_config_errors() {
        let mut entries = STANDARD_ROUTES.to_vec();
        entries.push(STANDARD_ROUTES[0]);
        assert!(matches!(RoutingTable::from_entries(&entries), Err(KisError::Config(_))));

        let missing = &STANDARD_ROUTES[1..];
        assert!(matches!(RoutingTable::from_entries(missing), Err(KisError::Config(_))));

        let mut sided = STANDARD_ROUTES.to_vec();
        sided[0].key.side = BUY;
        assert!(matches!(RoutingTable::from_entries(&sided), Err(KisError::Config(_))));
    }

    #[test]
    fn live_night_loc_is_signed_and_kept() {
        let d = router()
            .resolve_in_session(OperationKind::PlaceOrder, Live, Night, Some(&buy(OrderType::Loc)))
            .unwrap();
        assert!(d.requires_signing);
        assert_eq!(d.effective_order_type, Some(OrderType::Loc));
        assert_eq!(d.downgrade_reason, None);
        assert_eq!(d.tr_id(), "TTTT1002U");
        assert_eq!(d.endpoint_path(), "/uapi/overseas-stock/v1/trading/order");
    }

    #[test]
    fn live_day_loc_is_downgraded() {
        let d = router()
            .resolve_in_session(OperationKind::PlaceOrder, Live, Day, Some(&buy(OrderType::Loc)))
            .unwrap();
        assert!(!d.requires_signing);
        assert_eq!(d.effective_order_type, Some(OrderType::Limit));
        assert_eq!(d.downgrade_reason, Some(DowngradeReason::DaySession));
        assert_eq!(d.tr_id(), "TTTS6036U");
        assert!(d.endpoint.is_daytime());
    }

    #[test]
    fn paper_night_moc_is_downgraded() {
        let sell = OrderIntent::limit(Side::Sell, "TSLA", 2, 500.0, Market::Nasdaq)
            .with_order_type(OrderType::Moc);
        let d = router()
            .resolve_in_session(OperationKind::PlaceOrder, Paper, Night, Some(&sell))
            .unwrap();
        assert_eq!(d.effective_order_type, Some(OrderType::Limit));
        assert_eq!(d.downgrade_reason, Some(DowngradeReason::PaperTrading));
        assert_eq!(d.tr_id(), "VTTT1001U");
        assert!(!d.requires_signing);
    }

    #[test]
    fn paper_reason_wins_in_day_session() {
        let d = router()
            .resolve_in_session(OperationKind::PlaceOrder, Paper, Day, Some(&buy(OrderType::Loo)))
            .unwrap();
        assert_eq!(d.effective_order_type, Some(OrderType::Limit));
        assert_eq!(d.downgrade_reason, Some(DowngradeReason::PaperTrading));
        assert_eq!(d.tr_id(), "VTTT1002U");
        assert!(!d.requires_signing);
        assert!(!d.endpoint.is_daytime());
    }

    #[test]
    fn limit_orders_are_never_downgraded() {
        for mode in TradingMode::ALL {
            for session in Session::ALL {
                let d = router()
                    .resolve_in_session(OperationKind::PlaceOrder, mode, session, Some(&buy(OrderType::Limit)))
                    .unwrap();
                assert_eq!(d.effective_order_type, Some(OrderType::Limit));
                assert_eq!(d.downgrade_reason, None);
            }
        }
    }

    #[test]
    fn amend_without_original_ref_is_rejected() {
        for mode in TradingMode::ALL {
            for session in Session::ALL {
                let err = router()
                    .resolve_in_session(OperationKind::AmendOrder, mode, session, Some(&buy(OrderType::Limit)))
                    .unwrap_err();
                assert!(matches!(err, KisError::Validation(_)));
            }
        }
        let err = router()
            .resolve_in_session(OperationKind::CancelOrder, Live, Night, Some(&buy(OrderType::Limit).amending("")))
            .unwrap_err();
        assert!(matches!(err, KisError::Validation(_)));
    }

    #[test]
    fn amend_and_cancel_share_identifiers() {
        let intent = buy(OrderType::Limit).amending("0030072265");
        let r = router();
        let amend = r.resolve_in_session(OperationKind::AmendOrder, Live, Night, Some(&intent)).unwrap();
        let cancel = r.resolve_in_session(OperationKind::CancelOrder, Live, Night, Some(&intent)).unwrap();
        assert_eq!(amend.tr_id(), "TTTT1004U");
        assert_eq!(cancel.tr_id(), "TTTT1004U");
        assert!(amend.requires_signing && cancel.requires_signing);

        let day = r.resolve_in_session(OperationKind::CancelOrder, Live, Day, Some(&intent)).unwrap();
        assert_eq!(day.tr_id(), "TTTS6038U");
        assert!(!day.requires_signing);
    }

    #[test]
    fn write_operations_validate_intent() {
        let r = router();
        assert!(matches!(
            r.resolve_in_session(OperationKind::PlaceOrder, Live, Night, None),
            Err(KisError::Validation(_))
        ));
        let mut zero = buy(OrderType::Limit);
        zero.quantity = 0;
        assert!(r.resolve_in_session(OperationKind::PlaceOrder, Live, Night, Some(&zero)).is_err());
        let mut negative = buy(OrderType::Limit);
        negative.limit_price = -1.0;
        assert!(r.resolve_in_session(OperationKind::PlaceOrder, Live, Night, Some(&negative)).is_err());
        let mut nan = buy(OrderType::Limit);
        nan.limit_price = f64::NAN;
        assert!(r.resolve_in_session(OperationKind::PlaceOrder, Live, Night, Some(&nan)).is_err());
    }

    #[test]
    fn queries_are_unsigned_and_mode_specific() {
        let r = router();
        for session in Session::ALL {
            let live = r.resolve_in_session(OperationKind::Balance, Live, session, None).unwrap();
            let paper = r.resolve_in_session(OperationKind::Balance, Paper, session, None).unwrap();
            assert_eq!(live.tr_id(), "TTTS3012R");
            assert_eq!(paper.tr_id(), "VTTS3012R");
            assert!(!live.requires_signing && !paper.requires_signing);
            assert_eq!(live.effective_order_type, None);
        }
        let quote = r.resolve_in_session(OperationKind::Quote, Paper, Night, None).unwrap();
        assert_eq!(quote.tr_id(), "HHDFS00000300");
    }

    #[test]
    fn signing_only_for_live_night_writes() {
        let r = router();
        let intent = buy(OrderType::Limit).amending("1");
        for operation in OperationKind::ALL {
            for mode in TradingMode::ALL {
                for session in Session::ALL {
                    let d = r.resolve_in_session(operation, mode, session, Some(&intent)).unwrap();
                    let expected = operation.is_write() && mode == Live && session == Night;
                    assert_eq!(d.requires_signing, expected, "{operation:?} {mode:?} {session:?}");
                }
            }
        }
    }

    #[test]
    fn resolve_derives_session_from_clock() {
        let r = router();
        let intent = buy(OrderType::Loc);
        let day = r.resolve(OperationKind::PlaceOrder, Live, seoul(11), Some(&intent)).unwrap();
        let night = r.resolve(OperationKind::PlaceOrder, Live, seoul(23), Some(&intent)).unwrap();
        assert_eq!(day.session, Day);
        assert_eq!(night.session, Night);
        assert_eq!(night.effective_order_type, Some(OrderType::Loc));
    }

    #[test]
    fn resolve_is_deterministic() {
        let r = router();
        let intent = buy(OrderType::Moo);
        let a = r.resolve(OperationKind::PlaceOrder, Live, seoul(12), Some(&intent)).unwrap();
        let b = r.resolve(OperationKind::PlaceOrder, Live, seoul(12), Some(&intent)).unwrap();
        assert_eq!(a, b);
    }
}
