//! Trading-related data structures: order intents and response views.
//!
//! [`OrderIntent`] flows from the caller into the router; the remaining types
//! are typed views the TD module extracts from broker responses.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{Market, OrderType, Side};
use crate::error::{KisError, Result};

// ---------------------------------------------------------------------------
// Order intent (caller → router / TD module)
// ---------------------------------------------------------------------------

/// An order the caller wants to place, amend, or cancel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Buy or sell.
    pub side: Side,
    /// Requested order type (the router may downgrade it).
    pub order_type: OrderType,
    /// Ticker (e.g. `"AAPL"`).
    pub symbol: String,
    /// Order quantity in shares; must be positive.
    pub quantity: u64,
    /// Limit price in USD; must be non-negative. Zero for cancels.
    pub limit_price: f64,
    /// Exchange the instrument trades on.
    pub market: Market,
    /// Broker order number being amended or cancelled (`ORGN_ODNO`).
    pub original_order_ref: Option<String>,
}

impl OrderIntent {
    /// A plain limit order with no original-order reference.
    pub fn limit(side: Side, symbol: impl Into<String>, quantity: u64, limit_price: f64, market: Market) -> Self {
        Self {
            side,
            order_type: OrderType::Limit,
            symbol: symbol.into(),
            quantity,
            limit_price,
            market,
            original_order_ref: None,
        }
    }

    /// Replace the order type.
    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    /// Attach the broker order number this intent amends or cancels.
    pub fn amending(mut self, original_order_ref: impl Into<String>) -> Self {
        self.original_order_ref = Some(original_order_ref.into());
        self
    }

    /// Limit price rounded to cents.
    pub fn rounded_price(&self) -> f64 {
        (self.limit_price * 100.0).round() / 100.0
    }

    /// The original-order reference, if present and not blank.
    pub fn original_ref(&self) -> Option<&str> {
        self.original_order_ref
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Response views (TD module → caller)
// ---------------------------------------------------------------------------

/// Current price snapshot for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    /// Last traded price.
    pub last: f64,
    /// Previous close.
    pub base: f64,
    /// Change versus previous close, in percent.
    pub rate: f64,
    /// Shares traded today.
    pub volume: u64,
}

/// One position in the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub name: String,
    pub quantity: f64,
    /// Quantity currently available to sell.
    pub orderable_quantity: f64,
    pub avg_price: f64,
    pub current_price: f64,
    /// Unrealized P&L in percent.
    pub profit_rate: f64,
    /// Unrealized P&L in USD.
    pub profit_amount: f64,
}

/// Account-level totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BalanceSummary {
    pub purchase_amount: f64,
    pub realized_pnl: f64,
    pub realized_rate: f64,
    pub total_pnl: f64,
    pub total_rate: f64,
}

/// Holdings plus account summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Balance {
    pub holdings: Vec<Holding>,
    pub summary: Option<BalanceSummary>,
}

/// A row of the pending-orders or filled-orders listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
    /// Broker order number (`odno`).
    pub order_no: String,
    pub symbol: String,
    pub side: Option<Side>,
    pub quantity: u64,
    pub filled_quantity: u64,
    pub unfilled_quantity: u64,
    /// Order price for pending rows, fill price for filled rows.
    pub price: f64,
    /// Processing status name, when the broker reports one.
    pub status: Option<String>,
    pub reject_reason: Option<String>,
    pub order_date: Option<String>,
    pub order_time: Option<String>,
}

/// The broker's acknowledgement of an order, amend, or cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Order number assigned by the broker. Amends receive a new number.
    pub order_no: String,
}

/// Inclusive date range for the filled-orders history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(KisError::Validation(format!(
                "date range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// Parse `YYYYMMDD` or `YYYY-MM-DD`.
    pub fn parse_day(s: &str) -> Result<NaiveDate> {
        let s = s.trim();
        NaiveDate::parse_from_str(s, "%Y%m%d")
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .map_err(|_| KisError::Validation(format!("invalid date: {s:?}")))
    }

    /// Start date in the broker's `YYYYMMDD` form.
    pub fn start_param(&self) -> String {
        self.start.format("%Y%m%d").to_string()
    }

    /// End date in the broker's `YYYYMMDD` form.
    pub fn end_param(&self) -> String {
        self.end.format("%Y%m%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_rounds_to_cents() {
        let intent = OrderIntent::limit(Side::Buy, "AAPL", 1, 50.005_1, Market::Nasdaq);
        assert_eq!(intent.rounded_price(), 50.01);
        let intent = OrderIntent::limit(Side::Buy, "AAPL", 1, 187.234, Market::Nasdaq);
        assert_eq!(intent.rounded_price(), 187.23);
    }

    #[test]
    fn blank_original_ref_counts_as_missing() {
        let intent = OrderIntent::limit(Side::Sell, "TSLA", 1, 500.0, Market::Nasdaq);
        assert_eq!(intent.original_ref(), None);
        assert_eq!(intent.clone().amending("   ").original_ref(), None);
        assert_eq!(intent.amending(" 0030072265 ").original_ref(), Some("0030072265"));
    }

    #[test]
    fn date_range_rejects_reversed_bounds() {
        let d = |s| DateRange::parse_day(s).unwrap();
        let range = DateRange::new(d("20240102"), d("2024-01-31")).unwrap();
        assert_eq!(range.start_param(), "20240102");
        assert_eq!(range.end_param(), "20240131");
        assert!(matches!(
            DateRange::new(d("20240131"), d("20240102")),
            Err(KisError::Validation(_))
        ));
        assert!(DateRange::parse_day("2024013").is_err());
    }
}
