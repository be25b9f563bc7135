//! Enumerations used throughout the KIS overseas trading toolkit.
//!
//! The broker identifies most choices with short string codes. Each enum here
//! owns its codes, so the rest of the system never handles raw strings.

use serde::{Deserialize, Serialize};

use crate::error::KisError;

// ---------------------------------------------------------------------------
// Trading mode / session
// ---------------------------------------------------------------------------

/// Real-money or simulated (paper) account.
///
/// Fixed at configuration time; selects the transaction-identifier family
/// and the default base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    #[default]
    Live,
    Paper,
}

impl TradingMode {
    pub const ALL: [TradingMode; 2] = [Self::Live, Self::Paper];

    /// Base URL used when the configuration does not name one.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Live => "https://openapi.koreainvestment.com:9443",
            Self::Paper => "https://openapivts.koreainvestment.com:29443",
        }
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Paper => write!(f, "paper"),
        }
    }
}

/// Trading session derived from the wall clock.
///
/// `Day` is the broker's US daytime-trading window; `Night` covers the
/// pre-market, regular and after-hours sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Session {
    Day,
    Night,
}

impl Session {
    pub const ALL: [Session; 2] = [Self::Day, Self::Night];
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Every broker call the router knows how to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Quote,
    QuoteDetail,
    Balance,
    PendingOrders,
    FilledOrders,
    PlaceOrder,
    AmendOrder,
    CancelOrder,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        Self::Quote,
        Self::QuoteDetail,
        Self::Balance,
        Self::PendingOrders,
        Self::FilledOrders,
        Self::PlaceOrder,
        Self::AmendOrder,
        Self::CancelOrder,
    ];

    /// `true` for operations that change account state.
    pub fn is_write(self) -> bool {
        matches!(self, Self::PlaceOrder | Self::AmendOrder | Self::CancelOrder)
    }

    /// `true` when the transaction identifier depends on the order side.
    pub fn is_sided(self) -> bool {
        matches!(self, Self::PlaceOrder)
    }
}

// ---------------------------------------------------------------------------
// Order enums
// ---------------------------------------------------------------------------

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Parse the broker's `sll_buy_dvsn_cd` (`01` sell, `02` buy).
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::Sell),
            "02" => Some(Self::Buy),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => f.write_str("BUY"),
            Self::Sell => f.write_str("SELL"),
        }
    }
}

/// Order division (`ORD_DVSN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderType {
    /// Plain limit order.
    #[default]
    Limit,
    /// Limit on close.
    Loc,
    /// Market on close.
    Moc,
    /// Limit on open.
    Loo,
    /// Market on open.
    Moo,
}

impl OrderType {
    /// Broker code for this order type.
    pub fn code(self) -> &'static str {
        match self {
            Self::Limit => "00",
            Self::Loc => "34",
            Self::Moc => "33",
            Self::Loo => "32",
            Self::Moo => "31",
        }
    }

    /// Look up an order type by its broker code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "00" => Some(Self::Limit),
            "34" => Some(Self::Loc),
            "33" => Some(Self::Moc),
            "32" => Some(Self::Loo),
            "31" => Some(Self::Moo),
            _ => None,
        }
    }

    /// `true` for the auction-relative (open/close) variants.
    pub fn is_auction(self) -> bool {
        !matches!(self, Self::Limit)
    }
}

impl std::str::FromStr for OrderType {
    type Err = KisError;

    /// Accepts either the name (`loc`) or the broker code (`34`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(t) = Self::from_code(s) {
            return Ok(t);
        }
        match s.to_ascii_uppercase().as_str() {
            "LIMIT" => Ok(Self::Limit),
            "LOC" => Ok(Self::Loc),
            "MOC" => Ok(Self::Moc),
            "LOO" => Ok(Self::Loo),
            "MOO" => Ok(Self::Moo),
            _ => Err(KisError::Validation(format!("unknown order type '{s}'"))),
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Limit => "LIMIT",
            Self::Loc => "LOC",
            Self::Moc => "MOC",
            Self::Loo => "LOO",
            Self::Moo => "MOO",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Markets
// ---------------------------------------------------------------------------

/// US exchange an instrument trades on.
///
/// The broker spells each exchange differently for quotes (`EXCD`, three
/// letters) and for orders/balances (`OVRS_EXCG_CD`, four letters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Market {
    #[default]
    Nasdaq,
    Nyse,
    Amex,
}

impl Market {
    /// Code used by the quotation endpoints.
    pub fn quote_code(self) -> &'static str {
        match self {
            Self::Nasdaq => "NAS",
            Self::Nyse => "NYS",
            Self::Amex => "AMX",
        }
    }

    /// Code used by the trading endpoints.
    pub fn order_code(self) -> &'static str {
        match self {
            Self::Nasdaq => "NASD",
            Self::Nyse => "NYSE",
            Self::Amex => "AMEX",
        }
    }
}

impl std::str::FromStr for Market {
    type Err = KisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NAS" | "NASD" | "NASDAQ" => Ok(Self::Nasdaq),
            "NYS" | "NYSE" => Ok(Self::Nyse),
            "AMX" | "AMEX" => Ok(Self::Amex),
            _ => Err(KisError::Validation(format!("unknown market '{s}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_type_codes() {
        assert_eq!(OrderType::Limit.code(), "00");
        assert_eq!(OrderType::Loc.code(), "34");
        assert_eq!(OrderType::Moc.code(), "33");
        assert_eq!(OrderType::Loo.code(), "32");
        assert_eq!(OrderType::Moo.code(), "31");
        assert_eq!(OrderType::from_code("34"), Some(OrderType::Loc));
        assert_eq!(OrderType::from_code("99"), None);
    }

    #[test]
    fn order_type_parses_names_and_codes() {
        assert_eq!("loc".parse::<OrderType>().unwrap(), OrderType::Loc);
        assert_eq!("31".parse::<OrderType>().unwrap(), OrderType::Moo);
        assert!("stop".parse::<OrderType>().is_err());
    }

    #[test]
    fn market_quote_and_order_codes_differ() {
        let m: Market = "NYS".parse().unwrap();
        assert_eq!(m, Market::Nyse);
        assert_eq!(m.order_code(), "NYSE");
        assert_eq!("nasd".parse::<Market>().unwrap().quote_code(), "NAS");
        assert!("KRX".parse::<Market>().is_err());
    }

    #[test]
    fn side_codes() {
        assert_eq!(Side::from_code("02"), Some(Side::Buy));
        assert_eq!(Side::from_code("01"), Some(Side::Sell));
        assert_eq!(Side::from_code(""), None);
    }

    #[test]
    fn mode_deserializes_lowercase() {
        let mode: TradingMode = serde_json::from_str("\"paper\"").unwrap();
        assert_eq!(mode, TradingMode::Paper);
        assert!(TradingMode::Paper.default_base_url().contains("openapivts"));
    }
}
