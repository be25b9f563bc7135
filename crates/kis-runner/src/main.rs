//! # kis-runner
//!
//! Command-line entry point for the KIS overseas-stock client.
//!
//! Loads a JSON configuration file, builds the trading module, runs one
//! command and prints the result as JSON.
//!
//! # Usage
//!
//! ```bash
//! kis-runner config.json quote AAPL
//! kis-runner config.json --log-level debug buy AAPL 1 187.50 --order-type LOC
//! kis-runner config.json filled --start 20240301 --end 20240304
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kis_core::enums::{Market, OrderType, Side};
use kis_core::trading::{DateRange, OrderIntent};
use kis_td::{KisTd, TdModule};
use serde::Serialize;
use tracing::info;

/// KIS overseas-stock trading client.
#[derive(Parser)]
#[command(name = "kis-runner", about = "KIS overseas-stock trading client")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Issue or reuse the access token.
    Token,
    /// Current price.
    Quote(SymbolArgs),
    /// Detailed price information.
    QuoteDetail(SymbolArgs),
    /// Holdings and account summary.
    Balance,
    /// Orders not yet filled.
    Pending,
    /// Order history (default: today).
    Filled {
        /// First day, `YYYYMMDD`.
        #[arg(long)]
        start: Option<String>,
        /// Last day, `YYYYMMDD`.
        #[arg(long)]
        end: Option<String>,
    },
    /// Place a buy order.
    Buy(OrderArgs),
    /// Place a sell order.
    Sell(OrderArgs),
    /// Amend an open order.
    Amend(AmendArgs),
    /// Cancel an open order.
    Cancel {
        /// Order number to cancel.
        order_no: String,
        symbol: String,
        quantity: u64,
        #[arg(long, default_value = "NASD")]
        market: Market,
    },
}

#[derive(Args)]
struct SymbolArgs {
    symbol: String,
    /// Exchange (`NAS`/`NASD`, `NYS`/`NYSE`, `AMX`/`AMEX`).
    #[arg(long, default_value = "NAS")]
    market: Market,
}

#[derive(Args)]
struct OrderArgs {
    symbol: String,
    quantity: u64,
    price: f64,
    /// `LIMIT`, `LOC`, `MOC`, `LOO`, `MOO` or the numeric code.
    #[arg(long, default_value = "LIMIT")]
    order_type: OrderType,
    #[arg(long, default_value = "NASD")]
    market: Market,
}

#[derive(Args)]
struct AmendArgs {
    /// Order number to amend.
    order_no: String,
    symbol: String,
    quantity: u64,
    price: f64,
    #[arg(long, default_value = "NASD")]
    market: Market,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = kis_core::config::load_config(&cli.config)?;
    config.validate()?;

    // 2. Initialize logging
    let module_name = config.module_name();
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());
    kis_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &module_name);
    info!(
        "{module_name} starting, config={}, mode={}",
        cli.config.display(),
        config.mode
    );

    // 3. Run the command
    let td = KisTd::new(config)?;
    match cli.command {
        Command::Token => {
            let credential = td.login().await?;
            print_json(&serde_json::json!({
                "access_token": kis_core::logging::redact(&credential.access_token),
                "expires_at": credential.expires_at,
            }))
        }
        Command::Quote(args) => print_json(&td.quote(&args.symbol, args.market).await?),
        Command::QuoteDetail(args) => print_json(&td.quote_detail(&args.symbol, args.market).await?),
        Command::Balance => print_json(&td.balance().await?),
        Command::Pending => print_json(&td.pending_orders().await?),
        Command::Filled { start, end } => {
            let range = date_range(&td, start.as_deref(), end.as_deref())?;
            print_json(&td.filled_orders(range).await?)
        }
        Command::Buy(args) => print_json(&td.place_order(&args.into_intent(Side::Buy)).await?),
        Command::Sell(args) => print_json(&td.place_order(&args.into_intent(Side::Sell)).await?),
        Command::Amend(args) => {
            let intent = OrderIntent::limit(Side::Buy, args.symbol, args.quantity, args.price, args.market)
                .amending(args.order_no);
            print_json(&td.amend_order(&intent).await?)
        }
        Command::Cancel { order_no, symbol, quantity, market } => {
            let intent = OrderIntent::limit(Side::Buy, symbol, quantity, 0.0, market).amending(order_no);
            print_json(&td.cancel_order(&intent).await?)
        }
    }
}

impl OrderArgs {
    fn into_intent(self, side: Side) -> OrderIntent {
        OrderIntent::limit(side, self.symbol, self.quantity, self.price, self.market)
            .with_order_type(self.order_type)
    }
}

fn date_range(td: &KisTd, start: Option<&str>, end: Option<&str>) -> Result<DateRange> {
    let today = td.today();
    let start = start.map(DateRange::parse_day).transpose()?.unwrap_or(today.start);
    let end = end.map(DateRange::parse_day).transpose()?.unwrap_or(today.end);
    Ok(DateRange::new(start, end)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("cannot serialize result")?;
    println!("{out}");
    Ok(())
}
