//! Synthetic replay harness for the session engine.
//!
//! Generates a random-walk price stream for a handful of trading days,
//! derives opening-range breakout signals from it, and drives the full
//! engine (entry gate, lifecycle management, flatten deadline) against the
//! simulated execution gateway. Useful for eyeballing the decision log and
//! end-of-run accounting without any market connectivity.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use clap::Parser;
use intraday_engine::calendar;
use intraday_engine::config::EngineConfig;
use intraday_engine::engine::trader::{BarEvent, TickEvent};
use intraday_engine::engine::SessionEngine;
use intraday_engine::execution::SimulatedGateway;
use intraday_engine::types::{AccountSnapshot, Bar, BarSignal, Quote, SymbolInfo};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "replay")]
#[command(about = "Replay a synthetic session through the decision engine")]
struct Args {
    /// Engine configuration as JSON (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of trading days to simulate
    #[arg(short, long, default_value = "5")]
    days: u32,

    /// First trading date (YYYY-MM-DD, weekends skipped)
    #[arg(long, default_value = "2024-06-10")]
    start_date: NaiveDate,

    /// Starting mid price of the random walk
    #[arg(long, default_value = "1.1000")]
    start_price: f64,

    /// Starting account balance
    #[arg(short, long, default_value = "10000")]
    balance: f64,

    /// Random walk seed
    #[arg(short, long, default_value = "42")]
    seed: u64,
}

const SPREAD: f64 = 0.0002;
const BAR_MINUTES: i64 = 5;
/// Bars forming the opening range the breakout signal works off.
const RANGE_BARS: usize = 6;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("intraday_engine=info".parse()?)
                .add_directive("replay=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    let symbol = SymbolInfo {
        pip_size: 0.0001,
        pip_value: 0.0001,
        min_volume: 1_000.0,
        max_volume: 10_000_000.0,
        volume_step: 1_000.0,
    };

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut engine = SessionEngine::new(config, symbol);
    let mut gateway = SimulatedGateway::new(symbol.pip_size, mid_quote(args.start_price));

    let mut price = args.start_price;
    let mut daily_bars: Vec<Bar> = Vec::new();
    let mut date = args.start_date;
    let mut simulated = 0;

    while simulated < args.days {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            date = date.succ_opt().context("date overflow")?;
            continue;
        }
        price = run_day(
            date,
            price,
            args.balance,
            &daily_bars,
            &mut rng,
            &mut engine,
            &mut gateway,
        );
        daily_bars.push(day_summary(date, price));
        date = date.succ_opt().context("date overflow")?;
        simulated += 1;
    }

    info!(
        "replay done: {} day(s), realized P&L {:.2}, {} position(s) still open",
        simulated,
        gateway.realized_pnl(),
        gateway.open_positions()
    );
    Ok(())
}

fn mid_quote(mid: f64) -> Quote {
    Quote { bid: mid - SPREAD / 2.0, ask: mid + SPREAD / 2.0 }
}

/// Walk one session bar by bar, feeding the engine. Returns the last mid.
fn run_day(
    date: NaiveDate,
    mut price: f64,
    start_balance: f64,
    daily_bars: &[Bar],
    rng: &mut StdRng,
    engine: &mut SessionEngine,
    gateway: &mut SimulatedGateway,
) -> f64 {
    let bounds = calendar::session_bounds_for(
        date,
        chrono::NaiveTime::from_hms_opt(11, 0, 0).unwrap_or_default(),
        Duration::seconds(60),
        Duration::zero(),
    );

    let mut session_bars: Vec<Bar> = Vec::new();
    let mut range_high = f64::MIN;
    let mut range_low = f64::MAX;
    let mut ts = bounds.session_open;

    while ts < bounds.session_close {
        let bar = random_bar(ts + Duration::minutes(BAR_MINUTES), price, rng);
        price = bar.close;
        let quote = mid_quote(price);
        ts = bar.timestamp;

        // Let resting stops/targets trigger before the engine sees the bar
        gateway.update_quote(quote);
        for id in gateway.take_closed() {
            engine.on_position_closed(&id);
        }

        let signal = if session_bars.len() < RANGE_BARS {
            range_high = range_high.max(bar.high);
            range_low = range_low.min(bar.low);
            BarSignal::none()
        } else if bar.close > range_high {
            BarSignal::buy()
        } else if bar.close < range_low {
            BarSignal::sell()
        } else {
            BarSignal::none()
        };
        session_bars.push(bar);

        let account = AccountSnapshot {
            balance: start_balance + gateway.realized_pnl(),
            equity: start_balance + gateway.realized_pnl() + gateway.unrealized_pnl(),
        };
        engine.on_bar_closed(
            &BarEvent {
                bar,
                signal,
                secondary_bars: &session_bars,
                daily_bars,
                quote,
                account,
            },
            gateway,
        );
        engine.on_timer(&TickEvent { now: ts, quote, account }, gateway);
    }

    // Final timer past the deadline flattens anything still open
    let account = AccountSnapshot {
        balance: start_balance + gateway.realized_pnl(),
        equity: start_balance + gateway.realized_pnl() + gateway.unrealized_pnl(),
    };
    engine.on_timer(
        &TickEvent { now: bounds.flatten_deadline, quote: mid_quote(price), account },
        gateway,
    );
    for id in gateway.take_closed() {
        engine.on_position_closed(&id);
    }

    price
}

fn random_bar(close_ts: chrono::DateTime<chrono::Utc>, open: f64, rng: &mut StdRng) -> Bar {
    let drift: f64 = rng.gen_range(-0.0008..0.0008);
    let close = open + drift;
    let wick_up: f64 = rng.gen_range(0.0..0.0004);
    let wick_down: f64 = rng.gen_range(0.0..0.0004);
    Bar {
        timestamp: close_ts,
        open,
        high: open.max(close) + wick_up,
        low: open.min(close) - wick_down,
        close,
    }
}

/// Coarse daily bar used by the volatility regime check on later days.
fn day_summary(date: NaiveDate, close: f64) -> Bar {
    Bar {
        timestamp: calendar::to_utc(
            date.and_hms_opt(17, 0, 0).unwrap_or_default(),
        ),
        open: close,
        high: close + 0.004,
        low: close - 0.004,
        close,
    }
}
