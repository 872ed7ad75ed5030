//! Entry gating and order construction.
//!
//! Runs once per closed primary bar. A signal only becomes an order after
//! every gate passes, in order: session window, daily trade limit, entry
//! cutoff, signal direction, the volatility-scoped structure filter, stop
//! placement, and sizing. Each rejection is logged at debug level with the
//! gate that stopped it; `None` always means "no trade", never an error.

use tracing::debug;

use super::drawdown::DrawdownController;
use super::sizing::{self, VolumeRounding};
use super::structure::{self, Trend};
use super::volatility;
use crate::calendar::SessionBounds;
use crate::config::EngineConfig;
use crate::types::{AccountSnapshot, Bar, BarSignal, Quote, Side, SymbolInfo};

/// Everything the gate needs to judge one closed signal bar.
pub struct EntryContext<'a> {
    pub bar: &'a Bar,
    pub signal: BarSignal,
    pub quote: Quote,
    pub account: AccountSnapshot,
    /// Secondary-timeframe bars for the structure trend check
    pub secondary_bars: &'a [Bar],
    /// Daily bars for the volatility regime check
    pub daily_bars: &'a [Bar],
    pub session: &'a SessionBounds,
    pub trades_opened_today: u32,
}

/// A fully sized entry ready for submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryOrder {
    pub side: Side,
    pub volume: f64,
    /// Protective stop distance in whole pips (already rounded up)
    pub stop_distance_pips: f64,
    /// Take-profit distance in pips, when a target multiple is configured
    pub target_distance_pips: Option<f64>,
}

/// Evaluate one closed bar against every entry gate.
pub fn evaluate(
    config: &EngineConfig,
    symbol: &SymbolInfo,
    drawdown: &DrawdownController,
    ctx: &EntryContext<'_>,
) -> Option<EntryOrder> {
    let ts = ctx.bar.timestamp;

    // Entries wait for the opening-range window when one is configured
    let window_start = if config.signal_window_minutes > 0 {
        ctx.session.signal_window_end
    } else {
        ctx.session.session_open
    };
    if ts < window_start || ts >= ctx.session.session_close {
        debug!("entry gate: {} outside session window", ts);
        return None;
    }

    if ctx.trades_opened_today >= config.daily_trade_limit {
        debug!(
            "entry gate: daily limit reached ({}/{})",
            ctx.trades_opened_today, config.daily_trade_limit
        );
        return None;
    }

    // The cutoff only guards the first trade of the day; re-entries after a
    // same-day close remain allowed until the session window shuts
    if ctx.trades_opened_today == 0 && ts >= ctx.session.no_entry_after {
        debug!("entry gate: past entry cutoff {}", ctx.session.no_entry_after);
        return None;
    }

    let side = ctx.signal.direction()?;

    if volatility::filter_active(&config.structure_filter, ctx.daily_bars) {
        let trend = structure::classify_trend(
            ctx.secondary_bars,
            config.pivot_strength,
            config.pivot_lookback_bars,
        );
        let aligned = matches!(
            (side, trend),
            (Side::Long, Some(Trend::Up)) | (Side::Short, Some(Trend::Down))
        );
        if !aligned {
            match trend {
                Some(t) => debug!("entry gate: {} signal against {} structure", side, t),
                None => debug!("entry gate: {} signal with insufficient structure", side),
            }
            return None;
        }
    }

    // Stop beyond the signal bar's adverse extreme (body or wick, whichever
    // is further) plus the configured pip offset
    let offset = config.stop_offset_pips * symbol.pip_size;
    let stop_price = match side {
        Side::Long => ctx.bar.low.min(ctx.bar.open) - offset,
        Side::Short => ctx.bar.high.max(ctx.bar.open) + offset,
    };
    if !stop_price.is_finite() {
        debug!("entry gate: non-finite stop from signal bar");
        return None;
    }

    let entry_estimate = ctx.quote.entry_price(side);
    let Some(distance) = sizing::stop_distance(entry_estimate, stop_price, side) else {
        debug!(
            "entry gate: degenerate stop {:.5} against entry {:.5}",
            stop_price, entry_estimate
        );
        return None;
    };
    if distance < symbol.pip_size {
        debug!("entry gate: stop within one pip of entry, skipping");
        return None;
    }

    let risk_percent = drawdown.risk_percent(config.risk_percent, config.defensive_risk_percent);
    let volume = sizing::volume_for_risk(
        risk_percent,
        distance,
        ctx.account.balance,
        symbol,
        VolumeRounding::Nearest,
    )?;

    let stop_distance_pips = (distance / symbol.pip_size).ceil();
    let target_distance_pips =
        (config.target_r > 0.0).then(|| stop_distance_pips * config.target_r);

    Some(EntryOrder {
        side,
        volume,
        stop_distance_pips,
        target_distance_pips,
    })
}
