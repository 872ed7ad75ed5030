//! Session engine orchestration.
//!
//! Event-driven core the host feeds with closed bars, ticks, and timer
//! fires. Owns the session clock (local trading date, rollover, flatten
//! deadline), the daily trade counter, the drawdown controller, and the
//! position book; everything outward goes through the execution gateway.
//!
//! Event responsibilities:
//! - closed primary bar: refresh session, run the entry gate
//! - tick/timer: trailing and partial-exit management, flatten at deadline
//! - position closed: purge book state for that id

use chrono::{DateTime, NaiveTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::drawdown::DrawdownController;
use super::gate::{self, EntryContext, EntryOrder};
use super::lifecycle::{ManagedPosition, PositionBook};
use crate::calendar::{self, SessionBounds};
use crate::config::EngineConfig;
use crate::execution::{ExecutionGateway, OrderRequest};
use crate::types::{AccountSnapshot, Bar, BarSignal, Quote, SymbolInfo};

/// A closed primary bar plus the context snapshots taken with it.
pub struct BarEvent<'a> {
    pub bar: Bar,
    pub signal: BarSignal,
    /// Secondary-timeframe history for the structure check
    pub secondary_bars: &'a [Bar],
    /// Daily history for the volatility regime check
    pub daily_bars: &'a [Bar],
    pub quote: Quote,
    pub account: AccountSnapshot,
}

/// A tick or management-timer fire.
#[derive(Debug, Clone, Copy)]
pub struct TickEvent {
    pub now: DateTime<Utc>,
    pub quote: Quote,
    pub account: AccountSnapshot,
}

/// The intraday decision engine for one symbol.
pub struct SessionEngine {
    config: EngineConfig,
    symbol: SymbolInfo,
    /// Entry cutoff parsed once at construction
    cutoff: NaiveTime,
    session: Option<SessionBounds>,
    trades_opened_today: u32,
    drawdown: DrawdownController,
    book: PositionBook,
}

impl SessionEngine {
    pub fn new(config: EngineConfig, symbol: SymbolInfo) -> Self {
        let cutoff = config.cutoff_time();
        let drawdown = DrawdownController::new(config.drawdown_threshold_pct);
        let book = PositionBook::new(config.tiers(), config.partial_exit_r);
        info!(
            "engine '{}' up: risk {}%, cutoff {}, {} trailing tier(s)",
            config.label,
            config.risk_percent,
            cutoff,
            config.tiers().len()
        );
        Self {
            config,
            symbol,
            cutoff,
            session: None,
            trades_opened_today: 0,
            drawdown,
            book,
        }
    }

    pub fn session(&self) -> Option<&SessionBounds> {
        self.session.as_ref()
    }

    pub fn trades_opened_today(&self) -> u32 {
        self.trades_opened_today
    }

    pub fn drawdown(&self) -> &DrawdownController {
        &self.drawdown
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    /// Handle a closed primary bar: the only event that can open positions.
    pub fn on_bar_closed(&mut self, event: &BarEvent<'_>, gateway: &mut dyn ExecutionGateway) {
        self.drawdown.update(event.account.equity);
        self.refresh_session(event.bar.timestamp);
        let Some(session) = self.session else { return };

        if event.bar.timestamp >= session.flatten_deadline {
            if !self.book.is_flat() {
                self.book.flatten_all("flatten deadline", gateway);
            }
            return;
        }

        // One position at a time: re-entry only after the previous close
        if !self.book.is_flat() {
            return;
        }

        let ctx = EntryContext {
            bar: &event.bar,
            signal: event.signal,
            quote: event.quote,
            account: event.account,
            secondary_bars: event.secondary_bars,
            daily_bars: event.daily_bars,
            session: &session,
            trades_opened_today: self.trades_opened_today,
        };
        if let Some(order) = gate::evaluate(&self.config, &self.symbol, &self.drawdown, &ctx) {
            self.submit_entry(&order, event.bar.timestamp, gateway);
        }
    }

    /// Handle a live tick: position management and the flatten deadline.
    pub fn on_tick(&mut self, event: &TickEvent, gateway: &mut dyn ExecutionGateway) {
        self.drawdown.update(event.account.equity);
        self.refresh_session(event.now);
        let Some(session) = self.session else { return };

        if event.now >= session.flatten_deadline {
            if !self.book.is_flat() {
                self.book.flatten_all("flatten deadline", gateway);
            }
            return;
        }
        self.book.manage(event.quote, &self.symbol, gateway);
    }

    /// Timer fallback for quiet markets; identical semantics to a tick, so
    /// the flatten deadline fires even when no quotes arrive.
    pub fn on_timer(&mut self, event: &TickEvent, gateway: &mut dyn ExecutionGateway) {
        self.on_tick(event, gateway);
    }

    /// Broker notification that a position closed (stop, target, manual).
    pub fn on_position_closed(&mut self, id: &Uuid) {
        if self.book.purge(id) {
            debug!("position {} closed, state purged", id);
        }
    }

    /// Recompute session bounds when the local trading date changes.
    ///
    /// Rollover resets the daily trade counter only. Open-position state is
    /// deliberately untouched: positions surviving past local midnight stay
    /// fully managed until their own exit.
    fn refresh_session(&mut self, now: DateTime<Utc>) {
        let date = calendar::local_date_of(now);
        if self.session.map(|s| s.date) == Some(date) {
            return;
        }
        let bounds = calendar::session_bounds_for(
            date,
            self.cutoff,
            self.config.close_buffer(),
            self.config.signal_window(),
        );
        info!(
            "session {}: open {} / cutoff {} / flatten {}",
            date, bounds.session_open, bounds.no_entry_after, bounds.flatten_deadline
        );
        self.session = Some(bounds);
        self.trades_opened_today = 0;
    }

    /// Submit a gated entry and register the resulting position.
    ///
    /// A fill without its protective stop attached gets one modify retry;
    /// if that also fails the position is closed immediately rather than
    /// left running unprotected.
    fn submit_entry(
        &mut self,
        order: &EntryOrder,
        opened_at: DateTime<Utc>,
        gateway: &mut dyn ExecutionGateway,
    ) {
        let request = OrderRequest {
            side: order.side,
            volume: order.volume,
            label: self.config.label.clone(),
            stop_distance_pips: Some(order.stop_distance_pips),
            target_distance_pips: order.target_distance_pips,
        };
        let fill = match gateway.submit_market_order(&request) {
            Ok(fill) => fill,
            Err(err) => {
                warn!("entry order rejected: {:#}", err);
                return;
            }
        };
        self.trades_opened_today += 1;
        info!(
            "entry {} of {}: {} {:.0} at {:.5}",
            self.trades_opened_today, self.config.daily_trade_limit, order.side, fill.volume,
            fill.entry_price
        );

        let sign = order.side.sign();
        let stop_price = match fill.stop_price {
            Some(stop) => stop,
            None => {
                // Naked fill: attach the stop now, or bail out of the trade
                let stop = fill.entry_price
                    - sign * order.stop_distance_pips * self.symbol.pip_size;
                let target = order
                    .target_distance_pips
                    .map(|pips| fill.entry_price + sign * pips * self.symbol.pip_size);
                match gateway.modify_position(fill.position_id, Some(stop), target) {
                    Ok(()) => stop,
                    Err(err) => {
                        warn!(
                            "could not attach stop to {} ({:#}), emergency close",
                            fill.position_id, err
                        );
                        if let Err(err) = gateway.close_position(fill.position_id, None) {
                            warn!("emergency close failed for {}: {:#}", fill.position_id, err);
                        }
                        return;
                    }
                }
            }
        };

        let initial_risk = (fill.entry_price - stop_price) * sign;
        self.book.register(ManagedPosition {
            id: fill.position_id,
            side: order.side,
            entry_price: fill.entry_price,
            stop_price: Some(stop_price),
            target_price: fill.target_price,
            volume: fill.volume,
            initial_risk,
            tier_applied: None,
            partial_done: false,
            opened_at,
        });
    }
}
