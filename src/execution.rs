//! Execution gateway abstraction.
//!
//! The engine only ever talks to a broker through [`ExecutionGateway`]:
//! submit a market order with protective orders attached, modify a
//! position's stop/target, or close a position (fully or partially).
//! [`SimulatedGateway`] is the in-memory implementation used by tests and
//! the replay binary, with failure injection for the error paths.

use std::collections::HashMap;

use anyhow::{bail, Result};
use tracing::debug;
use uuid::Uuid;

use crate::types::{Quote, Side};

/// Request to open a market order.
///
/// Stop and target are expressed as distances in pips from the fill price
/// and are attached atomically at submission when the broker supports it.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub side: Side,
    pub volume: f64,
    /// Strategy label; the engine only manages positions carrying it
    pub label: String,
    pub stop_distance_pips: Option<f64>,
    pub target_distance_pips: Option<f64>,
}

/// A filled market order.
#[derive(Debug, Clone)]
pub struct Fill {
    pub position_id: Uuid,
    pub entry_price: f64,
    pub volume: f64,
    /// Protective stop the broker actually attached, if any
    pub stop_price: Option<f64>,
    /// Target the broker actually attached, if any
    pub target_price: Option<f64>,
}

/// Broker-facing operations the engine needs.
pub trait ExecutionGateway {
    /// Submit a market order. Failure must leave no position behind.
    fn submit_market_order(&mut self, request: &OrderRequest) -> Result<Fill>;

    /// Replace a position's stop and/or target.
    fn modify_position(&mut self, id: Uuid, stop: Option<f64>, target: Option<f64>) -> Result<()>;

    /// Close a position, or only `volume` of it when given.
    fn close_position(&mut self, id: Uuid, volume: Option<f64>) -> Result<()>;
}

/// One position held by the simulated broker.
#[derive(Debug, Clone)]
pub struct SimPosition {
    pub side: Side,
    pub entry_price: f64,
    pub volume: f64,
    pub stop: Option<f64>,
    pub target: Option<f64>,
    pub label: String,
}

/// In-memory gateway for tests and replay runs.
///
/// Fills at the current quote, keeps positions in a map, and reports closes
/// through a pending-notification queue the host drains and feeds back into
/// the engine, mirroring how a real broker delivers async close events.
#[derive(Debug, Default)]
pub struct SimulatedGateway {
    pub pip_size: f64,
    quote: Quote,
    positions: HashMap<Uuid, SimPosition>,
    pending_closed: Vec<Uuid>,
    realized_pnl: f64,

    /// Reject every submission (order-failure path)
    pub reject_orders: bool,
    /// Drop stop/target at submission (forces the modify-retry path)
    pub fail_attach: bool,
    /// Number of upcoming modifies to reject
    pub fail_modifies: u32,

    pub orders_submitted: u32,
    pub modifies_accepted: u32,
    pub closes_requested: u32,
}

impl SimulatedGateway {
    pub fn new(pip_size: f64, quote: Quote) -> Self {
        Self {
            pip_size,
            quote,
            ..Default::default()
        }
    }

    /// Update the market and sweep resting stops/targets.
    ///
    /// Positions whose stop or target is crossed are closed at that price
    /// and queued as pending close notifications.
    pub fn update_quote(&mut self, quote: Quote) {
        self.quote = quote;
        let triggered: Vec<Uuid> = self
            .positions
            .iter()
            .filter(|(_, p)| Self::protective_hit(p, quote))
            .map(|(id, _)| *id)
            .collect();
        for id in triggered {
            if let Some(pos) = self.positions.remove(&id) {
                let exit = Self::protective_price(&pos, quote);
                self.realized_pnl += (exit - pos.entry_price) * pos.side.sign() * pos.volume;
                debug!("sim: protective exit for {} at {:.5}", id, exit);
                self.pending_closed.push(id);
            }
        }
    }

    fn protective_hit(pos: &SimPosition, quote: Quote) -> bool {
        let mark = quote.exit_price(pos.side);
        let stop_hit = pos.stop.is_some_and(|s| match pos.side {
            Side::Long => mark <= s,
            Side::Short => mark >= s,
        });
        let target_hit = pos.target.is_some_and(|t| match pos.side {
            Side::Long => mark >= t,
            Side::Short => mark <= t,
        });
        stop_hit || target_hit
    }

    fn protective_price(pos: &SimPosition, quote: Quote) -> f64 {
        let mark = quote.exit_price(pos.side);
        if let Some(s) = pos.stop {
            let hit = match pos.side {
                Side::Long => mark <= s,
                Side::Short => mark >= s,
            };
            if hit {
                return s;
            }
        }
        pos.target.unwrap_or(mark)
    }

    /// Drain close notifications for the host to feed into the engine.
    pub fn take_closed(&mut self) -> Vec<Uuid> {
        std::mem::take(&mut self.pending_closed)
    }

    pub fn position(&self, id: &Uuid) -> Option<&SimPosition> {
        self.positions.get(id)
    }

    pub fn open_positions(&self) -> usize {
        self.positions.len()
    }

    /// Realized P&L in price units times volume.
    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Floating P&L of all open positions at the current quote.
    pub fn unrealized_pnl(&self) -> f64 {
        self.positions
            .values()
            .map(|p| (self.quote.exit_price(p.side) - p.entry_price) * p.side.sign() * p.volume)
            .sum()
    }
}

impl ExecutionGateway for SimulatedGateway {
    fn submit_market_order(&mut self, request: &OrderRequest) -> Result<Fill> {
        if self.reject_orders {
            bail!("simulated rejection of {} {} order", request.side, request.volume);
        }

        let entry_price = self.quote.entry_price(request.side);
        let sign = request.side.sign();
        let (stop, target) = if self.fail_attach {
            (None, None)
        } else {
            (
                request
                    .stop_distance_pips
                    .map(|pips| entry_price - sign * pips * self.pip_size),
                request
                    .target_distance_pips
                    .map(|pips| entry_price + sign * pips * self.pip_size),
            )
        };

        let id = Uuid::new_v4();
        self.positions.insert(
            id,
            SimPosition {
                side: request.side,
                entry_price,
                volume: request.volume,
                stop,
                target,
                label: request.label.clone(),
            },
        );
        self.orders_submitted += 1;
        debug!(
            "sim: filled {} {:.0} at {:.5} (stop {:?}, target {:?})",
            request.side, request.volume, entry_price, stop, target
        );

        Ok(Fill {
            position_id: id,
            entry_price,
            volume: request.volume,
            stop_price: stop,
            target_price: target,
        })
    }

    fn modify_position(&mut self, id: Uuid, stop: Option<f64>, target: Option<f64>) -> Result<()> {
        if self.fail_modifies > 0 {
            self.fail_modifies -= 1;
            bail!("simulated modify rejection for {}", id);
        }
        let Some(pos) = self.positions.get_mut(&id) else {
            bail!("unknown position {}", id);
        };
        if stop.is_some() {
            pos.stop = stop;
        }
        if target.is_some() {
            pos.target = target;
        }
        self.modifies_accepted += 1;
        Ok(())
    }

    fn close_position(&mut self, id: Uuid, volume: Option<f64>) -> Result<()> {
        self.closes_requested += 1;
        let Some(pos) = self.positions.get_mut(&id) else {
            bail!("unknown position {}", id);
        };
        let exit = self.quote.exit_price(pos.side);

        match volume {
            Some(v) if v > 0.0 && v < pos.volume => {
                pos.volume -= v;
                self.realized_pnl += (exit - pos.entry_price) * pos.side.sign() * v;
                debug!("sim: partial close {} of {} at {:.5}", v, id, exit);
            }
            _ => {
                let pos = self.positions.remove(&id).expect("present above");
                self.realized_pnl += (exit - pos.entry_price) * pos.side.sign() * pos.volume;
                self.pending_closed.push(id);
                debug!("sim: closed {} at {:.5}", id, exit);
            }
        }
        Ok(())
    }
}
