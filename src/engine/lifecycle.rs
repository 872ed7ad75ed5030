//! Open-position lifecycle management.
//!
//! Owns all per-position state in an explicit id-keyed table: initial risk
//! distance, trailing-tier progress, partial-exit status. Reacts to
//! tick/timer marks by advancing the stop through the tier ladder, taking
//! the partial exit, or flattening everything at session end. Entries are
//! never purged here except on the broker's position-closed notification.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::sizing::{self, VolumeRounding};
use crate::config::TrailingTier;
use crate::execution::ExecutionGateway;
use crate::types::{Quote, Side, SymbolInfo};

/// State for one open position.
#[derive(Debug, Clone)]
pub struct ManagedPosition {
    pub id: Uuid,
    pub side: Side,
    pub entry_price: f64,
    pub stop_price: Option<f64>,
    pub target_price: Option<f64>,
    pub volume: f64,
    /// |entry - initial stop| captured at the fill and never recomputed
    /// from a moved stop; all R-multiples are measured against it
    pub initial_risk: f64,
    /// Highest tier index applied so far; `None` until the first tier fires
    pub tier_applied: Option<usize>,
    pub partial_done: bool,
    pub opened_at: DateTime<Utc>,
}

impl ManagedPosition {
    /// Current R-multiple of favorable excursion at the given mark.
    pub fn r_multiple(&self, mark: f64) -> f64 {
        if self.initial_risk <= 0.0 {
            return 0.0;
        }
        (mark - self.entry_price) * self.side.sign() / self.initial_risk
    }

    /// Stop price a tier target of `target_r` R-multiples maps to.
    fn tier_stop(&self, target_r: f64) -> f64 {
        self.entry_price + self.side.sign() * target_r * self.initial_risk
    }

    /// Whether a candidate stop is strictly more favorable than the current
    /// one. Strict so no-op and adverse modifications are never sent.
    fn stop_improves(&self, candidate: f64) -> bool {
        match self.stop_price {
            None => true,
            Some(current) => match self.side {
                Side::Long => candidate > current,
                Side::Short => candidate < current,
            },
        }
    }
}

/// The id-keyed position table plus the rules applied to it.
pub struct PositionBook {
    positions: HashMap<Uuid, ManagedPosition>,
    tiers: Vec<TrailingTier>,
    partial_exit_r: f64,
}

impl PositionBook {
    pub fn new(tiers: Vec<TrailingTier>, partial_exit_r: f64) -> Self {
        Self {
            positions: HashMap::new(),
            tiers,
            partial_exit_r,
        }
    }

    /// Register a freshly filled position. Takes effect from the next event;
    /// nothing in the current event evaluates it.
    pub fn register(&mut self, position: ManagedPosition) {
        debug!(
            "registered {} {} {:.0} @ {:.5} (risk {:.5})",
            position.side, position.id, position.volume, position.entry_price,
            position.initial_risk
        );
        self.positions.insert(position.id, position);
    }

    /// Purge state for a closed position. Returns whether it was ours.
    pub fn purge(&mut self, id: &Uuid) -> bool {
        self.positions.remove(id).is_some()
    }

    pub fn is_flat(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, id: &Uuid) -> Option<&ManagedPosition> {
        self.positions.get(id)
    }

    pub fn positions(&self) -> impl Iterator<Item = &ManagedPosition> {
        self.positions.values()
    }

    /// Run trailing-tier and partial-exit management for every open
    /// position against the current quote. Tick/timer driven only.
    pub fn manage(&mut self, quote: Quote, symbol: &SymbolInfo, gateway: &mut dyn ExecutionGateway) {
        for position in self.positions.values_mut() {
            let mark = quote.exit_price(position.side);
            let r = position.r_multiple(mark);
            Self::apply_tiers(position, r, &self.tiers, gateway);
            Self::apply_partial(position, r, self.partial_exit_r, symbol, gateway);
        }
    }

    /// Close every open position, e.g. at the session flatten deadline.
    /// State stays in the table until the broker's close notifications
    /// arrive and [`PositionBook::purge`] runs.
    pub fn flatten_all(&mut self, reason: &str, gateway: &mut dyn ExecutionGateway) {
        for (id, position) in &self.positions {
            info!(
                "flatten ({}): closing {} {} {:.0}",
                reason, position.side, id, position.volume
            );
            if let Err(err) = gateway.close_position(*id, None) {
                warn!("flatten close failed for {}: {:#}", id, err);
            }
        }
    }

    /// Advance the stop to the highest newly qualified trailing tier.
    ///
    /// Tiers strictly above the last applied index are considered; at most
    /// one fires per evaluation and the index never regresses. The index is
    /// recorded even when the broker rejects the modification, so a doomed
    /// modify is not re-sent on every tick.
    fn apply_tiers(
        position: &mut ManagedPosition,
        r: f64,
        tiers: &[TrailingTier],
        gateway: &mut dyn ExecutionGateway,
    ) {
        let first_candidate = position.tier_applied.map_or(0, |applied| applied + 1);
        let mut qualified: Option<usize> = None;
        for (idx, tier) in tiers.iter().enumerate().skip(first_candidate) {
            if tier.trigger_r <= r {
                qualified = Some(idx);
            }
        }
        let Some(idx) = qualified else { return };

        let candidate = position.tier_stop(tiers[idx].target_r);
        if position.stop_improves(candidate) {
            match gateway.modify_position(position.id, Some(candidate), position.target_price) {
                Ok(()) => {
                    position.stop_price = Some(candidate);
                    info!(
                        "tier {} applied on {}: stop -> {:.5} (R {:.2})",
                        idx, position.id, candidate, r
                    );
                }
                Err(err) => {
                    warn!("tier {} stop modify failed for {}: {:#}", idx, position.id, err);
                }
            }
        }
        position.tier_applied = Some(idx);
    }

    /// Take the 50% partial exit once its R-multiple is reached: close half
    /// the volume (lot-quantized; the close is skipped below the broker
    /// minimum), move the stop to breakeven keeping the target, mark done.
    fn apply_partial(
        position: &mut ManagedPosition,
        r: f64,
        partial_exit_r: f64,
        symbol: &SymbolInfo,
        gateway: &mut dyn ExecutionGateway,
    ) {
        if partial_exit_r <= 0.0 || position.partial_done || r < partial_exit_r {
            return;
        }

        let half = sizing::quantize_volume(position.volume * 0.5, symbol, VolumeRounding::Down);
        if half >= symbol.min_volume && half > 0.0 {
            match gateway.close_position(position.id, Some(half)) {
                Ok(()) => {
                    position.volume -= half;
                    info!(
                        "partial exit on {}: closed {:.0}, {:.0} remains (R {:.2})",
                        position.id, half, position.volume, r
                    );
                }
                Err(err) => {
                    warn!("partial close failed for {}: {:#}", position.id, err);
                }
            }
        } else {
            debug!(
                "partial exit on {}: half volume {:.0} below minimum, close skipped",
                position.id, half
            );
        }

        let breakeven = position.entry_price;
        if position.stop_improves(breakeven) {
            match gateway.modify_position(position.id, Some(breakeven), position.target_price) {
                Ok(()) => {
                    position.stop_price = Some(breakeven);
                    info!("partial exit on {}: stop -> breakeven {:.5}", position.id, breakeven);
                }
                Err(err) => {
                    warn!("breakeven modify failed for {}: {:#}", position.id, err);
                }
            }
        }
        position.partial_done = true;
    }
}
