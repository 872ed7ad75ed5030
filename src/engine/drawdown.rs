//! Drawdown-driven defensive risk mode.
//!
//! Tracks the equity high-water mark and switches new entries to a reduced
//! risk percentage once floating drawdown crosses a threshold. The switch is
//! hysteretic: it releases only after drawdown recovers below half the
//! threshold, so readings oscillating around the trigger cannot chatter the
//! mode on and off.

use tracing::info;

#[derive(Debug)]
pub struct DrawdownController {
    /// Drawdown percent that activates defensive mode; <= 0 disables
    threshold_pct: f64,
    /// Monotone non-decreasing equity high-water mark
    max_equity_seen: f64,
    drawdown_pct: f64,
    defensive: bool,
}

impl DrawdownController {
    pub fn new(threshold_pct: f64) -> Self {
        Self {
            threshold_pct,
            max_equity_seen: 0.0,
            drawdown_pct: 0.0,
            defensive: false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.threshold_pct > 0.0
    }

    pub fn defensive(&self) -> bool {
        self.defensive
    }

    pub fn drawdown_pct(&self) -> f64 {
        self.drawdown_pct
    }

    /// Risk percent to size the next entry with.
    pub fn risk_percent(&self, normal: f64, defensive: f64) -> f64 {
        if self.defensive {
            defensive
        } else {
            normal
        }
    }

    /// Fold the latest equity reading into the high-water mark and the
    /// defensive switch. Called on every bar/tick/timer event. Returns the
    /// current drawdown percent.
    pub fn update(&mut self, equity: f64) -> f64 {
        if equity > self.max_equity_seen {
            self.max_equity_seen = equity;
        }
        self.drawdown_pct = if self.max_equity_seen > 0.0 {
            (self.max_equity_seen - equity) / self.max_equity_seen * 100.0
        } else {
            0.0
        };

        if self.enabled() {
            if !self.defensive && self.drawdown_pct >= self.threshold_pct {
                self.defensive = true;
                info!(
                    "defensive mode ON: drawdown {:.2}% >= {:.2}% (peak equity {:.2})",
                    self.drawdown_pct, self.threshold_pct, self.max_equity_seen
                );
            } else if self.defensive && self.drawdown_pct < self.threshold_pct * 0.5 {
                self.defensive = false;
                info!(
                    "defensive mode OFF: drawdown recovered to {:.2}%",
                    self.drawdown_pct
                );
            }
        }

        self.drawdown_pct
    }
}
