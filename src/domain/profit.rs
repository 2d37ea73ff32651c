//! Position and profit-ratio bookkeeping driven by trading events.
//!
//! Capital is normalized to 1.0. Entries convert a fraction of that capital
//! into units of the base asset at the event price; take profits and closing
//! events convert units back into realized capital. The reported profit ratio
//! is the marked value of the open position plus realized and uncommitted
//! capital, minus the initial 1.0. A short position is worth its committed
//! capital scaled by entry price over current price.

use tracing::{debug, warn};

use super::event::{Event, EventKind};
use super::signal::{Direction, Signal};

const FULL_RATIO_TOLERANCE: f64 = 1e-9;

/// Size-weighted mean of two fills.
pub fn weighted_average_price(old_units: f64, old_price: f64, new_units: f64, new_price: f64) -> f64 {
    let total = old_units + new_units;
    if old_units <= 0.0 || total <= 0.0 {
        return new_price;
    }
    (old_price * old_units + new_price * new_units) / total
}

/// Sum of the first `target` ratios. Targets past the end of `ratios` inherit
/// the last cumulative value.
pub fn cumulative_ratio(ratios: &[f64], target: usize) -> f64 {
    ratios.iter().take(target).sum()
}

#[derive(Debug, Clone)]
pub struct ProfitCalculator {
    direction: Direction,
    entry_ratios: Vec<f64>,
    take_profit_ratios: Vec<f64>,
    entry_price: Option<f64>,
    position_size: f64,
    ratio_awaiting_entry: f64,
    ratio_realized: f64,
    last_price: f64,
    highest_entry: usize,
    events_applied: usize,
}

impl ProfitCalculator {
    pub fn new(direction: Direction, entry_ratios: &[f64], take_profit_ratios: &[f64]) -> Self {
        let or_full = |ratios: &[f64]| {
            if ratios.is_empty() {
                vec![1.0]
            } else {
                ratios.to_vec()
            }
        };
        Self {
            direction,
            entry_ratios: or_full(entry_ratios),
            take_profit_ratios: or_full(take_profit_ratios),
            entry_price: None,
            position_size: 0.0,
            ratio_awaiting_entry: 1.0,
            ratio_realized: 0.0,
            last_price: 0.0,
            highest_entry: 0,
            events_applied: 0,
        }
    }

    pub fn for_signal(signal: &Signal) -> Self {
        Self::new(
            signal.direction(),
            &signal.entry_ratios,
            &signal.take_profit_ratios,
        )
    }

    /// Applies one event and returns the profit ratio after it.
    ///
    /// Events must be applied in the order they occurred.
    pub fn apply_event(&mut self, event: &Event) -> f64 {
        let Some(price) = event.price else {
            return self.profit_ratio();
        };
        let first_event = self.events_applied == 0;
        self.events_applied += 1;
        self.last_price = price;

        match event.kind {
            EventKind::Entered => self.enter(event.target.unwrap_or(1), price),
            EventKind::TookProfit => self.take_profit(event.target.unwrap_or(1), price),
            kind => {
                if first_event {
                    debug!(?kind, "closing event before any entry");
                } else if kind == EventKind::StoppedLoss && self.position_size <= 0.0 {
                    warn!(price, "stop loss with no open position");
                }
                self.fold_awaiting();
                self.close(self.position_size, price);
                self.position_size = 0.0;
            }
        }
        self.profit_ratio()
    }

    /// Marked value of the open position plus realized and uncommitted
    /// capital, minus one. Zero until something has been entered.
    pub fn profit_ratio(&self) -> f64 {
        let Some(entry_price) = self.entry_price else {
            return 0.0;
        };
        self.value_of(self.position_size, entry_price, self.last_price)
            + self.ratio_realized
            + self.ratio_awaiting_entry
            - 1.0
    }

    /// No capital is waiting to enter and no position is open.
    pub fn is_finished(&self) -> bool {
        self.ratio_awaiting_entry == 0.0 && self.position_size == 0.0
    }

    pub fn entry_price(&self) -> Option<f64> {
        self.entry_price
    }

    pub fn position_size(&self) -> f64 {
        self.position_size
    }

    pub fn ratio_awaiting_entry(&self) -> f64 {
        self.ratio_awaiting_entry
    }

    pub fn ratio_realized(&self) -> f64 {
        self.ratio_realized
    }

    fn enter(&mut self, target: usize, price: f64) {
        if self.ratio_awaiting_entry <= 0.0 || target <= self.highest_entry {
            return;
        }
        let committed = cumulative_ratio(&self.entry_ratios, target);
        let enter_with = committed - cumulative_ratio(&self.entry_ratios, self.highest_entry);
        let new_units = enter_with / price;
        let old_price = self.entry_price.unwrap_or(price);

        self.entry_price = Some(weighted_average_price(
            self.position_size,
            old_price,
            new_units,
            price,
        ));
        self.position_size += new_units;
        self.ratio_awaiting_entry = if target >= self.entry_ratios.len() {
            0.0
        } else {
            (1.0 - committed).max(0.0)
        };
        self.highest_entry = target;
        debug!(target, price, enter_with, "entered");
    }

    fn take_profit(&mut self, target: usize, price: f64) {
        if self.position_size <= 0.0 {
            warn!(target, price, "take profit with no open position");
            self.fold_awaiting();
            return;
        }
        self.fold_awaiting();

        let ratio = cumulative_ratio(&self.take_profit_ratios, target);
        if ratio >= 1.0 - FULL_RATIO_TOLERANCE {
            self.close(self.position_size, price);
            self.position_size = 0.0;
        } else {
            let units = self.position_size * ratio;
            self.close(units, price);
            self.position_size -= units;
        }
        debug!(target, price, ratio, "took profit");
    }

    /// Capital that never entered can no longer enter once the position
    /// starts closing.
    fn fold_awaiting(&mut self) {
        self.ratio_realized += self.ratio_awaiting_entry;
        self.ratio_awaiting_entry = 0.0;
    }

    fn close(&mut self, units: f64, price: f64) {
        if units <= 0.0 {
            return;
        }
        if let Some(entry_price) = self.entry_price {
            self.ratio_realized += self.value_of(units, entry_price, price);
        }
    }

    fn value_of(&self, units: f64, entry_price: f64, price: f64) -> f64 {
        match self.direction {
            Direction::Long => units * price,
            // Capital scales by entry / price.
            Direction::Short => units * entry_price * entry_price / price,
        }
    }
}
