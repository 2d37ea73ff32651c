//! Signal evaluation state machine.
//!
//! Each tick runs through a fixed cascade of guards: discard before the
//! initial time, record the first price, invalidate, enter, stop loss, take
//! profit. At most one event fires per tick and every event with a price is
//! forwarded to the [`ProfitCalculator`] before deciding whether to continue.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::error::SignalCheckError;
use crate::domain::event::{Event, EventKind};
use crate::domain::market::Tick;
use crate::domain::profit::ProfitCalculator;
use crate::domain::signal::{Direction, Signal};
use crate::domain::tick::{TickExpander, TickPull};
use crate::ports::exchange_port::CandlestickSource;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluatorState {
    /// Entry zones reached so far (1-based index of the furthest one).
    pub highest_entry: usize,
    pub highest_take_profit: usize,
    pub reached_stop_loss: bool,
    pub first_candle_open_price: Option<f64>,
    pub first_candle_at: Option<DateTime<Utc>>,
    /// Effective stop loss; moves when a take-profit ratchet fires.
    pub stop_loss: Option<f64>,
    /// Price at the last entry or take profit.
    pub price_checkpoint: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Terminate,
}

/// Result of one evaluation run.
#[derive(Debug)]
pub struct Evaluation {
    pub state: EvaluatorState,
    pub events: Vec<Event>,
    pub profit_ratio: f64,
    /// Fatal upstream error; `events` holds everything before it.
    pub error: Option<SignalCheckError>,
}

impl Evaluation {
    pub fn entered(&self) -> bool {
        self.state.highest_entry > 0
    }
}

pub struct SignalEvaluator<'a> {
    signal: &'a Signal,
    direction: Direction,
    initial_time: Option<DateTime<Utc>>,
    invalidate_at: Option<DateTime<Utc>>,
    state: EvaluatorState,
    calculator: ProfitCalculator,
    events: Vec<Event>,
}

impl<'a> SignalEvaluator<'a> {
    pub fn new(signal: &'a Signal) -> Self {
        Self {
            signal,
            direction: signal.direction(),
            initial_time: signal.initial_time,
            invalidate_at: signal.invalidate_at(),
            state: EvaluatorState {
                stop_loss: signal.stop_loss,
                ..EvaluatorState::default()
            },
            calculator: ProfitCalculator::for_signal(signal),
            events: Vec::new(),
        }
    }

    /// Pulls ticks until a terminating event, exhaustion or a fatal error.
    pub fn run<S: CandlestickSource>(mut self, ticks: &mut TickExpander<S>) -> Evaluation {
        loop {
            match ticks.next_tick() {
                TickPull::Tick(tick) => {
                    if self.on_tick(&tick) == Step::Terminate {
                        return self.finish(None);
                    }
                }
                TickPull::Exhausted { last } => {
                    let event = match last {
                        Some(tick) => Event::new(EventKind::FinishedDataset, tick.price, tick.timestamp),
                        None => Event::empty_dataset(),
                    };
                    self.emit(event);
                    return self.finish(None);
                }
                TickPull::Failed { error, .. } => {
                    warn!(%error, events = self.events.len(), "evaluation aborted");
                    return self.finish(Some(error));
                }
            }
        }
    }

    /// Applies the transition rules to one tick.
    pub fn on_tick(&mut self, tick: &Tick) -> Step {
        if let Some(initial) = self.initial_time {
            if tick.timestamp < initial {
                return Step::Continue;
            }
        }
        if self.state.first_candle_at.is_none() {
            self.state.first_candle_open_price = Some(tick.price);
            self.state.first_candle_at = Some(tick.timestamp);
        }

        let price = tick.price;

        if let Some(invalidate_at) = self.invalidate_at {
            if tick.timestamp >= invalidate_at {
                self.emit(Event::new(EventKind::Invalidated, price, tick.timestamp));
                return Step::Terminate;
            }
        }

        if let Some(target) = self.entry_target(price) {
            self.state.highest_entry = target;
            self.state.price_checkpoint = Some(price);
            let event = Event::new(EventKind::Entered, price, tick.timestamp).with_target(target);
            return self.emit(event);
        }

        if self.state.highest_entry == 0 {
            return Step::Continue;
        }

        if let Some(stop_loss) = self.state.stop_loss {
            if self.direction.is_against(price, stop_loss) {
                self.state.reached_stop_loss = true;
                self.emit(Event::new(EventKind::StoppedLoss, price, tick.timestamp));
                return Step::Terminate;
            }
        }

        if let Some(target) = self.take_profit_target(price) {
            self.state.highest_take_profit = target;
            let event = Event::new(EventKind::TookProfit, price, tick.timestamp).with_target(target);
            if self.emit(event) == Step::Terminate
                || target >= self.signal.take_profits.len()
            {
                return Step::Terminate;
            }
            if self.signal.stops_at_previous(target) {
                debug!(target, stop_loss = ?self.state.price_checkpoint, "moving stop loss");
                self.state.stop_loss = self.state.price_checkpoint;
            }
            self.state.price_checkpoint = Some(price);
        }

        Step::Continue
    }

    pub fn state(&self) -> &EvaluatorState {
        &self.state
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn finish(self, error: Option<SignalCheckError>) -> Evaluation {
        Evaluation {
            profit_ratio: self.calculator.profit_ratio(),
            state: self.state,
            events: self.events,
            error,
        }
    }

    /// Forwards the event to the calculator and appends it to the log.
    fn emit(&mut self, mut event: Event) -> Step {
        event.profit_ratio = match event.price {
            Some(_) => self.calculator.apply_event(&event),
            None => self.calculator.profit_ratio(),
        };
        debug!(
            kind = ?event.kind,
            target = ?event.target,
            price = ?event.price,
            profit_ratio = event.profit_ratio,
            "event"
        );
        let closing = event.kind.is_closing();
        self.events.push(event);
        if closing || self.calculator.is_finished() {
            Step::Terminate
        } else {
            Step::Continue
        }
    }

    /// Furthest not-yet-entered zone containing `price`, as a 1-based target.
    fn entry_target(&self, price: f64) -> Option<usize> {
        let entries = &self.signal.entries;
        let zones = self.signal.entry_zone_count();
        if self.state.highest_entry >= zones {
            return None;
        }
        match entries.len() {
            0 => Some(1),
            1 => self.direction.is_against(price, entries[0]).then_some(1),
            _ => (self.state.highest_entry..zones)
                .rev()
                .find(|&zone| self.in_zone(zone, price))
                .map(|zone| zone + 1),
        }
    }

    /// Zone `i` spans `entries[i + 1]` (inclusive) to `entries[i]`; the top
    /// of the first zone is inclusive too.
    fn in_zone(&self, zone: usize, price: f64) -> bool {
        let entries = &self.signal.entries;
        let (top, bottom) = (entries[zone], entries[zone + 1]);
        let within_top = if zone == 0 {
            self.direction.is_against(price, top)
        } else {
            !self.direction.is_favourable(price, top)
        };
        within_top && self.direction.is_favourable(price, bottom)
    }

    /// Furthest untaken target reached by `price`, as a 1-based index.
    fn take_profit_target(&self, price: f64) -> Option<usize> {
        let targets = &self.signal.take_profits;
        (self.state.highest_take_profit..targets.len())
            .rev()
            .find(|&i| self.direction.is_favourable(price, targets[i]))
            .map(|i| i + 1)
    }
}
