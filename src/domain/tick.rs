//! Tick expansion: candlesticks to an ordered stream of price ticks.

use crate::domain::error::SignalCheckError;
use crate::domain::market::Tick;
use crate::domain::retry::RetryPolicy;
use crate::ports::exchange_port::{CandlestickSource, Fetched};

/// Outcome of pulling one tick.
#[derive(Debug)]
pub enum TickPull {
    Tick(Tick),
    /// Source exhausted; carries the last tick ever produced, if any.
    Exhausted { last: Option<Tick> },
    Failed {
        error: SignalCheckError,
        last: Option<Tick>,
    },
}

/// Emits two ticks per candlestick, low then high.
pub struct TickExpander<S> {
    source: S,
    retry: RetryPolicy,
    pending: Option<Tick>,
    last: Option<Tick>,
}

impl<S: CandlestickSource> TickExpander<S> {
    pub fn new(source: S, retry: RetryPolicy) -> Self {
        Self {
            source,
            retry,
            pending: None,
            last: None,
        }
    }

    pub fn next_tick(&mut self) -> TickPull {
        if let Some(tick) = self.pending.take() {
            self.last = Some(tick);
            return TickPull::Tick(tick);
        }

        let source = &mut self.source;
        match self.retry.pull(|| source.next_candlestick()) {
            Fetched::Item(candle) => {
                let [low, high] = candle.to_ticks();
                self.pending = Some(high);
                self.last = Some(low);
                TickPull::Tick(low)
            }
            Fetched::Exhausted => TickPull::Exhausted { last: self.last },
            Fetched::RateLimited => TickPull::Failed {
                error: SignalCheckError::RateLimited {
                    attempts: self.retry.max_attempts(),
                },
                last: self.last,
            },
            Fetched::Failed(error) => TickPull::Failed {
                error,
                last: self.last,
            },
        }
    }

    pub fn last_tick(&self) -> Option<Tick> {
        self.last
    }
}
