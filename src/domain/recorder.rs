//! Opt-in recorder of every candlestick consumed during a check.

use crate::domain::market::Candlestick;
use crate::ports::exchange_port::{CandlestickSource, Fetched};

pub struct RecordingSource<S> {
    inner: S,
    recorded: Option<Vec<Candlestick>>,
}

impl<S: CandlestickSource> RecordingSource<S> {
    pub fn new(inner: S, enabled: bool) -> Self {
        Self {
            inner,
            recorded: enabled.then(Vec::new),
        }
    }

    /// Recorded candlesticks, or `None` when recording was disabled.
    pub fn into_recorded(self) -> Option<Vec<Candlestick>> {
        self.recorded
    }
}

impl<S: CandlestickSource> CandlestickSource for RecordingSource<S> {
    fn next_candlestick(&mut self) -> Fetched<Candlestick> {
        let fetched = self.inner.next_candlestick();
        if let (Fetched::Item(candle), Some(recorded)) = (&fetched, self.recorded.as_mut()) {
            recorded.push(candle.clone());
        }
        fetched
    }
}
