//! Trading events emitted by the evaluator and consumed by the profit calculator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Entered,
    TookProfit,
    StoppedLoss,
    Invalidated,
    FinishedDataset,
}

impl EventKind {
    /// Events after which no position may remain open.
    pub fn is_closing(self) -> bool {
        matches!(
            self,
            EventKind::StoppedLoss | EventKind::Invalidated | EventKind::FinishedDataset
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// 1-based target index for entries and take profits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<usize>,
    /// Absent only for a finished dataset on an empty stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub profit_ratio: f64,
}

impl Event {
    pub fn new(kind: EventKind, price: f64, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            target: None,
            price: Some(price),
            at: Some(at),
            profit_ratio: 0.0,
        }
    }

    pub fn with_target(mut self, target: usize) -> Self {
        self.target = Some(target);
        self
    }

    /// Finished-dataset event for a stream that never produced a tick.
    pub fn empty_dataset() -> Self {
        Self {
            kind: EventKind::FinishedDataset,
            target: None,
            price: None,
            at: None,
            profit_ratio: 0.0,
        }
    }
}
