//! Report produced by a signal check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::SignalCheckError;
use super::evaluator::Evaluation;
use super::event::Event;
use super::market::Candlestick;
use super::signal::Signal;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalCheckOutput {
    pub events: Vec<Event>,
    pub input: Signal,
    pub entered: bool,
    pub highest_entry: usize,
    pub highest_take_profit: usize,
    pub reached_stop_loss: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_candle_open_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_candle_at: Option<DateTime<Utc>>,
    pub profit_ratio: f64,
    pub is_error: bool,
    pub http_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(
        default,
        rename = "maxEnterUSD",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_enter_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candlesticks: Option<Vec<Candlestick>>,
}

impl SignalCheckOutput {
    /// Output for a check that never started.
    pub fn rejected(input: Signal, error: &SignalCheckError) -> Self {
        Self {
            events: Vec::new(),
            input,
            entered: false,
            highest_entry: 0,
            highest_take_profit: 0,
            reached_stop_loss: false,
            first_candle_open_price: None,
            first_candle_at: None,
            profit_ratio: 0.0,
            is_error: true,
            http_status: error.http_status(),
            error_message: Some(error.to_string()),
            max_enter_usd: None,
            candlesticks: None,
        }
    }

    pub fn from_evaluation(
        input: Signal,
        evaluation: Evaluation,
        max_enter_usd: Option<f64>,
        candlesticks: Option<Vec<Candlestick>>,
    ) -> Self {
        let entered = evaluation.entered();
        let Evaluation {
            state,
            events,
            profit_ratio,
            error,
        } = evaluation;
        Self {
            events,
            input,
            entered,
            highest_entry: state.highest_entry,
            highest_take_profit: state.highest_take_profit,
            reached_stop_loss: state.reached_stop_loss,
            first_candle_open_price: state.first_candle_open_price,
            first_candle_at: state.first_candle_at,
            profit_ratio,
            is_error: error.is_some(),
            http_status: error.as_ref().map_or(200, SignalCheckError::http_status),
            error_message: error.map(|e| e.to_string()),
            max_enter_usd,
            candlesticks,
        }
    }
}
