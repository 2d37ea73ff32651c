//! Core domain types and logic.

pub mod market;
pub mod signal;
pub mod validation;
pub mod event;
pub mod profit;
pub mod retry;
pub mod tick;
pub mod recorder;
pub mod evaluator;
pub mod usd_price;
pub mod max_enter;
pub mod checker;
pub mod output;
pub mod config_validation;
pub mod error;
