//! Top-level signal check: validation, evaluation and size estimation.

use tracing::{info, warn};

use crate::domain::error::SignalCheckError;
use crate::domain::evaluator::SignalEvaluator;
use crate::domain::max_enter::{MaxEnterConfig, max_enter_usd_for_events};
use crate::domain::output::SignalCheckOutput;
use crate::domain::recorder::RecordingSource;
use crate::domain::retry::RetryPolicy;
use crate::domain::signal::Signal;
use crate::domain::tick::TickExpander;
use crate::domain::validation::validate_signal;
use crate::ports::exchange_port::{ExchangePort, ExchangeRegistry};

/// Tunables shared by every check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckOptions {
    pub retry: RetryPolicy,
    pub max_enter: MaxEnterConfig,
}

/// Normalizes and validates `signal`, then evaluates it on its exchange.
pub fn check_signal(
    signal: Signal,
    exchanges: &ExchangeRegistry,
    options: &CheckOptions,
) -> SignalCheckOutput {
    let signal = signal.normalized();
    if let Err(error) = validate_signal(&signal) {
        info!(%error, "signal rejected");
        return SignalCheckOutput::rejected(signal, &error);
    }
    let Some(exchange) = exchanges.get(&signal.exchange) else {
        let error = SignalCheckError::UnknownExchange {
            name: signal.exchange.clone(),
        };
        info!(%error, "signal rejected");
        return SignalCheckOutput::rejected(signal, &error);
    };
    evaluate(signal, exchange, options)
}

/// Evaluates an already validated signal.
///
/// The max-enter estimate is best effort: its failure only omits the field.
pub fn evaluate(
    signal: Signal,
    exchange: &dyn ExchangePort,
    options: &CheckOptions,
) -> SignalCheckOutput {
    let pair = signal.market_pair();
    let Some(initial_time) = signal.initial_time else {
        let error = SignalCheckError::invalid_signal("initialTime", "initial time is required");
        return SignalCheckOutput::rejected(signal, &error);
    };

    let mut recorder = RecordingSource::new(
        exchange.candlesticks(&pair, initial_time),
        signal.return_candlesticks,
    );
    let mut ticks = TickExpander::new(&mut recorder, options.retry.clone());
    let evaluation = SignalEvaluator::new(&signal).run(&mut ticks);
    let candlesticks = recorder.into_recorded();

    info!(
        %pair,
        events = evaluation.events.len(),
        profit_ratio = evaluation.profit_ratio,
        failed = evaluation.error.is_some(),
        "evaluation finished"
    );

    let max_enter_usd = if evaluation.error.is_none()
        && evaluation.entered()
        && !signal.dont_calculate_max_enter_usd
    {
        match max_enter_usd_for_events(
            exchange,
            &pair,
            &evaluation.events,
            &options.max_enter,
            &options.retry,
        ) {
            Ok(usd) => Some(usd),
            Err(error) => {
                warn!(%pair, %error, "max enter estimate unavailable");
                None
            }
        }
    } else {
        None
    };

    SignalCheckOutput::from_evaluation(signal, evaluation, max_enter_usd, candlesticks)
}
