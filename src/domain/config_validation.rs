//! Configuration validation.
//!
//! Validates the settings file before any check runs.

use crate::domain::error::SignalCheckError;
use crate::ports::config_port::ConfigPort;

pub fn validate_check_config(config: &dyn ConfigPort) -> Result<(), SignalCheckError> {
    validate_retry(config)?;
    validate_max_enter(config)?;
    validate_data_source(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> SignalCheckError {
    SignalCheckError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_retry(config: &dyn ConfigPort) -> Result<(), SignalCheckError> {
    let max_retries = config.get_int("retry", "max_retries", 5);
    if !(0..=20).contains(&max_retries) {
        return Err(invalid("retry", "max_retries", "max_retries must be between 0 and 20"));
    }
    if config.get_int("retry", "delay_ms", 1000) < 0 {
        return Err(invalid("retry", "delay_ms", "delay_ms must be non-negative"));
    }
    if let Some(backoff) = config.get_string("retry", "backoff") {
        if !matches!(backoff.to_lowercase().as_str(), "fixed" | "exponential") {
            return Err(invalid("retry", "backoff", "backoff must be fixed or exponential"));
        }
    }
    Ok(())
}

fn validate_max_enter(config: &dyn ConfigPort) -> Result<(), SignalCheckError> {
    if config.get_int("max_enter", "minute_count", 5) <= 0 {
        return Err(invalid("max_enter", "minute_count", "minute_count must be positive"));
    }
    if config.get_int("max_enter", "max_trade_count", 10_000) <= 0 {
        return Err(invalid(
            "max_enter",
            "max_trade_count",
            "max_trade_count must be positive",
        ));
    }
    let percentile = config.get_double("max_enter", "percentile", 0.8);
    if !(0.0..=1.0).contains(&percentile) {
        return Err(invalid("max_enter", "percentile", "percentile must be between 0 and 1"));
    }
    Ok(())
}

fn validate_data_source(config: &dyn ConfigPort) -> Result<(), SignalCheckError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string())
        .to_lowercase();
    match source.as_str() {
        "csv" => Ok(()),
        "sqlite" => {
            if config.get_string("sqlite", "path").is_none() {
                return Err(SignalCheckError::ConfigMissing {
                    section: "sqlite".to_string(),
                    key: "path".to_string(),
                });
            }
            Ok(())
        }
        _ => Err(invalid("data", "source", "source must be csv or sqlite")),
    }
}
