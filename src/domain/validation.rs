//! Signal validation.
//!
//! Runs on a normalized [`Signal`] before any market data is fetched.

use chrono::Duration;

use crate::domain::error::SignalCheckError;
use crate::domain::signal::{Direction, Signal};

const RATIO_TOLERANCE: f64 = 1e-9;

pub fn validate_signal(signal: &Signal) -> Result<(), SignalCheckError> {
    validate_assets(signal)?;
    validate_times(signal)?;
    validate_prices(signal)?;
    validate_entries(signal)?;
    validate_take_profits(signal)?;
    validate_stop_loss(signal)?;
    validate_ratios("entryRatios", &signal.entry_ratios)?;
    validate_ratios("takeProfitRatios", &signal.take_profit_ratios)?;
    Ok(())
}

/// True when the ratios add up to one within float tolerance.
pub fn ratios_sum_to_one(ratios: &[f64]) -> bool {
    let sum: f64 = ratios.iter().sum();
    (sum - 1.0).abs() <= RATIO_TOLERANCE * ratios.len().max(1) as f64
}

fn validate_assets(signal: &Signal) -> Result<(), SignalCheckError> {
    if signal.base_asset.is_empty() {
        return Err(SignalCheckError::invalid_signal("baseAsset", "base asset is required"));
    }
    if signal.quote_asset.is_empty() {
        return Err(SignalCheckError::invalid_signal("quoteAsset", "quote asset is required"));
    }
    if signal.base_asset == signal.quote_asset {
        return Err(SignalCheckError::invalid_signal(
            "quoteAsset",
            "base and quote assets must differ",
        ));
    }
    Ok(())
}

fn validate_times(signal: &Signal) -> Result<(), SignalCheckError> {
    let Some(initial) = signal.initial_time else {
        return Err(SignalCheckError::invalid_signal("initialTime", "initial time is required"));
    };
    if let Some(invalidate) = signal.invalidate_time {
        if invalidate <= initial {
            return Err(SignalCheckError::invalid_signal(
                "invalidateTime",
                "invalidate time must be after initial time",
            ));
        }
    }
    if let Some(seconds) = signal.invalidate_after_seconds {
        if seconds <= 0 {
            return Err(SignalCheckError::invalid_signal(
                "invalidateAfterSeconds",
                "invalidate after seconds must be positive",
            ));
        }
        let deadline = Duration::try_seconds(seconds).and_then(|d| initial.checked_add_signed(d));
        if deadline.is_none() {
            return Err(SignalCheckError::invalid_signal(
                "invalidateAfterSeconds",
                "invalidate after seconds is out of range",
            ));
        }
    }
    Ok(())
}

fn validate_prices(signal: &Signal) -> Result<(), SignalCheckError> {
    let all_positive = |prices: &[f64]| prices.iter().all(|p| p.is_finite() && *p > 0.0);
    if !all_positive(&signal.entries) {
        return Err(SignalCheckError::invalid_signal("entries", "prices must be positive"));
    }
    if !all_positive(&signal.take_profits) {
        return Err(SignalCheckError::invalid_signal("takeProfits", "prices must be positive"));
    }
    if let Some(stop_loss) = signal.stop_loss {
        if !(stop_loss.is_finite() && stop_loss > 0.0) {
            return Err(SignalCheckError::invalid_signal("stopLoss", "price must be positive"));
        }
    }
    Ok(())
}

/// Long entries descend and short entries ascend.
fn validate_entries(signal: &Signal) -> Result<(), SignalCheckError> {
    let direction = signal.direction();
    let ordered = signal
        .entries
        .windows(2)
        .all(|w| w[0] != w[1] && direction.is_against(w[1], w[0]));
    if !ordered {
        return Err(SignalCheckError::invalid_signal(
            "entries",
            "entry range is inverted",
        ));
    }
    Ok(())
}

fn validate_take_profits(signal: &Signal) -> Result<(), SignalCheckError> {
    let direction = signal.direction();
    let ordered = signal
        .take_profits
        .windows(2)
        .all(|w| w[0] != w[1] && direction.is_favourable(w[1], w[0]));
    if !ordered {
        return Err(SignalCheckError::invalid_signal(
            "takeProfits",
            "take profits must be ordered toward the profitable side",
        ));
    }
    if let (Some(&first_entry), Some(&first_tp)) =
        (signal.entries.first(), signal.take_profits.first())
    {
        if direction.is_against(first_tp, first_entry) {
            return Err(SignalCheckError::invalid_signal(
                "takeProfits",
                "first take profit is on the wrong side of the entry range",
            ));
        }
    }
    Ok(())
}

fn validate_stop_loss(signal: &Signal) -> Result<(), SignalCheckError> {
    let (Some(stop_loss), Some(&last_entry)) = (signal.stop_loss, signal.entries.last()) else {
        return Ok(());
    };
    if signal.direction().is_favourable(stop_loss, last_entry) {
        let side = match signal.direction() {
            Direction::Long => "below",
            Direction::Short => "above",
        };
        return Err(SignalCheckError::invalid_signal(
            "stopLoss",
            format!("stop loss must be {side} the entry range"),
        ));
    }
    Ok(())
}

fn validate_ratios(field: &str, ratios: &[f64]) -> Result<(), SignalCheckError> {
    if ratios.iter().any(|r| !r.is_finite() || *r < 0.0) {
        return Err(SignalCheckError::invalid_signal(field, "ratios must be non-negative"));
    }
    if !ratios_sum_to_one(ratios) {
        return Err(SignalCheckError::invalid_signal(field, "ratios must add up to 1"));
    }
    Ok(())
}
