//! Domain error types.

/// Top-level error type for signalcheck.
#[derive(Debug, thiserror::Error)]
pub enum SignalCheckError {
    #[error("invalid signal: {field}: {reason}")]
    InvalidSignal { field: String, reason: String },

    #[error("unknown exchange '{name}'")]
    UnknownExchange { name: String },

    #[error("market pair {pair} does not exist on the exchange")]
    InvalidMarketPair { pair: String },

    #[error("exchange kept rate limiting after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("exchange error: {reason}")]
    Exchange { reason: String },

    #[error("no price for {pair} at or after {at}")]
    NoPriceAt { pair: String, at: String },

    #[error("cannot resolve USD price of {asset}")]
    UsdPriceUnresolved { asset: String },

    #[error("no trades available for {pair} after {at}")]
    NoTrades { pair: String, at: String },

    #[error("signal never entered")]
    NotEntered,

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SignalCheckError {
    pub fn invalid_signal(field: &str, reason: impl Into<String>) -> Self {
        SignalCheckError::InvalidSignal {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Status reported in the check output and by the web front end.
    pub fn http_status(&self) -> u16 {
        match self {
            SignalCheckError::InvalidSignal { .. }
            | SignalCheckError::UnknownExchange { .. }
            | SignalCheckError::Json(_) => 400,
            SignalCheckError::RateLimited { .. } => 429,
            _ => 500,
        }
    }
}

impl From<&SignalCheckError> for std::process::ExitCode {
    fn from(err: &SignalCheckError) -> Self {
        let code: u8 = match err {
            SignalCheckError::Io(_) | SignalCheckError::Json(_) => 1,
            SignalCheckError::ConfigParse { .. }
            | SignalCheckError::ConfigMissing { .. }
            | SignalCheckError::ConfigInvalid { .. } => 2,
            SignalCheckError::Database { .. } | SignalCheckError::DatabaseQuery { .. } => 3,
            SignalCheckError::InvalidSignal { .. } | SignalCheckError::UnknownExchange { .. } => 4,
            SignalCheckError::InvalidMarketPair { .. }
            | SignalCheckError::RateLimited { .. }
            | SignalCheckError::Exchange { .. }
            | SignalCheckError::NoPriceAt { .. }
            | SignalCheckError::UsdPriceUnresolved { .. }
            | SignalCheckError::NoTrades { .. }
            | SignalCheckError::NotEntered => 5,
        };
        std::process::ExitCode::from(code)
    }
}
