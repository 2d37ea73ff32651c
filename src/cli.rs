//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvEventLogAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::checker::{CheckOptions, check_signal};
use crate::domain::config_validation::validate_check_config;
use crate::domain::error::SignalCheckError;
use crate::domain::max_enter::MaxEnterConfig;
use crate::domain::output::SignalCheckOutput;
use crate::domain::retry::{Backoff, RetryPolicy};
use crate::domain::signal::{DEFAULT_EXCHANGE, Signal};
use crate::domain::validation::validate_signal;
use crate::ports::config_port::ConfigPort;
use crate::ports::exchange_port::ExchangeRegistry;
use crate::ports::report_port::ReportPort;

const DEFAULT_CSV_DIR: &str = "data";
#[cfg(feature = "web")]
const DEFAULT_LISTEN: &str = "127.0.0.1:3000";

#[derive(Parser, Debug)]
#[command(name = "signalcheck", about = "Replay trading signals against historical prices")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a signal against market data
    Check {
        #[arg(short, long)]
        signal: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// CSV data directory, overrides the configured source
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Write the JSON output here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the event log as CSV
        #[arg(short, long)]
        events: Option<PathBuf>,
    },
    /// Validate a signal without evaluating it
    Validate {
        #[arg(short, long)]
        signal: PathBuf,
    },
    /// Start the web server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Check {
            signal,
            config,
            data,
            output,
            events,
        } => run_check(
            &signal,
            config.as_deref(),
            data.as_deref(),
            output.as_deref(),
            events.as_deref(),
        ),
        Command::Validate { signal } => {
            init_logging(None);
            run_validate(&signal)
        }
        Command::Serve { config } => run_serve(&config),
    }
}

/// Installs the stderr subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(level: Option<String>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_deref().unwrap_or("info")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn load_optional_config(path: Option<&Path>) -> Result<FileConfigAdapter, ExitCode> {
    match path {
        Some(path) => load_config(path),
        None => FileConfigAdapter::from_string("").map_err(|err| {
            eprintln!("error: {err}");
            ExitCode::from(&err)
        }),
    }
}

pub fn read_signal(path: &Path) -> Result<Signal, SignalCheckError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Builds retry and max-enter settings from a validated config.
pub fn build_check_options(config: &dyn ConfigPort) -> Result<CheckOptions, SignalCheckError> {
    validate_check_config(config)?;

    let defaults = CheckOptions::default();
    let backoff = match config
        .get_string("retry", "backoff")
        .map(|b| b.to_lowercase())
        .as_deref()
    {
        Some("exponential") => Backoff::Exponential,
        Some(_) => Backoff::Fixed,
        None => defaults.retry.backoff,
    };
    let retry = RetryPolicy {
        max_retries: config.get_int("retry", "max_retries", i64::from(defaults.retry.max_retries))
            as u32,
        base_delay: Duration::from_millis(
            config.get_int("retry", "delay_ms", defaults.retry.base_delay.as_millis() as i64) as u64,
        ),
        backoff,
    };

    let max_enter = MaxEnterConfig {
        minute_count: config.get_int(
            "max_enter",
            "minute_count",
            i64::from(defaults.max_enter.minute_count),
        ) as u32,
        max_trade_count: config.get_int(
            "max_enter",
            "max_trade_count",
            defaults.max_enter.max_trade_count as i64,
        ) as usize,
        percentile: config.get_double("max_enter", "percentile", defaults.max_enter.percentile),
    };

    Ok(CheckOptions { retry, max_enter })
}

fn configured_exchanges(config: &dyn ConfigPort) -> Vec<String> {
    let names = config.get_list("data", "exchanges");
    if names.is_empty() {
        vec![DEFAULT_EXCHANGE.to_string()]
    } else {
        names.into_iter().map(|n| n.to_lowercase()).collect()
    }
}

/// Opens every configured exchange. `data_dir` forces the CSV source.
pub fn build_registry(
    config: &dyn ConfigPort,
    data_dir: Option<&Path>,
) -> Result<ExchangeRegistry, SignalCheckError> {
    let names = configured_exchanges(config);
    let source = match data_dir {
        Some(_) => "csv".to_string(),
        None => config
            .get_string("data", "source")
            .unwrap_or_else(|| "csv".to_string())
            .to_lowercase(),
    };

    let mut registry = ExchangeRegistry::new();
    match source.as_str() {
        "sqlite" => register_sqlite(config, &names, &mut registry)?,
        _ => {
            let dir = data_dir.map(Path::to_path_buf).unwrap_or_else(|| {
                PathBuf::from(
                    config
                        .get_string("data", "csv_dir")
                        .unwrap_or_else(|| DEFAULT_CSV_DIR.to_string()),
                )
            });
            let adapter = CsvAdapter::new(dir);
            for name in &names {
                registry.register(name, adapter.load_exchange(name)?);
            }
        }
    }
    debug!(exchanges = ?registry.names(), %source, "exchanges loaded");
    Ok(registry)
}

#[cfg(feature = "sqlite")]
fn register_sqlite(
    config: &dyn ConfigPort,
    names: &[String],
    registry: &mut ExchangeRegistry,
) -> Result<(), SignalCheckError> {
    use crate::adapters::sqlite_adapter::SqliteStore;

    let store = SqliteStore::from_config(config)?;
    for name in names {
        registry.register(name, store.exchange(name));
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn register_sqlite(
    _config: &dyn ConfigPort,
    _names: &[String],
    _registry: &mut ExchangeRegistry,
) -> Result<(), SignalCheckError> {
    Err(SignalCheckError::ConfigInvalid {
        section: "data".into(),
        key: "source".into(),
        reason: "sqlite feature is required for the sqlite source".into(),
    })
}

/// Exit code for a finished check.
pub fn exit_code_for(output: &SignalCheckOutput) -> ExitCode {
    match (output.is_error, output.http_status) {
        (false, _) => ExitCode::SUCCESS,
        (true, 400) => ExitCode::from(4),
        (true, _) => ExitCode::from(5),
    }
}

fn run_check(
    signal_path: &Path,
    config_path: Option<&Path>,
    data_dir: Option<&Path>,
    output_path: Option<&Path>,
    events_path: Option<&Path>,
) -> ExitCode {
    let config = match load_optional_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    init_logging(config.get_string("logging", "level"));

    let options = match build_check_options(&config) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    let signal = match read_signal(signal_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    let registry = match build_registry(&config, data_dir) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    let output = check_signal(signal, &registry, &options);
    info!(
        entered = output.entered,
        events = output.events.len(),
        profit_ratio = output.profit_ratio,
        "check finished"
    );

    let json = JsonReportAdapter::new(true);
    let written = match output_path {
        Some(path) => json.write(&output, path),
        None => json.render(&output).map(|text| println!("{text}")),
    };
    if let Err(e) = written {
        eprintln!("error: {e}");
        return ExitCode::from(&e);
    }

    if let Some(path) = events_path {
        if let Err(e) = CsvEventLogAdapter.write(&output, path) {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    }

    if let Some(message) = &output.error_message {
        eprintln!("error: {message}");
    }
    exit_code_for(&output)
}

fn run_validate(signal_path: &Path) -> ExitCode {
    let signal = match read_signal(signal_path) {
        Ok(s) => s.normalized(),
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    match validate_signal(&signal) {
        Ok(()) => {
            println!(
                "Signal is valid: {} on {} ({} entries, {} take profits)",
                signal.market_pair(),
                signal.exchange,
                signal.entries.len(),
                signal.take_profits.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

fn run_serve(config_path: &Path) -> ExitCode {
    #[cfg(feature = "web")]
    {
        use crate::adapters::web::{AppState, build_router};
        use std::net::SocketAddr;
        use std::sync::Arc;

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };
        init_logging(config.get_string("logging", "level"));

        let options = match build_check_options(&config) {
            Ok(o) => o,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(&e);
            }
        };
        let registry = match build_registry(&config, None) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(&e);
            }
        };

        let listen = config
            .get_string("web", "listen")
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let addr: SocketAddr = match listen.parse() {
            Ok(a) => a,
            Err(e) => {
                let err = SignalCheckError::ConfigInvalid {
                    section: "web".into(),
                    key: "listen".into(),
                    reason: e.to_string(),
                };
                eprintln!("error: {err}");
                return ExitCode::from(&err);
            }
        };

        let router = build_router(AppState {
            exchanges: Arc::new(registry),
            options,
        });

        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                let err = SignalCheckError::Io(e);
                eprintln!("error: {err}");
                return ExitCode::from(&err);
            }
        };

        let served = runtime.block_on(async {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(%addr, "web server listening");
            axum::serve(listener, router).await
        });

        match served {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                let err = SignalCheckError::Io(e);
                eprintln!("error: {err}");
                ExitCode::from(&err)
            }
        }
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        eprintln!("error: web feature is required for serve");
        ExitCode::from(1)
    }
}
