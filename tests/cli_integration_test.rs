//! CLI integration tests for the check and validate commands.
//!
//! Tests cover:
//! - Config parsing into check options (build_check_options)
//! - Exchange registry construction from a CSV data directory
//! - End-to-end `check` writing the JSON output and the event log
//! - `validate` exit codes

mod common;

use clap::Parser;
use common::*;
use signalcheck::adapters::file_config_adapter::FileConfigAdapter;
use signalcheck::cli::{self, Cli};
use signalcheck::domain::checker::CheckOptions;
use signalcheck::domain::error::SignalCheckError;
use signalcheck::domain::output::SignalCheckOutput;
use signalcheck::domain::retry::Backoff;
use signalcheck::domain::signal::Signal;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// ExitCode has no PartialEq, compare through Debug.
fn same_code(actual: ExitCode, expected: ExitCode) -> bool {
    format!("{actual:?}") == format!("{expected:?}")
}

const CHECK_INI: &str = r#"
[retry]
max_retries = 2
delay_ms = 0
backoff = exponential

[max_enter]
minute_count = 10
max_trade_count = 500
percentile = 0.5

[data]
source = csv
exchanges = Binance
"#;

/// Writes `<dir>/binance/ETH_USDT_candles.csv`.
fn write_csv_data(dir: &Path) {
    let binance = dir.join("binance");
    fs::create_dir_all(&binance).unwrap();
    let candles = format!(
        "timestamp,open,high,low,close,volume,trade_count\n\
         {},1.0,1.0,1.0,1.0,10,1\n\
         {},4.0,5.0,4.0,5.0,10,1\n\
         {},0.5,0.6,0.5,0.6,10,1\n",
        START,
        START + 60,
        START + 120
    );
    fs::write(binance.join("ETH_USDT_candles.csv"), candles).unwrap();
}

fn write_signal(dir: &Path, signal: &Signal) -> std::path::PathBuf {
    let path = dir.join("signal.json");
    fs::write(&path, serde_json::to_string(signal).unwrap()).unwrap();
    path
}

mod check_options {
    use super::*;

    #[test]
    fn reads_retry_and_max_enter_sections() {
        let config = FileConfigAdapter::from_string(CHECK_INI).unwrap();
        let options = cli::build_check_options(&config).unwrap();

        assert_eq!(options.retry.max_retries, 2);
        assert_eq!(options.retry.base_delay, Duration::ZERO);
        assert_eq!(options.retry.backoff, Backoff::Exponential);
        assert_eq!(options.max_enter.minute_count, 10);
        assert_eq!(options.max_enter.max_trade_count, 500);
        assert_eq!(options.max_enter.percentile, 0.5);
    }

    #[test]
    fn empty_config_yields_defaults() {
        let config = FileConfigAdapter::from_string("").unwrap();
        assert_eq!(cli::build_check_options(&config).unwrap(), CheckOptions::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = FileConfigAdapter::from_string("[retry]\nmax_retries = 99\n").unwrap();
        let err = cli::build_check_options(&config).unwrap_err();
        assert!(matches!(err, SignalCheckError::ConfigInvalid { key, .. } if key == "max_retries"));
    }
}

mod registry {
    use super::*;

    #[test]
    fn csv_source_registers_configured_exchanges() {
        let dir = tempfile::tempdir().unwrap();
        write_csv_data(dir.path());
        let ini = format!("{CHECK_INI}csv_dir = {}\n", dir.path().display());
        let config = FileConfigAdapter::from_string(&ini).unwrap();

        let registry = cli::build_registry(&config, None).unwrap();
        assert_eq!(registry.names(), vec!["binance"]);
    }

    #[test]
    fn data_override_forces_csv_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_csv_data(dir.path());
        let config = FileConfigAdapter::from_string("[data]\nsource = sqlite\n").unwrap();

        let registry = cli::build_registry(&config, Some(dir.path())).unwrap();
        assert!(registry.get("binance").is_some());
    }

    #[test]
    fn missing_exchange_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfigAdapter::from_string("[data]\nexchanges = kraken\n").unwrap();
        assert!(cli::build_registry(&config, Some(dir.path())).is_err());
    }
}

mod check_command {
    use super::*;

    #[test]
    fn writes_output_and_event_log() {
        let dir = tempfile::tempdir().unwrap();
        write_csv_data(dir.path());
        let signal = Signal {
            stop_loss: Some(0.5),
            ..long_signal()
        };
        let signal_path = write_signal(dir.path(), &signal);
        let config = write_temp_ini(CHECK_INI);
        let output_path = dir.path().join("out/result.json");
        let events_path = dir.path().join("out/events.csv");

        let code = cli::run(Cli::parse_from([
            "signalcheck",
            "check",
            "--signal",
            signal_path.to_str().unwrap(),
            "--config",
            config.path().to_str().unwrap(),
            "--data",
            dir.path().to_str().unwrap(),
            "--output",
            output_path.to_str().unwrap(),
            "--events",
            events_path.to_str().unwrap(),
        ]));
        assert!(same_code(code, ExitCode::SUCCESS));

        let output: SignalCheckOutput =
            serde_json::from_str(&fs::read_to_string(&output_path).unwrap()).unwrap();
        assert!(output.entered);
        assert!(output.reached_stop_loss);
        assert_eq!(output.events.len(), 3);
        assert!((output.profit_ratio - 1.75).abs() < 1e-9);

        let log = fs::read_to_string(&events_path).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines[0], "type,target,price,at,profit_ratio");
        assert_eq!(lines.len(), 4);
        assert!(lines[3].starts_with("stopped_loss,"));
    }

    #[test]
    fn upstream_failure_exits_non_zero_with_output() {
        let dir = tempfile::tempdir().unwrap();
        write_csv_data(dir.path());
        let signal = Signal {
            quote_asset: "BTC".into(),
            ..long_signal()
        };
        let signal_path = write_signal(dir.path(), &signal);
        let output_path = dir.path().join("result.json");

        let code = cli::run(Cli::parse_from([
            "signalcheck",
            "check",
            "--signal",
            signal_path.to_str().unwrap(),
            "--data",
            dir.path().to_str().unwrap(),
            "--output",
            output_path.to_str().unwrap(),
        ]));
        assert!(same_code(code, ExitCode::from(5)));

        let output: SignalCheckOutput =
            serde_json::from_str(&fs::read_to_string(&output_path).unwrap()).unwrap();
        assert!(output.is_error);
        assert_eq!(output.http_status, 500);
    }

    #[test]
    fn unreadable_signal_exits_with_io_code() {
        let dir = tempfile::tempdir().unwrap();
        let code = cli::run(Cli::parse_from([
            "signalcheck",
            "check",
            "--signal",
            dir.path().join("missing.json").to_str().unwrap(),
            "--data",
            dir.path().to_str().unwrap(),
        ]));
        assert!(same_code(code, ExitCode::from(1)));
    }

    #[test]
    fn invalid_config_exits_with_config_code() {
        let dir = tempfile::tempdir().unwrap();
        let signal_path = write_signal(dir.path(), &long_signal());
        let config = write_temp_ini("[max_enter]\npercentile = 2\n");

        let code = cli::run(Cli::parse_from([
            "signalcheck",
            "check",
            "--signal",
            signal_path.to_str().unwrap(),
            "--config",
            config.path().to_str().unwrap(),
        ]));
        assert!(same_code(code, ExitCode::from(2)));
    }
}

mod validate_command {
    use super::*;

    #[test]
    fn valid_signal_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let signal_path = write_signal(dir.path(), &long_signal());
        let code = cli::run(Cli::parse_from([
            "signalcheck",
            "validate",
            "--signal",
            signal_path.to_str().unwrap(),
        ]));
        assert!(same_code(code, ExitCode::SUCCESS));
    }

    #[test]
    fn inverted_entries_fail_with_signal_code() {
        let dir = tempfile::tempdir().unwrap();
        let signal = Signal {
            entries: vec![1.0, 2.0],
            ..long_signal()
        };
        let signal_path = write_signal(dir.path(), &signal);
        let code = cli::run(Cli::parse_from([
            "signalcheck",
            "validate",
            "--signal",
            signal_path.to_str().unwrap(),
        ]));
        assert!(same_code(code, ExitCode::from(4)));
    }
}
