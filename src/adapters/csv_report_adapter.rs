//! Event log CSV adapter implementing ReportPort.

use std::fs;
use std::path::Path;

use crate::domain::error::SignalCheckError;
use crate::domain::event::EventKind;
use crate::domain::output::SignalCheckOutput;
use crate::ports::report_port::ReportPort;

pub struct CsvEventLogAdapter;

fn kind_label(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Entered => "entered",
        EventKind::TookProfit => "took_profit",
        EventKind::StoppedLoss => "stopped_loss",
        EventKind::Invalidated => "invalidated",
        EventKind::FinishedDataset => "finished_dataset",
    }
}

fn csv_error(e: csv::Error) -> SignalCheckError {
    SignalCheckError::Io(std::io::Error::other(e.to_string()))
}

impl ReportPort for CsvEventLogAdapter {
    fn write(&self, output: &SignalCheckOutput, path: &Path) -> Result<(), SignalCheckError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
        writer
            .write_record(["type", "target", "price", "at", "profit_ratio"])
            .map_err(csv_error)?;
        for event in &output.events {
            writer
                .write_record([
                    kind_label(event.kind).to_string(),
                    event.target.map(|t| t.to_string()).unwrap_or_default(),
                    event.price.map(|p| p.to_string()).unwrap_or_default(),
                    event.at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    event.profit_ratio.to_string(),
                ])
                .map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(())
    }
}
