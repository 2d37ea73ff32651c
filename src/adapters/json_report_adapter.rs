//! JSON report adapter implementing ReportPort.

use std::fs;
use std::path::Path;

use crate::domain::error::SignalCheckError;
use crate::domain::output::SignalCheckOutput;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter {
    pretty: bool,
}

impl JsonReportAdapter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn render(&self, output: &SignalCheckOutput) -> Result<String, SignalCheckError> {
        let json = if self.pretty {
            serde_json::to_string_pretty(output)?
        } else {
            serde_json::to_string(output)?
        };
        Ok(json)
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, output: &SignalCheckOutput, path: &Path) -> Result<(), SignalCheckError> {
        let json = self.render(output)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        Ok(())
    }
}
