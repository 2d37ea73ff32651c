//! Report output port trait.

use std::path::Path;

use crate::domain::error::SignalCheckError;
use crate::domain::output::SignalCheckOutput;

/// Port for writing a finished check to a destination.
pub trait ReportPort {
    fn write(&self, output: &SignalCheckOutput, path: &Path) -> Result<(), SignalCheckError>;
}
