use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use ::time::{format_description::well_known, OffsetDateTime};

use crate::types::{PortResult, ProtocolSelection, ScanRequest};

/// Default file the CLI appends results to.
pub const DEFAULT_RESULTS_FILE: &str = "port_scan_results.txt";

/// Summary of a finished scan, suitable for JSON output.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub host: String,
    pub start_port: u16,
    pub end_port: u16,
    pub protocol: ProtocolSelection,
    pub elapsed_ms: u64,
    pub finished_at: String,
    pub open_count: usize,
    pub results: Vec<PortResult>,
}

impl ScanReport {
    pub fn new(request: &ScanRequest, elapsed_ms: u64, results: Vec<PortResult>) -> Self {
        Self {
            host: request.host.clone(),
            start_port: request.start_port,
            end_port: request.end_port,
            protocol: request.protocol,
            elapsed_ms,
            finished_at: now_rfc3339(),
            open_count: results.len(),
            results,
        }
    }
}

/// One line per result: `Port <N> open - <service>`.
pub fn format_result_line(result: &PortResult) -> String {
    format!("Port {} open - {}", result.port, result.service)
}

/// Append results to `path`, creating it if needed.
pub fn append_results(path: impl AsRef<Path>, results: &[PortResult]) -> Result<()> {
    let path = path.as_ref();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open results file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for result in results {
        writeln!(writer, "{}", format_result_line(result))
            .with_context(|| format!("failed to write results file: {}", path.display()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `report` as pretty JSON, replacing any existing file.
pub fn write_json(path: impl AsRef<Path>, report: &ScanReport) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("failed to create JSON report: {}", path.display()))?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
