use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;

use crate::date::format_timestamp;
use crate::event_log::{Row, TIME_COLUMN};
use crate::matcher::{MatchReport, MatchedEvent, Tolerance};

pub const PARSE_ERROR_COLUMN: &str = "Parse_Error";
pub const SUBFOLDER_COLUMN: &str = "Subfolder";
pub const FILENAME_COLUMN: &str = "Filename";

/// Which rows end up in the results file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportScope {
    #[default]
    MatchedOnly,
    AllRows,
}

/// A row read back from a results file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedRow {
    pub row: Row,
    pub location: String,
    pub filename: String,
}

/// Original columns, `Time` normalized, plus parse error and match columns.
pub fn export_row(matched: &MatchedEvent) -> Row {
    let event = &matched.event;
    let mut row = event.row.clone();
    row.insert(
        TIME_COLUMN.to_string(),
        event
            .parsed_time
            .map_or(Value::Null, |t| Value::String(format_timestamp(&t))),
    );
    row.insert(
        PARSE_ERROR_COLUMN.to_string(),
        Value::String(event.parse_error.clone().unwrap_or_default()),
    );
    row.insert(
        SUBFOLDER_COLUMN.to_string(),
        Value::String(matched.matched_location().to_string()),
    );
    row.insert(
        FILENAME_COLUMN.to_string(),
        Value::String(matched.matched_filename().to_string()),
    );
    row
}

pub fn export_rows(report: &MatchReport, scope: ExportScope) -> Vec<Row> {
    report
        .events
        .iter()
        .filter(|e| scope == ExportScope::AllRows || e.outcome.is_matched())
        .map(export_row)
        .collect()
}

/// Write the results file. Returns the number of rows written.
pub fn write_results(report: &MatchReport, scope: ExportScope, path: &Path) -> anyhow::Result<usize> {
    let rows = export_rows(report, scope);
    let file = File::create(path)
        .with_context(|| format!("Cannot create results file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &rows)
        .map_err(anyhow::Error::from)
        .and_then(|()| writer.flush().map_err(anyhow::Error::from))
        .with_context(|| format!("Cannot write results file {}", path.display()))?;
    Ok(rows.len())
}

/// Read a results file written by [`write_results`].
pub fn read_results(path: &Path) -> anyhow::Result<Vec<ExportedRow>> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open results file {}", path.display()))?;
    let rows: Vec<Row> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid results file {}", path.display()))?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let text = |column: &str| {
                row.get(column)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            let location = text(SUBFOLDER_COLUMN);
            let filename = text(FILENAME_COLUMN);
            ExportedRow {
                row,
                location,
                filename,
            }
        })
        .collect())
}

/// `<log dir>/<base>_threshold_<tolerance>s<ext>`, where `base` and `ext`
/// come from `output_base` when given, else `<log stem>_matched` and `.json`.
/// A blank `output_base` falls back to the bare log stem.
pub fn default_output_path(log_path: &Path, output_base: Option<&str>, tolerance: Tolerance) -> PathBuf {
    let dir = log_path.parent().unwrap_or_else(|| Path::new(""));
    let log_stem = log_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());

    let (base, ext) = match output_base.map(str::trim) {
        None => (format!("{}_matched", log_stem), None),
        Some("") => (log_stem, None),
        Some(b) => {
            let p = Path::new(b);
            let stem = p
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| b.to_string());
            let ext = p.extension().map(|e| e.to_string_lossy().into_owned());
            (stem, ext)
        }
    };

    let ext = ext.unwrap_or_else(|| "json".to_string());
    dir.join(format!("{}_threshold_{}s.{}", base, tolerance, ext))
}
