use std::path::Path;

use anyhow::{anyhow, Context};
use calamine::{open_workbook_auto, Data, DataType, Reader};

use crate::date::CellValue;

/// Extensions read as a workbook rather than JSON.
pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// First worksheet of a workbook: header names plus typed cells per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| WORKBOOK_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Read the first sheet. The first row is the header; an empty sheet has no columns.
pub fn read_first_sheet(path: &Path) -> anyhow::Result<Sheet> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Cannot open workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("{} has no worksheets", path.display()))?
        .with_context(|| format!("Cannot read the first sheet of {}", path.display()))?;

    let mut rows = range.rows();
    let columns = rows
        .next()
        .map(|header| header.iter().map(|c| c.to_string().trim().to_string()).collect())
        .unwrap_or_default();
    let rows = rows.map(|row| row.iter().map(cell_value).collect()).collect();

    Ok(Sheet { columns, rows })
}

/// Typed spreadsheet cell -> `CellValue`. Date-formatted cells stay datetimes.
pub fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map_or_else(|| CellValue::Text(cell.to_string()), CellValue::DateTime),
        other => CellValue::Text(other.to_string()),
    }
}
