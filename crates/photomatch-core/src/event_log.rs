use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDateTime;
use log::{debug, info};
use serde_json::{Map, Value};

use crate::date::{parse_cell, CellValue};
use crate::error::LoadError;
use crate::groups::GroupTable;
use crate::sheet::{self, Sheet};

pub const TIME_COLUMN: &str = "Time";
pub const CAMERA_COLUMN: &str = "Camera";

/// One log row: column name -> original cell value, in column order.
pub type Row = Map<String, Value>;

/// One row of the event log with its normalized time.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Zero-based position in the log
    pub index: usize,
    /// All original columns, untouched
    pub row: Row,
    pub raw_time: CellValue,
    /// Trimmed; may be empty
    pub device_id: String,
    pub parsed_time: Option<NaiveDateTime>,
    pub parse_error: Option<String>,
}

impl EventRecord {
    fn new(index: usize, row: Row, raw_time: CellValue) -> Self {
        let device_id = device_string(row.get(CAMERA_COLUMN));
        let (parsed_time, parse_error) = match parse_cell(&raw_time) {
            Ok(t) => (Some(t), None),
            Err(e) => {
                debug!("Row {}: {}", index, e);
                (None, Some(e.message().to_string()))
            }
        };

        Self {
            index,
            row,
            raw_time,
            device_id,
            parsed_time,
            parse_error,
        }
    }
}

fn device_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

/// A fully loaded and validated event log.
#[derive(Debug, Clone)]
pub struct EventLog {
    columns: Vec<String>,
    records: Vec<EventRecord>,
}

impl EventLog {
    /// Rows from a JSON array. Columns are the union of keys in first-seen order.
    ///
    /// An empty array is an empty log: with no rows there is nothing to check
    /// columns against.
    pub fn from_rows(rows: Vec<Row>, groups: &GroupTable) -> Result<Self, LoadError> {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        if rows.is_empty() {
            return Ok(Self {
                columns,
                records: Vec::new(),
            });
        }

        let cells = rows
            .into_iter()
            .map(|row| {
                let time = CellValue::from(row.get(TIME_COLUMN));
                (row, time)
            })
            .collect();
        Self::from_cells(columns, cells, groups)
    }

    /// Rows from a worksheet. The `Time` cell keeps its spreadsheet type, so
    /// date-formatted cells reach the parser as datetimes.
    pub fn from_sheet(sheet: Sheet, groups: &GroupTable) -> Result<Self, LoadError> {
        let time_idx = sheet.columns.iter().position(|c| c == TIME_COLUMN);
        let cells = sheet
            .rows
            .into_iter()
            .map(|cells| {
                let time = time_idx
                    .and_then(|i| cells.get(i).cloned())
                    .unwrap_or(CellValue::Empty);
                let row: Row = sheet
                    .columns
                    .iter()
                    .zip(&cells)
                    .filter(|(name, _)| !name.is_empty())
                    .map(|(name, cell)| (name.clone(), Value::from(cell)))
                    .collect();
                (row, time)
            })
            .collect();
        let columns = sheet.columns.into_iter().filter(|c| !c.is_empty()).collect();
        Self::from_cells(columns, cells, groups)
    }

    /// Parse every row's time and validate device ids against `groups`.
    ///
    /// Missing `Time`/`Camera` columns or an unknown device abort the whole
    /// load; an unparsable time only marks its row.
    fn from_cells(
        columns: Vec<String>,
        rows: Vec<(Row, CellValue)>,
        groups: &GroupTable,
    ) -> Result<Self, LoadError> {
        let missing: Vec<String> = [TIME_COLUMN, CAMERA_COLUMN]
            .into_iter()
            .filter(|c| !columns.iter().any(|k| k == c))
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Err(LoadError::MissingColumns(missing));
        }

        let records: Vec<EventRecord> = rows
            .into_iter()
            .enumerate()
            .map(|(i, (row, time))| EventRecord::new(i, row, time))
            .collect();

        groups.validate(records.iter().map(|r| r.device_id.as_str()))?;

        Ok(Self { columns, records })
    }

    /// Load a workbook's first sheet (by extension, see [`sheet::is_workbook`])
    /// or a JSON array of row objects.
    pub fn load(path: &Path, groups: &GroupTable) -> anyhow::Result<Self> {
        let log = if sheet::is_workbook(path) {
            Self::from_sheet(sheet::read_first_sheet(path)?, groups)?
        } else {
            let file =
                File::open(path).with_context(|| format!("Cannot open log {}", path.display()))?;
            let rows: Vec<Row> = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("{} is not a JSON array of row objects", path.display()))?;
            Self::from_rows(rows, groups)?
        };

        info!(
            "Loaded {} rows from {} ({} with unparsable times)",
            log.len(),
            path.display(),
            log.parse_failures()
        );
        Ok(log)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn parse_failures(&self) -> usize {
        self.records.iter().filter(|r| r.parsed_time.is_none()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn rows(value: Value) -> Vec<Row> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_load_parses_each_row() {
        let log = EventLog::from_rows(
            rows(json!([
                {"Time": "03/04/2024 10:15:30", "Camera": " PDP1 ", "Lat": -33.8},
                {"Time": 45292.5, "Camera": "PDP2"},
                {"Time": "garbage", "Camera": "PDP3"},
                {"Camera": "PDP3"},
            ])),
            &GroupTable::default(),
        )
        .unwrap();

        assert_eq!(log.columns(), ["Time", "Camera", "Lat"]);
        assert_eq!(log.len(), 4);
        let r = log.records();
        assert_eq!(r[0].device_id, "PDP1");
        assert_eq!(
            r[0].parsed_time,
            NaiveDate::from_ymd_opt(2024, 4, 3).unwrap().and_hms_opt(10, 15, 30)
        );
        assert_eq!(
            r[1].parsed_time,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(12, 0, 0)
        );
        assert_eq!(
            r[2].parse_error.as_deref(),
            Some("Failed all parses (raw: 'garbage') | Type: text")
        );
        assert_eq!(r[3].parse_error.as_deref(), Some("Empty/NaN value"));
        assert_eq!(log.parse_failures(), 2);
    }

    #[test]
    fn test_missing_columns_abort() {
        let err = EventLog::from_rows(
            rows(json!([{"Time": "03/04/2024", "Device": "PDP1"}])),
            &GroupTable::default(),
        )
        .unwrap_err();
        assert_eq!(err, LoadError::MissingColumns(vec!["Camera".into()]));

        let err = EventLog::from_sheet(Sheet::default(), &GroupTable::default()).unwrap_err();
        assert_eq!(
            err,
            LoadError::MissingColumns(vec!["Time".into(), "Camera".into()])
        );
    }

    #[test]
    fn test_empty_log_has_no_rows() {
        let log = EventLog::from_rows(Vec::new(), &GroupTable::default()).unwrap();
        assert!(log.is_empty());
        assert_eq!(log.parse_failures(), 0);

        let header_only = Sheet {
            columns: vec!["Time".into(), "Camera".into()],
            rows: Vec::new(),
        };
        let log = EventLog::from_sheet(header_only, &GroupTable::default()).unwrap();
        assert!(log.is_empty());
        assert_eq!(log.columns(), ["Time", "Camera"]);
    }

    #[test]
    fn test_sheet_keeps_typed_time_cells() {
        let t = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let sheet = Sheet {
            columns: vec!["Time".into(), "Camera".into(), "".into(), "Lat".into()],
            rows: vec![
                vec![
                    CellValue::DateTime(t),
                    CellValue::Text("PDP1".into()),
                    CellValue::Text("stray".into()),
                    CellValue::Number(-33.8),
                ],
                vec![CellValue::Number(45292.5), CellValue::Text("PDP2".into())],
            ],
        };
        let log = EventLog::from_sheet(sheet, &GroupTable::default()).unwrap();

        assert_eq!(log.columns(), ["Time", "Camera", "Lat"]);
        let r = log.records();
        assert_eq!(r[0].raw_time, CellValue::DateTime(t));
        assert_eq!(r[0].parsed_time, Some(t));
        assert_eq!(r[0].row["Time"], json!("2024-01-01 12:00:00"));
        assert_eq!(r[0].row["Lat"], json!(-33.8));
        assert_eq!(r[1].parsed_time, Some(t));
        assert!(!r[1].row.contains_key("Lat"));
    }

    #[test]
    fn test_unknown_device_aborts() {
        let err = EventLog::from_rows(
            rows(json!([
                {"Time": "03/04/2024", "Camera": "PDP1"},
                {"Time": "03/04/2024", "Camera": "PDP9"},
            ])),
            &GroupTable::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("PDP9"));
    }

    #[test]
    fn test_numeric_device_ids() {
        let groups = GroupTable::new([("7", "Solo")]).unwrap();
        let log = EventLog::from_rows(
            rows(json!([{"Time": "03/04/2024", "Camera": 7}, {"Time": "03/04/2024", "Camera": null}])),
            &groups,
        )
        .unwrap();
        assert_eq!(log.records()[0].device_id, "7");
        assert_eq!(log.records()[1].device_id, "");
    }
}
