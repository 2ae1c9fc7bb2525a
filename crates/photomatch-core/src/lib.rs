pub mod date;
pub mod error;
pub mod event_log;
pub mod export;
pub mod groups;
pub mod index;
pub mod matcher;
pub mod photo;
pub mod photo_scan;
pub mod selection;
pub mod sheet;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use log::{info, warn};
use serde::{Deserialize, Serialize};

pub use error::{ConfigError, LoadError};
pub use event_log::{EventLog, EventRecord};
pub use groups::GroupTable;
pub use index::{CandidateIndex, CandidateIndices};
pub use matcher::{match_events, MatchOutcome, MatchReport, Tolerance};
pub use photo::{PhotoRecord, TimeSource};
pub use photo_scan::PhotoScan;
pub use selection::{Manifest, Selection};

/// Options for the `scan` stage: extract capture times and write a selection manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Group name -> photo root
    pub photo_dirs: BTreeMap<String, PathBuf>,
    /// Optional device -> group table overriding the built-in one
    #[serde(default)]
    pub groups: Option<PathBuf>,
    /// Where to write the selection manifest
    pub manifest: PathBuf,
}

/// Options for the `match` stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Event log (JSON array of row objects)
    pub log: PathBuf,
    pub photo_dirs: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub groups: Option<PathBuf>,
    /// Seconds; 0 means exact
    #[serde(default)]
    pub tolerance: f64,
    /// Curated manifest from the scan stage
    #[serde(default)]
    pub selection: Option<PathBuf>,
    #[serde(default)]
    pub include_all: bool,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub output_base: Option<String>,
    #[serde(default)]
    pub include_unmatched: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupCounts {
    pub group: String,
    pub found: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub groups: Vec<GroupCounts>,
    pub manifest: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSummary {
    pub rows: u64,
    pub parse_failures: u64,
    pub matched: u64,
    pub unmatched: u64,
    pub photos: Vec<GroupCounts>,
    pub selected: u64,
    /// `None` when there was nothing to export
    pub output: Option<PathBuf>,
    pub rows_exported: u64,
    pub tolerance: f64,
}

/// Type alias for progress callback
pub type ProgressCallback = dyn Fn(&str, u64, u64, &str) + Send + Sync;

/// Throttled progress reporter: emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback,
    last_emit: std::sync::Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback) -> Self {
        Self {
            inner,
            last_emit: std::sync::Mutex::new(Instant::now() - std::time::Duration::from_secs(1)),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current + 1 >= total;
        if !is_done {
            let mut last = self.last_emit.lock().unwrap_or_else(|e| e.into_inner());
            if last.elapsed().as_millis() < 200 {
                return;
            }
            *last = Instant::now();
        }
        (self.inner)(stage, current, total, message);
    }
}

fn load_group_table(path: Option<&PathBuf>) -> anyhow::Result<GroupTable> {
    match path {
        Some(p) => GroupTable::load(p),
        None => Ok(GroupTable::default()),
    }
}

/// Pair every group in the table with its photo root, in table order.
pub fn resolve_photo_dirs(
    table: &GroupTable,
    photo_dirs: &BTreeMap<String, PathBuf>,
) -> Result<Vec<(String, PathBuf)>, ConfigError> {
    if let Some(unknown) = photo_dirs.keys().find(|g| !table.contains_group(g)) {
        return Err(ConfigError::UnknownGroup {
            group: unknown.clone(),
            expected: table.groups().to_vec(),
        });
    }

    let missing: Vec<String> = table
        .groups()
        .iter()
        .filter(|g| !photo_dirs.contains_key(*g))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ConfigError::MissingGroupDirs(missing));
    }

    Ok(table
        .groups()
        .iter()
        .map(|g| (g.clone(), photo_dirs[g].clone()))
        .collect())
}

fn group_counts(scan: &PhotoScan) -> Vec<GroupCounts> {
    scan.groups
        .iter()
        .map(|g| GroupCounts {
            group: g.group.clone(),
            found: g.found() as u64,
            skipped: g.skipped_count() as u64,
        })
        .collect()
}

/// Scan every group's photos and write a manifest with nothing selected.
pub fn run_scan(options: &ScanOptions, progress_callback: &ProgressCallback) -> anyhow::Result<ScanSummary> {
    let tp = ThrottledProgress::new(progress_callback);
    let table = load_group_table(options.groups.as_ref())?;
    let dirs = resolve_photo_dirs(&table, &options.photo_dirs)?;

    let scan = photo_scan::scan_photo_dirs(&dirs, &tp)?;
    Manifest::from_scan(&scan, &Selection::new()).save(&options.manifest)?;
    info!("Selection manifest written to {}", options.manifest.display());

    Ok(ScanSummary {
        groups: group_counts(&scan),
        manifest: options.manifest.clone(),
    })
}

/// Run the full pipeline: load log, scan photos, apply the selection, match, export.
///
/// Structural problems (bad options, missing columns, unknown devices) fail
/// before any photo is read.
pub fn run_match(options: &MatchOptions, progress_callback: &ProgressCallback) -> anyhow::Result<MatchSummary> {
    let tp = ThrottledProgress::new(progress_callback);
    let table = load_group_table(options.groups.as_ref())?;
    let tolerance = Tolerance::new(options.tolerance)?;
    let dirs = resolve_photo_dirs(&table, &options.photo_dirs)?;

    // Stage 1: Load and validate the log
    let log = EventLog::load(&options.log, &table)?;

    // Stage 2: Extract capture times
    let scan = photo_scan::scan_photo_dirs(&dirs, &tp)?;

    // Stage 3: Curate
    let selection = if options.include_all {
        Selection::all(&scan)
    } else if let Some(path) = &options.selection {
        let selection = Selection::from_manifest(&Manifest::load(path)?);
        let missing = selection.missing_from(&scan);
        if !missing.is_empty() {
            warn!(
                "{} selected photo(s) in {} were not found by this scan, e.g. {}",
                missing.len(),
                path.display(),
                missing[0].display()
            );
        }
        selection
    } else {
        Selection::new()
    };
    if selection.is_empty() {
        warn!("No photos selected; every row will be unmatched");
    }

    // Stage 4: Index and match
    let indices = CandidateIndices::build(&scan, &selection);
    let report = match_events(&log, &table, &indices, tolerance, &tp);

    // Stage 5: Export
    let scope = if options.include_unmatched {
        export::ExportScope::AllRows
    } else {
        export::ExportScope::MatchedOnly
    };
    let exportable = match scope {
        export::ExportScope::AllRows => report.events.len(),
        export::ExportScope::MatchedOnly => report.matched_count(),
    };
    let (output, rows_exported) = if exportable == 0 {
        info!("No matches to export");
        (None, 0)
    } else {
        let path = options.output.clone().unwrap_or_else(|| {
            export::default_output_path(&options.log, options.output_base.as_deref(), tolerance)
        });
        let written = export::write_results(&report, scope, &path)?;
        info!("Exported {} rows to {}", written, path.display());
        (Some(path), written as u64)
    };

    Ok(MatchSummary {
        rows: log.len() as u64,
        parse_failures: log.parse_failures() as u64,
        matched: report.matched_count() as u64,
        unmatched: report.unmatched_count() as u64,
        photos: group_counts(&scan),
        selected: indices.total_candidates() as u64,
        output,
        rows_exported,
        tolerance: tolerance.seconds(),
    })
}
