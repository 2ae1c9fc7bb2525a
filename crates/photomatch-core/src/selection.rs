use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::photo::TimeSource;
use crate::photo_scan::{GroupScan, PhotoScan};

/// The set of photos a curator has opted in for matching.
/// Everything starts excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    included: HashSet<PathBuf>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every scanned photo included.
    pub fn all(scan: &PhotoScan) -> Self {
        let mut selection = Self::new();
        for group in &scan.groups {
            selection.include_group(group);
        }
        selection
    }

    pub fn include(&mut self, path: impl Into<PathBuf>) {
        self.included.insert(path.into());
    }

    pub fn exclude(&mut self, path: &Path) {
        self.included.remove(path);
    }

    pub fn include_group(&mut self, group: &GroupScan) {
        for photo in &group.photos {
            self.included.insert(photo.path.clone());
        }
    }

    pub fn exclude_group(&mut self, group: &GroupScan) {
        for photo in &group.photos {
            self.included.remove(&photo.path);
        }
    }

    pub fn is_included(&self, path: &Path) -> bool {
        self.included.contains(path)
    }

    pub fn len(&self) -> usize {
        self.included.len()
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }

    /// Included paths that `scan` did not find, e.g. files moved since the manifest was written.
    pub fn missing_from<'a>(&'a self, scan: &PhotoScan) -> Vec<&'a Path> {
        let scanned: HashSet<&Path> = scan.photos().map(|p| p.path.as_path()).collect();
        let mut missing: Vec<&Path> = self
            .included
            .iter()
            .map(PathBuf::as_path)
            .filter(|p| !scanned.contains(p))
            .collect();
        missing.sort();
        missing
    }

    pub fn from_manifest(manifest: &Manifest) -> Self {
        let included = manifest
            .groups
            .iter()
            .flat_map(|g| g.photos.iter())
            .filter(|p| p.included)
            .map(|p| p.path.clone())
            .collect();
        Self { included }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub location: String,
    pub filename: String,
    pub capture_time: NaiveDateTime,
    pub source: TimeSource,
    pub included: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestGroup {
    pub group: String,
    pub root: PathBuf,
    pub photos: Vec<ManifestEntry>,
    #[serde(default)]
    pub skipped: Vec<PathBuf>,
}

/// Editable listing of every scanned photo and whether it is included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub groups: Vec<ManifestGroup>,
}

impl Manifest {
    pub fn from_scan(scan: &PhotoScan, selection: &Selection) -> Self {
        let groups = scan
            .groups
            .iter()
            .map(|g| ManifestGroup {
                group: g.group.clone(),
                root: g.root.clone(),
                photos: g
                    .photos
                    .iter()
                    .map(|p| ManifestEntry {
                        path: p.path.clone(),
                        location: p.location.clone(),
                        filename: p.filename.clone(),
                        capture_time: p.capture_time,
                        source: p.source,
                        included: selection.is_included(&p.path),
                    })
                    .collect(),
                skipped: g.skipped.clone(),
            })
            .collect();
        Self { groups }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Cannot open selection manifest {}", path.display()))?;
        let manifest = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Invalid selection manifest {}", path.display()))?;
        Ok(manifest)
    }

    /// Write via a temp file, then rename.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let temp_path = path.with_extension("tmp");
        let file = File::create(&temp_path)
            .with_context(|| format!("Cannot create {}", temp_path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer
            .flush()
            .with_context(|| format!("Cannot write {}", temp_path.display()))?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    pub fn included_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| g.photos.iter())
            .filter(|p| p.included)
            .count()
    }
}
