use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// EXIF field a capture time was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeSource {
    DateTimeOriginal,
    DateTimeDigitized,
    DateTime,
}

impl TimeSource {
    pub fn field_name(self) -> &'static str {
        match self {
            TimeSource::DateTimeOriginal => "DateTimeOriginal",
            TimeSource::DateTimeDigitized => "DateTimeDigitized",
            TimeSource::DateTime => "DateTime",
        }
    }
}

impl fmt::Display for TimeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// A scanned image with a usable capture time. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    /// Full path on disk; the identity used by curation
    pub path: PathBuf,
    /// Group (device bucket) the image was scanned for
    pub group: String,
    /// Subfolder relative to the group root, `/`-separated, empty at top level
    pub location: String,
    /// Just the filename
    pub filename: String,
    pub capture_time: NaiveDateTime,
    /// Informational only
    pub source: TimeSource,
}

impl PhotoRecord {
    pub fn new(
        path: PathBuf,
        group: String,
        location: String,
        filename: String,
        capture_time: NaiveDateTime,
        source: TimeSource,
    ) -> Self {
        Self {
            path,
            group,
            location,
            filename,
            capture_time,
            source,
        }
    }
}
