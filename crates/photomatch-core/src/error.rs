use thiserror::Error;

/// Structural problems with the event log. Any of these aborts the load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Required column(s) not found in the log: {}", quote_all(.0))]
    MissingColumns(Vec<String>),

    #[error("Unknown cameras found: [{}]. Expected {}.", .unknown.join(", "), .expected.join(", "))]
    UnknownDevices {
        unknown: Vec<String>,
        expected: Vec<String>,
    },
}

/// Invalid user-supplied configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid threshold value '{0}'. Please enter a non-negative number (e.g., 30 for 30 seconds).")]
    InvalidTolerance(String),

    #[error("No photo directory given for group(s): {}", .0.join(", "))]
    MissingGroupDirs(Vec<String>),

    #[error("Unknown group '{group}'. Expected one of: {}", .expected.join(", "))]
    UnknownGroup { group: String, expected: Vec<String> },

    #[error("Device group table is empty")]
    EmptyGroupTable,

    #[error("Device '{device}' is mapped to both '{first}' and '{second}'")]
    ConflictingDevice {
        device: String,
        first: String,
        second: String,
    },
}

fn quote_all(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{}'", n))
        .collect::<Vec<_>>()
        .join(", ")
}
