use std::fmt;
use std::str::FromStr;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::event_log::{EventLog, EventRecord};
use crate::groups::GroupTable;
use crate::index::CandidateIndices;
use crate::ThrottledProgress;

/// Largest accepted time difference in seconds. Finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Tolerance(f64);

impl Tolerance {
    /// Only identical timestamps match.
    pub const EXACT: Tolerance = Tolerance(0.0);

    pub fn new(seconds: f64) -> Result<Self, ConfigError> {
        if seconds.is_finite() && seconds >= 0.0 {
            Ok(Self(seconds))
        } else {
            Err(ConfigError::InvalidTolerance(seconds.to_string()))
        }
    }

    pub fn seconds(self) -> f64 {
        self.0
    }

    /// Inclusive: a difference equal to the tolerance is accepted.
    pub fn accepts(self, diff_seconds: f64) -> bool {
        diff_seconds <= self.0
    }
}

impl TryFrom<f64> for Tolerance {
    type Error = ConfigError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Tolerance> for f64 {
    fn from(value: Tolerance) -> Self {
        value.0
    }
}

impl FromStr for Tolerance {
    type Err = ConfigError;

    /// Blank input means exact matching.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::EXACT);
        }
        s.parse::<f64>()
            .map_err(|_| ConfigError::InvalidTolerance(s.to_string()))
            .and_then(Self::new)
            .map_err(|_| ConfigError::InvalidTolerance(s.to_string()))
    }
}

/// Always shows a decimal point: `0.0`, `30.0`, `2.5`.
impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 {
            write!(f, "{:.1}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// How one event row was resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched {
        location: String,
        filename: String,
        diff_seconds: f64,
    },
    /// The row's time could not be parsed
    NoParsedTime,
    /// Empty or unmapped device id
    UnknownGroup,
    /// The group has no included photos
    NoCandidates,
    /// Nearest photo was further away than the tolerance
    OutsideTolerance { diff_seconds: f64 },
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched { .. })
    }
}

/// Resolve a single row against the frozen indices.
pub fn resolve(
    event: &EventRecord,
    groups: &GroupTable,
    indices: &CandidateIndices,
    tolerance: Tolerance,
) -> MatchOutcome {
    let Some(time) = event.parsed_time else {
        return MatchOutcome::NoParsedTime;
    };
    let Some(group) = groups.group_of(&event.device_id) else {
        return MatchOutcome::UnknownGroup;
    };
    let Some(nearest) = indices.get(group).and_then(|index| index.nearest(time)) else {
        return MatchOutcome::NoCandidates;
    };

    if tolerance.accepts(nearest.diff_seconds) {
        MatchOutcome::Matched {
            location: nearest.candidate.location.clone(),
            filename: nearest.candidate.filename.clone(),
            diff_seconds: nearest.diff_seconds,
        }
    } else {
        MatchOutcome::OutsideTolerance {
            diff_seconds: nearest.diff_seconds,
        }
    }
}

/// An event row together with its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedEvent {
    pub event: EventRecord,
    pub outcome: MatchOutcome,
}

impl MatchedEvent {
    /// Empty unless matched.
    pub fn matched_location(&self) -> &str {
        match &self.outcome {
            MatchOutcome::Matched { location, .. } => location,
            _ => "",
        }
    }

    /// Empty unless matched.
    pub fn matched_filename(&self) -> &str {
        match &self.outcome {
            MatchOutcome::Matched { filename, .. } => filename,
            _ => "",
        }
    }
}

/// Outcome of a matching pass, in log row order.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub tolerance: Tolerance,
    pub columns: Vec<String>,
    pub events: Vec<MatchedEvent>,
}

impl MatchReport {
    pub fn matched(&self) -> impl Iterator<Item = &MatchedEvent> {
        self.events.iter().filter(|e| e.outcome.is_matched())
    }

    pub fn matched_count(&self) -> usize {
        self.matched().count()
    }

    pub fn unmatched_count(&self) -> usize {
        self.events.len() - self.matched_count()
    }
}

/// Match every row in log order.
///
/// Rows are independent: a photo accepted for one row stays available to
/// every other row.
pub fn match_events(
    log: &EventLog,
    groups: &GroupTable,
    indices: &CandidateIndices,
    tolerance: Tolerance,
    progress: &ThrottledProgress,
) -> MatchReport {
    let total = log.len() as u64;
    let mut events = Vec::with_capacity(log.len());

    for (i, event) in log.records().iter().enumerate() {
        let outcome = resolve(event, groups, indices, tolerance);
        events.push(MatchedEvent {
            event: event.clone(),
            outcome,
        });
        progress.report("match", i as u64, total, "Matching rows");
    }

    let report = MatchReport {
        tolerance,
        columns: log.columns().to_vec(),
        events,
    };
    info!(
        "Matched {} of {} rows (tolerance {}s)",
        report.matched_count(),
        report.events.len(),
        tolerance
    );
    report
}
