use std::collections::HashMap;

use chrono::NaiveDateTime;
use log::warn;

use crate::date::abs_diff_seconds;
use crate::photo::PhotoRecord;
use crate::photo_scan::PhotoScan;
use crate::selection::Selection;

/// What a match records about a photo. No reference back to the record.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub capture_time: NaiveDateTime,
    pub location: String,
    pub filename: String,
}

impl From<&PhotoRecord> for Candidate {
    fn from(photo: &PhotoRecord) -> Self {
        Self {
            capture_time: photo.capture_time,
            location: photo.location.clone(),
            filename: photo.filename.clone(),
        }
    }
}

/// Closest candidate to an event and its distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest<'a> {
    pub diff_seconds: f64,
    pub candidate: &'a Candidate,
}

/// Included photos of one group, ascending by capture time. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateIndex {
    candidates: Vec<Candidate>,
}

impl CandidateIndex {
    /// Keep only photos in `selection`, then sort by capture time.
    /// The sort is stable: equal times keep scan order.
    pub fn build<'a, I>(photos: I, selection: &Selection) -> Self
    where
        I: IntoIterator<Item = &'a PhotoRecord>,
    {
        Self::from_candidates(
            photos
                .into_iter()
                .filter(|p| selection.is_included(&p.path))
                .map(Candidate::from)
                .collect(),
        )
    }

    pub fn from_candidates(mut candidates: Vec<Candidate>) -> Self {
        candidates.sort_by_key(|c| c.capture_time);
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    /// Linear scan for the smallest absolute time difference.
    ///
    /// Only a strictly smaller difference replaces the current best, so on a
    /// tie the earlier photo wins. `None` when the index is empty.
    pub fn nearest(&self, time: NaiveDateTime) -> Option<Nearest<'_>> {
        let mut best: Option<Nearest<'_>> = None;
        for candidate in &self.candidates {
            let diff_seconds = abs_diff_seconds(candidate.capture_time, time);
            if best.map_or(true, |b| diff_seconds < b.diff_seconds) {
                best = Some(Nearest {
                    diff_seconds,
                    candidate,
                });
            }
        }
        best
    }
}

/// Frozen per-group indices for one matching pass.
#[derive(Debug, Clone, Default)]
pub struct CandidateIndices {
    by_group: HashMap<String, CandidateIndex>,
}

impl CandidateIndices {
    pub fn build(scan: &PhotoScan, selection: &Selection) -> Self {
        let mut by_group = HashMap::with_capacity(scan.groups.len());
        for group in &scan.groups {
            let index = CandidateIndex::build(&group.photos, selection);
            if index.is_empty() {
                warn!("{}: no photos selected, its rows cannot match", group.group);
            }
            by_group.insert(group.group.clone(), index);
        }
        Self { by_group }
    }

    pub fn insert(&mut self, group: impl Into<String>, index: CandidateIndex) {
        self.by_group.insert(group.into(), index);
    }

    pub fn get(&self, group: &str) -> Option<&CandidateIndex> {
        self.by_group.get(group)
    }

    pub fn total_candidates(&self) -> usize {
        self.by_group.values().map(CandidateIndex::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::TimeSource;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    fn candidate(time: NaiveDateTime, filename: &str) -> Candidate {
        Candidate {
            capture_time: time,
            location: String::new(),
            filename: filename.into(),
        }
    }

    #[test]
    fn test_nearest_picks_smallest_difference() {
        let index = CandidateIndex::from_candidates(vec![
            candidate(at(12, 0, 5), "late.jpg"),
            candidate(at(11, 59, 50), "early.jpg"),
        ]);
        let best = index.nearest(at(12, 0, 0)).unwrap();
        assert_eq!(best.candidate.filename, "late.jpg");
        assert_eq!(best.diff_seconds, 5.0);
    }

    #[test]
    fn test_tie_goes_to_earlier_photo() {
        let index = CandidateIndex::from_candidates(vec![
            candidate(at(12, 0, 10), "after.jpg"),
            candidate(at(11, 59, 50), "before.jpg"),
        ]);
        let best = index.nearest(at(12, 0, 0)).unwrap();
        assert_eq!(best.candidate.filename, "before.jpg");
        assert_eq!(best.diff_seconds, 10.0);
    }

    #[test]
    fn test_equal_times_keep_scan_order() {
        let index = CandidateIndex::from_candidates(vec![
            candidate(at(12, 0, 0), "first.jpg"),
            candidate(at(12, 0, 0), "second.jpg"),
        ]);
        assert_eq!(index.nearest(at(12, 0, 0)).unwrap().candidate.filename, "first.jpg");
    }

    #[test]
    fn test_empty_index_has_no_nearest() {
        assert!(CandidateIndex::default().nearest(at(12, 0, 0)).is_none());
    }

    #[test]
    fn test_build_respects_selection() {
        let photo = |name: &str, time| {
            PhotoRecord::new(
                PathBuf::from(name),
                "Green".into(),
                "day1".into(),
                name.into(),
                time,
                TimeSource::DateTime,
            )
        };
        let photos = vec![photo("b.jpg", at(13, 0, 0)), photo("a.jpg", at(9, 0, 0)), photo("c.jpg", at(10, 0, 0))];
        let mut selection = Selection::new();
        selection.include("b.jpg");
        selection.include("a.jpg");

        let index = CandidateIndex::build(&photos, &selection);
        let names: Vec<_> = index.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(names, ["a.jpg", "b.jpg"]);
        assert_eq!(index.iter().next().unwrap().location, "day1");
    }
}
