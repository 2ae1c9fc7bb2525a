use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context};
use log::{info, warn};
use rayon::prelude::*;

use crate::date::exif::extract_capture_time;
use crate::photo::PhotoRecord;
use crate::ThrottledProgress;

/// Extraction result for one group root.
#[derive(Debug, Clone, Default)]
pub struct GroupScan {
    pub group: String,
    pub root: PathBuf,
    /// Images with a capture time, in scan order
    pub photos: Vec<PhotoRecord>,
    /// Images without a usable capture time
    pub skipped: Vec<PathBuf>,
}

impl GroupScan {
    pub fn found(&self) -> usize {
        self.photos.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Result of scanning all group roots, in group-table order.
#[derive(Debug, Clone, Default)]
pub struct PhotoScan {
    pub groups: Vec<GroupScan>,
}

impl PhotoScan {
    pub fn group(&self, name: &str) -> Option<&GroupScan> {
        self.groups.iter().find(|g| g.group == name)
    }

    pub fn photos(&self) -> impl Iterator<Item = &PhotoRecord> {
        self.groups.iter().flat_map(|g| g.photos.iter())
    }

    pub fn total_found(&self) -> usize {
        self.groups.iter().map(GroupScan::found).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.groups.iter().map(GroupScan::skipped_count).sum()
    }
}

/// JPEG by extension (case-insensitive).
pub fn is_jpeg(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .map_or(false, |mime| mime == mime_guess::mime::IMAGE_JPEG)
}

/// Every JPEG under `root`, recursively, in sorted path order.
pub fn list_images(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("Photo directory does not exist: {}", root.display());
    }
    let mut files = Vec::new();
    collect_images_recursive(root, &mut files);
    Ok(files)
}

fn collect_images_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read directory {}: {}", dir.display(), e);
            return;
        }
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            collect_images_recursive(&path, files);
        } else if is_jpeg(&path) {
            files.push(path);
        }
    }
}

/// Subfolder of `path` relative to `root`, `/`-separated; empty at top level.
pub fn relative_location(root: &Path, path: &Path) -> String {
    let Some(parent) = path.parent() else {
        return String::new();
    };
    let relative = pathdiff::diff_paths(parent, root)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();
    if relative == "." {
        String::new()
    } else {
        relative
    }
}

/// Walk each `(group, root)` pair and extract capture times in parallel.
///
/// Roots are canonicalized first, so photo paths are absolute and the same
/// however the directory was spelled. A missing root is an error; a file
/// without usable metadata is only counted as skipped.
pub fn scan_photo_dirs(
    dirs: &[(String, PathBuf)],
    progress: &ThrottledProgress,
) -> anyhow::Result<PhotoScan> {
    let mut roots: Vec<(String, PathBuf)> = Vec::with_capacity(dirs.len());
    let mut targets: Vec<(usize, PathBuf)> = Vec::new();
    for (group_idx, (group, root)) in dirs.iter().enumerate() {
        let root = fs::canonicalize(root)
            .with_context(|| format!("Photo directory does not exist: {}", root.display()))?;
        info!("Scanning {} photos in {}", group, root.display());
        for path in list_images(&root)? {
            targets.push((group_idx, path));
        }
        roots.push((group.clone(), root));
    }

    let total = targets.len() as u64;
    let counter = AtomicU64::new(0);
    let extracted: Vec<_> = targets
        .par_iter()
        .map(|(group_idx, path)| {
            let result = extract_capture_time(path);
            let current = counter.fetch_add(1, Ordering::Relaxed);
            progress.report("scan", current, total, "Reading EXIF");
            (*group_idx, result)
        })
        .collect();

    let mut groups: Vec<GroupScan> = roots
        .iter()
        .map(|(group, root)| GroupScan {
            group: group.clone(),
            root: root.clone(),
            ..GroupScan::default()
        })
        .collect();

    for ((group_idx, result), (_, path)) in extracted.into_iter().zip(targets) {
        let scan = &mut groups[group_idx];
        match result {
            Some(capture) => {
                let location = relative_location(&scan.root, &path);
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                scan.photos.push(PhotoRecord::new(
                    path,
                    scan.group.clone(),
                    location,
                    filename,
                    capture.time,
                    capture.source,
                ));
            }
            None => scan.skipped.push(path),
        }
    }

    for g in &groups {
        info!("{}: {} photos found, {} skipped", g.group, g.found(), g.skipped_count());
    }

    Ok(PhotoScan { groups })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_jpeg() {
        assert!(is_jpeg(Path::new("a/IMG_0001.JPG")));
        assert!(is_jpeg(Path::new("b.jpeg")));
        assert!(!is_jpeg(Path::new("c.png")));
        assert!(!is_jpeg(Path::new("notes.txt")));
    }

    #[test]
    fn test_relative_location() {
        let root = Path::new("/photos/green");
        assert_eq!(relative_location(root, Path::new("/photos/green/a.jpg")), "");
        assert_eq!(
            relative_location(root, Path::new("/photos/green/day1/am/a.jpg")),
            "day1/am"
        );
    }

    #[test]
    fn test_list_images_sorted_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        for p in [
            dir.path().join("b.jpg"),
            dir.path().join("a.JPEG"),
            dir.path().join("skip.png"),
            sub.join("c.jpg"),
        ] {
            fs::write(p, b"x").unwrap();
        }

        let files = list_images(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, ["a.JPEG", "b.jpg", "sub/c.jpg"]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        assert!(list_images(Path::new("/definitely/not/here")).is_err());
    }

    #[test]
    fn test_unreadable_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.jpg"), b"not a jpeg").unwrap();

        let noop = |_: &str, _: u64, _: u64, _: &str| {};
        let progress = ThrottledProgress::new(&noop);
        let scan = scan_photo_dirs(&[("Green".into(), dir.path().to_path_buf())], &progress).unwrap();

        let green = scan.group("Green").unwrap();
        assert_eq!(green.found(), 0);
        assert_eq!(green.skipped_count(), 1);
    }
}
