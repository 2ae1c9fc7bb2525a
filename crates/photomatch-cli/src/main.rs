use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use photomatch_core::{MatchOptions, ScanOptions, Tolerance};

#[derive(Parser)]
#[command(name = "photomatch", version, about = "Match event log rows to the photo taken closest in time")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read capture times and write a selection manifest to curate
    Scan {
        #[command(flatten)]
        photos: PhotoArgs,

        /// Where to write the selection manifest
        #[arg(short, long)]
        manifest: PathBuf,
    },
    /// Match log rows to photos and export the results
    Match {
        /// Event log with Time and Camera columns: a workbook (.xlsx, .xls, .ods; first sheet) or a JSON array of row objects
        #[arg(short, long)]
        log: PathBuf,

        #[command(flatten)]
        photos: PhotoArgs,

        /// Largest accepted difference in seconds (0 = exact)
        #[arg(short, long, default_value = "0", value_parser = parse_tolerance)]
        tolerance: Tolerance,

        /// Selection manifest written by `scan` and edited by hand
        #[arg(short, long, conflicts_with = "include_all")]
        selection: Option<PathBuf>,

        /// Use every photo with a capture time, ignoring any manifest
        #[arg(long)]
        include_all: bool,

        /// Results file (default: <log dir>/<log stem>_matched_threshold_<tolerance>s.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Base name (and optional extension) for the default results file
        #[arg(long, conflicts_with = "output")]
        output_base: Option<String>,

        /// Also export rows that found no photo
        #[arg(long)]
        include_unmatched: bool,
    },
}

#[derive(Args)]
struct PhotoArgs {
    /// Photo root for a group, as NAME=DIR (repeat for each group)
    #[arg(short, long = "group", value_name = "NAME=DIR", required = true, value_parser = parse_group)]
    groups: Vec<(String, PathBuf)>,

    /// JSON object mapping device ids to group names (default: PDP1=Green, PDP2=White, PDP3=Third)
    #[arg(long = "groups")]
    group_table: Option<PathBuf>,
}

impl PhotoArgs {
    fn photo_dirs(&self) -> BTreeMap<String, PathBuf> {
        self.groups.iter().cloned().collect()
    }
}

fn parse_group(s: &str) -> Result<(String, PathBuf), String> {
    let (name, dir) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=DIR, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() || dir.trim().is_empty() {
        return Err(format!("expected NAME=DIR, got '{}'", s));
    }
    Ok((name.to_string(), PathBuf::from(dir.trim())))
}

fn parse_tolerance(s: &str) -> Result<Tolerance, photomatch_core::ConfigError> {
    s.parse()
}

/// One bar per stage; a new stage name replaces the previous bar.
struct StageBars {
    style: ProgressStyle,
    current: Mutex<Option<(String, ProgressBar)>>,
}

impl StageBars {
    fn new() -> anyhow::Result<Self> {
        Ok(Self {
            style: ProgressStyle::default_bar().template("[{prefix}] [{bar:40}] {pos}/{len} {msg}")?,
            current: Mutex::new(None),
        })
    }

    fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let mut slot = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().map_or(true, |(name, _)| name != stage) {
            if let Some((_, old)) = slot.take() {
                old.finish_and_clear();
            }
            let pb = ProgressBar::new(total);
            pb.set_style(self.style.clone());
            pb.set_prefix(stage.to_string());
            *slot = Some((stage.to_string(), pb));
        }
        if let Some((_, pb)) = slot.as_ref() {
            pb.set_length(total);
            pb.set_position(current + 1);
            pb.set_message(message.to_string());
            if current + 1 >= total {
                pb.finish_and_clear();
            }
        }
    }

    fn clear(&self) {
        if let Some((_, pb)) = self.current.lock().unwrap_or_else(|e| e.into_inner()).take() {
            pb.finish_and_clear();
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let t_total = std::time::Instant::now();
    let bars = std::sync::Arc::new(StageBars::new()?);
    let progress_bars = std::sync::Arc::clone(&bars);
    let progress = move |stage: &str, current: u64, total: u64, message: &str| {
        progress_bars.report(stage, current, total, message);
    };

    match cli.command {
        Command::Scan { photos, manifest } => {
            let options = ScanOptions {
                photo_dirs: photos.photo_dirs(),
                groups: photos.group_table,
                manifest,
            };
            let result = photomatch_core::run_scan(&options, &progress);
            bars.clear();
            let summary = result?;

            for g in &summary.groups {
                eprintln!("  {}: {} photos, {} skipped", g.group, g.found, g.skipped);
            }
            eprintln!(
                "Done! Manifest written to {} ({:.2}s). Mark photos as included, then run `match --selection`.",
                summary.manifest.display(),
                t_total.elapsed().as_secs_f64()
            );
        }
        Command::Match {
            log,
            photos,
            tolerance,
            selection,
            include_all,
            output,
            output_base,
            include_unmatched,
        } => {
            let options = MatchOptions {
                log,
                photo_dirs: photos.photo_dirs(),
                groups: photos.group_table,
                tolerance: tolerance.seconds(),
                selection,
                include_all,
                output,
                output_base,
                include_unmatched,
            };
            let result = photomatch_core::run_match(&options, &progress);
            bars.clear();
            let summary = result?;

            for g in &summary.photos {
                eprintln!("  {}: {} photos, {} skipped", g.group, g.found, g.skipped);
            }
            eprintln!(
                "Done! {} rows ({} unparsable times), {} selected photos, {} matched, {} unmatched at {}s ({:.2}s)",
                summary.rows,
                summary.parse_failures,
                summary.selected,
                summary.matched,
                summary.unmatched,
                tolerance,
                t_total.elapsed().as_secs_f64()
            );
            match summary.output {
                Some(path) => eprintln!("{} rows written to {}", summary.rows_exported, path.display()),
                None => eprintln!("No matches to export"),
            }
        }
    }

    Ok(())
}
