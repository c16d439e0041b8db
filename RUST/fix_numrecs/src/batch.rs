//! Directory scan and per-file repair loop.

use std::{
    fmt,
    io::{self, Write},
    num::NonZeroU64,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use glob::{glob_with, MatchOptions, Pattern};
use tracing::warn;

use crate::error::RepairError;
use crate::patch::{PatchOutcome, Patcher};
use crate::repair::{CounterDerived, RecordCountSource};

/// Per-processor output files: `<anything>_NNNN.nc`.
pub const CANDIDATE_PATTERN: &str = "*_[0-9][0-9][0-9][0-9].nc";
pub const DEFAULT_OUTPUT_DIR: &str = "../output";

/// 1. Find all candidate files directly in `dir`, sorted lexically; dot files are ignored
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/{}", Pattern::escape(&dir.to_string_lossy()), CANDIDATE_PATTERN);
    let options = MatchOptions { require_literal_leading_dot: true, ..MatchOptions::new() };
    let mut v: Vec<_> = glob_with(&pattern, options)?
        .filter_map(|e| e.ok())
        .filter(|p| p.is_file())
        .collect();
    v.sort();
    Ok(v)
}

/// 2. Same as `discover`, but a run with nothing to repair is a failed run
pub fn candidates(dir: &Path) -> Result<Vec<PathBuf>> {
    let files = discover(dir)?;
    if files.is_empty() {
        bail!("No processor files ({CANDIDATE_PATTERN}) found in {}", dir.display());
    }
    Ok(files)
}

/// 3. The shared count of a counter run. Checked before any file is listed:
/// a missing, garbled or oversized counter fails the whole run.
pub fn counter_source(dir: &Path, counter_file: &str, stride: NonZeroU64) -> Result<CounterDerived> {
    CounterDerived::from_counter_file(&dir.join(counter_file), stride)
        .with_context(|| format!("cannot determine record count in {}", dir.display()))
}

// ─────────────────────────────────────────────────────────────────────
// Per-file status
// ─────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Skip(String),
    AlreadyCorrect(u32),
    Patched { old: u32, new: u32 },
    WouldPatch { old: u32, new: u32 },
    Error(String),
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path:   PathBuf,
    pub status: FileStatus,
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned());
        match &self.status {
            FileStatus::Skip(why)            => write!(f, "  SKIP  {name}: {why}"),
            FileStatus::AlreadyCorrect(n)    => write!(f, "  OK    {name}: already {n} records"),
            FileStatus::Patched { old, new } => write!(f, "  PATCH {name}: {old} → {new}"),
            FileStatus::WouldPatch { old, new } => {
                write!(f, "  PATCH {name}: {old} → {new} (dry run)")
            }
            FileStatus::Error(msg)           => write!(f, "  ERROR {name}: {msg}"),
        }
    }
}

/// 4. Derive the count for one file and patch it; never fails outright
pub fn repair_file(path: &Path, source: &dyn RecordCountSource, patcher: &Patcher) -> FileStatus {
    match repair_once(path, source, patcher) {
        Ok(PatchOutcome::NotNetCdf3)              => FileStatus::Skip("not a NetCDF-3 file".into()),
        Ok(PatchOutcome::AlreadyCorrect(n))       => FileStatus::AlreadyCorrect(n),
        Ok(PatchOutcome::Patched { old, new })    => FileStatus::Patched { old, new },
        Ok(PatchOutcome::WouldPatch { old, new }) => FileStatus::WouldPatch { old, new },
        Err(e) if e.is_skip() => FileStatus::Skip(e.to_string()),
        Err(e) => FileStatus::Error(e.to_string()),
    }
}

// One open handle from header read to patch write.
fn repair_once(
    path:    &Path,
    source:  &dyn RecordCountSource,
    patcher: &Patcher,
) -> Result<PatchOutcome, RepairError> {
    let mut file = patcher.open(path)?;
    let target   = source.numrecs_for(&mut file)?;
    patcher.apply_to(&mut file, target)
}

// ─────────────────────────────────────────────────────────────────────
// Batch
// ─────────────────────────────────────────────────────────────────────
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub skipped:         usize,
    pub already_correct: usize,
    pub patched:         usize,
    pub failed:          usize,
}

#[derive(Debug)]
pub struct BatchReport {
    pub files:    Vec<FileReport>,
    pub started:  DateTime<Local>,
    pub finished: DateTime<Local>,
}

impl BatchReport {
    pub fn summary(&self) -> Summary {
        let mut s = Summary::default();
        for r in &self.files {
            match r.status {
                FileStatus::Skip(_)                                      => s.skipped += 1,
                FileStatus::AlreadyCorrect(_)                            => s.already_correct += 1,
                FileStatus::Patched { .. } | FileStatus::WouldPatch { .. } => s.patched += 1,
                FileStatus::Error(_)                                     => s.failed += 1,
            }
        }
        s
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s       = self.summary();
        let elapsed = self.finished.signed_duration_since(self.started).num_milliseconds();
        write!(
            f,
            "[{}] Finished {} files: {} patched, {} already correct, {} skipped, {} failed ({} ms)",
            self.finished.format("%Y-%m-%d %H:%M:%S"),
            self.files.len(),
            s.patched,
            s.already_correct,
            s.skipped,
            s.failed,
            elapsed,
        )
    }
}

/// 5. Repair every file in order, writing one status line per file to `out`
pub fn run_batch<W: Write>(
    files:   &[PathBuf],
    source:  &dyn RecordCountSource,
    patcher: &Patcher,
    out:     &mut W,
) -> io::Result<BatchReport> {
    let started = Local::now();
    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        let status = repair_file(path, source, patcher);
        if let FileStatus::Error(msg) = &status {
            warn!(path = %path.display(), source = source.label(), "repair failed: {msg}");
        }
        let report = FileReport { path: path.clone(), status };
        writeln!(out, "{report}")?;
        reports.push(report);
    }
    Ok(BatchReport { files: reports, started, finished: Local::now() })
}
