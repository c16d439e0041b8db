//! Where the true record count comes from.
//!
//! Two interchangeable sources implement [`RecordCountSource`]: one trusts the
//! file's own header layout and size, the other trusts the step counter left
//! behind by the simulation. The operator picks one per invocation.

use std::{
    fs::{self, File},
    io::{Read, Seek, SeekFrom},
    num::NonZeroU64,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::error::RepairError;
use crate::header::{parse_header, Header, RecordLayout, HEADER_WINDOW};

pub trait RecordCountSource {
    /// Short label for logs, e.g. `file size`.
    fn label(&self) -> &'static str;

    /// The number of records physically present in `file`. The file is the
    /// same open handle the patcher writes through afterwards.
    fn numrecs_for(&self, file: &mut File) -> Result<u32, RepairError>;
}

// ─────────────────────────────────────────────────────────────────────
// Header window
// ─────────────────────────────────────────────────────────────────────

/// Leading bytes of a file plus its total length.
#[derive(Debug)]
pub struct HeaderWindow {
    pub bytes:     Vec<u8>,
    pub file_size: u64,
}

impl HeaderWindow {
    pub fn read(path: &Path) -> Result<Self, RepairError> {
        Self::from_file(&mut File::open(path)?)
    }

    /// Reads from the start of `file` whatever its current position.
    pub fn from_file(file: &mut File) -> Result<Self, RepairError> {
        let file_size = file.metadata()?.len();
        let mut bytes = Vec::with_capacity(HEADER_WINDOW.min(file_size as usize));
        file.seek(SeekFrom::Start(0))?;
        file.by_ref().take(HEADER_WINDOW as u64).read_to_end(&mut bytes)?;
        Ok(HeaderWindow { bytes, file_size })
    }

    pub fn header(&self) -> Result<Header, RepairError> {
        parse_header(&self.bytes)
    }
}

// ─────────────────────────────────────────────────────────────────────
// Size-derived
// ─────────────────────────────────────────────────────────────────────

/// Floor of `(file_size - data_begin) / record_size`; a partial trailing
/// record is not counted.
pub fn size_derived_count(file_size: u64, layout: &RecordLayout) -> Result<u32, RepairError> {
    let count = file_size.saturating_sub(layout.data_begin) / layout.record_size;
    u32::try_from(count).map_err(|_| RepairError::CountOverflow { count })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SizeDerived;

impl RecordCountSource for SizeDerived {
    fn label(&self) -> &'static str {
        "file size"
    }

    fn numrecs_for(&self, file: &mut File) -> Result<u32, RepairError> {
        let window = HeaderWindow::from_file(file)?;
        let layout = window.header()?.record_layout().ok_or(RepairError::NoRecordVariables)?;
        let count  = size_derived_count(window.file_size, &layout)?;
        debug!(
            file_size = window.file_size,
            record_size = layout.record_size,
            data_begin = layout.data_begin,
            count,
            "size-derived record count"
        );
        Ok(count)
    }
}

// ─────────────────────────────────────────────────────────────────────
// Counter-derived
// ─────────────────────────────────────────────────────────────────────

pub const DEFAULT_COUNTER_FILE: &str = "time.step";

pub fn counter_derived_count(step: u64, stride: NonZeroU64) -> Result<u32, RepairError> {
    let count = step / stride.get();
    u32::try_from(count).map_err(|_| RepairError::CountOverflow { count })
}

/// One count shared by every file of a run, taken from the step counter.
#[derive(Debug, Clone)]
pub struct CounterDerived {
    step:    u64,
    stride:  NonZeroU64,
    numrecs: u32,
}

impl CounterDerived {
    pub fn new(step: u64, stride: NonZeroU64) -> Result<Self, RepairError> {
        let numrecs = counter_derived_count(step, stride)?;
        Ok(CounterDerived { step, stride, numrecs })
    }

    /// Reads a single whitespace-trimmed non-negative integer from `path`.
    pub fn from_counter_file(path: &Path, stride: NonZeroU64) -> Result<Self, RepairError> {
        let missing = |detail: String| RepairError::MissingCounterSource {
            path: PathBuf::from(path),
            detail,
        };
        let text = fs::read_to_string(path).map_err(|e| missing(e.to_string()))?;
        let step = text
            .trim()
            .parse::<u64>()
            .map_err(|e| missing(format!("{:?} is not a step count ({e})", text.trim())))?;
        Self::new(step, stride)
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn stride(&self) -> NonZeroU64 {
        self.stride
    }

    pub fn numrecs(&self) -> u32 {
        self.numrecs
    }
}

impl RecordCountSource for CounterDerived {
    fn label(&self) -> &'static str {
        "step counter"
    }

    // Only the magic is checked, and the patcher does that.
    fn numrecs_for(&self, _file: &mut File) -> Result<u32, RepairError> {
        Ok(self.numrecs)
    }
}
