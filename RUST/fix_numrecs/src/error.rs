//! Error taxonomy for header decoding and record-count repair.
//!
//! Not every variant is a failure from the operator's point of view: a file
//! that is not NetCDF-3 or has no record variables is simply skipped. The
//! batch driver asks [`RepairError::is_skip`] to tell the two apart.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    /// Magic bytes are neither `CDF\x01` nor `CDF\x02`.
    #[error("not a NetCDF-3 file (magic \"{magic}\")")]
    NotNetCdf3 { magic: String },

    /// A list tag did not match, a field held an impossible value, or a read
    /// ran past the captured header window.
    #[error("structural parse error at byte {offset}: {detail}")]
    Structural { offset: usize, detail: String },

    /// The header parsed cleanly but nothing is stored along an unlimited
    /// dimension, so there is no record count to repair.
    #[error("no record variables")]
    NoRecordVariables,

    /// The companion step counter is absent or not an integer.
    #[error("cannot read step counter {}: {detail}", path.display())]
    MissingCounterSource { path: PathBuf, detail: String },

    /// The derived record count does not fit the 32-bit numrecs field.
    #[error("derived record count {count} does not fit in numrecs")]
    CountOverflow { count: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepairError {
    pub(crate) fn structural(offset: usize, detail: impl Into<String>) -> Self {
        RepairError::Structural { offset, detail: detail.into() }
    }

    /// Skips are reported but do not count as failed files.
    pub fn is_skip(&self) -> bool {
        matches!(self, RepairError::NotNetCdf3 { .. } | RepairError::NoRecordVariables)
    }
}
