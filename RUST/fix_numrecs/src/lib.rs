//! Repair of the `numrecs` header field in NetCDF-3 classic files.
//!
//! Writers that keep a file open for a whole run only flush `numrecs` on
//! close, so an interrupted run leaves a header claiming zero records over
//! data that is physically there. This crate decodes the header, works out
//! the true record count, and rewrites the 4 bytes at offset 4.

pub mod batch;
pub mod error;
pub mod header;
pub mod patch;
pub mod repair;

pub use batch::{discover, repair_file, run_batch, BatchReport, FileReport, FileStatus, Summary};
pub use error::RepairError;
pub use header::{parse_header, FormatKind, Header, NcType, RecordLayout};
pub use patch::{PatchOutcome, Patcher};
pub use repair::{CounterDerived, HeaderWindow, RecordCountSource, SizeDerived};
