//! In-place rewrite of the numrecs field.
//!
//! The only bytes ever written are `[4, 8)`. There is no temporary file and
//! no rename; readers of the file should be quiesced while patching.

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

use tracing::debug;

use crate::error::RepairError;
use crate::header::{FormatKind, NUMRECS_OFFSET};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    NotNetCdf3,
    AlreadyCorrect(u32),
    Patched { old: u32, new: u32 },
    /// Dry run: the write that would have happened.
    WouldPatch { old: u32, new: u32 },
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Patcher {
    dry_run: bool,
}

impl Patcher {
    pub fn new() -> Self {
        Patcher::default()
    }

    pub fn dry_run(mut self, yes: bool) -> Self {
        self.dry_run = yes;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Opens `path` for the whole read-decide-write cycle; writable unless
    /// this is a dry run.
    pub fn open(&self, path: &Path) -> Result<File, RepairError> {
        Ok(OpenOptions::new().read(true).write(!self.dry_run).open(path)?)
    }

    /// Sets the numrecs field of `path` to `target`.
    pub fn apply(&self, path: &Path, target: u32) -> Result<PatchOutcome, RepairError> {
        let mut file = self.open(path)?;
        let outcome  = self.apply_to(&mut file, target)?;
        if let PatchOutcome::Patched { old, new } = outcome {
            debug!(path = %path.display(), old, new, "numrecs rewritten");
        }
        Ok(outcome)
    }

    /// Same as [`Patcher::apply`] on a handle from [`Patcher::open`].
    pub fn apply_to(&self, file: &mut File, target: u32) -> Result<PatchOutcome, RepairError> {
        let mut head = Vec::with_capacity(8);
        file.seek(SeekFrom::Start(0))?;
        std::io::Read::by_ref(&mut *file).take(8).read_to_end(&mut head)?;
        if head.len() < 4 || FormatKind::from_magic(&head[..4]).is_none() {
            return Ok(PatchOutcome::NotNetCdf3);
        }
        if head.len() < 8 {
            return Err(RepairError::structural(head.len(), "file ends inside the numrecs field"));
        }

        let current = u32::from_be_bytes([head[4], head[5], head[6], head[7]]);
        if current == target {
            return Ok(PatchOutcome::AlreadyCorrect(current));
        }
        if self.dry_run {
            return Ok(PatchOutcome::WouldPatch { old: current, new: target });
        }

        file.seek(SeekFrom::Start(NUMRECS_OFFSET))?;
        file.write_all(&target.to_be_bytes())?;
        file.sync_data()?;
        Ok(PatchOutcome::Patched { old: current, new: target })
    }
}
