//! Classic NetCDF-3 header decoding.
//!
//! Only what record-count repair needs is kept: dimensions, the variable
//! descriptors, and the position of the unlimited dimension. Attribute lists
//! are walked by exact byte length and thrown away.

use crate::error::RepairError;
use tracing::debug;

// ─────────────────────────────────────────────────────────────────────
// Format constants
// ─────────────────────────────────────────────────────────────────────
pub const MAGIC_CLASSIC:  [u8; 4] = *b"CDF\x01";
pub const MAGIC_64BIT:    [u8; 4] = *b"CDF\x02";
pub const NUMRECS_OFFSET: u64     = 4;
/// Bytes captured from the start of a file before parsing.
pub const HEADER_WINDOW:  usize   = 256 * 1024;

const TAG_ABSENT:    u32 = 0x00;
const TAG_DIMENSION: u32 = 0x0A;
const TAG_VARIABLE:  u32 = 0x0B;
const TAG_ATTRIBUTE: u32 = 0x0C;

// ─────────────────────────────────────────────────────────────────────
// Decoded header
// ─────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Classic32,
    Classic64Offset,
}

impl FormatKind {
    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        if magic == MAGIC_CLASSIC {
            Some(FormatKind::Classic32)
        } else if magic == MAGIC_64BIT {
            Some(FormatKind::Classic64Offset)
        } else {
            None
        }
    }

    /// Width of a variable's begin offset.
    pub fn offset_width(self) -> usize {
        match self {
            FormatKind::Classic32       => 4,
            FormatKind::Classic64Offset => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcType {
    Byte,
    Char,
    Short,
    Int,
    Float,
    Double,
}

impl NcType {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => NcType::Byte,
            2 => NcType::Char,
            3 => NcType::Short,
            4 => NcType::Int,
            5 => NcType::Float,
            6 => NcType::Double,
            _ => return None,
        })
    }

    pub fn width(self) -> usize {
        match self {
            NcType::Byte | NcType::Char => 1,
            NcType::Short               => 2,
            NcType::Int | NcType::Float => 4,
            NcType::Double              => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub size: u32,
}

impl Dimension {
    pub fn is_unlimited(&self) -> bool {
        self.size == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name:    String,
    pub dim_ids: Vec<u32>,
    pub nc_type: NcType,
    /// Declared byte size, already padded to 4 by the writer.
    pub vsize:   u32,
    pub begin:   u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub format:     FormatKind,
    pub numrecs:    u32,
    pub dimensions: Vec<Dimension>,
    /// Index of the unlimited dimension, if one was declared.
    pub record_dim: Option<usize>,
    pub variables:  Vec<Variable>,
}

/// Where records start and how wide one record is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub record_size: u64,
    pub data_begin:  u64,
    pub record_vars: usize,
}

impl Header {
    pub fn is_record_variable(&self, var: &Variable) -> bool {
        self.record_dim
            .is_some_and(|rd| var.dim_ids.iter().any(|&id| id as usize == rd))
    }

    pub fn record_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|v| self.is_record_variable(v))
    }

    /// `None` when no variable is stored along the unlimited dimension.
    pub fn record_layout(&self) -> Option<RecordLayout> {
        let mut record_size = 0u64;
        let mut data_begin  = None::<u64>;
        let mut record_vars = 0usize;
        for var in self.record_variables() {
            record_size += u64::from(var.vsize);
            data_begin = Some(data_begin.map_or(var.begin, |b| b.min(var.begin)));
            record_vars += 1;
        }
        match data_begin {
            Some(data_begin) if record_size > 0 => {
                Some(RecordLayout { record_size, data_begin, record_vars })
            }
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Byte cursor
// ─────────────────────────────────────────────────────────────────────
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], pos: usize) -> Self {
        Cursor { buf, pos }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], RepairError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                RepairError::structural(
                    self.pos,
                    format!("{what} needs {n} bytes, header window holds {}", self.buf.len()),
                )
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self, what: &str) -> Result<u32, RepairError> {
        let b = self.take(4, what)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self, what: &str) -> Result<u64, RepairError> {
        let b = self.take(8, what)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_be_bytes(raw))
    }

    /// Advance over `len` payload bytes plus padding to the next multiple of 4.
    fn padded(&mut self, len: usize, what: &str) -> Result<&'a [u8], RepairError> {
        let start  = self.pos;
        let padded = len.checked_next_multiple_of(4).ok_or_else(|| {
            RepairError::structural(start, format!("{what} length {len} overflows"))
        })?;
        let block = self.take(padded, what)?;
        Ok(&block[..len])
    }

    fn name(&mut self, what: &str) -> Result<String, RepairError> {
        let len = self.u32(what)? as usize;
        let raw = self.padded(len, what)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    fn nc_type(&mut self, what: &str) -> Result<NcType, RepairError> {
        let at   = self.pos;
        let code = self.u32(what)?;
        NcType::from_code(code)
            .ok_or_else(|| RepairError::structural(at, format!("{what}: unknown type code {code}")))
    }

    /// Reads a (tag, count) list header. An empty list may carry either the
    /// absent tag or the list's own tag; both are seen in real files.
    fn list(&mut self, expected: u32, what: &str) -> Result<usize, RepairError> {
        let at    = self.pos;
        let tag   = self.u32(what)?;
        let count = self.u32(what)?;
        match tag {
            t if t == expected => Ok(count as usize),
            TAG_ABSENT if count == 0 => Ok(0),
            TAG_ABSENT => Err(RepairError::structural(
                at,
                format!("{what} marked absent but declares {count} entries"),
            )),
            other => Err(RepairError::structural(
                at,
                format!("unexpected {what} tag {other:#010x}"),
            )),
        }
    }

    fn skip_attributes(&mut self, what: &str) -> Result<(), RepairError> {
        let count = self.list(TAG_ATTRIBUTE, what)?;
        for _ in 0..count {
            self.name("attribute name")?;
            let nc_type = self.nc_type("attribute type")?;
            let at      = self.pos;
            let nelems  = self.u32("attribute length")? as usize;
            let len = nelems.checked_mul(nc_type.width()).ok_or_else(|| {
                RepairError::structural(at, format!("attribute length {nelems} overflows"))
            })?;
            self.padded(len, "attribute values")?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Parser
// ─────────────────────────────────────────────────────────────────────

/// Checks the 4 magic bytes without looking any further.
pub fn check_magic(buf: &[u8]) -> Result<FormatKind, RepairError> {
    let magic = &buf[..buf.len().min(4)];
    FormatKind::from_magic(magic).ok_or_else(|| RepairError::NotNetCdf3 {
        magic: magic.escape_ascii().to_string(),
    })
}

/// Decodes a classic header from the start of `buf`.
pub fn parse_header(buf: &[u8]) -> Result<Header, RepairError> {
    let format = check_magic(buf)?;
    let mut cur = Cursor::new(buf, 4);
    let numrecs = cur.u32("numrecs")?;

    // 1. dimensions
    let ndims = cur.list(TAG_DIMENSION, "dimension list")?;
    let mut dimensions = Vec::with_capacity(ndims.min(1024));
    let mut record_dim = None;
    for idx in 0..ndims {
        let name = cur.name("dimension name")?;
        let size = cur.u32("dimension size")?;
        if size == 0 {
            if let Some(first) = record_dim {
                return Err(RepairError::structural(
                    cur.pos - 4,
                    format!("dimension {idx} ({name}) is a second unlimited dimension after {first}"),
                ));
            }
            record_dim = Some(idx);
        }
        dimensions.push(Dimension { name, size });
    }

    // 2. global attributes
    cur.skip_attributes("global attribute list")?;

    // 3. variables
    let nvars = cur.list(TAG_VARIABLE, "variable list")?;
    let mut variables = Vec::with_capacity(nvars.min(1024));
    for _ in 0..nvars {
        let name  = cur.name("variable name")?;
        let nrank = cur.u32("variable rank")? as usize;
        let mut dim_ids = Vec::with_capacity(nrank.min(64));
        for _ in 0..nrank {
            let at = cur.pos;
            let id = cur.u32("dimension id")?;
            if id as usize >= dimensions.len() {
                return Err(RepairError::structural(
                    at,
                    format!("variable {name} references dimension {id} of {}", dimensions.len()),
                ));
            }
            dim_ids.push(id);
        }
        cur.skip_attributes("variable attribute list")?;
        let nc_type = cur.nc_type("variable type")?;
        let vsize   = cur.u32("variable size")?;
        let begin   = match format {
            FormatKind::Classic32       => u64::from(cur.u32("variable begin")?),
            FormatKind::Classic64Offset => cur.u64("variable begin")?,
        };
        variables.push(Variable { name, dim_ids, nc_type, vsize, begin });
    }

    debug!(
        ?format,
        numrecs,
        dims = dimensions.len(),
        vars = variables.len(),
        header_len = cur.pos,
        "decoded header"
    );
    Ok(Header { format, numrecs, dimensions, record_dim, variables })
}
