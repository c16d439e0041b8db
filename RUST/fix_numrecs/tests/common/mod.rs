//! Synthetic classic-format files with a known layout.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

pub const NC_BYTE:   u32 = 1;
pub const NC_CHAR:   u32 = 2;
pub const NC_SHORT:  u32 = 3;
pub const NC_INT:    u32 = 4;
pub const NC_FLOAT:  u32 = 5;
pub const NC_DOUBLE: u32 = 6;

pub struct Att {
    name:    String,
    nc_type: u32,
    nelems:  u32,
    values:  Vec<u8>,
}

pub fn text_att(name: &str, value: &str) -> Att {
    Att { name: name.into(), nc_type: NC_CHAR, nelems: value.len() as u32, values: value.as_bytes().to_vec() }
}

pub fn short_att(name: &str, values: &[i16]) -> Att {
    Att {
        name:    name.into(),
        nc_type: NC_SHORT,
        nelems:  values.len() as u32,
        values:  values.iter().flat_map(|v| v.to_be_bytes()).collect(),
    }
}

pub fn double_att(name: &str, values: &[f64]) -> Att {
    Att {
        name:    name.into(),
        nc_type: NC_DOUBLE,
        nelems:  values.len() as u32,
        values:  values.iter().flat_map(|v| v.to_be_bytes()).collect(),
    }
}

pub struct Var {
    name:    String,
    dim_ids: Vec<u32>,
    nc_type: u32,
    vsize:   u32,
    atts:    Vec<Att>,
}

pub fn var(name: &str, dim_ids: &[u32], nc_type: u32, vsize: u32) -> Var {
    Var { name: name.into(), dim_ids: dim_ids.to_vec(), nc_type, vsize, atts: Vec::new() }
}

impl Var {
    pub fn with_att(mut self, att: Att) -> Self {
        self.atts.push(att);
        self
    }
}

pub struct Synth {
    pub wide:    bool,
    pub numrecs: u32,
    pub dims:    Vec<(String, u32)>,
    pub gatts:   Vec<Att>,
    pub vars:    Vec<Var>,
}

/// Header, data offsets and sizes produced by [`Synth::layout`].
pub struct Layout {
    pub header_len:  u64,
    pub begins:      Vec<u64>,
    pub record_size: u64,
    pub data_begin:  u64,
}

fn put_u32(b: &mut Vec<u8>, v: u32) {
    b.extend_from_slice(&v.to_be_bytes());
}

fn put_padded(b: &mut Vec<u8>, bytes: &[u8]) {
    b.extend_from_slice(bytes);
    while b.len() % 4 != 0 {
        b.push(0);
    }
}

fn put_name(b: &mut Vec<u8>, s: &str) {
    put_u32(b, s.len() as u32);
    put_padded(b, s.as_bytes());
}

fn put_atts(b: &mut Vec<u8>, atts: &[Att]) {
    if atts.is_empty() {
        put_u32(b, 0);
        put_u32(b, 0);
        return;
    }
    put_u32(b, 0x0C);
    put_u32(b, atts.len() as u32);
    for a in atts {
        put_name(b, &a.name);
        put_u32(b, a.nc_type);
        put_u32(b, a.nelems);
        put_padded(b, &a.values);
    }
}

impl Synth {
    /// `time` (unlimited) and `x` = 10.
    pub fn gyre_like() -> Self {
        Synth {
            wide:    false,
            numrecs: 0,
            dims:    vec![("time_counter".into(), 0), ("x".into(), 10)],
            gatts:   vec![
                text_att("name", "GYRE_10d_grid_T"),
                double_att("timestep", &[2880.0]),
                short_att("DOMAIN_number", &[0, 1, 4]),
            ],
            vars: vec![
                var("nav_lon", &[1], NC_FLOAT, 40).with_att(text_att("units", "degrees_east")),
                var("time_counter", &[0], NC_DOUBLE, 8)
                    .with_att(text_att("calendar", "noleap"))
                    .with_att(double_att("valid_range", &[0.0, 1e9])),
                var("sossheig", &[0, 1], NC_FLOAT, 40).with_att(short_att("flag", &[7])),
                var("somask", &[0, 1], NC_BYTE, 12),
            ],
        }
    }

    pub fn is_record(&self, v: &Var) -> bool {
        self.dims
            .iter()
            .position(|(_, size)| *size == 0)
            .is_some_and(|rd| v.dim_ids.contains(&(rd as u32)))
    }

    pub fn header_bytes(&self, begins: &[u64]) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(if self.wide { b"CDF\x02" } else { b"CDF\x01" });
        put_u32(&mut b, self.numrecs);

        if self.dims.is_empty() {
            put_u32(&mut b, 0);
            put_u32(&mut b, 0);
        } else {
            put_u32(&mut b, 0x0A);
            put_u32(&mut b, self.dims.len() as u32);
            for (name, size) in &self.dims {
                put_name(&mut b, name);
                put_u32(&mut b, *size);
            }
        }

        put_atts(&mut b, &self.gatts);

        if self.vars.is_empty() {
            put_u32(&mut b, 0);
            put_u32(&mut b, 0);
        } else {
            put_u32(&mut b, 0x0B);
            put_u32(&mut b, self.vars.len() as u32);
            for (v, begin) in self.vars.iter().zip(begins) {
                put_name(&mut b, &v.name);
                put_u32(&mut b, v.dim_ids.len() as u32);
                for id in &v.dim_ids {
                    put_u32(&mut b, *id);
                }
                put_atts(&mut b, &v.atts);
                put_u32(&mut b, v.nc_type);
                put_u32(&mut b, v.vsize);
                if self.wide {
                    b.extend_from_slice(&begin.to_be_bytes());
                } else {
                    put_u32(&mut b, *begin as u32);
                }
            }
        }
        b
    }

    /// Fixed variables first, then interleaved records, as writers lay them out.
    pub fn layout(&self) -> Layout {
        let header_len = self.header_bytes(&vec![0; self.vars.len()]).len() as u64;
        let mut begins = vec![0; self.vars.len()];
        let mut at = header_len;
        for (i, v) in self.vars.iter().enumerate() {
            if !self.is_record(v) {
                begins[i] = at;
                at += u64::from(v.vsize);
            }
        }
        let data_begin = at;
        for (i, v) in self.vars.iter().enumerate() {
            if self.is_record(v) {
                begins[i] = at;
                at += u64::from(v.vsize);
            }
        }
        Layout { header_len, begins, record_size: at - data_begin, data_begin }
    }

    /// Whole file holding `records` full records and `tail` stray bytes.
    pub fn file_bytes(&self, records: u64, tail: usize) -> Vec<u8> {
        let l = self.layout();
        let mut b = self.header_bytes(&l.begins);
        let total = l.data_begin + records * l.record_size + tail as u64;
        let mut i = 0u32;
        while (b.len() as u64) < total {
            b.push((i.wrapping_mul(31) % 251) as u8);
            i += 1;
        }
        b
    }

    pub fn write(&self, dir: &Path, name: &str, records: u64, tail: usize) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.file_bytes(records, tail)).unwrap();
        path
    }
}
