//! Immutable per-read metadata: length, library id, mate id.
//!
//! The read store itself is out of scope (spec.md §1); this module is the
//! interface THE CORE depends on, plus a concrete in-memory implementation
//! good enough for testing and for small standalone runs.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Read ids are dense `u32` in `[1, N]`; 0 is the null sentinel.
pub type ReadId = u32;

/// Collaborator interface for read metadata. Implementations are immutable
/// and opaque to the core: it never asks for base sequence.
pub trait ReadInfoProvider: Send + Sync {
    /// Number of reads, N. Valid ids are `1..=num_reads()`.
    fn num_reads(&self) -> u32;

    /// Length in bases of the given read.
    fn read_length(&self, id: ReadId) -> u32;

    /// Library id the read belongs to.
    fn library_id(&self, id: ReadId) -> u32;

    /// Mate read id, or 0 if unpaired.
    fn mate_id(&self, id: ReadId) -> ReadId;
}

#[derive(Clone, Copy, Debug, Default)]
struct ReadRecord {
    length: u32,
    library_id: u32,
    mate_id: ReadId,
}

/// A flat, `Vec`-backed implementation of [`ReadInfoProvider`].
///
/// Index 0 is the unused sentinel slot; records live at `records[id]`.
#[derive(Debug, Default)]
pub struct InMemoryReadInfo {
    records: Vec<ReadRecord>,
}

impl InMemoryReadInfo {
    /// Build an empty provider with capacity for `num_reads` reads.
    pub fn with_capacity(num_reads: u32) -> Self {
        Self {
            records: vec![ReadRecord::default(); num_reads as usize + 1],
        }
    }

    /// Set the metadata for a read, growing the backing store if needed.
    pub fn set(&mut self, id: ReadId, length: u32, library_id: u32, mate_id: ReadId) {
        let idx = id as usize;
        if idx >= self.records.len() {
            self.records.resize(idx + 1, ReadRecord::default());
        }
        self.records[idx] = ReadRecord {
            length,
            library_id,
            mate_id,
        };
    }

    /// Load from a TSV with columns `read_id length library_id mate_id`.
    ///
    /// Lines starting with `#` and blank lines are skipped, the same
    /// tolerance the teacher's PAF reader applies to malformed lines.
    pub fn load_tsv<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut info = InMemoryReadInfo::default();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 3 {
                continue;
            }

            let id: ReadId = match fields[0].parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let length: u32 = match fields[1].parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let library_id: u32 = match fields[2].parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let mate_id: ReadId = fields.get(3).and_then(|s| s.parse().ok()).unwrap_or(0);

            info.set(id, length, library_id, mate_id);
        }

        Ok(info)
    }
}

impl ReadInfoProvider for InMemoryReadInfo {
    fn num_reads(&self) -> u32 {
        self.records.len().saturating_sub(1) as u32
    }

    fn read_length(&self, id: ReadId) -> u32 {
        self.records.get(id as usize).map(|r| r.length).unwrap_or(0)
    }

    fn library_id(&self, id: ReadId) -> u32 {
        self.records
            .get(id as usize)
            .map(|r| r.library_id)
            .unwrap_or(0)
    }

    fn mate_id(&self, id: ReadId) -> ReadId {
        self.records.get(id as usize).map(|r| r.mate_id).unwrap_or(0)
    }
}

/// A read-id indexed map used when reads arrive with string names (as in
/// PAF input) and must be assigned dense integer ids.
#[derive(Debug, Default)]
pub struct ReadNameIndex {
    name_to_id: HashMap<String, ReadId>,
    id_to_name: Vec<String>,
}

impl ReadNameIndex {
    pub fn new() -> Self {
        Self {
            name_to_id: HashMap::new(),
            id_to_name: vec![String::new()], // index 0 sentinel
        }
    }

    /// Look up or assign a dense id for `name`.
    pub fn intern(&mut self, name: &str) -> ReadId {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = self.id_to_name.len() as ReadId;
        self.id_to_name.push(name.to_string());
        self.name_to_id.insert(name.to_string(), id);
        id
    }

    pub fn name(&self, id: ReadId) -> Option<&str> {
        self.id_to_name.get(id as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> u32 {
        self.id_to_name.len().saturating_sub(1) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_index_is_zero() {
        let info = InMemoryReadInfo::with_capacity(3);
        assert_eq!(info.read_length(0), 0);
        assert_eq!(info.num_reads(), 3);
    }

    #[test]
    fn set_and_read_back() {
        let mut info = InMemoryReadInfo::with_capacity(2);
        info.set(1, 100, 0, 2);
        info.set(2, 100, 0, 1);
        assert_eq!(info.read_length(1), 100);
        assert_eq!(info.mate_id(1), 2);
        assert_eq!(info.mate_id(2), 1);
    }

    #[test]
    fn name_index_interns_stably() {
        let mut idx = ReadNameIndex::new();
        let a = idx.intern("read_a");
        let b = idx.intern("read_b");
        let a_again = idx.intern("read_a");
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(idx.name(a), Some("read_a"));
    }
}
