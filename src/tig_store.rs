//! TigStore: a versioned, disk-resident store of [`Tig`]s (spec.md §4.10,
//! §6). Each version is a trio of files: `<prefix>.v###.tig` (the index,
//! MASR-magic + version header), `<prefix>.v###.dat` (the tig payloads,
//! bincode-encoded and length-prefixed), and `<prefix>.v###.ctg` (small
//! per-version companion metadata -- currently just the active tig count,
//! kept as a separate file because the original store layout writes it
//! independently of the index).

use crate::error::{Error, Result};
use crate::tig::{Tig, TigClass, TigId, TigVector};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use log::{debug, info};

pub const MASR_MAGIC: u32 = 0x5253414d;
pub const MASR_VERSION: u32 = 2;
pub const MASR_VERSION_MIN_READABLE: u32 = 1;

/// How a store is opened (mirrors canu's `tgStoreType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Make a new store at version 0, then behave like `Write`.
    Create,
    /// Open version `v` for reading only.
    ReadOnly,
    /// Open version `v+1` for writing, purging any existing contents there.
    Write,
    /// Open version `v+1` for writing, preserving any existing contents.
    Append,
    /// Open version `v` for writing in place, preserving contents.
    Modify,
}

/// One index entry: tig metadata plus the packed bitfield locating its
/// payload (spec.md §4.10, grounded on canu's `tgStoreEntry`: unusedFlags:12,
/// flushNeeded:1, isDeleted:1, svID:10, fileOffset:40).
#[derive(Debug, Clone, Copy)]
struct TigStoreEntry {
    tig_id: TigId,
    class: TigClass,
    bits: u64,
}

fn pack_bits(unused_flags: u16, flush_needed: bool, is_deleted: bool, sv_id: u16, file_offset: u64) -> u64 {
    let mut v = (unused_flags as u64) & 0xFFF;
    v |= (flush_needed as u64) << 12;
    v |= (is_deleted as u64) << 13;
    v |= (sv_id as u64 & 0x3FF) << 14;
    v |= (file_offset & 0xFF_FFFF_FFFF) << 24;
    v
}

fn unpack_bits(bits: u64) -> (u16, bool, bool, u16, u64) {
    let unused_flags = (bits & 0xFFF) as u16;
    let flush_needed = (bits >> 12) & 1 != 0;
    let is_deleted = (bits >> 13) & 1 != 0;
    let sv_id = ((bits >> 14) & 0x3FF) as u16;
    let file_offset = (bits >> 24) & 0xFF_FFFF_FFFF;
    (unused_flags, flush_needed, is_deleted, sv_id, file_offset)
}

impl TigStoreEntry {
    fn is_deleted(&self) -> bool {
        unpack_bits(self.bits).2
    }

    fn sv_id(&self) -> u16 {
        unpack_bits(self.bits).3
    }

    fn file_offset(&self) -> u64 {
        unpack_bits(self.bits).4
    }

    fn set_deleted(&mut self, deleted: bool) {
        let (unused, flush, _, sv, off) = unpack_bits(self.bits);
        self.bits = pack_bits(unused, flush, deleted, sv, off);
    }
}

fn index_path(prefix: &str, version: u32) -> PathBuf {
    PathBuf::from(format!("{}.v{:03}.tig", prefix, version))
}

fn data_path(prefix: &str, version: u32) -> PathBuf {
    PathBuf::from(format!("{}.v{:03}.dat", prefix, version))
}

fn companion_path(prefix: &str, version: u32) -> PathBuf {
    PathBuf::from(format!("{}.v{:03}.ctg", prefix, version))
}

/// A versioned on-disk store of tigs.
pub struct TigStore {
    prefix: String,
    mode: OpenMode,
    original_version: u32,
    current_version: u32,
    entries: HashMap<TigId, TigStoreEntry>,
    cache: HashMap<TigId, Tig>,
}

impl TigStore {
    /// Open a store at `version` under `prefix`, per `mode`'s semantics
    /// (spec.md §4.10 "Open modes").
    pub fn open(prefix: &str, version: u32, mode: OpenMode) -> Result<Self> {
        let (original_version, current_version) = match mode {
            OpenMode::Create => (version, version),
            OpenMode::ReadOnly | OpenMode::Modify => (version, version),
            OpenMode::Write | OpenMode::Append => (version, version + 1),
        };

        let mut store = Self {
            prefix: prefix.to_string(),
            mode,
            original_version,
            current_version,
            entries: HashMap::new(),
            cache: HashMap::new(),
        };

        match mode {
            OpenMode::Create => {
                // Nothing on disk yet; starts empty at version 0 (or
                // whatever `version` names), immediately writable.
            }
            OpenMode::Write => {
                if index_path(prefix, current_version).exists() {
                    debug!(target: "tigstore", "purging pre-existing version {} before write", current_version);
                    remove_version_files(prefix, current_version)?;
                }
            }
            OpenMode::ReadOnly | OpenMode::Modify => {
                store.load_index(original_version)?;
            }
            OpenMode::Append => {
                if index_path(prefix, original_version).exists() {
                    store.load_index(original_version)?;
                }
            }
        }

        Ok(store)
    }

    fn load_index(&mut self, version: u32) -> Result<()> {
        let path = index_path(&self.prefix, version);
        let mut file = File::open(&path)?;

        let mut magic_buf = [0u8; 4];
        file.read_exact(&mut magic_buf)?;
        let magic = u32::from_le_bytes(magic_buf);
        if magic != MASR_MAGIC {
            return Err(Error::StoreCorruption(format!(
                "{}: bad MASR magic {:#x}",
                path.display(),
                magic
            )));
        }

        let mut version_buf = [0u8; 4];
        file.read_exact(&mut version_buf)?;
        let file_version = u32::from_le_bytes(version_buf);
        if file_version < MASR_VERSION_MIN_READABLE || file_version > MASR_VERSION {
            return Err(Error::StoreCorruption(format!(
                "{}: unsupported MASR version {}",
                path.display(),
                file_version
            )));
        }

        let mut count_buf = [0u8; 4];
        file.read_exact(&mut count_buf)?;
        let _n_tigs = u32::from_le_bytes(count_buf);

        let mut index_unused_buf = [0u8; 4];
        file.read_exact(&mut index_unused_buf)?;

        let mut array_len_buf = [0u8; 4];
        file.read_exact(&mut array_len_buf)?;
        let array_len = u32::from_le_bytes(array_len_buf);

        for _ in 0..array_len {
            let mut tig_id_buf = [0u8; 4];
            file.read_exact(&mut tig_id_buf)?;
            let tig_id = u32::from_le_bytes(tig_id_buf);

            let mut class_buf = [0u8; 1];
            file.read_exact(&mut class_buf)?;
            let class = class_from_byte(class_buf[0]);

            let mut bits_buf = [0u8; 8];
            file.read_exact(&mut bits_buf)?;
            let bits = u64::from_le_bytes(bits_buf);

            self.entries.insert(tig_id, TigStoreEntry { tig_id, class, bits });
        }

        Ok(())
    }

    /// Number of tig slots known to the store (including deleted ones).
    pub fn num_tigs(&self) -> usize {
        self.entries.len()
    }

    pub fn is_deleted(&self, tig_id: TigId) -> bool {
        self.entries.get(&tig_id).map(|e| e.is_deleted()).unwrap_or(true)
    }

    pub fn version_of(&self, tig_id: TigId) -> Option<u16> {
        self.entries.get(&tig_id).map(|e| e.sv_id())
    }

    /// Add or update a tig in the store, caching it for later flush.
    pub fn insert_tig(&mut self, tig: &Tig) {
        self.cache.insert(tig.id, tig.clone());
        let entry = self
            .entries
            .entry(tig.id)
            .or_insert_with(|| TigStoreEntry {
                tig_id: tig.id,
                class: tig.class,
                bits: pack_bits(0, true, false, self.current_version as u16, 0),
            });
        entry.class = tig.class;
        let (unused, _, _, sv, off) = unpack_bits(entry.bits);
        entry.bits = pack_bits(unused, true, false, sv, off);
    }

    /// Mark a tig deleted: removed from the cache, flagged in the index.
    pub fn delete_tig(&mut self, tig_id: TigId) {
        self.cache.remove(&tig_id);
        if let Some(entry) = self.entries.get_mut(&tig_id) {
            entry.set_deleted(true);
        }
    }

    /// Load (and cache) a tig from disk, or from the write-pending cache if
    /// already present there.
    pub fn load_tig(&mut self, tig_id: TigId) -> Result<Tig> {
        if let Some(tig) = self.cache.get(&tig_id) {
            return Ok(tig.clone());
        }

        let entry = self.entries.get(&tig_id).ok_or_else(|| {
            Error::StoreCorruption(format!("no such tig {} in store", tig_id))
        })?;
        if entry.is_deleted() {
            return Err(Error::StoreCorruption(format!("tig {} is deleted", tig_id)));
        }

        let path = data_path(&self.prefix, entry.sv_id() as u32);
        let mut file = File::open(&path)?;
        file.seek(SeekFrom::Start(entry.file_offset()))?;

        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf)?;
        let len = u32::from_le_bytes(len_buf) as usize;

        let mut payload = vec![0u8; len];
        file.read_exact(&mut payload)?;

        let tig: Tig = bincode::deserialize(&payload)?;
        self.cache.insert(tig_id, tig.clone());
        Ok(tig)
    }

    /// Flush every cached (dirty) tig to the current version's data file
    /// and rewrite the index.
    pub fn flush_disk(&mut self) -> Result<()> {
        if self.mode == OpenMode::ReadOnly {
            return Ok(());
        }

        let dat_path = data_path(&self.prefix, self.current_version);
        let mut data_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&dat_path)?;

        let mut dirty_ids: Vec<TigId> = self.cache.keys().copied().collect();
        dirty_ids.sort_unstable();

        for tig_id in dirty_ids {
            let tig = &self.cache[&tig_id];
            let payload = bincode::serialize(tig)?;
            let offset = data_file.seek(SeekFrom::End(0))?;
            data_file.write_all(&(payload.len() as u32).to_le_bytes())?;
            data_file.write_all(&payload)?;

            let entry = self.entries.entry(tig_id).or_insert_with(|| TigStoreEntry {
                tig_id,
                class: tig.class,
                bits: 0,
            });
            let (unused, _, deleted, _, _) = unpack_bits(entry.bits);
            entry.bits = pack_bits(unused, false, deleted, self.current_version as u16, offset);
            entry.class = tig.class;
        }

        self.write_index()?;
        info!(target: "tigstore", "flushed {} tigs to version {}", self.cache.len(), self.current_version);
        Ok(())
    }

    fn write_index(&self) -> Result<()> {
        let path = index_path(&self.prefix, self.current_version);
        let mut file = File::create(&path)?;

        file.write_all(&MASR_MAGIC.to_le_bytes())?;
        file.write_all(&MASR_VERSION.to_le_bytes())?;
        file.write_all(&(self.entries.len() as u32).to_le_bytes())?;
        // index_unused, per spec.md §6's fixed header layout.
        file.write_all(&0u32.to_le_bytes())?;
        file.write_all(&(self.entries.len() as u32).to_le_bytes())?;

        let mut ids: Vec<TigId> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let entry = &self.entries[&id];
            file.write_all(&entry.tig_id.to_le_bytes())?;
            file.write_all(&[class_to_byte(entry.class)])?;
            file.write_all(&entry.bits.to_le_bytes())?;
        }

        let companion = companion_path(&self.prefix, self.current_version);
        fs::write(companion, (self.entries.len() as u32).to_le_bytes())?;

        Ok(())
    }

    /// Flush dirty tigs, close the current version, and move to a fresh
    /// version, wiping any files already present there (spec.md §4.10's
    /// `nextVersion`).
    pub fn next_version(&mut self) -> Result<()> {
        self.flush_disk()?;
        self.cache.clear();
        self.current_version += 1;
        remove_version_files(&self.prefix, self.current_version)?;
        Ok(())
    }

    pub fn current_version(&self) -> u32 {
        self.current_version
    }

    pub fn original_version(&self) -> u32 {
        self.original_version
    }

    /// Persist an entire in-memory [`TigVector`] as a fresh version.
    pub fn save_all(&mut self, tigs: &TigVector) -> Result<()> {
        for tig_id in tigs.tig_ids() {
            if let Some(tig) = tigs.get(tig_id) {
                self.insert_tig(tig);
            }
        }
        self.flush_disk()
    }

    /// Reconstruct a [`TigVector`] from every non-deleted tig in the store.
    pub fn load_all(&mut self, num_reads: u32) -> Result<TigVector> {
        let mut out = TigVector::new(num_reads);
        let mut ids: Vec<TigId> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            if self.is_deleted(id) {
                continue;
            }
            let tig = self.load_tig(id)?;
            let new_id = out.create_tig();
            for node in tig.ufpath {
                out.add_frag(new_id, node, 0)?;
            }
            out.sort_tig(new_id);
        }
        Ok(out)
    }
}

fn remove_version_files(prefix: &str, version: u32) -> Result<()> {
    for path in [
        index_path(prefix, version),
        data_path(prefix, version),
        companion_path(prefix, version),
    ] {
        if path.exists() {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn class_to_byte(class: TigClass) -> u8 {
    match class {
        TigClass::Unassembled => 0,
        TigClass::Contig => 1,
        TigClass::Bubble => 2,
        TigClass::Repeat => 3,
        TigClass::NoClass => 4,
    }
}

fn class_from_byte(b: u8) -> TigClass {
    match b {
        0 => TigClass::Unassembled,
        1 => TigClass::Contig,
        2 => TigClass::Bubble,
        3 => TigClass::Repeat,
        _ => TigClass::NoClass,
    }
}

/// Offline partitioning: greedily assign each tig to the currently
/// smallest partition not exceeding `target_size`, emitting a
/// read-id -> partition-index map for downstream consensus sharding
/// (spec.md §4.10 "Partitioning").
pub fn partition_tigs(tigs: &TigVector, target_size: u32) -> HashMap<u32, u32> {
    let mut partitions: Vec<u32> = Vec::new();
    let mut assignment = HashMap::new();

    let mut ids = tigs.tig_ids();
    ids.sort_by_key(|&id| std::cmp::Reverse(tigs.get(id).map(|t| t.num_reads()).unwrap_or(0)));

    for tig_id in ids {
        let tig = match tigs.get(tig_id) {
            Some(t) => t,
            None => continue,
        };
        let size = tig.num_reads() as u32;
        if size == 0 {
            continue;
        }

        let target_partition = partitions
            .iter()
            .enumerate()
            .filter(|(_, &used)| used + size <= target_size)
            .min_by_key(|(_, &used)| used)
            .map(|(i, _)| i);

        let partition_idx = match target_partition {
            Some(i) => {
                partitions[i] += size;
                i
            }
            None => {
                partitions.push(size);
                partitions.len() - 1
            }
        };

        for node in &tig.ufpath {
            assignment.insert(node.read_id, partition_idx as u32);
        }
    }

    assignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tig::TigPosition;
    use tempfile::tempdir;

    #[test]
    fn round_trips_a_tig_through_disk() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("asm").to_string_lossy().to_string();

        let mut tigs = TigVector::new(2);
        let t1 = tigs.create_tig();
        tigs.add_frag(t1, TigPosition::new(1, 0, 100), 0).unwrap();
        tigs.add_frag(t1, TigPosition::new(2, 30, 130), 0).unwrap();
        tigs.sort_tig(t1);

        {
            let mut store = TigStore::open(&prefix, 0, OpenMode::Create).unwrap();
            store.save_all(&tigs).unwrap();
        }

        let mut reopened = TigStore::open(&prefix, 0, OpenMode::ReadOnly).unwrap();
        assert_eq!(reopened.num_tigs(), 1);
        let loaded = reopened.load_all(2).unwrap();
        assert_eq!(loaded.len(), 1);
        let tig = loaded.get(loaded.tig_ids()[0]).unwrap();
        assert_eq!(tig.length(), 130);
        assert_eq!(tig.num_reads(), 2);
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("asm").to_string_lossy().to_string();
        let path = index_path(&prefix, 0);
        fs::write(&path, [0u8; 10]).unwrap();

        let result = TigStore::open(&prefix, 0, OpenMode::ReadOnly);
        assert!(result.is_err());
    }

    #[test]
    fn deleted_tig_is_excluded_from_load_all() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("asm").to_string_lossy().to_string();

        let mut tigs = TigVector::new(1);
        let t1 = tigs.create_tig();
        tigs.add_frag(t1, TigPosition::new(1, 0, 100), 0).unwrap();

        let mut store = TigStore::open(&prefix, 0, OpenMode::Create).unwrap();
        store.save_all(&tigs).unwrap();
        store.delete_tig(t1);
        store.flush_disk().unwrap();

        let mut reopened = TigStore::open(&prefix, 0, OpenMode::ReadOnly).unwrap();
        let loaded = reopened.load_all(1).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn partitioning_respects_target_size() {
        let mut tigs = TigVector::new(4);
        let t1 = tigs.create_tig();
        tigs.add_frag(t1, TigPosition::new(1, 0, 100), 0).unwrap();
        tigs.add_frag(t1, TigPosition::new(2, 0, 100), 0).unwrap();
        let t2 = tigs.create_tig();
        tigs.add_frag(t2, TigPosition::new(3, 0, 100), 0).unwrap();
        tigs.add_frag(t2, TigPosition::new(4, 0, 100), 0).unwrap();

        let assignment = partition_tigs(&tigs, 2);
        let partitions: std::collections::HashSet<u32> = assignment.values().copied().collect();
        assert_eq!(partitions.len(), 2);
    }
}
