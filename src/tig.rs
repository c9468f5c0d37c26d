//! The Tig/TigVector data model: ordered read placements, the global
//! read->tig index, and the ordering/length/lifecycle invariants spec.md §3
//! requires.

use crate::error::{Error, Result};
use crate::read_info::ReadId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type TigId = u32;

/// Tig-level classification (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TigClass {
    Unassembled,
    Contig,
    Bubble,
    Repeat,
    NoClass,
}

impl Default for TigClass {
    fn default() -> Self {
        TigClass::NoClass
    }
}

/// Tig-level suggestion flags, individually settable/gettable (SPEC_FULL §3
/// supplement, mirroring `tgTig`'s named accessors rather than one opaque
/// bitfield).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestFlags {
    pub repeat: bool,
    pub bubble: bool,
    pub circular: bool,
    pub no_trim: bool,
}

/// One entry in a tig's `ufpath`: a positioned, oriented read placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TigPosition {
    pub read_id: ReadId,
    /// begin > end iff the read is placed reverse (spec.md §3).
    pub begin: i64,
    pub end: i64,
    /// Read this one was placed against; may be 0.
    pub parent: ReadId,
    pub a_hang: i32,
    pub b_hang: i32,
    /// Id of the direct container, or 0 if not contained.
    pub contained: ReadId,
    pub containment_depth: u32,
    /// Bases trimmed from each end that should not contribute to consensus.
    pub a_skip: u32,
    pub b_skip: u32,
}

impl TigPosition {
    pub fn new(read_id: ReadId, begin: i64, end: i64) -> Self {
        Self {
            read_id,
            begin,
            end,
            parent: 0,
            a_hang: 0,
            b_hang: 0,
            contained: 0,
            containment_depth: 0,
            a_skip: 0,
            b_skip: 0,
        }
    }

    pub fn min(&self) -> i64 {
        self.begin.min(self.end)
    }

    pub fn max(&self) -> i64 {
        self.begin.max(self.end)
    }

    pub fn is_reverse(&self) -> bool {
        self.begin > self.end
    }

    pub fn len(&self) -> i64 {
        (self.max() - self.min()).max(0)
    }

    fn shift(&mut self, delta: i64) {
        self.begin += delta;
        self.end += delta;
    }

    /// Flip the placement about `tig_length` (used by reverse-complement).
    fn flip_about(&mut self, tig_length: i64) {
        let new_begin = tig_length - self.begin;
        let new_end = tig_length - self.end;
        self.begin = new_begin;
        self.end = new_end;
    }
}

/// A single tig: an ordered, positioned read layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tig {
    pub id: TigId,
    pub class: TigClass,
    pub suggest: SuggestFlags,
    pub ufpath: Vec<TigPosition>,
    length: i64,
    #[serde(skip)]
    dirty: bool,
}

impl Tig {
    pub fn new(id: TigId) -> Self {
        Self {
            id,
            class: TigClass::default(),
            suggest: SuggestFlags::default(),
            ufpath: Vec::new(),
            length: 0,
            dirty: false,
        }
    }

    pub fn length(&self) -> i64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.ufpath.is_empty()
    }

    pub fn num_reads(&self) -> usize {
        self.ufpath.len()
    }

    /// Append a placement at `offset`, shifting it by `offset` first,
    /// mirroring `Unitig::addFrag`. Updates `length` and marks the path
    /// dirty (needs re-sort before ordered iteration).
    ///
    /// Returns an error if the final position would be negative: callers
    /// that may produce a negative placement (population, containment)
    /// must call [`Tig::shift_to_nonnegative`] first.
    pub fn add_frag(&mut self, mut node: TigPosition, offset: i64) -> Result<usize> {
        node.shift(offset);

        if node.begin < 0 || node.end < 0 {
            return Err(Error::AlgorithmicAnomaly(format!(
                "add_frag: read {} placed at negative position ({}, {})",
                node.read_id, node.begin, node.end
            )));
        }

        let frg_end = node.max();
        if frg_end > self.length {
            self.length = frg_end;
        }

        self.ufpath.push(node);
        self.dirty = true;
        Ok(self.ufpath.len() - 1)
    }

    /// Shift the whole tig (all placements and `length`) so that the given
    /// prospective placement's minimum becomes non-negative, returning the
    /// placement with the same shift applied. Mirrors
    /// `Unitig::addAndPlaceFrag`'s "shift the unitig to make space" step.
    pub fn shift_to_nonnegative(&mut self, mut node: TigPosition) -> TigPosition {
        let frg_bgn = node.min();
        if frg_bgn < 0 {
            let delta = -frg_bgn;
            node.shift(delta);
            self.length += delta;
            for existing in self.ufpath.iter_mut() {
                existing.shift(delta);
            }
        }
        node
    }

    /// Enforce the ufpath ordering invariant: ascending by `min(position)`,
    /// ties broken by backbone-before-contained (spec.md §3).
    pub fn ensure_sorted(&mut self) {
        if !self.dirty {
            return;
        }
        self.ufpath.sort_by(|a, b| {
            // backbone (contained == 0) sorts before contains at the same offset
            a.min()
                .cmp(&b.min())
                .then_with(|| (a.contained != 0).cmp(&(b.contained != 0)))
        });
        self.dirty = false;
    }

    /// Reverse-complement the tig: flip every placement about the current
    /// length and reverse iteration order so min-ascending order is
    /// restored after a single sort.
    pub fn reverse_complement(&mut self) {
        let len = self.length;
        for node in self.ufpath.iter_mut() {
            node.flip_about(len);
        }
        self.dirty = true;
        self.ensure_sorted();
    }

    /// Remove and return the placement for `read_id`, if present.
    pub fn remove_read(&mut self, read_id: ReadId) -> Option<TigPosition> {
        let pos = self.ufpath.iter().position(|n| n.read_id == read_id)?;
        let node = self.ufpath.remove(pos);
        self.recompute_length();
        Some(node)
    }

    fn recompute_length(&mut self) {
        self.length = self.ufpath.iter().map(|n| n.max()).max().unwrap_or(0);
    }

    /// First non-contained read in ufpath order (used by bubble pop / join).
    pub fn first_backbone(&self) -> Option<&TigPosition> {
        self.ufpath.iter().filter(|n| n.contained == 0).min_by_key(|n| n.min())
    }

    /// Last non-contained read in ufpath order.
    pub fn last_backbone(&self) -> Option<&TigPosition> {
        self.ufpath.iter().filter(|n| n.contained == 0).max_by_key(|n| n.max())
    }

    pub fn position_of(&self, read_id: ReadId) -> Option<&TigPosition> {
        self.ufpath.iter().find(|n| n.read_id == read_id)
    }

    pub fn position_of_mut(&mut self, read_id: ReadId) -> Option<&mut TigPosition> {
        self.ufpath.iter_mut().find(|n| n.read_id == read_id)
    }
}

/// Global mapping from read_id to (tig_id, ordinal within ufpath). Reads not
/// in any tig map to tig_id 0 (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct TigIndex {
    tig_of: Vec<TigId>,
    ordinal_of: Vec<usize>,
}

impl TigIndex {
    pub fn with_capacity(num_reads: u32) -> Self {
        Self {
            tig_of: vec![0; num_reads as usize + 1],
            ordinal_of: vec![0; num_reads as usize + 1],
        }
    }

    pub fn tig_of(&self, read_id: ReadId) -> TigId {
        self.tig_of.get(read_id as usize).copied().unwrap_or(0)
    }

    pub fn ordinal_of(&self, read_id: ReadId) -> usize {
        self.ordinal_of.get(read_id as usize).copied().unwrap_or(0)
    }

    pub fn is_placed(&self, read_id: ReadId) -> bool {
        self.tig_of(read_id) != 0
    }

    fn set(&mut self, read_id: ReadId, tig_id: TigId, ordinal: usize) {
        let idx = read_id as usize;
        if idx >= self.tig_of.len() {
            self.tig_of.resize(idx + 1, 0);
            self.ordinal_of.resize(idx + 1, 0);
        }
        self.tig_of[idx] = tig_id;
        self.ordinal_of[idx] = ordinal;
    }

    fn clear(&mut self, read_id: ReadId) {
        self.set(read_id, 0, 0);
    }
}

/// Owns all live tigs plus the global read index, and is the only way
/// phases add, remove, split or destroy tigs: every mutation keeps the
/// index consistent, which is invariant 1 of spec.md §8.
#[derive(Debug, Default)]
pub struct TigVector {
    tigs: HashMap<TigId, Tig>,
    next_id: TigId,
    index: TigIndex,
}

impl TigVector {
    pub fn new(num_reads: u32) -> Self {
        Self {
            tigs: HashMap::new(),
            next_id: 1,
            index: TigIndex::with_capacity(num_reads),
        }
    }

    pub fn index(&self) -> &TigIndex {
        &self.index
    }

    pub fn create_tig(&mut self) -> TigId {
        let id = self.next_id;
        self.next_id += 1;
        self.tigs.insert(id, Tig::new(id));
        id
    }

    pub fn get(&self, id: TigId) -> Option<&Tig> {
        self.tigs.get(&id)
    }

    pub fn get_mut(&mut self, id: TigId) -> Option<&mut Tig> {
        self.tigs.get_mut(&id)
    }

    pub fn tig_ids(&self) -> Vec<TigId> {
        let mut ids: Vec<TigId> = self.tigs.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.tigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tigs.is_empty()
    }

    /// Add a placement to `tig_id` and register it in the global index.
    /// Reindexes every entry of the tig after insertion, since `add_frag`
    /// may have shifted all prior ordinals via a subsequent sort elsewhere;
    /// callers that need ordinal stability across many inserts should defer
    /// `reindex_tig` until the batch completes.
    pub fn add_frag(&mut self, tig_id: TigId, node: TigPosition, offset: i64) -> Result<()> {
        let tig = self
            .tigs
            .get_mut(&tig_id)
            .ok_or_else(|| Error::AlgorithmicAnomaly(format!("no such tig {}", tig_id)))?;
        let ordinal = tig.add_frag(node, offset)?;
        self.index.set(node.read_id, tig_id, ordinal);
        Ok(())
    }

    /// Recompute `ordinal_of` for every read currently in `tig_id` to match
    /// its current ufpath order. Call after sorting or splicing.
    pub fn reindex_tig(&mut self, tig_id: TigId) {
        if let Some(tig) = self.tigs.get(&tig_id) {
            let entries: Vec<(ReadId, usize)> = tig
                .ufpath
                .iter()
                .enumerate()
                .map(|(i, n)| (n.read_id, i))
                .collect();
            for (read_id, ordinal) in entries {
                self.index.set(read_id, tig_id, ordinal);
            }
        }
    }

    pub fn sort_tig(&mut self, tig_id: TigId) {
        if let Some(tig) = self.tigs.get_mut(&tig_id) {
            tig.ensure_sorted();
        }
        self.reindex_tig(tig_id);
    }

    /// Remove a single read from its tig, clearing its index entry, and
    /// reindex the remaining entries.
    pub fn remove_read(&mut self, read_id: ReadId) -> Option<TigPosition> {
        let tig_id = self.index.tig_of(read_id);
        if tig_id == 0 {
            return None;
        }
        let removed = self.tigs.get_mut(&tig_id).and_then(|t| t.remove_read(read_id));
        self.index.clear(read_id);
        self.reindex_tig(tig_id);
        removed
    }

    /// Destroy a tig entirely: clears the index for every read it held.
    pub fn destroy_tig(&mut self, tig_id: TigId) {
        if let Some(tig) = self.tigs.remove(&tig_id) {
            for node in tig.ufpath {
                self.index.clear(node.read_id);
            }
        }
    }

    /// Destroys `tig_id` and returns its ufpath so callers can redistribute
    /// the reads into new tigs (split, bubble-merge): ownership transfers,
    /// placements are not copied.
    pub fn take_tig_path(&mut self, tig_id: TigId) -> Vec<TigPosition> {
        match self.tigs.remove(&tig_id) {
            Some(tig) => {
                for node in &tig.ufpath {
                    self.index.clear(node.read_id);
                }
                tig.ufpath
            }
            None => Vec::new(),
        }
    }

    /// Verify invariant 1 (global index matches every tig's ufpath) and
    /// invariant 2 (min==0, max==length) for all tigs. Intended for tests
    /// and debug assertions, not the hot path.
    pub fn check_invariants(&self) -> Result<()> {
        for (&tig_id, tig) in &self.tigs {
            if tig.is_empty() {
                continue;
            }
            let min = tig.ufpath.iter().map(|n| n.min()).min().unwrap();
            let max = tig.ufpath.iter().map(|n| n.max()).max().unwrap();
            if min != 0 {
                return Err(Error::AlgorithmicAnomaly(format!(
                    "tig {} minimum position {} != 0",
                    tig_id, min
                )));
            }
            if max != tig.length() {
                return Err(Error::AlgorithmicAnomaly(format!(
                    "tig {} max position {} != length {}",
                    tig_id,
                    max,
                    tig.length()
                )));
            }
            for (ordinal, node) in tig.ufpath.iter().enumerate() {
                if self.index.tig_of(node.read_id) != tig_id {
                    return Err(Error::AlgorithmicAnomaly(format!(
                        "read {} index points to tig {} but lives in tig {}",
                        node.read_id,
                        self.index.tig_of(node.read_id),
                        tig_id
                    )));
                }
                if self.index.ordinal_of(node.read_id) != ordinal {
                    return Err(Error::AlgorithmicAnomaly(format!(
                        "read {} index ordinal {} != actual ordinal {}",
                        node.read_id,
                        self.index.ordinal_of(node.read_id),
                        ordinal
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_frag_tracks_length() {
        let mut tig = Tig::new(1);
        tig.add_frag(TigPosition::new(1, 0, 100), 0).unwrap();
        tig.add_frag(TigPosition::new(2, 30, 130), 0).unwrap();
        assert_eq!(tig.length(), 130);
    }

    #[test]
    fn add_frag_rejects_negative_position() {
        let mut tig = Tig::new(1);
        let err = tig.add_frag(TigPosition::new(1, -10, 50), 0);
        assert!(err.is_err());
    }

    #[test]
    fn shift_to_nonnegative_shifts_whole_tig() {
        let mut tig = Tig::new(1);
        tig.add_frag(TigPosition::new(1, 0, 100), 0).unwrap();
        let placed = tig.shift_to_nonnegative(TigPosition::new(2, -30, 70));
        assert_eq!(placed.begin, 0);
        assert_eq!(placed.end, 100);
        assert_eq!(tig.ufpath[0].begin, 30);
        assert_eq!(tig.ufpath[0].end, 130);
        assert_eq!(tig.length(), 130);
    }

    #[test]
    fn reverse_complement_twice_is_identity() {
        let mut tig = Tig::new(1);
        tig.add_frag(TigPosition::new(1, 0, 100), 0).unwrap();
        tig.add_frag(TigPosition::new(2, 30, 130), 0).unwrap();
        let before = tig.ufpath.clone();
        tig.reverse_complement();
        tig.reverse_complement();
        assert_eq!(tig.ufpath, before);
    }

    #[test]
    fn vector_keeps_index_consistent() {
        let mut tv = TigVector::new(5);
        let t1 = tv.create_tig();
        tv.add_frag(t1, TigPosition::new(1, 0, 100), 0).unwrap();
        tv.add_frag(t1, TigPosition::new(2, 30, 130), 0).unwrap();
        assert_eq!(tv.index().tig_of(1), t1);
        assert_eq!(tv.index().tig_of(2), t1);
        assert_eq!(tv.index().ordinal_of(2), 1);
        tv.check_invariants().unwrap();
    }

    #[test]
    fn remove_read_clears_index() {
        let mut tv = TigVector::new(5);
        let t1 = tv.create_tig();
        tv.add_frag(t1, TigPosition::new(1, 0, 100), 0).unwrap();
        tv.remove_read(1);
        assert_eq!(tv.index().tig_of(1), 0);
    }
}
