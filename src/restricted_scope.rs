//! Shared machinery for re-running BOG/CG construction over a restricted
//! read set. spec.md §9 resolves the source's "temporarily overwrite the
//! global OG/CG" trick (used by mate extension and repeat reconstruction,
//! `AS_BAT_ExtendByMates.C` / `AS_BAT_ReconstructRepeats.C`) into a nested,
//! locally-scoped build rather than a global swap: no shared mutable state,
//! just a BOG/CG constructed over a subset and handed to the ordinary
//! seeding/placement functions.

use crate::overlap::{InMemoryOverlapCache, Overlap, OverlapSource};
use crate::read_info::{ReadId, ReadInfoProvider};
use std::collections::HashSet;

/// A [`ReadInfoProvider`] view that reports zero length for any read
/// outside `restrict`. Every BOG/CG construction pass already skips
/// zero-length reads, so wrapping the real provider this way is enough to
/// keep a restricted build from ever scoring an edge into or out of scope.
pub struct RestrictedReads<'a, R: ReadInfoProvider> {
    inner: &'a R,
    restrict: &'a HashSet<ReadId>,
}

impl<'a, R: ReadInfoProvider> RestrictedReads<'a, R> {
    pub fn new(inner: &'a R, restrict: &'a HashSet<ReadId>) -> Self {
        Self { inner, restrict }
    }
}

impl<'a, R: ReadInfoProvider> ReadInfoProvider for RestrictedReads<'a, R> {
    fn num_reads(&self) -> u32 {
        self.inner.num_reads()
    }

    fn read_length(&self, id: ReadId) -> u32 {
        if self.restrict.contains(&id) {
            self.inner.read_length(id)
        } else {
            0
        }
    }

    fn library_id(&self, id: ReadId) -> u32 {
        self.inner.library_id(id)
    }

    fn mate_id(&self, id: ReadId) -> ReadId {
        self.inner.mate_id(id)
    }
}

/// Collect a fresh, in-memory overlap cache holding only overlaps between
/// two reads that are both in `restrict` ("only overlaps within the set are
/// used for the BOG", `AS_BAT_ExtendByMates.C`).
pub fn restricted_overlap_cache<O: OverlapSource>(
    overlaps: &O,
    restrict: &HashSet<ReadId>,
    max_evalue: u32,
) -> InMemoryOverlapCache {
    let mut collected: Vec<Overlap> = Vec::new();
    let max_id = restrict.iter().copied().max().unwrap_or(0);
    for &id in restrict {
        for ovl in overlaps.overlaps_for(id, max_evalue) {
            // Only keep the canonical (smaller-id-first) direction; `build`
            // below re-derives the symmetric copy itself, and both
            // directions pass through this same filter as `id` sweeps
            // across `restrict`.
            if ovl.a_id < ovl.b_id && restrict.contains(&ovl.b_id) {
                collected.push(*ovl);
            }
        }
    }
    InMemoryOverlapCache::build(collected, max_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_info::InMemoryReadInfo;

    #[test]
    fn restricted_reads_zeroes_out_of_scope_lengths() {
        let mut reads = InMemoryReadInfo::with_capacity(3);
        reads.set(1, 100, 0, 0);
        reads.set(2, 200, 0, 0);
        reads.set(3, 300, 0, 0);
        let restrict: HashSet<ReadId> = [1, 3].into_iter().collect();
        let view = RestrictedReads::new(&reads, &restrict);

        assert_eq!(view.read_length(1), 100);
        assert_eq!(view.read_length(2), 0);
        assert_eq!(view.read_length(3), 300);
        assert_eq!(view.num_reads(), 3);
    }

    #[test]
    fn restricted_cache_drops_overlaps_crossing_the_boundary() {
        use crate::overlap::InMemoryOverlapCache;

        let ovl = |a, b, ah, bh| Overlap {
            a_id: a,
            b_id: b,
            flipped: false,
            a_hang: ah,
            b_hang: bh,
            evalue: 10,
        };
        let cache = InMemoryOverlapCache::build(vec![ovl(1, 2, 30, 30), ovl(2, 3, 10, 10)], 3);
        let restrict: HashSet<ReadId> = [1, 2].into_iter().collect();

        let restricted = restricted_overlap_cache(&cache, &restrict, 1000);
        assert_eq!(restricted.overlaps_for(1, 1000).len(), 1);
        assert_eq!(restricted.overlaps_for(2, 1000).len(), 1);
        assert!(restricted.overlaps_for(3, 1000).is_empty());
    }
}
