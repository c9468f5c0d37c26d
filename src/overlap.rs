//! Pairwise read overlaps and the collaborator interface over them.

use crate::read_info::ReadId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Units `evalue` is quantised in (basis points of error rate).
pub const EVALUE_SCALE: f64 = 10000.0;

/// Aligned interval of A's coordinate space implied by the overlap's
/// hangs: `[max(0, a_hang), min(a_length, a_length + b_hang))`, uniform
/// across containment and both dovetail orientations. Used by suspicious-
/// read detection and by the placement engine's coverage computations.
pub fn aligned_interval_on_a(ovl: &Overlap, a_length: u32) -> (i64, i64) {
    let a_length = a_length as i64;
    let begin = ovl.a_hang.max(0) as i64;
    let end = (a_length + ovl.b_hang as i64).min(a_length);
    (begin, end.max(begin))
}

/// A read end: the 5' or 3' extremity of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReadEnd {
    pub read_id: ReadId,
    pub is_three_prime: bool,
}

impl ReadEnd {
    pub fn new(read_id: ReadId, is_three_prime: bool) -> Self {
        Self {
            read_id,
            is_three_prime,
        }
    }

    pub fn five_prime(read_id: ReadId) -> Self {
        Self::new(read_id, false)
    }

    pub fn three_prime(read_id: ReadId) -> Self {
        Self::new(read_id, true)
    }

    /// The other end of the same read.
    pub fn flip(self) -> Self {
        Self::new(self.read_id, !self.is_three_prime)
    }
}

/// How a pairwise overlap classifies under spec.md §3's hang-sign rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapKind {
    /// a_hang >= 0 && b_hang <= 0: A contains B.
    AContainsB,
    /// a_hang <= 0 && b_hang >= 0: B contains A.
    BContainsA,
    /// a_hang < 0 && b_hang < 0: overlap off A's 5' end.
    DovetailFivePrime,
    /// a_hang > 0 && b_hang > 0: overlap off A's 3' end.
    DovetailThreePrime,
}

/// A pairwise overlap between reads `a_id` and `b_id`, from A's perspective.
///
/// Quantities mirror `BAToverlap` in the original bogart source: `flipped`
/// records whether B is reverse-complemented relative to A, and the two
/// signed hangs place B relative to A's coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Overlap {
    pub a_id: ReadId,
    pub b_id: ReadId,
    pub flipped: bool,
    pub a_hang: i32,
    pub b_hang: i32,
    /// Quantised error rate, integer units (the engine never interprets the
    /// unit itself beyond "lower is better").
    pub evalue: u32,
}

impl Overlap {
    /// Classify the overlap by the sign of its hangs (spec.md §3).
    ///
    /// Degenerate equal-hang containments (`a_hang == 0 && b_hang == 0`) are
    /// broken by read id: the smaller id is the container, matching the
    /// original's tie-break ("smaller id = container").
    pub fn kind(&self) -> OverlapKind {
        if self.a_hang == 0 && self.b_hang == 0 {
            return if self.a_id < self.b_id {
                OverlapKind::AContainsB
            } else {
                OverlapKind::BContainsA
            };
        }
        if self.a_hang >= 0 && self.b_hang <= 0 {
            OverlapKind::AContainsB
        } else if self.a_hang <= 0 && self.b_hang >= 0 {
            OverlapKind::BContainsA
        } else if self.a_hang < 0 && self.b_hang < 0 {
            OverlapKind::DovetailFivePrime
        } else {
            OverlapKind::DovetailThreePrime
        }
    }

    pub fn is_containment(&self) -> bool {
        matches!(
            self.kind(),
            OverlapKind::AContainsB | OverlapKind::BContainsA
        )
    }

    pub fn is_dovetail(&self) -> bool {
        !self.is_containment()
    }

    /// Which end of A this overlap is anchored at. Only meaningful for
    /// dovetail overlaps; callers must not invoke this on a containment.
    pub fn a_end(&self) -> bool {
        matches!(self.kind(), OverlapKind::DovetailThreePrime)
    }

    /// Length of the overlap on the A read, used as the dominant term of
    /// the BOG composite score.
    pub fn length_on_a(&self, a_length: u32) -> u32 {
        let a_length = a_length as i64;
        let len = match self.kind() {
            OverlapKind::AContainsB | OverlapKind::BContainsA => a_length,
            OverlapKind::DovetailThreePrime => a_length - self.a_hang as i64,
            OverlapKind::DovetailFivePrime => a_length + self.b_hang as i64,
        };
        len.max(0) as u32
    }

    /// Quantised error rate as a fraction (evalue is in basis points).
    pub fn erate(&self) -> f64 {
        self.evalue as f64 / EVALUE_SCALE
    }

    /// The symmetric overlap, from B's perspective.
    pub fn flip_perspective(&self) -> Overlap {
        if !self.flipped {
            Overlap {
                a_id: self.b_id,
                b_id: self.a_id,
                flipped: false,
                a_hang: -self.a_hang,
                b_hang: -self.b_hang,
                evalue: self.evalue,
            }
        } else {
            Overlap {
                a_id: self.b_id,
                b_id: self.a_id,
                flipped: true,
                a_hang: self.b_hang,
                b_hang: self.a_hang,
                evalue: self.evalue,
            }
        }
    }
}

/// Collaborator interface over a filtered overlap store (spec.md §1, §6):
/// "for a read A and an error-rate ceiling, returns the list of overlaps".
pub trait OverlapSource: Send + Sync {
    /// All overlaps for read `a_id` with `evalue <= max_evalue`.
    fn overlaps_for(&self, a_id: ReadId, max_evalue: u32) -> &[Overlap];

    /// Restrict subsequent ranged iteration to `[lo, hi]` inclusive
    /// (spec.md §6: "supports setting a range of reads").
    fn set_range(&mut self, lo: ReadId, hi: ReadId);

    /// Reads touched by the current range, in ascending order.
    fn ranged_reads(&self) -> Vec<ReadId>;
}

/// An in-memory [`OverlapSource`] built once from a flat list of overlaps,
/// indexed by `a_id` for O(1) lookup, mirroring how the teacher indexes its
/// `OverlapGraph` by node id after a single pass over PAF records.
pub struct InMemoryOverlapCache {
    by_read: HashMap<ReadId, Vec<Overlap>>,
    num_reads: u32,
    range: (ReadId, ReadId),
}

impl InMemoryOverlapCache {
    /// Build the cache from a flat overlap list, adding the symmetric
    /// (B-perspective) overlap for every entry so each read sees its own
    /// overlaps regardless of which side produced the record.
    pub fn build(overlaps: Vec<Overlap>, num_reads: u32) -> Self {
        let mut by_read: HashMap<ReadId, Vec<Overlap>> = HashMap::new();

        for ovl in overlaps {
            by_read.entry(ovl.a_id).or_default().push(ovl);
            let sym = ovl.flip_perspective();
            by_read.entry(sym.a_id).or_default().push(sym);
        }

        for bucket in by_read.values_mut() {
            bucket.sort_by_key(|o| o.evalue);
        }

        Self {
            by_read,
            num_reads,
            range: (1, num_reads),
        }
    }

    pub fn num_reads(&self) -> u32 {
        self.num_reads
    }

    /// Load overlaps from a TSV with columns `a_id b_id flipped a_hang
    /// b_hang evalue` (the same line-oriented tolerance as
    /// [`crate::read_info::InMemoryReadInfo::load_tsv`]: blank lines and
    /// `#`-prefixed comments are skipped, malformed lines are dropped).
    pub fn load_tsv<P: AsRef<Path>>(path: P, num_reads: u32) -> io::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut overlaps = Vec::new();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 6 {
                continue;
            }

            let (a_id, b_id, flipped, a_hang, b_hang, evalue) = match (
                fields[0].parse(),
                fields[1].parse(),
                fields[2].parse::<u8>(),
                fields[3].parse(),
                fields[4].parse(),
                fields[5].parse(),
            ) {
                (Ok(a), Ok(b), Ok(f), Ok(ah), Ok(bh), Ok(ev)) => (a, b, f != 0, ah, bh, ev),
                _ => continue,
            };

            overlaps.push(Overlap {
                a_id,
                b_id,
                flipped,
                a_hang,
                b_hang,
                evalue,
            });
        }

        Ok(Self::build(overlaps, num_reads))
    }
}

impl OverlapSource for InMemoryOverlapCache {
    fn overlaps_for(&self, a_id: ReadId, max_evalue: u32) -> &[Overlap] {
        match self.by_read.get(&a_id) {
            Some(v) => {
                // bucket is sorted by evalue ascending; find the slice prefix
                // that satisfies the ceiling. Binary search on a key, falling
                // back to a full scan result via partition_point.
                let end = v.partition_point(|o| o.evalue <= max_evalue);
                &v[..end]
            }
            None => &[],
        }
    }

    fn set_range(&mut self, lo: ReadId, hi: ReadId) {
        self.range = (lo, hi);
    }

    fn ranged_reads(&self) -> Vec<ReadId> {
        let (lo, hi) = self.range;
        (lo..=hi).filter(|id| self.by_read.contains_key(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ovl(a: ReadId, b: ReadId, ah: i32, bh: i32) -> Overlap {
        Overlap {
            a_id: a,
            b_id: b,
            flipped: false,
            a_hang: ah,
            b_hang: bh,
            evalue: 10,
        }
    }

    #[test]
    fn classifies_containment() {
        let o = ovl(1, 2, 40, -110);
        assert_eq!(o.kind(), OverlapKind::AContainsB);
        assert!(o.is_containment());
    }

    #[test]
    fn classifies_dovetail_ends() {
        assert_eq!(ovl(1, 2, -30, -30).kind(), OverlapKind::DovetailFivePrime);
        assert_eq!(ovl(1, 2, 30, 30).kind(), OverlapKind::DovetailThreePrime);
    }

    #[test]
    fn degenerate_tie_breaks_by_smaller_id() {
        assert_eq!(ovl(1, 2, 0, 0).kind(), OverlapKind::AContainsB);
        assert_eq!(ovl(2, 1, 0, 0).kind(), OverlapKind::BContainsA);
    }

    #[test]
    fn flip_perspective_round_trips() {
        let o = ovl(1, 2, 30, -10);
        let back = o.flip_perspective().flip_perspective();
        assert_eq!(back, o);
    }

    #[test]
    fn cache_filters_by_evalue() {
        let overlaps = vec![ovl(1, 2, 30, 30), ovl(1, 3, 30, 30)];
        let mut overlaps = overlaps;
        overlaps[0].evalue = 5;
        overlaps[1].evalue = 50;
        let cache = InMemoryOverlapCache::build(overlaps, 3);
        assert_eq!(cache.overlaps_for(1, 10).len(), 1);
        assert_eq!(cache.overlaps_for(1, 100).len(), 2);
    }
}
