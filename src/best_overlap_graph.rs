//! The Best Overlap Graph (BOG): per read-end, the single best dovetail
//! edge; per read, the single best container. Classifies reads as
//! contained, suspicious, spur, lopsided or coverage-gap (spec.md §4.1).

use crate::error::{Error, Result};
use crate::interval_list::IntervalList;
use crate::overlap::{aligned_interval_on_a, Overlap, OverlapKind, OverlapSource};
use crate::read_info::{ReadId, ReadInfoProvider};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::Mutex;

/// Bits of the composite score reserved for each error-rate term. The
/// dominant length term occupies everything above `2 * EVALUE_BITS`, so
/// length always outranks error rate, and corrected error rate always
/// outranks the constant original-error term, exactly as spec.md §4.1's
/// scoring contract requires.
const EVALUE_BITS: u32 = 16;
const MAX_EVALUE: u64 = (1u64 << EVALUE_BITS) - 1;

/// The single best dovetail edge at one read end. A zero `target_id` means
/// "no edge" (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestEdgeOverlap {
    pub target_id: ReadId,
    pub target_three_prime: bool,
    pub a_hang: i32,
    pub b_hang: i32,
    pub evalue: u32,
}

impl Default for BestEdgeOverlap {
    fn default() -> Self {
        Self {
            target_id: 0,
            target_three_prime: false,
            a_hang: 0,
            b_hang: 0,
            evalue: 0,
        }
    }
}

impl BestEdgeOverlap {
    pub fn is_valid(&self) -> bool {
        self.target_id != 0
    }
}

/// The single best containment for a read (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestContainment {
    pub container: ReadId,
    pub same_orientation: bool,
    pub a_hang: i32,
    pub b_hang: i32,
    pub is_contained: bool,
}

impl Default for BestContainment {
    fn default() -> Self {
        Self {
            container: 0,
            same_orientation: true,
            a_hang: 0,
            b_hang: 0,
            is_contained: false,
        }
    }
}

/// Per-read status flags (spec.md §3). Kept as named booleans rather than a
/// literal bitfield: only the on-disk tigStoreEntry layout needs bit-exact
/// packing (spec.md §9).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadStatus {
    pub contained: bool,
    pub ignored: bool,
    pub coverage_gap: bool,
    pub lopsided_5: bool,
    pub lopsided_3: bool,
    pub backbone: bool,
    pub spur: bool,
    pub bubble: bool,
    pub orphan: bool,
    pub delinquent: bool,
    pub suspicious: bool,
}

/// Construction-time configuration (spec.md §4.1, §6's graph thresholds).
#[derive(Debug, Clone)]
pub struct BogConfig {
    /// Maximum error rate (quantised `evalue` units) for an overlap to be
    /// usable at all (`-eg`).
    pub graph_erate: u32,
    /// Absolute error-count ceiling, recorded for checkpoint validation
    /// (`-Eg`).
    pub graph_elimit: u32,
    pub filter_high_error: bool,
    pub filter_lopsided: bool,
    pub filter_spur: bool,
    /// Optional cap on overlaps examined per read end (spec.md §9's
    /// commented-out "top N" refinement), off by default.
    pub max_overlaps_per_end: Option<usize>,
    /// Optional weak-overlap fraction to drop per read end before scoring
    /// (spec.md §4.1 step 2), off by default.
    pub weak_overlap_fraction: Option<f64>,
}

impl Default for BogConfig {
    fn default() -> Self {
        Self {
            graph_erate: 1000,
            graph_elimit: u32::MAX,
            filter_high_error: true,
            filter_lopsided: true,
            filter_spur: false,
            max_overlaps_per_end: None,
            weak_overlap_fraction: None,
        }
    }
}

fn is_overlap_bad_quality(ovl: &Overlap, a_length: u32, b_length: u32, cfg: &BogConfig) -> bool {
    if a_length == 0 || b_length == 0 {
        return true;
    }
    cfg.filter_high_error && ovl.evalue > cfg.graph_erate
}

/// Composite score: length on A dominates, corrected error rate breaks
/// ties, a constant original-error term breaks further ties (mirrors
/// `scoreOverlap` in `AS_BAT_BestOverlapGraph.C`, which also leaves the
/// "original error" term constant since the core never sees an
/// uncorrected-vs-corrected error rate distinction).
fn score_overlap(ovl: &Overlap, a_length: u32) -> u64 {
    let corr = MAX_EVALUE - (ovl.evalue as u64).min(MAX_EVALUE);
    let orig = MAX_EVALUE; // constant: see AS_BAT_BestOverlapGraph.C scoreOverlap

    if ovl.is_containment() {
        return (corr << EVALUE_BITS) | orig;
    }

    let leng = ovl.length_on_a(a_length) as u64;
    (leng << (2 * EVALUE_BITS)) | (corr << EVALUE_BITS) | orig
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestOverlapGraph {
    pub graph_erate: u32,
    pub graph_elimit: u32,
    best5: Vec<BestEdgeOverlap>,
    best3: Vec<BestEdgeOverlap>,
    best_contain: Vec<BestContainment>,
    status: Vec<ReadStatus>,
}

const CHECKPOINT_MAGIC: &[u8; 4] = b"BOGG";
const CHECKPOINT_VERSION: u32 = 1;

impl BestOverlapGraph {
    /// Build the BOG from scratch, per spec.md §4.1's numbered passes.
    pub fn build<R: ReadInfoProvider, O: OverlapSource>(
        reads: &R,
        overlaps: &O,
        cfg: &BogConfig,
    ) -> Self {
        let n = reads.num_reads() as usize;
        let mut bog = BestOverlapGraph {
            graph_erate: cfg.graph_erate,
            graph_elimit: cfg.graph_elimit,
            best5: vec![BestEdgeOverlap::default(); n + 1],
            best3: vec![BestEdgeOverlap::default(); n + 1],
            best_contain: vec![BestContainment::default(); n + 1],
            status: vec![ReadStatus::default(); n + 1],
        };

        bog.detect_suspicious(reads, overlaps, cfg);
        bog.score_containments(reads, overlaps, cfg);

        for id in 1..=n as ReadId {
            if bog.best_contain[id as usize].is_contained {
                bog.status[id as usize].contained = true;
            }
        }

        bog.score_dovetails(reads, overlaps, cfg);

        if cfg.filter_spur {
            bog.detect_spurs();
        }
        if cfg.filter_lopsided {
            bog.detect_lopsided(reads);
        }
        bog.detect_coverage_gap(reads, overlaps, cfg);

        // Post-pass: contained reads carry no dovetail edges.
        for id in 1..=n as ReadId {
            if bog.status[id as usize].contained {
                bog.best5[id as usize] = BestEdgeOverlap::default();
                bog.best3[id as usize] = BestEdgeOverlap::default();
            } else {
                bog.status[id as usize].backbone = bog.best5[id as usize].is_valid()
                    || bog.best3[id as usize].is_valid();
            }
        }

        info!(
            target: "bog",
            "built BOG over {} reads: {} contained, {} suspicious",
            n,
            bog.status.iter().filter(|s| s.contained).count(),
            bog.status.iter().filter(|s| s.suspicious).count()
        );

        bog
    }

    fn detect_suspicious<R: ReadInfoProvider, O: OverlapSource>(
        &mut self,
        reads: &R,
        overlaps: &O,
        cfg: &BogConfig,
    ) {
        let n = reads.num_reads();
        let suspicious: Mutex<HashSet<ReadId>> = Mutex::new(HashSet::new());

        // Parallel-for over reads with a dynamic block size (spec.md §5):
        // each iteration only touches its own read; the suspicious set is
        // the one shared resource and is guarded by a mutex only at insert.
        let block_size = if n < 100 { 1 } else { (n as usize) / 99 };

        (1..=n)
            .collect::<Vec<ReadId>>()
            .par_chunks(block_size.max(1))
            .for_each(|chunk| {
                for &id in chunk {
                    let a_length = reads.read_length(id);
                    if a_length == 0 {
                        continue;
                    }
                    let mut has_container = false;
                    let mut intervals = IntervalList::new();

                    for ovl in overlaps.overlaps_for(id, cfg.graph_erate) {
                        let b_length = reads.read_length(ovl.b_id);
                        if is_overlap_bad_quality(ovl, a_length, b_length, cfg) {
                            continue;
                        }
                        if matches!(ovl.kind(), OverlapKind::BContainsA) {
                            has_container = true;
                        }
                        let (begin, end) = aligned_interval_on_a(ovl, a_length);
                        if end > begin {
                            intervals.add(begin, end - begin);
                        }
                    }

                    if has_container || intervals.is_empty() {
                        continue;
                    }

                    let merged = intervals.merge();
                    let covers_whole = merged.len() == 1
                        && merged[0].begin <= 0
                        && merged[0].end >= a_length as i64;

                    if !covers_whole {
                        suspicious.lock().unwrap().insert(id);
                    }
                }
            });

        let suspicious = suspicious.into_inner().unwrap();
        debug!(target: "bog", "{} suspicious reads detected", suspicious.len());
        for id in suspicious {
            self.status[id as usize].suspicious = true;
        }
    }

    fn score_containments<R: ReadInfoProvider, O: OverlapSource>(
        &mut self,
        reads: &R,
        overlaps: &O,
        cfg: &BogConfig,
    ) {
        let n = reads.num_reads();
        let mut best_score = vec![0u64; n as usize + 1];

        for a_id in 1..=n {
            let a_length = reads.read_length(a_id);
            if a_length == 0 {
                continue;
            }
            for ovl in overlaps.overlaps_for(a_id, cfg.graph_erate) {
                let b_length = reads.read_length(ovl.b_id);
                if is_overlap_bad_quality(ovl, a_length, b_length, cfg) {
                    continue;
                }
                if ovl.kind() != OverlapKind::AContainsB {
                    continue;
                }
                let score = score_overlap(ovl, a_length);
                if score > best_score[ovl.b_id as usize] {
                    best_score[ovl.b_id as usize] = score;
                    self.best_contain[ovl.b_id as usize] = BestContainment {
                        container: a_id,
                        same_orientation: !ovl.flipped,
                        a_hang: ovl.a_hang,
                        b_hang: ovl.b_hang,
                        is_contained: true,
                    };
                }
            }
        }
    }

    fn score_dovetails<R: ReadInfoProvider, O: OverlapSource>(
        &mut self,
        reads: &R,
        overlaps: &O,
        cfg: &BogConfig,
    ) {
        let n = reads.num_reads();
        let mut best5_score = vec![0u64; n as usize + 1];
        let mut best3_score = vec![0u64; n as usize + 1];

        for a_id in 1..=n {
            let a_length = reads.read_length(a_id);
            if a_length == 0 || self.status[a_id as usize].suspicious {
                continue;
            }
            if self.best_contain[a_id as usize].is_contained {
                continue;
            }

            let mut end_overlaps: Vec<&Overlap> =
                overlaps.overlaps_for(a_id, cfg.graph_erate).iter().collect();
            if let Some(cap) = cfg.max_overlaps_per_end {
                end_overlaps.sort_by_key(|o| o.evalue);
                end_overlaps.truncate(cap * 2);
            }

            for ovl in end_overlaps {
                if !ovl.is_dovetail() {
                    continue;
                }
                let b_length = reads.read_length(ovl.b_id);
                if is_overlap_bad_quality(ovl, a_length, b_length, cfg) {
                    continue;
                }
                if self.status[ovl.b_id as usize].suspicious
                    || self.best_contain[ovl.b_id as usize].is_contained
                {
                    continue;
                }

                let score = score_overlap(ovl, a_length);
                let is_three_prime = ovl.a_end();
                let target_three_prime = if ovl.flipped {
                    is_three_prime
                } else {
                    !is_three_prime
                };

                let edge = BestEdgeOverlap {
                    target_id: ovl.b_id,
                    target_three_prime,
                    a_hang: ovl.a_hang,
                    b_hang: ovl.b_hang,
                    evalue: ovl.evalue,
                };

                if is_three_prime {
                    if score > best3_score[a_id as usize] {
                        best3_score[a_id as usize] = score;
                        self.best3[a_id as usize] = edge;
                    }
                } else if score > best5_score[a_id as usize] {
                    best5_score[a_id as usize] = score;
                    self.best5[a_id as usize] = edge;
                }
            }
        }

        // Detect the contradictory-edge anomaly: a read with best edges to
        // the same partner from both ends (spec.md §3, §7).
        for id in 1..=n {
            let b5 = &self.best5[id as usize];
            let b3 = &self.best3[id as usize];
            if b5.is_valid() && b3.is_valid() && b5.target_id == b3.target_id {
                warn!(
                    target: "bog",
                    "read {} has best edges to {} from both ends; erasing both",
                    id, b5.target_id
                );
                self.best5[id as usize] = BestEdgeOverlap::default();
                self.best3[id as usize] = BestEdgeOverlap::default();
            }
        }
    }

    fn detect_spurs(&mut self) {
        let n = self.best5.len() - 1;
        for id in 1..=n as ReadId {
            if self.status[id as usize].contained {
                continue;
            }
            let has5 = self.best5[id as usize].is_valid();
            let has3 = self.best3[id as usize].is_valid();
            if has5 != has3 {
                self.status[id as usize].spur = true;
            }
        }
        // Rebuild: disallow edges into spurs.
        let spurs: HashSet<ReadId> = (1..=n as ReadId)
            .filter(|&id| self.status[id as usize].spur)
            .collect();
        for id in 1..=n as ReadId {
            if spurs.contains(&self.best5[id as usize].target_id) {
                self.best5[id as usize] = BestEdgeOverlap::default();
            }
            if spurs.contains(&self.best3[id as usize].target_id) {
                self.best3[id as usize] = BestEdgeOverlap::default();
            }
        }
    }

    fn detect_lopsided<R: ReadInfoProvider>(&mut self, reads: &R) {
        let n = reads.num_reads();
        for id in 1..=n {
            if self.status[id as usize].contained {
                continue;
            }
            let a_length = reads.read_length(id) as i64;
            if a_length == 0 {
                continue;
            }
            let b5 = self.best5[id as usize];
            let b3 = self.best3[id as usize];
            if b5.is_valid() {
                let extent = a_length + b5.b_hang as i64 - b5.a_hang as i64;
                if extent <= 0 || extent > 4 * a_length {
                    self.status[id as usize].lopsided_5 = true;
                }
            }
            if b3.is_valid() {
                let extent = a_length + b3.b_hang as i64 - b3.a_hang as i64;
                if extent <= 0 || extent > 4 * a_length {
                    self.status[id as usize].lopsided_3 = true;
                }
            }
        }
    }

    fn detect_coverage_gap<R: ReadInfoProvider, O: OverlapSource>(
        &mut self,
        reads: &R,
        overlaps: &O,
        cfg: &BogConfig,
    ) {
        let n = reads.num_reads();
        for id in 1..=n {
            if self.status[id as usize].contained {
                continue;
            }
            let a_length = reads.read_length(id);
            if a_length == 0 {
                continue;
            }
            let mut intervals = IntervalList::new();
            for ovl in overlaps.overlaps_for(id, cfg.graph_erate) {
                let b_length = reads.read_length(ovl.b_id);
                if is_overlap_bad_quality(ovl, a_length, b_length, cfg) {
                    continue;
                }
                let (begin, end) = aligned_interval_on_a(ovl, a_length);
                if end > begin {
                    intervals.add(begin, end - begin);
                }
            }
            if intervals.is_empty() {
                continue;
            }
            let merged = intervals.merge();
            // A coverage gap is an internal break in the merged interval set
            // that isn't explained by containment (suspicious reads already
            // rule that case out): more than one merged piece, with a gap
            // strictly inside the read's coordinate range.
            if merged.len() > 1 {
                let mid_gap = merged.windows(2).any(|w| {
                    w[0].end > 0 && w[1].begin < a_length as i64 && (w[1].begin - w[0].end) > 0
                });
                if mid_gap {
                    self.status[id as usize].coverage_gap = true;
                }
            }
        }
    }

    pub fn best_edge(&self, read_id: ReadId, three_prime: bool) -> BestEdgeOverlap {
        if three_prime {
            self.best3[read_id as usize]
        } else {
            self.best5[read_id as usize]
        }
    }

    pub fn best_containment(&self, read_id: ReadId) -> BestContainment {
        self.best_contain[read_id as usize]
    }

    pub fn status(&self, read_id: ReadId) -> ReadStatus {
        self.status[read_id as usize]
    }

    pub fn set_status(&mut self, read_id: ReadId, status: ReadStatus) {
        self.status[read_id as usize] = status;
    }

    pub fn is_contained(&self, read_id: ReadId) -> bool {
        self.status[read_id as usize].contained
    }

    pub fn is_suspicious(&self, read_id: ReadId) -> bool {
        self.status[read_id as usize].suspicious
    }

    pub fn num_reads(&self) -> u32 {
        self.best5.len().saturating_sub(1) as u32
    }

    pub fn num_contained(&self) -> usize {
        self.status.iter().filter(|s| s.contained).count()
    }

    pub fn num_spurs(&self) -> usize {
        self.status.iter().filter(|s| s.spur).count()
    }

    /// Save a checkpoint: magic, version, the graph erate/elimit used, then
    /// the three per-read arrays (spec.md §4.1 "Persistence").
    pub fn save_checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(CHECKPOINT_MAGIC)?;
        writer.write_all(&CHECKPOINT_VERSION.to_le_bytes())?;
        writer.write_all(&self.graph_erate.to_le_bytes())?;
        writer.write_all(&self.graph_elimit.to_le_bytes())?;
        bincode::serialize_into(&mut writer, self)?;
        Ok(())
    }

    /// Load a checkpoint, rejecting it if the magic, version or recorded
    /// erate/elimit don't match the caller's expectations.
    pub fn load_checkpoint<P: AsRef<Path>>(
        path: P,
        expected_erate: u32,
        expected_elimit: u32,
    ) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != CHECKPOINT_MAGIC {
            return Err(Error::CheckpointMismatch(
                "bad BOG checkpoint magic".to_string(),
            ));
        }
        let mut buf4 = [0u8; 4];
        file.read_exact(&mut buf4)?;
        let version = u32::from_le_bytes(buf4);
        if version != CHECKPOINT_VERSION {
            return Err(Error::CheckpointMismatch(format!(
                "checkpoint version {} != expected {}",
                version, CHECKPOINT_VERSION
            )));
        }
        file.read_exact(&mut buf4)?;
        let erate = u32::from_le_bytes(buf4);
        file.read_exact(&mut buf4)?;
        let elimit = u32::from_le_bytes(buf4);
        if erate != expected_erate || elimit != expected_elimit {
            return Err(Error::CheckpointMismatch(format!(
                "checkpoint erate/elimit {}/{} != expected {}/{}",
                erate, elimit, expected_erate, expected_elimit
            )));
        }
        let bog: BestOverlapGraph = bincode::deserialize_from(file)?;
        Ok(bog)
    }

    /// Plain-text best-edge report (spec.md §6 Outputs): one line per
    /// non-contained, non-singleton read.
    pub fn write_best_edges_report<P: AsRef<Path>>(
        &self,
        path: P,
        library_of: impl Fn(ReadId) -> u32,
    ) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let n = self.num_reads();
        for id in 1..=n {
            if self.status[id as usize].contained {
                continue;
            }
            let b5 = self.best5[id as usize];
            let b3 = self.best3[id as usize];
            if !b5.is_valid() && !b3.is_valid() {
                continue;
            }
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                id,
                library_of(id),
                b5.target_id,
                b5.target_three_prime as u8,
                b3.target_id,
                b3.target_three_prime as u8,
                b5.evalue,
                b3.evalue
            )?;
        }
        Ok(())
    }
}
