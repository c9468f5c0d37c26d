//! Repeat reconstruction: rebuild unitigs from whatever reads are still
//! unplaced after the main pipeline, using a fresh BOG/CG scoped to just
//! those reads (spec.md §9's restricted-read-set recursion, grounded on
//! `AS_BAT_ReconstructRepeats.C`).

use crate::best_overlap_graph::{BestOverlapGraph, BogConfig};
use crate::chunk_graph::ChunkGraph;
use crate::contained_placement::place_contains;
use crate::overlap::OverlapSource;
use crate::populate_unitig::populate_unitig;
use crate::read_info::{ReadId, ReadInfoProvider};
use crate::restricted_scope::{restricted_overlap_cache, RestrictedReads};
use crate::tig::TigVector;
use log::info;
use std::collections::HashSet;

/// Destroy any tig whose backbone contains a coverage-gap or lopsided read
/// (the existing BOG anomaly signals spec.md §7 already associates with
/// ambiguous, likely-repetitive regions), releasing its reads back to
/// "unplaced" so [`reconstruct_repeats`] or mate extension can re-seed them
/// from a cleaner, locally-scoped graph (`-SR` shatter repeats).
pub fn shatter_repeat_tigs(bog: &BestOverlapGraph, tigs: &mut TigVector) -> usize {
    let mut shattered = 0;
    for tig_id in tigs.tig_ids() {
        let is_repeat_like = match tigs.get(tig_id) {
            Some(tig) => tig.ufpath.iter().any(|n| {
                n.contained == 0 && {
                    let s = bog.status(n.read_id);
                    s.coverage_gap || s.lopsided_5 || s.lopsided_3
                }
            }),
            None => false,
        };
        if is_repeat_like {
            tigs.destroy_tig(tig_id);
            shattered += 1;
        }
    }
    if shattered > 0 {
        info!(target: "repeat", "shattered {} repeat-like tigs for rebuild", shattered);
    }
    shattered
}

/// Rebuild unitigs from the reads still unplaced after the main pipeline.
/// Mirrors `reconstructRepeats`'s `erateGraph / 2.0`: repeat-spanning
/// overlaps are held to a tighter ceiling than first-pass construction.
/// Returns the number of tigs seeded.
pub fn reconstruct_repeats<R: ReadInfoProvider, O: OverlapSource>(
    reads: &R,
    overlaps: &O,
    tigs: &mut TigVector,
    graph_erate: u32,
) -> usize {
    let unplaced: HashSet<ReadId> = (1..=reads.num_reads())
        .filter(|&id| !tigs.index().is_placed(id))
        .collect();
    if unplaced.is_empty() {
        return 0;
    }

    info!(target: "repeat", "reconstructing repeats from {} unplaced reads", unplaced.len());

    let restricted_reads = RestrictedReads::new(reads, &unplaced);
    let restricted_erate = graph_erate / 2;
    let cache = restricted_overlap_cache(overlaps, &unplaced, restricted_erate);
    let cfg = BogConfig {
        graph_erate: restricted_erate,
        ..BogConfig::default()
    };
    let bog = BestOverlapGraph::build(&restricted_reads, &cache, &cfg);
    let cg = ChunkGraph::build(&bog, restricted_reads.num_reads());

    let mut seeded = 0;
    for id in cg.iter() {
        if populate_unitig(id, &bog, &restricted_reads, tigs).is_some() {
            seeded += 1;
        }
    }
    // Catch any fragments the chunk-graph order missed (mirrors the
    // source's unconditional second sweep).
    for id in 1..=restricted_reads.num_reads() {
        if populate_unitig(id, &bog, &restricted_reads, tigs).is_some() {
            seeded += 1;
        }
    }

    let (placed, _deferred) = place_contains(&bog, &restricted_reads, tigs);
    info!(
        target: "repeat",
        "repeat reconstruction seeded {} tigs, placed {} contains",
        seeded, placed
    );
    seeded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlap::{InMemoryOverlapCache, Overlap};
    use crate::read_info::InMemoryReadInfo;
    use crate::tig::TigPosition;

    fn ovl(a: ReadId, b: ReadId, ah: i32, bh: i32, ev: u32) -> Overlap {
        Overlap {
            a_id: a,
            b_id: b,
            flipped: false,
            a_hang: ah,
            b_hang: bh,
            evalue: ev,
        }
    }

    #[test]
    fn shatter_releases_a_lopsided_backbone_read() {
        let mut reads = InMemoryReadInfo::with_capacity(2);
        reads.set(1, 10, 0, 0);
        reads.set(2, 60, 0, 0);
        // Engineered so read 1's extent (length + b_hang - a_hang) is
        // negative, tripping the lopsided_5 flag.
        let cache = InMemoryOverlapCache::build(vec![ovl(1, 2, -1, -50, 10)], 2);
        let bog = BestOverlapGraph::build(&reads, &cache, &BogConfig::default());
        assert!(bog.status(1).lopsided_5);

        let mut tigs = TigVector::new(2);
        let t1 = tigs.create_tig();
        tigs.add_frag(t1, TigPosition::new(1, 0, 10), 0).unwrap();

        let shattered = shatter_repeat_tigs(&bog, &mut tigs);
        assert_eq!(shattered, 1);
        assert!(tigs.get(t1).is_none());
        assert!(!tigs.index().is_placed(1));
    }

    #[test]
    fn nothing_to_do_when_all_reads_placed() {
        let mut reads = InMemoryReadInfo::with_capacity(1);
        reads.set(1, 100, 0, 0);
        let cache = InMemoryOverlapCache::build(vec![], 1);
        let mut tigs = TigVector::new(1);
        tigs.add_frag(tigs.create_tig(), TigPosition::new(1, 0, 100), 0).unwrap();

        let seeded = reconstruct_repeats(&reads, &cache, &mut tigs, 1000);
        assert_eq!(seeded, 0);
    }

    #[test]
    fn unplaced_chain_is_seeded_into_a_new_tig() {
        let mut reads = InMemoryReadInfo::with_capacity(3);
        reads.set(1, 100, 0, 0);
        reads.set(2, 100, 0, 0);
        reads.set(3, 100, 0, 0);
        let overlaps = vec![ovl(1, 2, 30, 30, 10), ovl(2, 3, 40, 40, 10)];
        let cache = InMemoryOverlapCache::build(overlaps, 3);

        let mut tigs = TigVector::new(3);
        // Read 1 already placed elsewhere; 2 and 3 are the repeat-copy
        // fragments left unplaced by the main pipeline.
        tigs.add_frag(tigs.create_tig(), TigPosition::new(1, 0, 100), 0).unwrap();

        let seeded = reconstruct_repeats(&reads, &cache, &mut tigs, 1000);
        assert_eq!(seeded, 1);
        assert!(tigs.index().is_placed(2));
        assert!(tigs.index().is_placed(3));
    }
}
