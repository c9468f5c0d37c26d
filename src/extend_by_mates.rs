//! Mate extension: re-open every multi-read tig, pull in any unplaced mate
//! of its member reads, and rebuild the tig from a fresh, locally-scoped
//! BOG/CG (spec.md §9's restricted-read-set recursion, grounded on
//! `AS_BAT_ExtendByMates.C`).

use crate::best_overlap_graph::{BestOverlapGraph, BogConfig};
use crate::chunk_graph::ChunkGraph;
use crate::contained_placement::place_contains;
use crate::overlap::OverlapSource;
use crate::populate_unitig::populate_unitig;
use crate::read_info::{ReadId, ReadInfoProvider};
use crate::restricted_scope::{restricted_overlap_cache, RestrictedReads};
use crate::tig::{TigId, TigVector};
use log::{info, warn};
use std::collections::HashSet;

/// Re-extend every multi-read tig with its members' unplaced mates.
/// Returns the number of tigs that had at least one mate pulled in.
pub fn extend_by_mates<R: ReadInfoProvider, O: OverlapSource>(
    reads: &R,
    overlaps: &O,
    tigs: &mut TigVector,
    graph_erate: u32,
) -> usize {
    let mut extended = 0;

    for tig_id in tigs.tig_ids() {
        let members: Vec<ReadId> = match tigs.get(tig_id) {
            Some(t) if t.num_reads() >= 2 => t.ufpath.iter().map(|n| n.read_id).collect(),
            _ => continue,
        };

        let mut frags: HashSet<ReadId> = HashSet::new();
        let mut mates: HashSet<ReadId> = HashSet::new();
        for &fid in &members {
            frags.insert(fid);
            let mid = reads.mate_id(fid);
            if mid != 0 && !tigs.index().is_placed(mid) {
                frags.insert(mid);
                mates.insert(mid);
            }
        }

        if mates.is_empty() {
            continue;
        }

        info!(
            target: "mate_ext",
            "tig {} with {} reads pulling in {} extra mates",
            tig_id, members.len(), mates.len()
        );

        // Remove the tig's own fragments so the rebuild below can't see
        // them as "already placed" (the mate-extension test is "not in the
        // same unitig", which only makes sense once the unitig is gone).
        tigs.destroy_tig(tig_id);

        extend_one(tig_id, &frags, &mates, reads, overlaps, tigs, graph_erate);
        extended += 1;
    }

    extended
}

fn extend_one<R: ReadInfoProvider, O: OverlapSource>(
    old_tig_id: TigId,
    frags: &HashSet<ReadId>,
    mates: &HashSet<ReadId>,
    reads: &R,
    overlaps: &O,
    tigs: &mut TigVector,
    graph_erate: u32,
) {
    let restricted_reads = RestrictedReads::new(reads, frags);
    let cache = restricted_overlap_cache(overlaps, frags, graph_erate);
    let cfg = BogConfig {
        graph_erate,
        ..BogConfig::default()
    };
    let bog = BestOverlapGraph::build(&restricted_reads, &cache, &cfg);
    let cg = ChunkGraph::build(&bog, restricted_reads.num_reads());

    let mut new_tigs = 0;
    for id in cg.iter() {
        if tigs.index().is_placed(id) || mates.contains(&id) {
            // Already placed, or an additional mate we don't want to seed
            // from (only extend an existing backbone, never start fresh
            // from the newly-added mate).
            continue;
        }
        if populate_unitig(id, &bog, &restricted_reads, tigs).is_some() {
            new_tigs += 1;
        }
    }

    if new_tigs > 1 {
        warn!(
            target: "mate_ext",
            "mate extension split tig {} into {} pieces",
            old_tig_id, new_tigs
        );
    }

    place_contains(&bog, &restricted_reads, tigs);
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
    fn tig_without_unplaced_mates_is_left_alone() {
        let mut reads = InMemoryReadInfo::with_capacity(2);
        reads.set(1, 100, 0, 0);
        reads.set(2, 100, 0, 0);
        let cache = InMemoryOverlapCache::build(vec![ovl(1, 2, 30, 30, 10)], 2);

        let mut tigs = TigVector::new(2);
        let t1 = tigs.create_tig();
        tigs.add_frag(t1, TigPosition::new(1, 0, 100), 0).unwrap();
        tigs.add_frag(t1, TigPosition::new(2, 30, 130), 0).unwrap();
        tigs.sort_tig(t1);

        let extended = extend_by_mates(&reads, &cache, &mut tigs, 1000);
        assert_eq!(extended, 0);
        assert!(tigs.get(t1).is_some());
    }

    #[test]
    fn unplaced_mate_is_pulled_into_the_tig() {
        let mut reads = InMemoryReadInfo::with_capacity(3);
        reads.set(1, 100, 0, 3); // mate of 3
        reads.set(2, 100, 0, 0);
        reads.set(3, 100, 0, 1);
        let overlaps = vec![ovl(1, 2, 30, 30, 10), ovl(2, 3, 40, 40, 10)];
        let cache = InMemoryOverlapCache::build(overlaps, 3);

        let mut tigs = TigVector::new(3);
        let t1 = tigs.create_tig();
        tigs.add_frag(t1, TigPosition::new(1, 0, 100), 0).unwrap();
        tigs.add_frag(t1, TigPosition::new(2, 30, 130), 0).unwrap();
        tigs.sort_tig(t1);

        let extended = extend_by_mates(&reads, &cache, &mut tigs, 1000);
        assert_eq!(extended, 1);
        assert!(tigs.index().is_placed(3), "mate's own read joins a tig");
    }
}
