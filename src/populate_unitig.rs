//! Seed-and-extend a unitig by following best edges (spec.md §4.3).

use crate::best_overlap_graph::{BestEdgeOverlap, BestOverlapGraph};
use crate::read_info::{ReadId, ReadInfoProvider};
use crate::tig::{TigId, TigPosition, TigVector};
use log::{debug, warn};

/// Compute the target read's tig placement given the current read's
/// existing placement and the best edge between them.
///
/// `current_is_three_prime` records which end of `current` the edge was
/// looked up from; together with `edge.target_three_prime` it recovers
/// whether the target is flipped relative to current, since
/// `BestEdgeOverlap` does not store the overlap's `flipped` bit directly
/// (it is folded into `target_three_prime` at BOG construction time).
fn place_target(
    current: &TigPosition,
    current_is_three_prime: bool,
    a_length: u32,
    edge: &BestEdgeOverlap,
) -> TigPosition {
    let flipped = edge.target_three_prime == current_is_three_prime;
    let a_hang = edge.a_hang as i64;
    let b_hang = edge.b_hang as i64;
    let a_length = a_length as i64;

    let dir: i64 = if current.begin < current.end { 1 } else { -1 };
    let a5 = current.begin;

    let (b5_local, b3_local) = if !flipped {
        (a_hang, a_length + b_hang)
    } else {
        (a_length + b_hang, a_hang)
    };

    let b5_tig = a5 + dir * b5_local;
    let b3_tig = a5 + dir * b3_local;

    let mut node = TigPosition::new(edge.target_id, b5_tig, b3_tig);
    node.parent = current.read_id;
    node.a_hang = edge.a_hang;
    node.b_hang = edge.b_hang;
    node
}

/// Seed a new tig at `seed_id` and extend it in both directions along best
/// edges. Returns the new tig's id, or `None` if the seed was already
/// placed.
pub fn populate_unitig<R: ReadInfoProvider>(
    seed_id: ReadId,
    bog: &BestOverlapGraph,
    reads: &R,
    tigs: &mut TigVector,
) -> Option<TigId> {
    if tigs.index().is_placed(seed_id) {
        return None;
    }

    let tig_id = tigs.create_tig();
    let seed_length = reads.read_length(seed_id);
    tigs.add_frag(tig_id, TigPosition::new(seed_id, 0, seed_length as i64), 0)
        .expect("seed placement at (0, length) is always valid");

    extend(tig_id, seed_id, true, bog, reads, tigs);
    extend(tig_id, seed_id, false, bog, reads, tigs);

    if let Some(tig) = tigs.get_mut(tig_id) {
        tig.ensure_sorted();
    }
    tigs.reindex_tig(tig_id);

    Some(tig_id)
}

/// Extend `tig_id` off the end of `from_read` corresponding to
/// `extend_three_prime`, appending placements until no edge remains or the
/// target is already placed elsewhere (an intersection, logged and left for
/// a later phase).
fn extend<R: ReadInfoProvider>(
    tig_id: TigId,
    from_read: ReadId,
    extend_three_prime: bool,
    bog: &BestOverlapGraph,
    reads: &R,
    tigs: &mut TigVector,
) {
    let mut current_read = from_read;
    let mut current_is_three_prime = extend_three_prime;

    loop {
        let edge = bog.best_edge(current_read, current_is_three_prime);
        if !edge.is_valid() {
            break;
        }

        if tigs.index().is_placed(edge.target_id) {
            debug!(
                target: "placement",
                "populateUnitig: read {} end {} meets already-placed read {} (intersection)",
                current_read, current_is_three_prime, edge.target_id
            );
            break;
        }

        let current_pos = match tigs.get(tig_id).and_then(|t| t.position_of(current_read)) {
            Some(p) => *p,
            None => {
                warn!(target: "placement", "lost track of read {} while extending", current_read);
                break;
            }
        };

        let a_length = reads.read_length(current_read);
        let placed = place_target(&current_pos, current_is_three_prime, a_length, &edge);

        let shifted = {
            let tig = tigs.get_mut(tig_id).expect("tig exists");
            tig.shift_to_nonnegative(placed)
        };

        if let Err(e) = tigs.add_frag(tig_id, shifted, 0) {
            warn!(target: "placement", "failed to extend tig {} onto read {}: {}", tig_id, edge.target_id, e);
            break;
        }

        // Continue from the target's far end.
        current_read = edge.target_id;
        current_is_three_prime = !edge.target_three_prime;
    }
}

/// Sweep every read in ascending order and seed a singleton tig for any
/// still unplaced (spec.md §2 step 3's "sweep all reads for any still
/// unplaced").
pub fn sweep_unplaced<R: ReadInfoProvider>(
    bog: &BestOverlapGraph,
    reads: &R,
    tigs: &mut TigVector,
) -> usize {
    let mut seeded = 0;
    for id in 1..=reads.num_reads() {
        if tigs.index().is_placed(id) || bog.is_contained(id) {
            continue;
        }
        if populate_unitig(id, bog, reads, tigs).is_some() {
            seeded += 1;
        }
    }
    seeded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::best_overlap_graph::BogConfig;
    use crate::overlap::{InMemoryOverlapCache, Overlap};
    use crate::read_info::InMemoryReadInfo;

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
    fn scenario_a_three_read_chain() {
        let mut reads = InMemoryReadInfo::with_capacity(3);
        reads.set(1, 100, 0, 0);
        reads.set(2, 100, 0, 0);
        reads.set(3, 100, 0, 0);
        let overlaps = vec![ovl(1, 2, 30, 30), ovl(2, 3, 40, 40)];
        let cache = InMemoryOverlapCache::build(overlaps, 3);
        let bog = BestOverlapGraph::build(&reads, &cache, &BogConfig::default());

        let mut tigs = TigVector::new(3);
        let tig_id = populate_unitig(1, &bog, &reads, &mut tigs).unwrap();

        let tig = tigs.get(tig_id).unwrap();
        assert_eq!(tig.length(), 170);
        assert_eq!(tig.num_reads(), 3);

        let p1 = tig.position_of(1).unwrap();
        let p2 = tig.position_of(2).unwrap();
        let p3 = tig.position_of(3).unwrap();
        assert_eq!((p1.begin, p1.end), (0, 100));
        assert_eq!((p2.begin, p2.end), (30, 130));
        assert_eq!((p3.begin, p3.end), (70, 170));

        tigs.check_invariants().unwrap();
    }

    #[test]
    fn already_placed_seed_is_skipped() {
        let reads = InMemoryReadInfo::with_capacity(1);
        let cache = InMemoryOverlapCache::build(vec![], 1);
        let bog = BestOverlapGraph::build(&reads, &cache, &BogConfig::default());
        let mut tigs = TigVector::new(1);
        populate_unitig(1, &bog, &reads, &mut tigs);
        assert!(populate_unitig(1, &bog, &reads, &mut tigs).is_none());
    }
}
