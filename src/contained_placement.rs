//! Contained-read placement: insert every contained read into its
//! container's tig at the position implied by the containment hangs
//! (spec.md §4.5).

use crate::best_overlap_graph::BestOverlapGraph;
use crate::read_info::{ReadId, ReadInfoProvider};
use crate::tig::{TigId, TigPosition, TigVector};
use log::{debug, warn};

/// Containment chains deeper than this are assumed to be cyclic ("zombie")
/// reads (spec.md §9) and are promoted to singletons instead of placed.
pub const MAX_CONTAINMENT_DEPTH: u32 = 100;

/// Compute C's placement inside container K's tig, given K's current
/// position and the stored containment hangs.
fn place_contained(container_pos: &TigPosition, bc: &crate::best_overlap_graph::BestContainment, c_id: ReadId) -> TigPosition {
    let dir: i64 = if container_pos.begin < container_pos.end {
        1
    } else {
        -1
    };
    let k5 = container_pos.begin;
    let k_length = (container_pos.end - container_pos.begin).abs();

    let a_hang = bc.a_hang as i64;
    let b_hang = bc.b_hang as i64;

    // bc.a_hang/b_hang were recorded with the container as "A" (spec.md
    // §3's BestContainment: hangs are relative to the container).
    let (c5_local, c3_local) = if bc.same_orientation {
        (a_hang, k_length + b_hang)
    } else {
        (k_length + b_hang, a_hang)
    };

    let c5_tig = k5 + dir * c5_local;
    let c3_tig = k5 + dir * c3_local;

    let mut node = TigPosition::new(c_id, c5_tig, c3_tig);
    node.parent = container_pos.read_id;
    node.a_hang = bc.a_hang;
    node.b_hang = bc.b_hang;
    node.contained = container_pos.read_id;
    node
}

/// Attempt to place every contained read whose container is already
/// placed. Returns `(placed_count, deferred)`, where `deferred` lists reads
/// whose container isn't placed yet (spec.md: "defer C to a later pass").
pub fn place_contains<R: ReadInfoProvider>(
    bog: &BestOverlapGraph,
    reads: &R,
    tigs: &mut TigVector,
) -> (usize, Vec<ReadId>) {
    let mut placed = 0;
    let mut deferred = Vec::new();
    let mut touched_tigs: Vec<TigId> = Vec::new();

    for c_id in 1..=reads.num_reads() {
        let bc = bog.best_containment(c_id);
        if !bc.is_contained {
            continue;
        }
        if tigs.index().is_placed(c_id) {
            continue;
        }

        let container_tig_id = tigs.index().tig_of(bc.container);
        if container_tig_id == 0 {
            deferred.push(c_id);
            continue;
        }

        let container_depth = tigs
            .get(container_tig_id)
            .and_then(|t| t.position_of(bc.container))
            .map(|p| p.containment_depth)
            .unwrap_or(0);

        if container_depth + 1 > MAX_CONTAINMENT_DEPTH {
            warn!(
                target: "placement",
                "read {} containment depth exceeds cap via container {}; treating as zombie",
                c_id, bc.container
            );
            deferred.push(c_id);
            continue;
        }

        let container_pos = match tigs
            .get(container_tig_id)
            .and_then(|t| t.position_of(bc.container))
        {
            Some(p) => *p,
            None => {
                deferred.push(c_id);
                continue;
            }
        };

        let mut node = place_contained(&container_pos, &bc, c_id);
        node.containment_depth = container_depth + 1;

        let min_pos = node.min();
        if min_pos < 0 || node.max() > tigs.get(container_tig_id).unwrap().length() {
            debug!(
                target: "placement",
                "contained read {} placement out of container {} bounds, deferring",
                c_id, bc.container
            );
            deferred.push(c_id);
            continue;
        }

        if tigs.add_frag(container_tig_id, node, 0).is_ok() {
            placed += 1;
            touched_tigs.push(container_tig_id);
        } else {
            deferred.push(c_id);
        }
    }

    touched_tigs.sort_unstable();
    touched_tigs.dedup();
    for tig_id in touched_tigs {
        tigs.sort_tig(tig_id);
    }

    (placed, deferred)
}

/// Promote every still-unplaced, non-contained read to its own singleton
/// tig (spec.md §4.5's fallback, gated by `enable_singleton_promotion`
/// i.e. the inverse of the CLI's `-DP` disallow-singleton-promotion flag).
pub fn promote_to_singletons<R: ReadInfoProvider>(
    reads: &R,
    tigs: &mut TigVector,
    enable: bool,
) -> usize {
    if !enable {
        return 0;
    }
    let mut promoted = 0;
    for id in 1..=reads.num_reads() {
        if tigs.index().is_placed(id) {
            continue;
        }
        let tig_id = tigs.create_tig();
        let length = reads.read_length(id);
        if tigs
            .add_frag(tig_id, TigPosition::new(id, 0, length as i64), 0)
            .is_ok()
        {
            promoted += 1;
        }
    }
    promoted
}
