//! Intersection break: split a tig where a read external to it has a best
//! edge pointing in, and the target does not actually overlap where the
//! edge implies (spec.md §4.6).

use crate::best_overlap_graph::BestOverlapGraph;
use crate::read_info::ReadId;
use crate::tig::{TigId, TigPosition, TigVector};
use log::info;
use std::collections::{HashMap, HashSet};

/// Minimum number of supporting reads and minimum break length for an
/// unconfirmed intersection to actually trigger a break (spec.md §4.6).
#[derive(Debug, Clone, Copy)]
pub struct BreakConfig {
    pub min_supporting_reads: usize,
    pub min_break_length: i64,
}

impl Default for BreakConfig {
    fn default() -> Self {
        Self {
            min_supporting_reads: 1,
            min_break_length: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakSide {
    Five,
    Three,
    Both,
}

/// Run one intersection-break pass over every tig, returning the number of
/// tigs split (new tigs are created in place of the originals; the
/// originals are destroyed).
pub fn break_intersections(
    bog: &BestOverlapGraph,
    tigs: &mut TigVector,
    cfg: &BreakConfig,
) -> usize {
    // For each read found to be the target of an unconfirmed edge, which
    // end(s) of it the edge(s) arrive at, and how many distinct reads
    // support breaking there.
    let mut incoming: HashMap<ReadId, (HashSet<ReadId>, HashSet<ReadId>)> = HashMap::new();

    // First pass: find every intersection point (a best edge crossing into
    // a different tig, or into the same tig but not actually adjacent).
    for tig_id in tigs.tig_ids() {
        let tig = match tigs.get(tig_id) {
            Some(t) => t,
            None => continue,
        };
        for node in &tig.ufpath {
            if node.contained != 0 {
                continue;
            }
            for three_prime in [false, true] {
                let edge = bog.best_edge(node.read_id, three_prime);
                if !edge.is_valid() {
                    continue;
                }
                let target_tig = tigs.index().tig_of(edge.target_id);
                if target_tig == 0 {
                    continue;
                }
                let confirmed = target_tig == tig_id && physically_overlaps(tig, node, edge.target_id);
                if !confirmed {
                    let entry = incoming.entry(edge.target_id).or_default();
                    if edge.target_three_prime {
                        entry.1.insert(node.read_id);
                    } else {
                        entry.0.insert(node.read_id);
                    }
                }
            }
        }
    }

    let mut break_points: HashMap<TigId, HashMap<ReadId, (bool, bool)>> = HashMap::new();
    for (target_read, (five_supporters, three_supporters)) in &incoming {
        let tig_id = tigs.index().tig_of(*target_read);
        if tig_id == 0 {
            continue;
        }
        let tig = tigs.get(tig_id).unwrap();
        if tig.length() < cfg.min_break_length {
            continue;
        }
        let breaks_five = five_supporters.len() >= cfg.min_supporting_reads;
        let breaks_three = three_supporters.len() >= cfg.min_supporting_reads;
        if !breaks_five && !breaks_three {
            continue;
        }
        break_points
            .entry(tig_id)
            .or_default()
            .insert(*target_read, (breaks_five, breaks_three));
    }

    let mut num_broken = 0;
    for (tig_id, points) in break_points {
        if split_tig_at(tig_id, &points, tigs) {
            num_broken += 1;
        }
    }

    if num_broken > 0 {
        info!(target: "split", "intersection break: split {} tigs", num_broken);
    }

    num_broken
}

fn physically_overlaps(
    tig: &crate::tig::Tig,
    node: &TigPosition,
    target_read: ReadId,
) -> bool {
    match tig.position_of(target_read) {
        Some(target) => node_overlaps(node, target),
        None => false,
    }
}

fn node_overlaps(a: &TigPosition, b: &TigPosition) -> bool {
    a.min() < b.max() && b.min() < a.max()
}

/// Break `tig_id` at every read in `break_points`, classifying each
/// breakpoint read by which of its ends is unconfirmed:
/// - break both ends -> the read becomes a singleton.
/// - break 5' only -> the read starts a new tig.
/// - break 3' only -> the read ends the current tig.
///
/// Contained reads are dropped from the tig and left for the subsequent
/// containment-placement pass.
fn split_tig_at(
    tig_id: TigId,
    break_points: &HashMap<ReadId, (bool, bool)>,
    tigs: &mut TigVector,
) -> bool {
    let path = tigs.take_tig_path(tig_id);
    if path.is_empty() {
        return false;
    }

    // Sort by min position to walk in layout order.
    let mut path = path;
    path.sort_by_key(|n| n.min());

    let mut segments: Vec<Vec<TigPosition>> = vec![Vec::new()];
    let mut deferred_contains: Vec<TigPosition> = Vec::new();

    for node in path {
        if node.contained != 0 {
            deferred_contains.push(node);
            continue;
        }

        let side = match break_points.get(&node.read_id) {
            Some((true, true)) => Some(BreakSide::Both),
            Some((true, false)) => Some(BreakSide::Five),
            Some((false, true)) => Some(BreakSide::Three),
            _ => None,
        };

        match side {
            Some(BreakSide::Both) => {
                segments.push(vec![node]);
                segments.push(Vec::new());
            }
            Some(BreakSide::Five) => {
                segments.push(vec![node]);
            }
            Some(BreakSide::Three) => {
                segments.last_mut().unwrap().push(node);
                segments.push(Vec::new());
            }
            None => {
                segments.last_mut().unwrap().push(node);
            }
        }
    }

    segments.retain(|s| !s.is_empty());
    if segments.len() <= 1 {
        // Nothing to do; put the single segment (plus contains, best effort)
        // back as a fresh tig to avoid losing reads.
        let new_id = tigs.create_tig();
        for node in segments.into_iter().flatten() {
            let min = node.min();
            let _ = tigs.add_frag(new_id, node, -min.min(0));
        }
        tigs.sort_tig(new_id);
        return false;
    }

    for segment in segments {
        let new_id = tigs.create_tig();
        let base = segment.iter().map(|n| n.min()).min().unwrap_or(0);
        for node in segment {
            let offset = -base;
            let _ = tigs.add_frag(new_id, node, offset);
        }
        tigs.sort_tig(new_id);
    }

    // Contained reads are simply dropped (their global index entry was
    // already cleared by take_tig_path); they fall through to the next
    // containment-placement pass, per spec.md §4.6.
    drop(deferred_contains);

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::best_overlap_graph::BogConfig;
    use crate::best_overlap_graph::BestOverlapGraph;
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
    fn confirmed_edge_does_not_break() {
        let mut reads = InMemoryReadInfo::with_capacity(2);
        reads.set(1, 100, 0, 0);
        reads.set(2, 100, 0, 0);
        let overlaps = vec![ovl(1, 2, 30, 30)];
        let cache = InMemoryOverlapCache::build(overlaps, 2);
        let bog = BestOverlapGraph::build(&reads, &cache, &BogConfig::default());

        let mut tigs = TigVector::new(2);
        let t1 = tigs.create_tig();
        tigs.add_frag(t1, TigPosition::new(1, 0, 100), 0).unwrap();
        tigs.add_frag(t1, TigPosition::new(2, 30, 130), 0).unwrap();
        tigs.sort_tig(t1);

        let broken = break_intersections(&bog, &mut tigs, &BreakConfig::default());
        assert_eq!(broken, 0);
        assert_eq!(tigs.len(), 1);
    }
}
