//! Bubble pop: merge a short tig into a larger one when both of its
//! endpoints' best edges land in the larger tig (spec.md §4.7).

use crate::best_overlap_graph::BestOverlapGraph;
use crate::overlap::OverlapSource;
use crate::placement::{place_read_using_overlaps, PlacementConfig};
use crate::read_info::{ReadId, ReadInfoProvider};
use crate::tig::{TigId, TigPosition, TigVector};
use log::debug;

/// Bubble-pop thresholds (SPEC_FULL.md §4.7 supplement).
#[derive(Debug, Clone)]
pub struct BubblePopConfig {
    pub placement: PlacementConfig,
    pub min_span_ratio: f64,
    pub max_span_ratio: f64,
    pub min_f_coverage: f64,
    /// A single read spanning more than this fraction of the candidate's
    /// length on its own is treated as the whole candidate when checking
    /// per-read placement consistency, rather than requiring every member
    /// independently.
    pub max_single_read_span_fraction: f64,
    /// Error-rate ceiling used when placing candidate reads into the host
    /// (spec.md §6's `-em`), independent of the graph-construction ceiling.
    pub merge_erate: u32,
}

impl Default for BubblePopConfig {
    fn default() -> Self {
        Self {
            placement: PlacementConfig::default(),
            min_span_ratio: 0.5,
            max_span_ratio: 2.0,
            min_f_coverage: 0.99,
            max_single_read_span_fraction: 0.8,
            merge_erate: 1000,
        }
    }
}

/// Attempt to pop every eligible bubble tig into its host. Returns the
/// number of tigs merged away.
pub fn pop_bubbles<R: ReadInfoProvider, O: OverlapSource>(
    bog: &BestOverlapGraph,
    reads: &R,
    overlaps: &O,
    tigs: &mut TigVector,
    cfg: &BubblePopConfig,
) -> usize {
    let mut popped = 0;

    for tig_id in tigs.tig_ids() {
        if tigs.get(tig_id).is_none() {
            // Already merged away by an earlier iteration in this pass.
            continue;
        }
        if let Some(host_id) = find_bubble_host(bog, tigs, tig_id) {
            if try_pop_into(bog, reads, overlaps, tigs, tig_id, host_id, cfg) {
                popped += 1;
            }
        }
    }

    popped
}

/// A candidate's first and last non-contained reads both carry a best edge
/// into the same, different, tig -- the bubble-candidate test (spec.md
/// §4.7 paragraph 1).
fn find_bubble_host(bog: &BestOverlapGraph, tigs: &TigVector, tig_id: TigId) -> Option<TigId> {
    let tig = tigs.get(tig_id)?;
    let first = tig.first_backbone()?;
    let last = tig.last_backbone()?;

    let first_target = external_target(bog, tigs, first, tig_id)?;
    let last_target = external_target(bog, tigs, last, tig_id)?;

    if first_target == last_target {
        Some(first_target)
    } else {
        None
    }
}

/// The tig a read's free-end best edge points into, if that tig differs
/// from the read's own tig.
fn external_target(
    bog: &BestOverlapGraph,
    tigs: &TigVector,
    node: &TigPosition,
    own_tig: TigId,
) -> Option<TigId> {
    // The "free" end is whichever end is not the read's interior-facing
    // side; for a candidate's first/last backbone read, both ends are
    // checked and whichever resolves to an external, placed tig counts.
    for three_prime in [false, true] {
        let edge = bog.best_edge(node.read_id, three_prime);
        if !edge.is_valid() {
            continue;
        }
        let target_tig = tigs.index().tig_of(edge.target_id);
        if target_tig != 0 && target_tig != own_tig {
            return Some(target_tig);
        }
    }
    None
}

fn try_pop_into<R: ReadInfoProvider, O: OverlapSource>(
    bog: &BestOverlapGraph,
    reads: &R,
    overlaps: &O,
    tigs: &mut TigVector,
    candidate_id: TigId,
    host_id: TigId,
    cfg: &BubblePopConfig,
) -> bool {
    let max_evalue = cfg.merge_erate;
    let candidate_length = match tigs.get(candidate_id) {
        Some(t) => t.length(),
        None => return false,
    };
    if candidate_length <= 0 {
        return false;
    }

    let members: Vec<TigPosition> = match tigs.get(candidate_id) {
        Some(t) => t.ufpath.clone(),
        None => return false,
    };

    // Single-read-spans-tig demotion (SPEC_FULL.md §4.7, spec.md §9's open
    // question): if one read already covers most of the candidate on its
    // own, this isn't really a bubble -- skip the pop.
    let max_single_read_span = members
        .iter()
        .filter(|m| m.contained == 0)
        .map(|m| (m.max() - m.min()).max(0))
        .max()
        .unwrap_or(0);
    if max_single_read_span as f64 >= cfg.max_single_read_span_fraction * candidate_length as f64 {
        debug!(
            target: "bubble",
            "tig {} bubble into {} rejected: single read spans {:.2} of candidate length",
            candidate_id, host_id, max_single_read_span as f64 / candidate_length as f64
        );
        return false;
    }

    let first_id = match tigs.get(candidate_id).and_then(|t| t.first_backbone()) {
        Some(n) => n.read_id,
        None => return false,
    };
    let last_id = match tigs.get(candidate_id).and_then(|t| t.last_backbone()) {
        Some(n) => n.read_id,
        None => return false,
    };

    let first_clusters =
        place_read_using_overlaps(first_id, max_evalue, reads, overlaps, tigs, &cfg.placement);
    let last_clusters =
        place_read_using_overlaps(last_id, max_evalue, reads, overlaps, tigs, &cfg.placement);

    let first_host = match crate::placement::best_in_tig(&first_clusters, host_id) {
        Some(c) => c,
        None => return false,
    };
    let last_host = match crate::placement::best_in_tig(&last_clusters, host_id) {
        Some(c) => c,
        None => return false,
    };

    // Orientation consistency: both endpoints must agree on whether the
    // candidate is inserted forward or reversed.
    if first_host.forward != last_host.forward {
        debug!(target: "bubble", "tig {} bubble into {} rejected: orientation mismatch", candidate_id, host_id);
        return false;
    }

    let span = (last_host.end.max(first_host.end) - first_host.begin.min(last_host.begin))
        .abs() as f64;
    let ratio = span / candidate_length as f64;
    if ratio < cfg.min_span_ratio || ratio > cfg.max_span_ratio {
        debug!(target: "bubble", "tig {} bubble into {} rejected: span ratio {:.2}", candidate_id, host_id, ratio);
        return false;
    }

    let window_lo = first_host.begin.min(first_host.end).min(last_host.begin.min(last_host.end));
    let window_hi = first_host.begin.max(first_host.end).max(last_host.begin.max(last_host.end));
    let expansion = (window_hi - window_lo) / 2;
    let window = (window_lo - expansion, window_hi + expansion);

    let mut forward_votes = 0usize;
    let mut reverse_votes = 0usize;
    let mut placements: Vec<TigPosition> = Vec::with_capacity(members.len());

    for member in &members {
        if member.contained != 0 {
            // Contained reads are copied verbatim, positioned relative to
            // their backbone parent below, once the backbone placement is
            // final; skip the independent-placement check for them.
            continue;
        }
        let clusters =
            place_read_using_overlaps(member.read_id, max_evalue, reads, overlaps, tigs, &cfg.placement);
        let in_host = match crate::placement::best_in_tig(&clusters, host_id) {
            Some(c) => c,
            None => {
                debug!(target: "bubble", "tig {} bubble into {} rejected: read {} has no placement in host", candidate_id, host_id, member.read_id);
                return false;
            }
        };
        let within_window = in_host.begin.min(in_host.end) >= window.0
            && in_host.begin.max(in_host.end) <= window.1;
        if in_host.f_coverage < cfg.min_f_coverage || !within_window {
            debug!(target: "bubble", "tig {} bubble into {} rejected: read {} fCoverage {:.3} outside window", candidate_id, host_id, member.read_id, in_host.f_coverage);
            return false;
        }
        if in_host.forward {
            forward_votes += 1;
        } else {
            reverse_votes += 1;
        }
        placements.push(in_host.to_tig_position(member.read_id));
    }

    if forward_votes > 0 && reverse_votes > 0 {
        debug!(target: "bubble", "tig {} bubble into {} rejected: mixed orientation among members", candidate_id, host_id);
        return false;
    }

    // Now re-derive contained reads' positions relative to their (already
    // validated) backbone parent's new placement in the host.
    for member in &members {
        if member.contained == 0 {
            continue;
        }
        let parent_old = members.iter().find(|n| n.read_id == member.contained);
        let parent_new = placements.iter().find(|n| n.read_id == member.contained);
        if let (Some(parent_old), Some(parent_new)) = (parent_old, parent_new) {
            let offset_begin = member.begin - parent_old.begin;
            let offset_end = member.end - parent_old.end;
            let mut node = *member;
            node.begin = parent_new.begin + offset_begin;
            node.end = parent_new.end + offset_end;
            placements.push(node);
        }
    }

    // All checks passed: copy positions into the host (position data only,
    // per spec.md §4.7: do not propagate parent/hang across the merge).
    for node in placements {
        let mut fresh = TigPosition::new(node.read_id, node.begin, node.end);
        fresh.contained = 0;
        if tigs.add_frag(host_id, fresh, 0).is_err() {
            debug!(target: "bubble", "tig {} bubble into {}: add_frag failed mid-merge, aborting copy", candidate_id, host_id);
            return false;
        }
    }

    tigs.sort_tig(host_id);
    tigs.destroy_tig(candidate_id);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::best_overlap_graph::BogConfig;
    use crate::overlap::{InMemoryOverlapCache, Overlap};
    use crate::read_info::InMemoryReadInfo;

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
    fn non_bubble_tig_is_left_alone() {
        let mut reads = InMemoryReadInfo::with_capacity(2);
        reads.set(1, 100, 0, 0);
        reads.set(2, 100, 0, 0);
        let overlaps = vec![ovl(1, 2, 30, 30, 10)];
        let cache = InMemoryOverlapCache::build(overlaps, 2);
        let bog = BestOverlapGraph::build(&reads, &cache, &BogConfig::default());

        let mut tigs = TigVector::new(2);
        let t1 = tigs.create_tig();
        tigs.add_frag(t1, TigPosition::new(1, 0, 100), 0).unwrap();
        let t2 = tigs.create_tig();
        tigs.add_frag(t2, TigPosition::new(2, 0, 100), 0).unwrap();

        let popped = pop_bubbles(&bog, &reads, &cache, &mut tigs, &BubblePopConfig::default());
        assert_eq!(popped, 0);
        assert_eq!(tigs.len(), 2);
    }

    #[test]
    fn single_dominant_read_is_demoted() {
        let mut reads = InMemoryReadInfo::with_capacity(2);
        reads.set(10, 95, 0, 0);
        reads.set(11, 10, 0, 0);
        let cache = InMemoryOverlapCache::build(Vec::new(), 2);
        let bog = BestOverlapGraph::build(&reads, &cache, &BogConfig::default());

        let mut tigs = TigVector::new(2);
        let candidate = tigs.create_tig();
        tigs.add_frag(candidate, TigPosition::new(10, 0, 95), 0).unwrap();
        tigs.add_frag(candidate, TigPosition::new(11, 90, 100), 0).unwrap();
        tigs.sort_tig(candidate);
        let host = tigs.create_tig();

        let popped = try_pop_into(&bog, &reads, &cache, &mut tigs, candidate, host, &BubblePopConfig::default());
        assert!(!popped, "a read spanning 95% of the candidate should demote the pop");
    }
}
