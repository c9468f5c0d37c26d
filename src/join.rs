//! Join: stitch two tigs together across a confirmed mutual best edge at
//! their free ends (spec.md §4.8).
//!
//! Gated behind `PipelineConfig::enable_join` (default off) per spec.md §9's
//! open question that joining is optional in practice.

use crate::best_overlap_graph::BestOverlapGraph;
use crate::overlap::OverlapSource;
use crate::placement::{best_in_tig, place_read_using_overlaps, PlacementConfig};
use crate::read_info::{ReadId, ReadInfoProvider};
use crate::tig::{TigId, TigVector};
use log::{debug, info};

#[derive(Debug, Clone)]
pub struct JoinConfig {
    pub placement: PlacementConfig,
    /// Error-rate ceiling used when placing the partner's joining read into
    /// the host (spec.md §6's `-em`).
    pub merge_erate: u32,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            placement: PlacementConfig::default(),
            merge_erate: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct JoinCandidate {
    host_tig: TigId,
    host_read: ReadId,
    host_three_prime: bool,
    partner_tig: TigId,
    partner_read: ReadId,
    partner_three_prime: bool,
    expected_merged_length: i64,
}

/// The free end of a tig's first backbone read: whichever end is not
/// interior-facing. See spec.md §3's begin(5')/end(3') convention.
fn first_free_end(tigs: &TigVector, tig_id: TigId) -> Option<(ReadId, bool)> {
    let node = tigs.get(tig_id)?.first_backbone()?;
    Some((node.read_id, node.is_reverse()))
}

/// The free end of a tig's last backbone read.
fn last_free_end(tigs: &TigVector, tig_id: TigId) -> Option<(ReadId, bool)> {
    let node = tigs.get(tig_id)?.last_backbone()?;
    Some((node.read_id, !node.is_reverse()))
}

/// Find every join candidate across all tigs (spec.md §4.8 paragraph 1).
fn find_candidates(bog: &BestOverlapGraph, tigs: &TigVector) -> Vec<JoinCandidate> {
    let mut candidates = Vec::new();
    let mut seen_pairs = std::collections::HashSet::new();

    for tig_id in tigs.tig_ids() {
        for (host_read, host_three_prime) in [first_free_end(tigs, tig_id), last_free_end(tigs, tig_id)]
            .into_iter()
            .flatten()
        {
            let edge = bog.best_edge(host_read, host_three_prime);
            if !edge.is_valid() {
                continue;
            }
            let partner_tig = tigs.index().tig_of(edge.target_id);
            if partner_tig == 0 || partner_tig == tig_id {
                continue;
            }
            let partner_first = first_free_end(tigs, partner_tig);
            let partner_last = last_free_end(tigs, partner_tig);
            let matches_partner_end = |end: Option<(ReadId, bool)>| {
                end.map(|(r, tp)| r == edge.target_id && tp == edge.target_three_prime)
                    .unwrap_or(false)
            };
            if !matches_partner_end(partner_first) && !matches_partner_end(partner_last) {
                continue;
            }

            let pair_key = if tig_id < partner_tig {
                (tig_id, partner_tig)
            } else {
                (partner_tig, tig_id)
            };
            if !seen_pairs.insert(pair_key) {
                continue;
            }

            let host_len = tigs.get(tig_id).map(|t| t.length()).unwrap_or(0);
            let partner_len = tigs.get(partner_tig).map(|t| t.length()).unwrap_or(0);
            let overlap_estimate = (edge.a_hang.abs().max(edge.b_hang.abs())) as i64;
            let expected_merged_length = (host_len + partner_len - overlap_estimate).max(host_len.max(partner_len));

            candidates.push(JoinCandidate {
                host_tig: tig_id,
                host_read,
                host_three_prime,
                partner_tig,
                partner_read: edge.target_id,
                partner_three_prime: edge.target_three_prime,
                expected_merged_length,
            });
        }
    }

    candidates.sort_by_key(|c| std::cmp::Reverse(c.expected_merged_length));
    candidates
}

/// Run one join pass over every confirmed candidate, returning the number
/// of tig pairs merged.
pub fn join_tigs<R: ReadInfoProvider, O: OverlapSource>(
    bog: &BestOverlapGraph,
    reads: &R,
    overlaps: &O,
    tigs: &mut TigVector,
    cfg: &JoinConfig,
) -> usize {
    let candidates = find_candidates(bog, tigs);
    let mut joined = 0;

    for candidate in candidates {
        if try_join(bog, reads, overlaps, tigs, &candidate, cfg) {
            joined += 1;
        }
    }

    if joined > 0 {
        info!(target: "join", "joined {} tig pairs", joined);
    }
    joined
}

fn try_join<R: ReadInfoProvider, O: OverlapSource>(
    bog: &BestOverlapGraph,
    reads: &R,
    overlaps: &O,
    tigs: &mut TigVector,
    candidate: &JoinCandidate,
    cfg: &JoinConfig,
) -> bool {
    if tigs.get(candidate.host_tig).is_none() || tigs.get(candidate.partner_tig).is_none() {
        return false;
    }

    // Re-confirm mutuality: both best edges still point at each other's
    // recorded end (spec.md §4.8: "confirm... the edge is still mutual").
    let host_edge = bog.best_edge(candidate.host_read, candidate.host_three_prime);
    let partner_edge = bog.best_edge(candidate.partner_read, candidate.partner_three_prime);
    if host_edge.target_id != candidate.partner_read
        || host_edge.target_three_prime != candidate.partner_three_prime
        || partner_edge.target_id != candidate.host_read
        || partner_edge.target_three_prime != candidate.host_three_prime
    {
        debug!(
            target: "join",
            "candidate {} <-> {} no longer mutual, skipping",
            candidate.host_tig, candidate.partner_tig
        );
        return false;
    }

    // Reverse-complement the partner if its joining read currently sits at
    // the far end rather than the near (position-0) end, so the attaching
    // read becomes the partner's new first backbone.
    let partner_is_last = tigs
        .get(candidate.partner_tig)
        .and_then(|t| t.last_backbone())
        .map(|n| n.read_id == candidate.partner_read)
        .unwrap_or(false);
    let partner_is_first = tigs
        .get(candidate.partner_tig)
        .and_then(|t| t.first_backbone())
        .map(|n| n.read_id == candidate.partner_read)
        .unwrap_or(false);
    if partner_is_last && !partner_is_first {
        if let Some(t) = tigs.get_mut(candidate.partner_tig) {
            t.reverse_complement();
        }
        tigs.reindex_tig(candidate.partner_tig);
    }

    let partner_old_pos = match tigs
        .get(candidate.partner_tig)
        .and_then(|t| t.position_of(candidate.partner_read))
    {
        Some(p) => *p,
        None => return false,
    };

    let max_evalue = cfg.merge_erate;
    let clusters = place_read_using_overlaps(
        candidate.partner_read,
        max_evalue,
        reads,
        overlaps,
        tigs,
        &cfg.placement,
    );
    let in_host = match best_in_tig(&clusters, candidate.host_tig) {
        Some(c) => c,
        None => {
            debug!(
                target: "join",
                "candidate {} <-> {}: partner read {} could not be placed in host",
                candidate.host_tig, candidate.partner_tig, candidate.partner_read
            );
            return false;
        }
    };

    let offset = in_host.begin.min(in_host.end) - partner_old_pos.min();

    let partner_path = tigs.take_tig_path(candidate.partner_tig);
    for mut node in partner_path {
        node.begin += offset;
        node.end += offset;
        if tigs.add_frag(candidate.host_tig, node, 0).is_err() {
            debug!(
                target: "join",
                "candidate {} <-> {}: add_frag failed mid-join, some reads may be lost",
                candidate.host_tig, candidate.partner_tig
            );
            return false;
        }
    }

    tigs.sort_tig(candidate.host_tig);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::best_overlap_graph::{BestOverlapGraph, BogConfig};
    use crate::overlap::{InMemoryOverlapCache, Overlap};
    use crate::read_info::InMemoryReadInfo;
    use crate::tig::TigPosition;

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
    fn joins_two_tigs_on_mutual_dovetail() {
        let mut reads = InMemoryReadInfo::with_capacity(2);
        reads.set(1, 100, 0, 0);
        reads.set(2, 100, 0, 0);
        let overlaps = vec![ovl(1, 2, 30, 30)];
        let cache = InMemoryOverlapCache::build(overlaps, 2);
        let bog = BestOverlapGraph::build(&reads, &cache, &BogConfig::default());

        let mut tigs = TigVector::new(2);
        let t1 = tigs.create_tig();
        tigs.add_frag(t1, TigPosition::new(1, 0, 100), 0).unwrap();
        let t2 = tigs.create_tig();
        tigs.add_frag(t2, TigPosition::new(2, 0, 100), 0).unwrap();

        let joined = join_tigs(&bog, &reads, &cache, &mut tigs, &JoinConfig::default());
        assert_eq!(joined, 1);
        assert_eq!(tigs.len(), 1);
    }

    #[test]
    fn no_candidate_when_edges_stay_inside_one_tig() {
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

        let joined = join_tigs(&bog, &reads, &cache, &mut tigs, &JoinConfig::default());
        assert_eq!(joined, 0);
    }
}
