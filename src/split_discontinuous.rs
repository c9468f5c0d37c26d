//! Split-discontinuous: break a tig wherever consecutive backbone reads
//! fail to overlap by at least `min_overlap` bases (spec.md §4.9).

use crate::tig::{TigId, TigPosition, TigVector};
use log::info;

#[derive(Debug, Clone, Copy)]
pub struct SplitConfig {
    pub min_overlap: i64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { min_overlap: 0 }
    }
}

/// Run one split pass over every tig. Returns the number of tigs that were
/// broken into two or more pieces.
pub fn split_discontinuous(tigs: &mut TigVector, cfg: &SplitConfig) -> usize {
    let mut split_count = 0;

    for tig_id in tigs.tig_ids() {
        if split_one(tig_id, tigs, cfg) {
            split_count += 1;
        }
    }

    if split_count > 0 {
        info!(target: "split", "split-discontinuous: broke {} tigs", split_count);
    }
    split_count
}

fn split_one(tig_id: TigId, tigs: &mut TigVector, cfg: &SplitConfig) -> bool {
    let has_gap = match tigs.get(tig_id) {
        Some(tig) => has_any_gap(tig, cfg),
        None => return false,
    };
    if !has_gap {
        return false;
    }

    let mut path = tigs.take_tig_path(tig_id);
    path.sort_by_key(|n| n.min());

    let mut segments: Vec<Vec<TigPosition>> = vec![Vec::new()];
    let mut running_max = i64::MIN;

    for node in path {
        if node.contained != 0 {
            // Contained reads that would straddle a split are dropped here
            // and re-placed by the subsequent contain-placement pass
            // (spec.md §4.9).
            continue;
        }
        if running_max != i64::MIN && node.min() > running_max - cfg.min_overlap {
            segments.push(Vec::new());
        }
        running_max = running_max.max(node.max());
        segments.last_mut().unwrap().push(node);
    }

    segments.retain(|s| !s.is_empty());
    for segment in segments {
        let new_id = tigs.create_tig();
        let base = segment.iter().map(|n| n.min()).min().unwrap_or(0);
        for node in segment {
            let _ = tigs.add_frag(new_id, node, -base);
        }
        tigs.sort_tig(new_id);
    }

    true
}

/// Walks backbone reads in ufpath order tracking the running maximum end
/// coordinate; a gap exists when the next read's min exceeds
/// `running_max - min_overlap` (spec.md §4.9).
fn has_any_gap(tig: &crate::tig::Tig, cfg: &SplitConfig) -> bool {
    let mut backbone: Vec<&TigPosition> = tig.ufpath.iter().filter(|n| n.contained == 0).collect();
    backbone.sort_by_key(|n| n.min());

    let mut running_max = i64::MIN;
    for node in backbone {
        if running_max != i64::MIN && node.min() > running_max - cfg.min_overlap {
            return true;
        }
        running_max = running_max.max(node.max());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_a_real_gap() {
        let mut tigs = TigVector::new(4);
        let t1 = tigs.create_tig();
        tigs.add_frag(t1, TigPosition::new(1, 0, 100), 0).unwrap();
        tigs.add_frag(t1, TigPosition::new(2, 200, 300), 0).unwrap();
        tigs.sort_tig(t1);

        let n = split_discontinuous(&mut tigs, &SplitConfig::default());
        assert_eq!(n, 1);
        assert_eq!(tigs.len(), 2);
        for id in tigs.tig_ids() {
            tigs.check_invariants().unwrap();
            let tig = tigs.get(id).unwrap();
            assert_eq!(tig.num_reads(), 1);
        }
    }

    #[test]
    fn no_gap_leaves_tig_untouched() {
        let mut tigs = TigVector::new(4);
        let t1 = tigs.create_tig();
        tigs.add_frag(t1, TigPosition::new(1, 0, 100), 0).unwrap();
        tigs.add_frag(t1, TigPosition::new(2, 30, 130), 0).unwrap();
        tigs.sort_tig(t1);

        let n = split_discontinuous(&mut tigs, &SplitConfig::default());
        assert_eq!(n, 0);
        assert_eq!(tigs.len(), 1);
    }

    #[test]
    fn second_pass_on_settled_input_is_a_no_op() {
        let mut tigs = TigVector::new(4);
        let t1 = tigs.create_tig();
        tigs.add_frag(t1, TigPosition::new(1, 0, 100), 0).unwrap();
        tigs.add_frag(t1, TigPosition::new(2, 200, 300), 0).unwrap();
        tigs.sort_tig(t1);

        split_discontinuous(&mut tigs, &SplitConfig::default());
        let tig_count_after_first = tigs.len();
        let n = split_discontinuous(&mut tigs, &SplitConfig::default());
        assert_eq!(n, 0);
        assert_eq!(tigs.len(), tig_count_after_first);
    }
}
