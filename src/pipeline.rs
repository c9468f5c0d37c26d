//! Top-level orchestration: the nine-step pipeline from spec.md §2.

use crate::best_overlap_graph::BestOverlapGraph;
use crate::bubble_pop::pop_bubbles;
use crate::chunk_graph::ChunkGraph;
use crate::config::PipelineConfig;
use crate::contained_placement::{place_contains, promote_to_singletons};
use crate::error::{FailureTally, Result};
use crate::extend_by_mates::extend_by_mates;
use crate::intersection_break::break_intersections;
use crate::join::join_tigs;
use crate::overlap::OverlapSource;
use crate::populate_unitig::{populate_unitig, sweep_unplaced};
use crate::read_info::ReadInfoProvider;
use crate::reconstruct_repeats::{reconstruct_repeats, shatter_repeat_tigs};
use crate::split_discontinuous::split_discontinuous;
use crate::tig::TigVector;
use log::info;

/// Everything a completed run reports back to the caller (spec.md §7's
/// propagation policy: the store is emitted regardless of failure counts).
pub struct PipelineReport {
    pub tigs: TigVector,
    pub failures: FailureTally,
}

/// Run the full nine-step pipeline (spec.md §2) over an already-loaded read
/// set and overlap source.
pub fn run<R: ReadInfoProvider, O: OverlapSource>(
    reads: &R,
    overlaps: &O,
    cfg: &PipelineConfig,
) -> Result<PipelineReport> {
    let mut failures = FailureTally::new();

    info!("step 1/9: building best overlap graph");
    let bog = BestOverlapGraph::build(reads, overlaps, &cfg.bog);

    info!("step 2/9: building chunk graph");
    let cg = ChunkGraph::build(&bog, reads.num_reads());

    info!("step 3/9: seeding and populating unitigs");
    let mut tigs = TigVector::new(reads.num_reads());
    let mut seeded = 0;
    for read_id in cg.iter() {
        if populate_unitig(read_id, &bog, reads, &mut tigs).is_some() {
            seeded += 1;
        }
    }
    let swept = sweep_unplaced(&bog, reads, &mut tigs);
    info!(
        "step 3/9: seeded {} tigs from chunk-graph order, {} more from the unplaced sweep",
        seeded, swept
    );

    info!("step 4/9: placing contained reads");
    let (placed, deferred) = place_contains(&bog, reads, &mut tigs);
    failures.placement_failures += deferred.len() as u64;
    info!("step 4/9: placed {} contained reads, deferred {}", placed, deferred.len());

    info!("step 5/9: popping bubbles");
    let popped = pop_bubbles(&bog, reads, overlaps, &mut tigs, &cfg.bubble_pop);
    info!("step 5/9: popped {} bubble tigs", popped);

    info!("step 6/9: breaking intersections, placing contains, joining, placing contains");
    let broken = break_intersections(&bog, &mut tigs, &cfg.break_cfg);
    info!("step 6/9: broke {} tigs at unconfirmed intersections", broken);
    let (placed, deferred) = place_contains(&bog, reads, &mut tigs);
    failures.placement_failures += deferred.len() as u64;
    debug_placed(placed, deferred.len());

    if cfg.enable_join {
        let joined = join_tigs(&bog, reads, overlaps, &mut tigs, &cfg.join);
        info!("step 6/9: joined {} tig pairs", joined);
    } else {
        info!("step 6/9: join disabled (PipelineConfig::enable_join = false)");
    }
    let (placed, deferred) = place_contains(&bog, reads, &mut tigs);
    failures.placement_failures += deferred.len() as u64;
    debug_placed(placed, deferred.len());

    info!("step 7/9: split discontinuous, move contains, split, move, split");
    for _ in 0..3 {
        let split = split_discontinuous(&mut tigs, &cfg.split);
        let (placed, deferred) = place_contains(&bog, reads, &mut tigs);
        failures.placement_failures += deferred.len() as u64;
        info!(
            "step 7/9: split {} tigs this pass, re-placed {} contains, deferred {}",
            split, placed, deferred.len()
        );
    }

    if cfg.switches.shatter_repeats
        && (cfg.switches.enable_repeat_reconstruction || cfg.switches.enable_mate_extension)
    {
        let shattered = shatter_repeat_tigs(&bog, &mut tigs);
        info!("step 7/9: shattered {} repeat-like tigs (-SR)", shattered);
    }

    if cfg.switches.enable_mate_extension {
        let extended = extend_by_mates(reads, overlaps, &mut tigs, cfg.bog.graph_erate);
        info!("step 7/9: mate extension touched {} tigs (-E)", extended);
        let (placed, deferred) = place_contains(&bog, reads, &mut tigs);
        failures.placement_failures += deferred.len() as u64;
        debug_placed(placed, deferred.len());
    }

    if cfg.switches.enable_repeat_reconstruction {
        let seeded = reconstruct_repeats(reads, overlaps, &mut tigs, cfg.bog.graph_erate);
        info!("step 7/9: repeat reconstruction seeded {} tigs (-R)", seeded);
        let (placed, deferred) = place_contains(&bog, reads, &mut tigs);
        failures.placement_failures += deferred.len() as u64;
        debug_placed(placed, deferred.len());
    }

    info!("step 8/9: parent/hang annotations already carried on each placement");

    info!("step 9/9: finalising unplaced reads");
    let promoted = promote_to_singletons(
        reads,
        &mut tigs,
        !cfg.switches.disallow_singleton_promotion,
    );
    info!("step 9/9: promoted {} leftover reads to singleton tigs", promoted);

    if let Err(e) = tigs.check_invariants() {
        failures.anomalies += 1;
        log::warn!("post-pipeline invariant check failed: {}", e);
    }

    Ok(PipelineReport { tigs, failures })
}

fn debug_placed(placed: usize, deferred: usize) {
    log::debug!("contain-placement pass: placed {}, deferred {}", placed, deferred);
}
