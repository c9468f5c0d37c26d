//! End-to-end pipeline scenarios (spec.md §8).

use bogle::best_overlap_graph::{BestOverlapGraph, BogConfig};
use bogle::bubble_pop::{pop_bubbles, BubblePopConfig};
use bogle::config::{AlgorithmSwitches, DiagnosticsConfig, OverlapCacheConfig, PipelineConfig, StoreConfig};
use bogle::intersection_break::{break_intersections, BreakConfig};
use bogle::join::JoinConfig;
use bogle::overlap::{InMemoryOverlapCache, Overlap};
use bogle::placement::PlacementConfig;
use bogle::read_info::{InMemoryReadInfo, ReadInfoProvider};
use bogle::split_discontinuous::SplitConfig;
use bogle::tig::{TigPosition, TigVector};
use bogle::tig_store::{OpenMode, TigStore};

fn ovl(a: u32, b: u32, ah: i32, bh: i32, ev: u32) -> Overlap {
    Overlap {
        a_id: a,
        b_id: b,
        flipped: false,
        a_hang: ah,
        b_hang: bh,
        evalue: ev,
    }
}

fn base_config() -> PipelineConfig {
    PipelineConfig {
        store: StoreConfig {
            read_store: "reads.tsv".into(),
            overlap_store: "overlaps.tsv".into(),
            tig_store_version: 1,
            output_prefix: "asm".into(),
        },
        bog: BogConfig::default(),
        overlap_cache: OverlapCacheConfig::default(),
        switches: AlgorithmSwitches {
            disallow_singleton_promotion: false,
            ..AlgorithmSwitches::default()
        },
        diagnostics: DiagnosticsConfig::default(),
        placement: PlacementConfig::default(),
        bubble_pop: BubblePopConfig::default(),
        break_cfg: BreakConfig::default(),
        join: JoinConfig::default(),
        split: SplitConfig::default(),
        enable_join: false,
    }
}

/// Scenario A: three reads chained by dovetail overlaps collapse into one tig.
#[test]
fn scenario_a_simple_chain() {
    let mut reads = InMemoryReadInfo::with_capacity(3);
    reads.set(1, 100, 0, 0);
    reads.set(2, 100, 0, 0);
    reads.set(3, 100, 0, 0);
    let overlaps = vec![ovl(1, 2, 30, 30, 10), ovl(2, 3, 40, 40, 12)];
    let cache = InMemoryOverlapCache::build(overlaps, 3);

    let report = bogle::pipeline::run(&reads, &cache, &base_config()).unwrap();
    assert_eq!(report.tigs.len(), 1);

    let tig_id = report.tigs.tig_ids()[0];
    let tig = report.tigs.get(tig_id).unwrap();
    assert_eq!(tig.num_reads(), 3);
    assert_eq!(tig.length(), 170);

    for (read_id, begin, end) in [(1u32, 0i64, 100i64), (2, 30, 130), (3, 70, 170)] {
        let pos = tig.position_of(read_id).expect("read placed");
        assert_eq!((pos.begin, pos.end), (begin, end));
    }
}

/// Scenario B: a short contained read is inserted into its container's tig.
#[test]
fn scenario_b_contained_read() {
    let mut reads = InMemoryReadInfo::with_capacity(2);
    reads.set(1, 200, 0, 0);
    reads.set(2, 50, 0, 0);
    let overlaps = vec![ovl(1, 2, 40, -110, 10)];
    let cache = InMemoryOverlapCache::build(overlaps, 2);

    let report = bogle::pipeline::run(&reads, &cache, &base_config()).unwrap();
    assert_eq!(report.tigs.len(), 1);

    let tig_id = report.tigs.tig_ids()[0];
    let tig = report.tigs.get(tig_id).unwrap();
    assert_eq!(tig.num_reads(), 2);

    let pos1 = tig.position_of(1).unwrap();
    assert_eq!((pos1.begin, pos1.end), (0, 200));
    let pos2 = tig.position_of(2).unwrap();
    assert_eq!((pos2.begin, pos2.end), (40, 90));
    assert_eq!(pos2.contained, 1);
}

/// Scenario C: a short bubble tig merges into its host once both of its
/// endpoints' best edges land inside that host (spec.md §8: long tig U with
/// backbone a-b-c-d-e, short tig S with x-y, x's 5' best edge into b's 3',
/// y's 3' best edge into c's 5').
#[test]
fn scenario_c_bubble_merges_into_host() {
    let mut reads = InMemoryReadInfo::with_capacity(8);
    reads.set(1, 200, 0, 0); // a
    reads.set(2, 300, 0, 0); // b
    reads.set(3, 300, 0, 0); // c
    reads.set(4, 300, 0, 0); // d
    reads.set(5, 200, 0, 0); // e
    reads.set(6, 300, 0, 0); // x
    reads.set(7, 300, 0, 0); // y

    let overlaps = vec![
        ovl(6, 2, -1, -1, 10),   // x's 5' best edge into b's 3'
        ovl(6, 7, 250, 250, 10), // x's 3' overlap into y, internal to S
        ovl(7, 3, 1, 1, 10),     // y's 3' best edge into c's 5'
    ];
    let cache = InMemoryOverlapCache::build(overlaps, 8);
    let bog = BestOverlapGraph::build(&reads, &cache, &BogConfig::default());

    let mut tigs = TigVector::new(8);
    let u = tigs.create_tig();
    tigs.add_frag(u, TigPosition::new(1, 0, 200), 0).unwrap();
    tigs.add_frag(u, TigPosition::new(2, 150, 450), 0).unwrap();
    tigs.add_frag(u, TigPosition::new(3, 400, 700), 0).unwrap();
    tigs.add_frag(u, TigPosition::new(4, 650, 950), 0).unwrap();
    tigs.add_frag(u, TigPosition::new(5, 900, 1100), 0).unwrap();
    tigs.sort_tig(u);

    let s = tigs.create_tig();
    tigs.add_frag(s, TigPosition::new(6, 0, 300), 0).unwrap();
    tigs.add_frag(s, TigPosition::new(7, 250, 550), 0).unwrap();
    tigs.sort_tig(s);

    let popped = pop_bubbles(&bog, &reads, &cache, &mut tigs, &BubblePopConfig::default());
    assert_eq!(popped, 1, "the short tig should pop into the host");
    assert!(tigs.get(s).is_none(), "the bubble tig is deleted once merged");

    let host = tigs.get(u).expect("host tig survives the merge");
    assert_eq!(host.num_reads(), 7, "host gains the bubble's x and y");
    for read_id in [1u32, 2, 3, 4, 5, 6, 7] {
        assert!(host.position_of(read_id).is_some(), "read {} placed in host", read_id);
    }
}

/// Scenario D: an intersection break splits a tig where an external read's
/// best edge points into a member that it does not actually overlap
/// (spec.md §8: tig U with a-b-c-d-e-f, read x outside U has its 3' best
/// edge into c's 5', x does not overlap c in U; U splits at c's 5' end into
/// U1=[a,b] and U2=[c,d,e,f]).
#[test]
fn scenario_d_intersection_break_splits_at_target() {
    let mut reads = InMemoryReadInfo::with_capacity(8);
    reads.set(1, 100, 0, 0); // a
    reads.set(2, 100, 0, 0); // b
    reads.set(3, 100, 0, 0); // c
    reads.set(4, 100, 0, 0); // d
    reads.set(5, 100, 0, 0); // e
    reads.set(6, 150, 0, 0); // f
    reads.set(7, 100, 0, 0); // x, outside U
    reads.set(8, 100, 0, 0); // dummy partner, fills out x's 5' coverage

    let overlaps = vec![
        ovl(7, 8, -1, -1, 10), // x's 5' edge, irrelevant to the break itself
        ovl(7, 3, 1, 1, 10),   // x's 3' best edge into c's 5'
    ];
    let cache = InMemoryOverlapCache::build(overlaps, 8);
    let bog = BestOverlapGraph::build(&reads, &cache, &BogConfig::default());

    let mut tigs = TigVector::new(8);
    let host = tigs.create_tig();
    tigs.add_frag(host, TigPosition::new(1, 0, 100), 0).unwrap();
    tigs.add_frag(host, TigPosition::new(2, 80, 180), 0).unwrap();
    tigs.add_frag(host, TigPosition::new(3, 160, 260), 0).unwrap();
    tigs.add_frag(host, TigPosition::new(4, 240, 340), 0).unwrap();
    tigs.add_frag(host, TigPosition::new(5, 320, 420), 0).unwrap();
    tigs.add_frag(host, TigPosition::new(6, 400, 550), 0).unwrap();
    tigs.sort_tig(host);

    let x_tig = tigs.create_tig();
    tigs.add_frag(x_tig, TigPosition::new(7, 0, 100), 0).unwrap();

    let broken = break_intersections(&bog, &mut tigs, &BreakConfig::default());
    assert_eq!(broken, 1, "the host tig should split at c");
    assert!(tigs.get(host).is_none(), "the original host is replaced by its two pieces");

    let mut u1 = None;
    let mut u2 = None;
    for tig_id in tigs.tig_ids() {
        if tig_id == x_tig {
            continue;
        }
        let tig = tigs.get(tig_id).unwrap();
        if tig.position_of(1).is_some() {
            u1 = Some(tig_id);
        }
        if tig.position_of(3).is_some() {
            u2 = Some(tig_id);
        }
    }
    let u1 = tigs.get(u1.expect("U1 exists")).unwrap();
    let u2 = tigs.get(u2.expect("U2 exists")).unwrap();

    assert_eq!(u1.num_reads(), 2, "U1 keeps a and b");
    assert!(u1.position_of(2).is_some());

    assert_eq!(u2.num_reads(), 4, "U2 keeps c, d, e, f");
    let first = u2.first_backbone().expect("U2 has a backbone");
    assert_eq!(first.read_id, 3, "c remains the first non-contained read of U2");
}

/// Scenario E: a chimeric read with two halves overlapping disjoint read
/// sets is flagged coverage_gap and ends up as a singleton, never a backbone.
#[test]
fn scenario_e_chimera_ends_as_singleton() {
    let mut reads = InMemoryReadInfo::with_capacity(5);
    reads.set(1, 200, 0, 0);
    reads.set(2, 100, 0, 0);
    reads.set(3, 100, 0, 0);
    reads.set(4, 100, 0, 0);
    reads.set(5, 100, 0, 0);

    // Read 1's first half overlaps reads 2/3 off its 5' end; its second half
    // overlaps reads 4/5 off its 3' end. No overlap bridges the two halves,
    // so the aligned-interval union on read 1 has an internal gap.
    let overlaps = vec![
        ovl(1, 2, -50, -50, 10),
        ovl(1, 3, -60, -60, 10),
        ovl(1, 4, 170, 170, 10),
        ovl(1, 5, 180, 180, 10),
    ];
    let cache = InMemoryOverlapCache::build(overlaps, 5);

    let bog = bogle::best_overlap_graph::BestOverlapGraph::build(&reads, &cache, &BogConfig::default());
    assert!(bog.status(1).coverage_gap);

    let report = bogle::pipeline::run(&reads, &cache, &base_config()).unwrap();
    let tig_id = report.tigs.index().tig_of(1);
    assert_ne!(tig_id, 0, "chimera should still land in a singleton tig once promoted");
    let tig = report.tigs.get(tig_id).unwrap();
    assert_eq!(tig.num_reads(), 1, "chimera must not become the backbone of a multi-read tig");
}

/// Scenario F: persisting and reloading a tig store yields an identical
/// TigVector (ufpath positions survive the round trip).
#[test]
fn scenario_f_tigstore_round_trip() {
    let mut reads = InMemoryReadInfo::with_capacity(3);
    reads.set(1, 100, 0, 0);
    reads.set(2, 100, 0, 0);
    reads.set(3, 100, 0, 0);
    let overlaps = vec![ovl(1, 2, 30, 30, 10), ovl(2, 3, 40, 40, 12)];
    let cache = InMemoryOverlapCache::build(overlaps, 3);

    let report = bogle::pipeline::run(&reads, &cache, &base_config()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("asm").to_str().unwrap().to_string();

    let mut store = TigStore::open(&prefix, 1, OpenMode::Create).unwrap();
    store.save_all(&report.tigs).unwrap();
    drop(store);

    let mut reopened = TigStore::open(&prefix, 1, OpenMode::ReadOnly).unwrap();
    let loaded = reopened.load_all(reads.num_reads()).unwrap();

    assert_eq!(loaded.len(), report.tigs.len());
    for tig_id in report.tigs.tig_ids() {
        let original = report.tigs.get(tig_id).unwrap();
        let reloaded = loaded.get(tig_id).expect("tig id preserved across round trip");
        assert_eq!(reloaded.num_reads(), original.num_reads());
        assert_eq!(reloaded.length(), original.length());
        for node in &original.ufpath {
            let reloaded_pos = reloaded.position_of(node.read_id).expect("read preserved");
            assert_eq!(reloaded_pos.begin, node.begin);
            assert_eq!(reloaded_pos.end, node.end);
        }
    }
}
