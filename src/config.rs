//! Centralised, validated configuration for a full engine run: assembles
//! the per-phase configs already defined alongside their modules into one
//! top-level [`PipelineConfig`], and performs the CLI-argument validation
//! spec.md §7 calls for ("missing or contradictory CLI arguments").

use crate::best_overlap_graph::BogConfig;
use crate::bubble_pop::BubblePopConfig;
use crate::error::{Error, Result};
use crate::intersection_break::BreakConfig;
use crate::join::JoinConfig;
use crate::placement::PlacementConfig;
use crate::split_discontinuous::SplitConfig;

/// Required store paths and output prefix (spec.md §6's required CLI args).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub read_store: String,
    pub overlap_store: String,
    pub tig_store_version: u32,
    pub output_prefix: String,
}

/// Overlap cache sizing (spec.md §6's `-M`/`-N`/`-create`/`-save`).
#[derive(Debug, Clone)]
pub struct OverlapCacheConfig {
    pub memory_limit_gb: Option<f64>,
    pub max_overlaps_per_read: Option<usize>,
    pub create_checkpoint: bool,
    pub save_checkpoint: bool,
}

impl Default for OverlapCacheConfig {
    fn default() -> Self {
        Self {
            memory_limit_gb: None,
            max_overlaps_per_read: None,
            create_checkpoint: false,
            save_checkpoint: false,
        }
    }
}

/// Algorithm switches (spec.md §6's `-R`/`-E`/`-SR`/`-DP`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlgorithmSwitches {
    pub enable_repeat_reconstruction: bool,
    pub enable_mate_extension: bool,
    pub shatter_repeats: bool,
    pub disallow_singleton_promotion: bool,
}

/// Diagnostics: global level plus per-component debug targets (spec.md §6's
/// `-D`/`-d`).
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsConfig {
    pub verbose: bool,
    pub debug_components: Vec<String>,
}

/// Top-level pipeline configuration: one instance fully determines a run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub store: StoreConfig,
    pub bog: BogConfig,
    pub overlap_cache: OverlapCacheConfig,
    pub switches: AlgorithmSwitches,
    pub diagnostics: DiagnosticsConfig,
    pub placement: PlacementConfig,
    pub bubble_pop: BubblePopConfig,
    pub break_cfg: BreakConfig,
    pub join: JoinConfig,
    pub split: SplitConfig,
    /// Off by default: spec.md §9's open question resolves join as
    /// optional in practice (see DESIGN.md).
    pub enable_join: bool,
}

impl PipelineConfig {
    /// Validate cross-field contradictions spec.md §7 calls out
    /// ("missing or contradictory CLI arguments"). Individual field parsing
    /// (e.g. "is this a number") happens in the CLI layer; this is the
    /// semantic layer that only the assembled config can check.
    pub fn validate(&self) -> Result<()> {
        if self.store.read_store.is_empty() {
            return Err(Error::Configuration("read store path is required (-S)".into()));
        }
        if self.store.overlap_store.is_empty() {
            return Err(Error::Configuration(
                "overlap store path is required (-O)".into(),
            ));
        }
        if self.store.output_prefix.is_empty() {
            return Err(Error::Configuration(
                "output prefix is required (-o)".into(),
            ));
        }
        if self.bog.graph_erate > 10_000 {
            return Err(Error::Configuration(format!(
                "graph erate {} exceeds the 10000 basis-point scale (-eg)",
                self.bog.graph_erate
            )));
        }
        if self.switches.shatter_repeats
            && !self.switches.enable_repeat_reconstruction
            && !self.switches.enable_mate_extension
        {
            return Err(Error::Configuration(
                "-SR (shatter repeats) requires -R (repeat reconstruction) or -E (mate extension)"
                    .into(),
            ));
        }
        if let Some(max_per_read) = self.overlap_cache.max_overlaps_per_read {
            if max_per_read == 0 {
                return Err(Error::Configuration(
                    "-N maxPerRead must be positive if specified".into(),
                ));
            }
        }
        Ok(())
    }
}
