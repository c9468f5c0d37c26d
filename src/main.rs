use std::process::ExitCode;

use bogle::cli::Cli;
use bogle::error::Error;
use bogle::overlap::InMemoryOverlapCache;
use bogle::read_info::InMemoryReadInfo;
use bogle::tig_store::{OpenMode, TigStore};
use clap::Parser;
use log::{error, info, LevelFilter};

fn main() -> ExitCode {
    let cli = Cli::parse();

    bogle::logging::init(
        if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info },
        &cli.debug_components,
    );

    match run(cli) {
        Ok(failures) => {
            if failures > 0 {
                eprintln!("completed with {} non-fatal anomalies", failures);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load the read and overlap stores, run the pipeline, and persist the
/// result. The read/overlap stores themselves are out of scope (spec.md
/// §1); `-S`/`-O` are read here as TSV files through the concrete
/// in-memory collaborators, the only standalone implementations this crate
/// carries (see DESIGN.md).
fn run(cli: Cli) -> Result<u64, Error> {
    let cfg = cli.into_pipeline_config()?;

    info!("loading read store from {}", cfg.store.read_store);
    let reads = InMemoryReadInfo::load_tsv(&cfg.store.read_store)?;

    info!("loading overlap store from {}", cfg.store.overlap_store);
    let overlaps = InMemoryOverlapCache::load_tsv(&cfg.store.overlap_store, reads.num_reads())?;

    let report = bogle::pipeline::run(&reads, &overlaps, &cfg)?;
    info!(
        "pipeline produced {} tigs, {} total non-fatal anomalies",
        report.tigs.len(),
        report.failures.total()
    );

    let mut store = TigStore::open(
        &cfg.store.output_prefix,
        cfg.store.tig_store_version,
        OpenMode::Create,
    )?;
    store.save_all(&report.tigs)?;
    info!(
        "persisted tig store at prefix {} version {}",
        cfg.store.output_prefix,
        store.current_version()
    );

    Ok(report.failures.total())
}
