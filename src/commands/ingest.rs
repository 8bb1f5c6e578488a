use anyhow::{Context, Result};
use patdex::{
    config::Config,
    ingest::{print_summary, DumpFile, IngestCheckpoint, IngestPipelineBuilder},
    store::open_store,
    PatentType,
};
use std::path::PathBuf;
use tracing::{info, warn};

pub fn ingest_dump(
    config: &Config,
    patent_type: PatentType,
    path: Option<PathBuf>,
    max_docs: Option<usize>,
    resume: bool,
    checkpoint: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    let path = match path.or_else(|| config.ingest.data_path(patent_type).cloned()) {
        Some(path) => path,
        None => anyhow::bail!(
            "No dump given and ingest.{}_data_path is not configured",
            patent_type
        ),
    };
    if !path.exists() {
        anyhow::bail!("Dump file not found: {}", path.display());
    }

    // Default checkpoint next to the dump
    let checkpoint_path = checkpoint.unwrap_or_else(|| path.with_extension("checkpoint"));

    let mut builder = IngestPipelineBuilder::new(patent_type)
        .with_config(&config.ingest)
        .with_max_documents(max_docs)
        .with_checkpoint(&checkpoint_path)
        .with_quiet(quiet);

    if resume {
        if checkpoint_path.exists() {
            let saved = IngestCheckpoint::load(&checkpoint_path)
                .map_err(|e| anyhow::anyhow!("Failed to load checkpoint: {}", e))?;
            if saved.source_path != path {
                warn!(
                    "Checkpoint was written for {}, resuming {} anyway",
                    saved.source_path.display(),
                    path.display()
                );
            }
            info!("Resuming from checkpoint: {} fragments", saved.fragments_processed);
            builder = builder.with_resume(saved);
        } else {
            warn!("No checkpoint at {}, starting from the beginning", checkpoint_path.display());
        }
    }

    // Connection and index setup failures abort before any fragment is read
    let store = open_store(config).context("Failed to open index store")?;
    let pipeline = builder.build(store).context("Failed to prepare index")?;

    let dump = DumpFile::open(&path)
        .with_context(|| format!("Failed to open dump: {}", path.display()))?;
    let report = pipeline.ingest(dump)?;

    if !quiet {
        print_summary(&report.stats);
        if !report.failures.is_empty() {
            println!("\nRejected fragments");
            println!("==================");
            for failure in &report.failures {
                println!("#{:<8} {:<12} {}", failure.index, failure.stage, failure.message);
            }
        }
    }

    Ok(())
}
