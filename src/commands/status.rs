use anyhow::Result;
use patdex::ingest::IngestCheckpoint;
use std::path::PathBuf;

pub fn show_ingest_status(checkpoint_path: PathBuf) -> Result<()> {
    if !checkpoint_path.exists() {
        anyhow::bail!("Checkpoint file not found: {}", checkpoint_path.display());
    }

    let checkpoint = IngestCheckpoint::load(&checkpoint_path)
        .map_err(|e| anyhow::anyhow!("Failed to load checkpoint: {}", e))?;

    println!("\nIngest Checkpoint Status");
    println!("========================");
    println!("Source file:         {}", checkpoint.source_path.display());
    println!("Patent type:         {}", checkpoint.patent_type);
    println!("Fragments processed: {}", checkpoint.fragments_processed);
    println!("Documents written:   {}", checkpoint.documents_written);
    println!("Timestamp:           {}", checkpoint.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("\nTo resume, run:");
    println!(
        "  patdex ingest --patent-type {} {} --resume --checkpoint {}",
        checkpoint.patent_type,
        checkpoint.source_path.display(),
        checkpoint_path.display()
    );

    Ok(())
}
