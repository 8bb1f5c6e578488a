//! Progress tracking for dump ingestion

use super::source::{FailureStage, IngestStats};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// Outcome of one fragment, as far as progress reporting is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOutcome {
    Written,
    Skipped,
    Failed(FailureStage),
}

/// Counters and the optional progress bar of one ingest run
pub struct IngestProgress {
    /// Progress bar (None if running in quiet mode)
    progress_bar: Option<ProgressBar>,
    start_time: Instant,
    stats: IngestStats,
}

impl IngestProgress {
    pub fn new(source_name: &str, quiet: bool) -> Self {
        let progress_bar = if !quiet {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {prefix} {pos} fragments {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_prefix(source_name.to_string());
            pb.enable_steady_tick(Duration::from_millis(200));
            Some(pb)
        } else {
            None
        };

        Self {
            progress_bar,
            start_time: Instant::now(),
            stats: IngestStats::default(),
        }
    }

    /// Fragments passed over because a checkpoint covered them
    pub fn fragments_resumed(&mut self, count: usize) {
        self.stats.fragments_resumed = count;
    }

    /// Record the result of one fragment
    pub fn fragment_done(&mut self, app_doc_id: Option<&str>, outcome: FragmentOutcome) {
        self.stats.fragments_processed += 1;
        match outcome {
            FragmentOutcome::Written => self.stats.documents_written += 1,
            FragmentOutcome::Skipped => self.stats.documents_skipped += 1,
            FragmentOutcome::Failed(FailureStage::Extraction) => self.stats.extraction_errors += 1,
            FragmentOutcome::Failed(FailureStage::Integrity) => self.stats.integrity_errors += 1,
            FragmentOutcome::Failed(FailureStage::IndexWrite) => self.stats.write_errors += 1,
        }

        if let Some(ref pb) = self.progress_bar {
            pb.set_position(self.stats.fragments_processed as u64);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                self.stats.fragments_processed as f64 / elapsed
            } else {
                0.0
            };

            pb.set_message(format!(
                "{:.1}/s | {} written, {} skipped, {} failed | {}",
                rate,
                self.stats.documents_written,
                self.stats.documents_skipped,
                self.stats.documents_failed(),
                app_doc_id.unwrap_or("-"),
            ));
        }
    }

    /// Get current statistics
    pub fn get_stats(&self) -> IngestStats {
        let mut stats = self.stats.clone();
        stats.elapsed_seconds = self.start_time.elapsed().as_secs_f64();
        stats.update_rate();
        stats
    }

    /// Finish the progress bar and return the final statistics
    pub fn finish(&mut self, fragments_dropped: usize) -> IngestStats {
        self.stats.fragments_dropped = fragments_dropped;
        let stats = self.get_stats();
        if let Some(ref pb) = self.progress_bar {
            pb.finish_with_message(format!(
                "Done! {} written, {} skipped, {} failed, {:.1} fragments/s",
                stats.documents_written,
                stats.documents_skipped,
                stats.documents_failed(),
                stats.docs_per_second
            ));
        }
        stats
    }
}

/// Print summary to console
pub fn print_summary(stats: &IngestStats) {
    println!("\nIngest Summary");
    println!("==============");
    println!("Fragments processed: {}", stats.fragments_processed);
    if stats.fragments_resumed > 0 {
        println!("Fragments resumed:   {}", stats.fragments_resumed);
    }
    println!("Documents written:   {}", stats.documents_written);
    println!("Documents skipped:   {}", stats.documents_skipped);
    println!("Extraction errors:   {}", stats.extraction_errors);
    println!("Integrity errors:    {}", stats.integrity_errors);
    println!("Write errors:        {}", stats.write_errors);
    println!("Unclosed fragments:  {}", stats.fragments_dropped);
    println!("Elapsed time:        {:.1}s", stats.elapsed_seconds);
    println!("Processing rate:     {:.1} fragments/s", stats.docs_per_second);
}
