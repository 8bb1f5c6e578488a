//! Ingest pipeline that drives a dump through framing, extraction,
//! validation and the upsert policy

use super::framer::{Fragment, FragmentReader};
use super::normalize::Patent;
use super::parser::extract_document;
use super::progress::{FragmentOutcome, IngestProgress};
use super::resolver::{RetryPolicy, UpsertOutcome, UpsertResolver};
use super::source::{
    DumpFile, FailureStage, FragmentFailure, IngestCheckpoint, IngestError, IngestReport,
};
use crate::config::IngestConfig;
use crate::store::{IndexSchema, PatentStore};
use crate::types::PatentType;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Sequential ingest of one dump into one store
pub struct IngestPipeline<S: PatentStore> {
    store: S,
    patent_type: PatentType,
    resolver: UpsertResolver,
    /// Stop after this many fragments in one run
    max_documents: Option<usize>,
    checkpoint_interval: usize,
    checkpoint_path: Option<PathBuf>,
    resume: Option<IngestCheckpoint>,
    quiet: bool,
}

impl<S: PatentStore> IngestPipeline<S> {
    /// Ingest every fragment of `dump` in source order.
    ///
    /// Extraction, validation and write failures are recorded per fragment and
    /// do not stop the run. Only a failure to read the dump itself, or to
    /// flush the store, aborts. The store is flushed before every checkpoint
    /// so a checkpoint never covers writes that are not yet durable.
    pub fn ingest(&self, dump: DumpFile) -> Result<IngestReport, IngestError> {
        let source_name = dump.source_name();
        let source_path = dump.path().to_path_buf();
        info!(
            "Ingesting {} documents from {} into {}",
            self.patent_type,
            source_name,
            self.store.name()
        );

        let resume_from = self.resume.as_ref().map_or(0, |c| c.fragments_processed);
        let written_before = self.resume.as_ref().map_or(0, |c| c.documents_written);
        if resume_from > 0 {
            info!("Resuming after {} fragments", resume_from);
        }

        let mut progress = IngestProgress::new(&source_name, self.quiet);
        let mut reader = FragmentReader::new(dump.into_reader(), self.patent_type);
        let mut failures = Vec::new();
        let mut resumed = 0;
        let mut handled = 0;
        let mut position = resume_from;

        for fragment in reader.by_ref() {
            let fragment = fragment?;

            if fragment.index < resume_from {
                resumed += 1;
                continue;
            }

            if let Some(max) = self.max_documents {
                if handled >= max {
                    info!("Reached max documents limit: {}", max);
                    break;
                }
            }

            let (app_doc_id, outcome) = self.process(&fragment, &mut failures);
            progress.fragment_done(app_doc_id.as_deref(), outcome);
            handled += 1;
            position = fragment.index + 1;

            if self.checkpoint_path.is_some() && position % self.checkpoint_interval == 0 {
                self.store.flush()?;
                let written = written_before + progress.get_stats().documents_written;
                self.save_checkpoint(&source_path, position, written);
            }
        }

        progress.fragments_resumed(resumed);
        let stats = progress.finish(reader.dropped());

        self.store.flush()?;
        self.save_checkpoint(&source_path, position, written_before + stats.documents_written);

        if stats.fragments_dropped > 0 {
            warn!(
                "{} fragment(s) in {} had no closing tag and were dropped",
                stats.fragments_dropped, source_name
            );
        }
        info!(
            "Finished {}: {} written, {} skipped, {} failed",
            source_name,
            stats.documents_written,
            stats.documents_skipped,
            stats.documents_failed()
        );

        Ok(IngestReport { stats, failures })
    }

    /// Run one fragment through every stage
    fn process(
        &self,
        fragment: &Fragment,
        failures: &mut Vec<FragmentFailure>,
    ) -> (Option<String>, FragmentOutcome) {
        let document = match extract_document(&fragment.text, self.patent_type) {
            Ok(document) => document,
            Err(e) => {
                return (
                    None,
                    record_failure(failures, fragment.index, FailureStage::Extraction, e.to_string()),
                )
            }
        };
        let app_doc_id = document.bibliographic.app_doc_id.clone();

        let patent = match Patent::from_extracted(document) {
            Ok(patent) => patent,
            Err(e) => {
                return (
                    Some(app_doc_id),
                    record_failure(failures, fragment.index, FailureStage::Integrity, e.to_string()),
                )
            }
        };

        let outcome = match self.resolver.apply(&self.store, &patent) {
            Ok(UpsertOutcome::Written { reason, .. }) => {
                debug!("Fragment {}: wrote {} ({:?})", fragment.index, app_doc_id, reason);
                FragmentOutcome::Written
            }
            Ok(UpsertOutcome::Skipped(reason)) => {
                debug!("Fragment {}: skipped {} ({})", fragment.index, app_doc_id, reason);
                FragmentOutcome::Skipped
            }
            Err(e) => record_failure(
                failures,
                fragment.index,
                FailureStage::IndexWrite,
                format!("{}: {}", app_doc_id, e),
            ),
        };
        (Some(app_doc_id), outcome)
    }

    fn save_checkpoint(&self, source_path: &Path, position: usize, written: usize) {
        if let Some(ref path) = self.checkpoint_path {
            let checkpoint =
                IngestCheckpoint::new(source_path.to_path_buf(), self.patent_type, position, written);
            if let Err(e) = checkpoint.save(path) {
                warn!("Failed to save checkpoint: {}", e);
            }
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

fn record_failure(
    failures: &mut Vec<FragmentFailure>,
    index: usize,
    stage: FailureStage,
    message: String,
) -> FragmentOutcome {
    warn!("Fragment {} failed at {}: {}", index, stage, message);
    failures.push(FragmentFailure {
        index,
        stage,
        message,
    });
    FragmentOutcome::Failed(stage)
}

/// Builder for IngestPipeline
pub struct IngestPipelineBuilder {
    patent_type: PatentType,
    policy: RetryPolicy,
    max_documents: Option<usize>,
    checkpoint_interval: usize,
    checkpoint_path: Option<PathBuf>,
    resume: Option<IngestCheckpoint>,
    quiet: bool,
}

impl IngestPipelineBuilder {
    pub fn new(patent_type: PatentType) -> Self {
        let defaults = IngestConfig::default();
        Self {
            patent_type,
            policy: RetryPolicy::from(&defaults),
            max_documents: None,
            checkpoint_interval: defaults.checkpoint_interval,
            checkpoint_path: None,
            resume: None,
            quiet: false,
        }
    }

    /// Take retry and checkpoint settings from configuration
    pub fn with_config(mut self, config: &IngestConfig) -> Self {
        self.policy = RetryPolicy::from(config);
        self.checkpoint_interval = config.checkpoint_interval;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set maximum fragments to process
    pub fn with_max_documents(mut self, max_docs: Option<usize>) -> Self {
        self.max_documents = max_docs;
        self
    }

    /// Set checkpoint path
    pub fn with_checkpoint(mut self, path: impl AsRef<Path>) -> Self {
        self.checkpoint_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Skip the fragments a previous run already handled
    pub fn with_resume(mut self, checkpoint: IngestCheckpoint) -> Self {
        self.resume = Some(checkpoint);
        self
    }

    /// Set quiet mode
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Prepare the store and build the pipeline
    pub fn build<S: PatentStore>(self, store: S) -> Result<IngestPipeline<S>, IngestError> {
        if self.checkpoint_interval == 0 {
            return Err(IngestError::Config("checkpoint interval must be positive".into()));
        }
        if let Some(ref checkpoint) = self.resume {
            if checkpoint.patent_type != self.patent_type {
                return Err(IngestError::Checkpoint(format!(
                    "checkpoint was written for {} documents, not {}",
                    checkpoint.patent_type, self.patent_type
                )));
            }
        }

        store.create_index(&IndexSchema::patents())?;

        Ok(IngestPipeline {
            store,
            patent_type: self.patent_type,
            resolver: UpsertResolver::new(self.policy),
            max_documents: self.max_documents,
            checkpoint_interval: self.checkpoint_interval,
            checkpoint_path: self.checkpoint_path,
            resume: self.resume,
            quiet: self.quiet,
        })
    }
}
