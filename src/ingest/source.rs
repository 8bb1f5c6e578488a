//! Dump files, run statistics, checkpoints, and pipeline errors

use crate::store::StoreError;
use crate::types::PatentType;
use bzip2::read::BzDecoder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Read buffer for dump files; weekly dumps run to several hundred MB
const DUMP_BUFFER_SIZE: usize = 1024 * 1024;

/// Compression of a dump file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpCompression {
    Plain,
    Bzip2,
}

impl DumpCompression {
    /// Detect compression from the file name
    pub fn detect(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".bz2") {
            DumpCompression::Bzip2
        } else {
            DumpCompression::Plain
        }
    }
}

/// An opened dump, ready to be framed
pub struct DumpFile {
    path: PathBuf,
    reader: Box<dyn BufRead + Send>,
}

impl DumpFile {
    /// Open a dump file, transparently decompressing `.bz2`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;

        let reader: Box<dyn BufRead + Send> = match DumpCompression::detect(&path) {
            DumpCompression::Bzip2 => {
                Box::new(BufReader::with_capacity(DUMP_BUFFER_SIZE, BzDecoder::new(file)))
            }
            DumpCompression::Plain => Box::new(BufReader::with_capacity(DUMP_BUFFER_SIZE, file)),
        };

        Ok(Self { path, reader })
    }

    /// Wrap an already-open reader (in-memory dumps, stdin)
    pub fn from_reader(name: impl Into<PathBuf>, reader: impl BufRead + Send + 'static) -> Self {
        Self {
            path: name.into(),
            reader: Box::new(reader),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name used for logging and progress display
    pub fn source_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "patent dump".to_string())
    }

    pub fn into_reader(self) -> Box<dyn BufRead + Send> {
        self.reader
    }
}

/// Pipeline stage at which a fragment was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Extraction,
    Integrity,
    IndexWrite,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Extraction => "extraction",
            Self::Integrity => "integrity",
            Self::IndexWrite => "index write",
        })
    }
}

/// A fragment that was skipped, with the reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentFailure {
    /// Position of the fragment in the dump (0-based)
    pub index: usize,
    pub stage: FailureStage,
    pub message: String,
}

/// Ingest statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Fragments that went through the pipeline in this run
    pub fragments_processed: usize,
    /// Fragments passed over because a checkpoint covered them
    pub fragments_resumed: usize,
    /// Unclosed fragments discarded by the framer
    pub fragments_dropped: usize,
    /// Records written to the index
    pub documents_written: usize,
    /// Records left untouched because a grant is already indexed
    pub documents_skipped: usize,
    pub extraction_errors: usize,
    pub integrity_errors: usize,
    pub write_errors: usize,
    /// Processing time in seconds
    pub elapsed_seconds: f64,
    /// Fragments per second
    pub docs_per_second: f64,
}

impl IngestStats {
    /// Total fragments rejected at any stage
    pub fn documents_failed(&self) -> usize {
        self.extraction_errors + self.integrity_errors + self.write_errors
    }

    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.docs_per_second = self.fragments_processed as f64 / self.elapsed_seconds;
        }
    }
}

/// Outcome of one ingest run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub stats: IngestStats,
    /// Every rejected fragment, in source order
    pub failures: Vec<FragmentFailure>,
}

/// Checkpoint for resuming an interrupted ingest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestCheckpoint {
    /// Source file path
    pub source_path: PathBuf,
    pub patent_type: PatentType,
    /// Fragments fully handled (written, skipped or failed) so far
    pub fragments_processed: usize,
    pub documents_written: usize,
    /// Timestamp of checkpoint
    pub timestamp: DateTime<Utc>,
}

impl IngestCheckpoint {
    pub fn new(
        source_path: PathBuf,
        patent_type: PatentType,
        fragments_processed: usize,
        documents_written: usize,
    ) -> Self {
        Self {
            source_path,
            patent_type,
            fragments_processed,
            documents_written,
            timestamp: Utc::now(),
        }
    }

    /// Save checkpoint to file
    pub fn save(&self, path: &Path) -> Result<(), IngestError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load checkpoint from file
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        let json = std::fs::read_to_string(path)?;
        let checkpoint = serde_json::from_str(&json)?;
        Ok(checkpoint)
    }
}

/// Errors that abort an ingest run
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Framing error: {0}")]
    Framing(#[from] super::framer::FramingError),

    #[error("Index error: {0}")]
    Index(#[from] StoreError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
