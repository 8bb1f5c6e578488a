//! Bulk ingestion of patent-office XML dumps
//!
//! Weekly grant and application dumps are concatenations of complete XML
//! documents. Each run handles one dump of one kind and pushes every document
//! through the same stages, strictly in source order.
//!
//! # Example Usage
//!
//! ```no_run
//! use patdex::ingest::{DumpFile, IngestPipelineBuilder};
//! use patdex::store::SledStore;
//! use patdex::PatentType;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SledStore::open(".patdex")?;
//! let pipeline = IngestPipelineBuilder::new(PatentType::Grant)
//!     .with_checkpoint("ipg240102.checkpoint")
//!     .build(store)?;
//!
//! let report = pipeline.ingest(DumpFile::open("ipg240102.xml")?)?;
//! println!("Wrote {} patents", report.stats.documents_written);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Ingest Pipeline                            │
//! │            (progress, resume, per-fragment failure log)             │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//!   DumpFile ──► FragmentReader ──► extract_document ──► Patent::validate
//!  (.xml/.bz2)   (boundary scan)    (element tree)       (integrity gate)
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          UpsertResolver                             │
//! │        (grant precedence, conditional write, retry/backoff)         │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//!                         PatentStore (sled / ES)
//! ```

pub mod framer;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod resolver;
pub mod source;
pub mod xml;

// Re-export main types
pub use framer::{frame, Fragment, FragmentReader, FramedDump, FramingError};
pub use normalize::{FieldKind, FieldViolation, IntegrityError, Patent, PatentCandidate};
pub use parser::{extract_document, ExtractedDocument, ExtractionError};
pub use pipeline::{IngestPipeline, IngestPipelineBuilder};
pub use progress::{print_summary, IngestProgress};
pub use resolver::{decide, ExistingRecord, RetryPolicy, UpsertAction, UpsertOutcome, UpsertResolver};
pub use source::{
    DumpFile, FailureStage, FragmentFailure, IngestCheckpoint, IngestError, IngestReport,
    IngestStats,
};
