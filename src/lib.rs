//! patdex: patent XML dump ingester
//!
//! Loads weekly patent-office bulk dumps into a searchable index, featuring:
//! - Streaming recovery of documents from concatenated multi-document XML
//! - Tolerant extraction of bibliographic data, parties and abstracts
//! - A single validation gate that reports every malformed field at once
//! - Grant precedence: an indexed grant is never replaced by an application
//! - Embedded (sled) or Elasticsearch backends with conditional writes

pub mod config;
pub mod ingest;
pub mod store;
pub mod types;

pub use config::Config;
pub use types::*;
