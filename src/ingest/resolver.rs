//! Grant-precedence upsert policy
//!
//! A patent moves one way through its lifecycle: one or more application
//! publications, then a grant. Once a grant is indexed under an `app_doc_id`
//! it is authoritative and a later application for the same id must not roll
//! it back. Everything else is a full-document replace.
//!
//! | incoming    | existing    | action                 |
//! |-------------|-------------|------------------------|
//! | grant       | absent      | write                  |
//! | grant       | application | write (supersedes)     |
//! | grant       | grant       | write (latest wins)    |
//! | application | absent      | write                  |
//! | application | application | write (refresh)        |
//! | application | grant       | skip                   |
//!
//! A stored record whose type cannot be read is treated as a grant when an
//! application arrives, and is overwritten by an incoming grant.
//!
//! The read-decide-write cycle runs against the store's conditional write, so
//! a record changed by another writer between the read and the write is
//! re-read and re-decided instead of being clobbered.

use super::normalize::Patent;
use crate::config::IngestConfig;
use crate::store::{PatentStore, RecordVersion, StoreError, StoredRecord, WriteCondition};
use crate::types::PatentType;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound for a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// What the index currently holds for an id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingRecord {
    Absent,
    Typed(PatentType),
    /// Present, but `patent_type` is missing or unrecognized
    Unrecognized,
}

impl ExistingRecord {
    pub fn of(record: Option<&StoredRecord>) -> Self {
        match record {
            None => Self::Absent,
            Some(record) => record
                .source
                .get("patent_type")
                .and_then(|v| v.as_str())
                .and_then(PatentType::from_discriminator)
                .map(Self::Typed)
                .unwrap_or(Self::Unrecognized),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteReason {
    Create,
    GrantSupersedesApplication,
    GrantReplacesGrant,
    ApplicationRefresh,
    GrantReplacesUnrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    GrantIsTerminal,
    ExistingTypeUnrecognized,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GrantIsTerminal => "a grant is already indexed",
            Self::ExistingTypeUnrecognized => "existing record has no recognizable patent_type",
        })
    }
}

/// Decision for one incoming record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Write(WriteReason),
    Skip(SkipReason),
}

/// Apply the precedence table
pub fn decide(incoming: PatentType, existing: ExistingRecord) -> UpsertAction {
    use ExistingRecord::*;
    use PatentType::*;

    match (incoming, existing) {
        (_, Absent) => UpsertAction::Write(WriteReason::Create),
        (Grant, Typed(Application)) => UpsertAction::Write(WriteReason::GrantSupersedesApplication),
        (Grant, Typed(Grant)) => UpsertAction::Write(WriteReason::GrantReplacesGrant),
        (Grant, Unrecognized) => UpsertAction::Write(WriteReason::GrantReplacesUnrecognized),
        (Application, Typed(Application)) => UpsertAction::Write(WriteReason::ApplicationRefresh),
        (Application, Typed(Grant)) => UpsertAction::Skip(SkipReason::GrantIsTerminal),
        (Application, Unrecognized) => UpsertAction::Skip(SkipReason::ExistingTypeUnrecognized),
    }
}

/// Retry budget for store calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_conflict_retries: u32,
    pub max_write_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for RetryPolicy {
    fn from(config: &IngestConfig) -> Self {
        Self {
            max_conflict_retries: config.max_conflict_retries,
            max_write_retries: config.max_write_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// Sleep before retry number `attempt` (1-based): backoff, 2x, 4x, ...
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Result of resolving one patent against the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Written {
        version: RecordVersion,
        reason: WriteReason,
    },
    Skipped(SkipReason),
}

/// Runs the read-decide-write cycle against a store
#[derive(Debug, Clone, Default)]
pub struct UpsertResolver {
    policy: RetryPolicy,
}

impl UpsertResolver {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Write `patent` unless a grant already holds its id
    pub fn apply<S: PatentStore + ?Sized>(
        &self,
        store: &S,
        patent: &Patent,
    ) -> Result<UpsertOutcome, StoreError> {
        let id = patent.app_doc_id.as_str();
        let document = patent.to_document()?;
        let mut conflicts = 0;

        loop {
            let existing = self.retrying(id, || store.get(id))?;
            let condition = match &existing {
                Some(record) => WriteCondition::Matches(record.version),
                None => WriteCondition::Absent,
            };

            let reason = match decide(patent.patent_type, ExistingRecord::of(existing.as_ref())) {
                UpsertAction::Skip(reason) => {
                    debug!("Skipping {} {}: {}", patent.patent_type, id, reason);
                    return Ok(UpsertOutcome::Skipped(reason));
                }
                UpsertAction::Write(reason) => reason,
            };

            match self.retrying(id, || store.upsert(id, &document, condition)) {
                Ok(version) => return Ok(UpsertOutcome::Written { version, reason }),
                Err(StoreError::VersionConflict(_)) if conflicts < self.policy.max_conflict_retries => {
                    conflicts += 1;
                    debug!("Version conflict on {}, re-reading (attempt {})", id, conflicts);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run `op`, retrying transient failures with exponential backoff
    fn retrying<T>(
        &self,
        id: &str,
        mut op: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut attempt = 0;
        loop {
            match op() {
                Err(e) if e.is_transient() && attempt < self.policy.max_write_retries => {
                    attempt += 1;
                    let delay = self.policy.delay(attempt);
                    warn!("Transient store error for {}: {} (retry {} in {:?})", id, e, attempt, delay);
                    std::thread::sleep(delay);
                }
                result => return result,
            }
        }
    }
}
