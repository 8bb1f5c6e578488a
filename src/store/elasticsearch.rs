//! Elasticsearch patent store over the REST API
//!
//! Conditional writes map onto the document API's optimistic concurrency
//! parameters: `op_type=create` for [`WriteCondition::Absent`] and
//! `if_seq_no` / `if_primary_term` for [`WriteCondition::Matches`]. A 409
//! response becomes [`StoreError::VersionConflict`].

use super::{IndexSchema, PatentStore, RecordVersion, StoreError, StoredRecord, WriteCondition};
use crate::config::ElasticsearchConfig;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Error type returned when the index already exists
const ALREADY_EXISTS: &str = "resource_already_exists_exception";

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_seq_no")]
    seq_no: Option<u64>,
    #[serde(rename = "_primary_term")]
    primary_term: Option<u64>,
    #[serde(rename = "_source")]
    source: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    #[serde(rename = "_seq_no")]
    seq_no: u64,
    #[serde(rename = "_primary_term")]
    primary_term: u64,
}

/// Patent store backed by one Elasticsearch index
#[derive(Debug)]
pub struct ElasticsearchStore {
    client: Client,
    base: Url,
    index: String,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticsearchStore {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self, StoreError> {
        let base = Url::parse(&config.host)
            .map_err(|e| StoreError::Rejected(format!("invalid host `{}`: {}", config.host, e)))?;

        // Credentials from config or environment
        let username = config
            .username
            .clone()
            .or_else(|| std::env::var("ELASTIC_USERNAME").ok());
        let password = config
            .password
            .clone()
            .or_else(|| std::env::var("ELASTIC_PASSWORD").ok());

        if !config.verify_certs {
            warn!("TLS certificate verification disabled for {}", config.host);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_certs)
            .build()
            .map_err(|e| StoreError::Rejected(format!("failed to build HTTP client: {}", e)))?;

        info!("Elasticsearch store: {} index={}", base, config.index);

        Ok(Self {
            client,
            base,
            index: config.index.clone(),
            username,
            password,
        })
    }

    /// URL of `/{index}/{segments...}`
    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Rejected(format!("host `{}` cannot be a base URL", self.base)))?
            .pop_if_empty()
            .push(&self.index)
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_ref()),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        self.authorize(request)
            .send()
            .map_err(|e| StoreError::Transient(format!("request failed: {}", e)))
    }
}

/// Map a non-success response to a store error
fn error_for(id: &str, status: StatusCode, body: &str) -> StoreError {
    if status == StatusCode::CONFLICT {
        StoreError::VersionConflict(id.to_string())
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StoreError::Transient(format!("HTTP {}: {}", status, body))
    } else {
        StoreError::Rejected(format!("HTTP {}: {}", status, body))
    }
}

/// Query parameters expressing a write precondition
fn condition_params(condition: WriteCondition) -> Vec<(&'static str, String)> {
    match condition {
        WriteCondition::Absent => vec![("op_type", "create".to_string())],
        WriteCondition::Matches(version) => vec![
            ("if_seq_no", version.seq_no.to_string()),
            ("if_primary_term", version.primary_term.to_string()),
        ],
    }
}

impl PatentStore for ElasticsearchStore {
    fn create_index(&self, schema: &IndexSchema) -> Result<(), StoreError> {
        let url = self.url(&[])?;
        let body = json!({ "mappings": schema.to_mappings() });
        let response = self.send(self.client.put(url).json(&body))?;

        let status = response.status();
        if status.is_success() {
            info!("Created index {}", self.index);
            return Ok(());
        }

        let text = response.text().unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && text.contains(ALREADY_EXISTS) {
            debug!("Index {} already exists", self.index);
            return Ok(());
        }
        Err(error_for(&self.index, status, &text))
    }

    fn get(&self, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        let url = self.url(&["_doc", id])?;
        let response = self.send(self.client.get(url))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(error_for(id, status, &text));
        }

        let body: GetResponse = response
            .json()
            .map_err(|e| StoreError::Rejected(format!("unreadable get response: {}", e)))?;
        match body {
            GetResponse {
                found: true,
                seq_no: Some(seq_no),
                primary_term: Some(primary_term),
                source,
            } => Ok(Some(StoredRecord {
                id: id.to_string(),
                version: RecordVersion { seq_no, primary_term },
                source: source.unwrap_or(Value::Null),
            })),
            _ => Ok(None),
        }
    }

    fn upsert(
        &self,
        id: &str,
        document: &Value,
        condition: WriteCondition,
    ) -> Result<RecordVersion, StoreError> {
        let url = self.url(&["_doc", id])?;
        let request = self
            .client
            .put(url)
            .query(&condition_params(condition))
            .json(document);
        let response = self.send(request)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(error_for(id, status, &text));
        }

        let body: WriteResponse = response
            .json()
            .map_err(|e| StoreError::Rejected(format!("unreadable write response: {}", e)))?;
        Ok(RecordVersion {
            seq_no: body.seq_no,
            primary_term: body.primary_term,
        })
    }

    fn flush(&self) -> Result<(), StoreError> {
        let url = self.url(&["_refresh"])?;
        let response = self.send(self.client.post(url))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(error_for(&self.index, status, &text));
        }
        Ok(())
    }

    fn name(&self) -> String {
        format!("elasticsearch ({} index={})", self.base, self.index)
    }
}
