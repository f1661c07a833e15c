use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;

use crate::config::StoreConfig;

use super::domain::{AnalysisId, NewAnalysis, SavedAnalysis};

/// Error enumeration for document-store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("document store is not configured")]
    NotConfigured,
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("store runtime unavailable: {0}")]
    Runtime(String),
    #[error("malformed document: {0}")]
    InvalidDocument(String),
}

/// Boundary to the external JSON document collection holding analyses.
///
/// The collection is shared across applications; every operation is scoped by
/// the application tag the implementation carries. Version creation is
/// append-only: there is no update-in-place beyond the `is_latest` flip.
pub trait AnalysisStore: Send + Sync {
    fn create(&self, record: NewAnalysis) -> Result<SavedAnalysis, StoreError>;
    fn fetch(&self, id: &AnalysisId) -> Result<Option<SavedAnalysis>, StoreError>;
    /// Best-effort flag flip on a superseded version.
    fn mark_latest(&self, id: &AnalysisId, is_latest: bool) -> Result<(), StoreError>;
    /// Every version of one lineage: records whose `parent_id` is `root`
    /// plus the root record itself, ordered by ascending `version_number`.
    fn lineage(&self, root: &AnalysisId) -> Result<Vec<SavedAnalysis>, StoreError>;
    fn list_for_client(&self, client_id: &str) -> Result<Vec<SavedAnalysis>, StoreError>;
    /// Latest-version drafts last touched before the cutoff.
    fn stale_drafts(&self, cutoff: DateTime<Utc>) -> Result<Vec<SavedAnalysis>, StoreError>;
    fn delete(&self, id: &AnalysisId) -> Result<(), StoreError>;
}

#[derive(Debug, Serialize)]
struct CreateDocumentRequest<'a> {
    app: &'a str,
    data: &'a NewAnalysis,
}

#[derive(Debug, Deserialize)]
struct CreatedDocument {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DocumentEnvelope {
    id: String,
    data: NewAnalysis,
}

#[derive(Debug, Serialize)]
struct LatestPatch {
    data: LatestFlag,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LatestFlag {
    is_latest: bool,
}

/// Thin wrapper around the generic document-store HTTP API allowing
/// synchronous workflows to persist analyses without exposing async details.
pub struct HttpDocumentStore {
    client: Client,
    base_url: String,
    application_tag: String,
    api_key: Option<String>,
    runtime: Runtime,
}

impl HttpDocumentStore {
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let base_url = config.base_url.clone().ok_or(StoreError::NotConfigured)?;

        let client = Client::builder()
            .build()
            .map_err(|err| StoreError::Runtime(err.to_string()))?;
        let runtime = Runtime::new().map_err(|err| StoreError::Runtime(err.to_string()))?;

        Ok(Self {
            client,
            base_url,
            application_tag: config.application_tag.clone(),
            api_key: config.api_key.clone(),
            runtime,
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn documents_url(&self) -> String {
        format!("{}/api/v1/documents", self.base_url)
    }

    fn document_url(&self, id: &AnalysisId) -> String {
        format!("{}/api/v1/documents/{}", self.base_url, id.0)
    }

    fn fetch_filtered(&self, query: &[(&str, &str)]) -> Result<Vec<SavedAnalysis>, StoreError> {
        let mut params = vec![("app", self.application_tag.as_str())];
        params.extend_from_slice(query);

        let envelopes: Vec<DocumentEnvelope> = self.runtime.block_on(async {
            let response = self
                .request(self.client.get(self.documents_url()).query(&params))
                .send()
                .await
                .map_err(|err| StoreError::Unavailable(err.to_string()))?
                .error_for_status()
                .map_err(|err| StoreError::Unavailable(err.to_string()))?;

            response
                .json()
                .await
                .map_err(|err| StoreError::InvalidDocument(err.to_string()))
        })?;

        Ok(envelopes
            .into_iter()
            .map(|envelope| SavedAnalysis::from_parts(AnalysisId(envelope.id), envelope.data))
            .collect())
    }
}

impl AnalysisStore for HttpDocumentStore {
    fn create(&self, record: NewAnalysis) -> Result<SavedAnalysis, StoreError> {
        let created: CreatedDocument = self.runtime.block_on(async {
            let response = self
                .request(self.client.post(self.documents_url()).json(
                    &CreateDocumentRequest {
                        app: &self.application_tag,
                        data: &record,
                    },
                ))
                .send()
                .await
                .map_err(|err| StoreError::Unavailable(err.to_string()))?
                .error_for_status()
                .map_err(|err| StoreError::Unavailable(err.to_string()))?;

            response
                .json()
                .await
                .map_err(|err| StoreError::InvalidDocument(err.to_string()))
        })?;

        Ok(SavedAnalysis::from_parts(AnalysisId(created.id), record))
    }

    fn fetch(&self, id: &AnalysisId) -> Result<Option<SavedAnalysis>, StoreError> {
        let url = self.document_url(id);
        let result = self.runtime.block_on(async {
            let response = self
                .request(self.client.get(&url).query(&[("app", &self.application_tag)]))
                .send()
                .await
                .map_err(|err| StoreError::Unavailable(err.to_string()))?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }

            let response = response
                .error_for_status()
                .map_err(|err| StoreError::Unavailable(err.to_string()))?;

            let envelope: DocumentEnvelope = response
                .json()
                .await
                .map_err(|err| StoreError::InvalidDocument(err.to_string()))?;
            Ok(Some(envelope))
        })?;

        Ok(result
            .map(|envelope| SavedAnalysis::from_parts(AnalysisId(envelope.id), envelope.data)))
    }

    fn mark_latest(&self, id: &AnalysisId, is_latest: bool) -> Result<(), StoreError> {
        let url = self.document_url(id);
        self.runtime.block_on(async {
            let response = self
                .request(
                    self.client
                        .patch(&url)
                        .query(&[("app", &self.application_tag)])
                        .json(&LatestPatch {
                            data: LatestFlag { is_latest },
                        }),
                )
                .send()
                .await
                .map_err(|err| StoreError::Unavailable(err.to_string()))?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(StoreError::NotFound);
            }

            response
                .error_for_status()
                .map(|_| ())
                .map_err(|err| StoreError::Unavailable(err.to_string()))
        })
    }

    fn lineage(&self, root: &AnalysisId) -> Result<Vec<SavedAnalysis>, StoreError> {
        // The collection filter matches parentId OR exact id, so the root
        // version comes back with its descendants.
        let mut versions = self.fetch_filtered(&[("lineage", root.0.as_str())])?;
        versions.sort_by_key(|analysis| analysis.version_number);
        Ok(versions)
    }

    fn list_for_client(&self, client_id: &str) -> Result<Vec<SavedAnalysis>, StoreError> {
        self.fetch_filtered(&[("client", client_id)])
    }

    fn stale_drafts(&self, cutoff: DateTime<Utc>) -> Result<Vec<SavedAnalysis>, StoreError> {
        let cutoff = cutoff.to_rfc3339();
        self.fetch_filtered(&[("status", "draft"), ("latest", "true"), ("before", &cutoff)])
    }

    fn delete(&self, id: &AnalysisId) -> Result<(), StoreError> {
        let url = self.document_url(id);
        self.runtime.block_on(async {
            let response = self
                .request(self.client.delete(&url).query(&[("app", &self.application_tag)]))
                .send()
                .await
                .map_err(|err| StoreError::Unavailable(err.to_string()))?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(StoreError::NotFound);
            }

            response
                .error_for_status()
                .map(|_| ())
                .map_err(|err| StoreError::Unavailable(err.to_string()))
        })
    }
}
