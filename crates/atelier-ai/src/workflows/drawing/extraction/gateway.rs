use std::time::Duration;

use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tokio::runtime::Runtime;
use tracing::warn;

use crate::config::ExtractionConfig;

use super::domain::ExtractionResult;
use super::normalizer::{normalize, AgentResponse};

/// Errors raised while talking to the drawing-extraction service.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("extraction endpoint is not configured")]
    NotConfigured,
    #[error("extraction backend failed: {0}")]
    Backend(String),
    #[error("extraction runtime unavailable: {0}")]
    Runtime(String),
    #[error("extraction response could not be parsed: {0}")]
    InvalidPayload(String),
}

/// One drawing handed to the extraction service together with the
/// natural-language instruction describing the fields to pull.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub file_name: String,
    pub file_type: Option<String>,
    pub bytes: Vec<u8>,
    pub instruction: String,
}

impl ExtractionRequest {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            file_type: None,
            bytes,
            instruction: standard_instruction(),
        }
    }

    pub fn with_file_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = Some(file_type.into());
        self
    }
}

/// Default instruction sent alongside every drawing.
pub fn standard_instruction() -> String {
    [
        "Extract the following fields from this technical drawing:",
        "reference, description, matiere, type_piece,",
        "every dimension (longueur, largeur, hauteur, epaisseur, diametre) with its unit,",
        "the list of fabrication processes (procedes), and any margin notes.",
        "Return one record per field with name, data_type, value, confidence (0-100), and justification.",
    ]
    .join(" ")
}

/// Boundary to the external multi-agent extraction service.
pub trait ExtractionGateway: Send + Sync {
    fn analyze_drawing(&self, request: ExtractionRequest)
        -> Result<ExtractionResult, ExtractionError>;
}

/// Thin wrapper around the extraction HTTP endpoint allowing synchronous
/// workflows to run analyses without exposing async details.
///
/// The agent pipeline itself is sequential: post the file, parse the field
/// list, retry the call once when the payload does not parse.
pub struct HttpExtractionClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    runtime: Runtime,
}

impl HttpExtractionClient {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        let base_url = config
            .base_url
            .clone()
            .ok_or(ExtractionError::NotConfigured)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| ExtractionError::Runtime(err.to_string()))?;

        let runtime = Runtime::new().map_err(|err| ExtractionError::Runtime(err.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            runtime,
        })
    }

    fn call(&self, request: &ExtractionRequest) -> Result<String, ExtractionError> {
        let mime_type = request
            .file_type
            .as_deref()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref())
            .to_string();

        self.runtime.block_on(async {
            let part = Part::bytes(request.bytes.clone())
                .file_name(request.file_name.clone())
                .mime_str(&mime_type)
                .map_err(|err| ExtractionError::Backend(err.to_string()))?;

            let form = Form::new()
                .part("file", part)
                .text("instruction", request.instruction.clone());

            let mut builder = self
                .client
                .post(format!("{}/api/v1/analyze", self.base_url))
                .multipart(form);
            if let Some(key) = &self.api_key {
                builder = builder.bearer_auth(key);
            }

            let response = builder
                .send()
                .await
                .map_err(|err| ExtractionError::Backend(err.to_string()))?;

            let response = response
                .error_for_status()
                .map_err(|err| ExtractionError::Backend(err.to_string()))?;

            response
                .text()
                .await
                .map_err(|err| ExtractionError::Backend(err.to_string()))
        })
    }
}

impl ExtractionGateway for HttpExtractionClient {
    fn analyze_drawing(
        &self,
        request: ExtractionRequest,
    ) -> Result<ExtractionResult, ExtractionError> {
        let body = self.call(&request)?;

        let (raw, response) = match parse_payload(&body) {
            Ok(parsed) => parsed,
            Err(first_err) => {
                // One retry covers the service's occasional truncated payloads.
                warn!(file = %request.file_name, error = %first_err, "extraction payload unparseable, retrying once");
                let body = self.call(&request)?;
                parse_payload(&body)
                    .map_err(|err| ExtractionError::InvalidPayload(err.to_string()))?
            }
        };

        let data = normalize(response);

        let mut result = ExtractionResult::new(request.file_name, Utc::now(), raw, data);
        result.file_type = request.file_type;
        Ok(result)
    }
}

fn parse_payload(body: &str) -> Result<(serde_json::Value, AgentResponse), serde_json::Error> {
    let raw: serde_json::Value = serde_json::from_str(body)?;
    let response: AgentResponse = serde_json::from_value(raw.clone())?;
    Ok((raw, response))
}
