use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for extraction results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractionId(pub String);

static EXTRACTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_extraction_id() -> ExtractionId {
    let id = EXTRACTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ExtractionId(format!("extr-{id:06}"))
}

/// Atomic unit of extracted information. A value never travels without its
/// provenance pair: the agent confidence (0-100) and the justification the
/// agent gave for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub value: String,
    pub confidence: f64,
    pub reason: String,
}

impl ExtractedField {
    pub fn new(value: impl Into<String>, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            confidence: confidence.clamp(0.0, 100.0),
            reason: reason.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new("", 0.0, "not detected")
    }
}

impl Default for ExtractedField {
    fn default() -> Self {
        Self::empty()
    }
}

/// Extracted measurement with the unit the drawing expressed it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionField {
    pub value: String,
    pub confidence: f64,
    pub reason: String,
    pub unit: String,
}

/// Free-form annotation lifted from the drawing margin or title block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteField {
    pub content: String,
    pub confidence: f64,
    pub reason: String,
}

/// Fields the agents returned that have no structured slot. Some agents emit
/// one record per name, others a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomFieldValue {
    Single(ExtractedField),
    Many(Vec<ExtractedField>),
}

/// The reviewed, mutable source of truth for everything read off a drawing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionData {
    pub reference: ExtractedField,
    pub description: ExtractedField,
    pub material: ExtractedField,
    pub piece_type: ExtractedField,
    pub dimensions: BTreeMap<String, DimensionField>,
    pub processes: Vec<ExtractedField>,
    pub notes: Vec<NoteField>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_fields: BTreeMap<String, CustomFieldValue>,
}

/// One extraction run against one uploaded drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub id: ExtractionId,
    pub file_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    /// Raw agent payload, kept verbatim for audits and re-normalization.
    pub raw: serde_json::Value,
    pub data: ExtractionData,
}

impl ExtractionResult {
    pub fn new(
        file_name: impl Into<String>,
        timestamp: DateTime<Utc>,
        raw: serde_json::Value,
        data: ExtractionData,
    ) -> Self {
        Self {
            id: next_extraction_id(),
            file_name: file_name.into(),
            timestamp,
            file_url: None,
            file_type: None,
            raw,
            data,
        }
    }

    /// Extracted piece length used by the estimating engine: the `longueur`
    /// dimension when present, otherwise the first dimension on the drawing.
    pub fn piece_length_field(&self) -> Option<&DimensionField> {
        self.data
            .dimensions
            .get("longueur")
            .or_else(|| self.data.dimensions.values().next())
    }
}
