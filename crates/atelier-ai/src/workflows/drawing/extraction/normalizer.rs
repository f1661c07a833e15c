use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::domain::{
    CustomFieldValue, DimensionField, ExtractedField, ExtractionData, NoteField,
};

/// One record of the agent field list.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentField {
    pub name: String,
    #[serde(default)]
    pub data_type: Option<String>,
    pub value: JsonValue,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub justification: Option<String>,
}

/// The two response shapes the extraction service is known to produce: the
/// current array-of-records form and a legacy object keyed by field name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AgentResponse {
    Fields(Vec<AgentField>),
    Keyed(BTreeMap<String, KeyedAgentField>),
}

/// Body of one entry in the legacy keyed shape; the field name lives on the
/// surrounding map key.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyedAgentField {
    #[serde(default)]
    pub data_type: Option<String>,
    pub value: JsonValue,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub justification: Option<String>,
}

/// Normalize either response shape into the reviewed extraction model.
///
/// Known names land in their structured slots, dimension-typed fields are
/// split into value and unit, and everything else becomes a custom field.
pub fn normalize(response: AgentResponse) -> ExtractionData {
    let fields = match response {
        AgentResponse::Fields(fields) => fields,
        AgentResponse::Keyed(map) => map
            .into_iter()
            .map(|(name, body)| AgentField {
                name,
                data_type: body.data_type,
                value: body.value,
                confidence: body.confidence,
                justification: body.justification,
            })
            .collect(),
    };

    let mut data = ExtractionData::default();

    for field in fields {
        route_field(&mut data, field);
    }

    data
}

fn route_field(data: &mut ExtractionData, field: AgentField) {
    let name = canonical_name(&field.name);
    let confidence = field.confidence.unwrap_or(0.0).clamp(0.0, 100.0);
    let reason = field.justification.clone().unwrap_or_default();

    match name.as_str() {
        "reference" => data.reference = scalar_field(&field.value, confidence, &reason),
        "description" | "designation" => {
            data.description = scalar_field(&field.value, confidence, &reason)
        }
        "material" | "matiere" => data.material = scalar_field(&field.value, confidence, &reason),
        "piece_type" | "type_piece" => {
            data.piece_type = scalar_field(&field.value, confidence, &reason)
        }
        "processes" | "procedes" => {
            data.processes = list_fields(&field.value, confidence, &reason)
        }
        "notes" => {
            data.notes = list_fields(&field.value, confidence, &reason)
                .into_iter()
                .map(|field| NoteField {
                    content: field.value,
                    confidence: field.confidence,
                    reason: field.reason,
                })
                .collect()
        }
        _ if is_dimension(&name, field.data_type.as_deref()) => {
            let scalar = scalar_field(&field.value, confidence, &reason);
            let (value, unit) = split_unit(&scalar.value);
            data.dimensions.insert(
                name,
                DimensionField {
                    value,
                    confidence: scalar.confidence,
                    reason: scalar.reason,
                    unit,
                },
            );
        }
        _ => {
            let value = match &field.value {
                JsonValue::Array(_) => {
                    CustomFieldValue::Many(list_fields(&field.value, confidence, &reason))
                }
                _ => CustomFieldValue::Single(scalar_field(&field.value, confidence, &reason)),
            };
            data.custom_fields.insert(name, value);
        }
    }
}

/// Lowercase, trimmed, whitespace collapsed to underscores.
fn canonical_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

const DIMENSION_NAMES: [&str; 7] = [
    "longueur",
    "largeur",
    "hauteur",
    "epaisseur",
    "diametre",
    "rayon",
    "section",
];

fn is_dimension(name: &str, data_type: Option<&str>) -> bool {
    if matches!(data_type, Some(kind) if kind.eq_ignore_ascii_case("dimension")) {
        return true;
    }
    DIMENSION_NAMES.contains(&name)
}

fn scalar_field(value: &JsonValue, confidence: f64, reason: &str) -> ExtractedField {
    let text = match value {
        JsonValue::String(text) => text.trim().to_string(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    };
    ExtractedField::new(text, confidence, reason)
}

fn list_fields(value: &JsonValue, confidence: f64, reason: &str) -> Vec<ExtractedField> {
    match value {
        JsonValue::Array(items) => items
            .iter()
            .map(|item| match item {
                JsonValue::Object(body) => {
                    let item_value = body.get("value").cloned().unwrap_or(JsonValue::Null);
                    let item_confidence = body
                        .get("confidence")
                        .and_then(JsonValue::as_f64)
                        .unwrap_or(confidence);
                    let item_reason = body
                        .get("justification")
                        .and_then(JsonValue::as_str)
                        .unwrap_or(reason);
                    scalar_field(&item_value, item_confidence, item_reason)
                }
                other => scalar_field(other, confidence, reason),
            })
            .collect(),
        JsonValue::Null => Vec::new(),
        other => vec![scalar_field(other, confidence, reason)],
    }
}

/// Split a trailing unit off a measurement string ("2400 mm" -> ("2400", "mm")).
fn split_unit(raw: &str) -> (String, String) {
    let trimmed = raw.trim();
    let boundary = trimmed
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | ' '))
        .last()
        .map(|(index, c)| index + c.len_utf8())
        .unwrap_or(0);

    let (value, unit) = trimmed.split_at(boundary);
    (value.trim().to_string(), unit.trim().to_string())
}
