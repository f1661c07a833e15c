use std::collections::BTreeSet;
use std::io::Write;

use serde_json::Value as JsonValue;

use super::domain::SavedAnalysis;

const BASE_HEADERS: [&str; 15] = [
    "id",
    "title",
    "client",
    "profile",
    "file",
    "status",
    "validated",
    "quantity",
    "version",
    "latest",
    "created_at",
    "updated_at",
    "reference",
    "pieces_per_bar",
    "estimated_cost",
];

/// Export an analysis list as CSV.
///
/// Custom fields are flattened into one column per distinct object property:
/// the header is the union of every `customFields.<name>.<property>` seen
/// across the exported records, applied uniformly, with blanks where a record
/// lacks the property. List-valued fields join their items with `; `.
pub fn export_csv<W: Write>(records: &[SavedAnalysis], writer: W) -> Result<(), csv::Error> {
    let custom_columns = custom_columns(records);

    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut headers: Vec<String> = BASE_HEADERS.iter().map(|header| header.to_string()).collect();
    headers.extend(
        custom_columns
            .iter()
            .map(|(name, property)| format!("customFields.{name}.{property}")),
    );
    csv_writer.write_record(&headers)?;

    for record in records {
        let customs = record
            .analysis_result
            .data
            .custom_fields
            .iter()
            .map(|(name, value)| {
                (
                    name.clone(),
                    serde_json::to_value(value).unwrap_or(JsonValue::Null),
                )
            })
            .collect::<Vec<_>>();

        let mut row = vec![
            record.id.0.clone(),
            record.title.clone(),
            record.client_name.clone(),
            record.profile_name.clone(),
            record.file_name.clone(),
            record.status.label().to_string(),
            record.validated.to_string(),
            record.quantity.to_string(),
            record.version_number.to_string(),
            record.is_latest.to_string(),
            record.created_at.to_rfc3339(),
            record.updated_at.to_rfc3339(),
            record.analysis_result.data.reference.value.clone(),
            record
                .calculation_result
                .as_ref()
                .map(|result| result.pieces_per_bar.to_string())
                .unwrap_or_default(),
            record
                .calculation_result
                .as_ref()
                .map(|result| format!("{:.2}", result.estimated_cost))
                .unwrap_or_default(),
        ];

        for (name, property) in &custom_columns {
            let cell = customs
                .iter()
                .find(|(candidate, _)| candidate == name)
                .map(|(_, value)| flatten_property(value, property))
                .unwrap_or_default();
            row.push(cell);
        }

        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Union of (field name, property) pairs across every exported record.
fn custom_columns(records: &[SavedAnalysis]) -> Vec<(String, String)> {
    let mut columns = BTreeSet::new();

    for record in records {
        for (name, value) in &record.analysis_result.data.custom_fields {
            let value = serde_json::to_value(value).unwrap_or(JsonValue::Null);
            for property in object_properties(&value) {
                columns.insert((name.clone(), property));
            }
        }
    }

    columns.into_iter().collect()
}

fn object_properties(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::Object(map) => map.keys().cloned().collect(),
        JsonValue::Array(items) => {
            let mut properties = BTreeSet::new();
            for item in items {
                if let JsonValue::Object(map) = item {
                    properties.extend(map.keys().cloned());
                }
            }
            properties.into_iter().collect()
        }
        _ => Vec::new(),
    }
}

fn flatten_property(value: &JsonValue, property: &str) -> String {
    match value {
        JsonValue::Object(map) => map.get(property).map(scalar_cell).unwrap_or_default(),
        JsonValue::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                JsonValue::Object(map) => map.get(property).map(scalar_cell),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("; "),
        _ => String::new(),
    }
}

fn scalar_cell(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}
