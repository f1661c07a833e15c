use super::domain::{CustomFieldValue, DimensionField, ExtractedField, ExtractionData, NoteField};

/// Reason recorded on every manually corrected field.
pub const MANUAL_EDIT_REASON: &str = "manually edited";

/// Confidence granted to a human correction.
pub const MANUAL_EDIT_CONFIDENCE: f64 = 100.0;

/// Errors raised while addressing or applying a field edit.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("unknown field path '{0}'")]
    UnknownPath(String),
    #[error("no dimension named '{0}'")]
    UnknownDimension(String),
    #[error("process index {0} out of range")]
    ProcessOutOfRange(usize),
    #[error("note index {0} out of range")]
    NoteOutOfRange(usize),
    #[error("no custom field named '{0}'")]
    UnknownCustomField(String),
    #[error("custom field '{0}' index {1} out of range")]
    CustomFieldOutOfRange(String, usize),
}

/// Addressable location inside [`ExtractionData`], parsed from the dotted
/// notation the review UI sends (`dimensions.longueur`, `processes.0`,
/// `customFields.tolerance.1`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    Reference,
    Description,
    Material,
    PieceType,
    Dimension(String),
    Process(usize),
    Note(usize),
    Custom(String),
    CustomIndexed(String, usize),
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, ReviewError> {
        let mut segments = raw.split('.');
        let head = segments.next().unwrap_or_default();

        let path = match head {
            "reference" => Self::Reference,
            "description" => Self::Description,
            "material" | "materiau" => Self::Material,
            "pieceType" | "piece_type" => Self::PieceType,
            "dimensions" => {
                let name = segments
                    .next()
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| ReviewError::UnknownPath(raw.to_string()))?;
                Self::Dimension(name.to_string())
            }
            "processes" => {
                let index = parse_index(segments.next(), raw)?;
                Self::Process(index)
            }
            "notes" => {
                let index = parse_index(segments.next(), raw)?;
                Self::Note(index)
            }
            "customFields" | "custom_fields" => {
                let name = segments
                    .next()
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| ReviewError::UnknownPath(raw.to_string()))?;
                match segments.next() {
                    Some(index) => {
                        let index = index
                            .parse::<usize>()
                            .map_err(|_| ReviewError::UnknownPath(raw.to_string()))?;
                        Self::CustomIndexed(name.to_string(), index)
                    }
                    None => Self::Custom(name.to_string()),
                }
            }
            _ => return Err(ReviewError::UnknownPath(raw.to_string())),
        };

        if segments.next().is_some() {
            return Err(ReviewError::UnknownPath(raw.to_string()));
        }

        Ok(path)
    }
}

fn parse_index(segment: Option<&str>, raw: &str) -> Result<usize, ReviewError> {
    segment
        .and_then(|segment| segment.parse::<usize>().ok())
        .ok_or_else(|| ReviewError::UnknownPath(raw.to_string()))
}

/// Apply a human correction to the addressed field.
///
/// Every edit overwrites the provenance pair: confidence becomes 100 and the
/// reason becomes the manual-edit marker, whatever the agents reported.
pub fn apply_edit(
    data: &mut ExtractionData,
    path: &FieldPath,
    new_value: impl Into<String>,
) -> Result<(), ReviewError> {
    let new_value = new_value.into();
    match path {
        FieldPath::Reference => overwrite(&mut data.reference, new_value),
        FieldPath::Description => overwrite(&mut data.description, new_value),
        FieldPath::Material => overwrite(&mut data.material, new_value),
        FieldPath::PieceType => overwrite(&mut data.piece_type, new_value),
        FieldPath::Dimension(name) => {
            let dimension = data
                .dimensions
                .get_mut(name)
                .ok_or_else(|| ReviewError::UnknownDimension(name.clone()))?;
            overwrite_dimension(dimension, new_value);
        }
        FieldPath::Process(index) => {
            let field = data
                .processes
                .get_mut(*index)
                .ok_or(ReviewError::ProcessOutOfRange(*index))?;
            overwrite(field, new_value);
        }
        FieldPath::Note(index) => {
            let note = data
                .notes
                .get_mut(*index)
                .ok_or(ReviewError::NoteOutOfRange(*index))?;
            overwrite_note(note, new_value);
        }
        FieldPath::Custom(name) => {
            let value = data
                .custom_fields
                .get_mut(name)
                .ok_or_else(|| ReviewError::UnknownCustomField(name.clone()))?;
            match value {
                CustomFieldValue::Single(field) => overwrite(field, new_value),
                CustomFieldValue::Many(_) => {
                    return Err(ReviewError::UnknownPath(format!("customFields.{name}")))
                }
            }
        }
        FieldPath::CustomIndexed(name, index) => {
            let value = data
                .custom_fields
                .get_mut(name)
                .ok_or_else(|| ReviewError::UnknownCustomField(name.clone()))?;
            match value {
                CustomFieldValue::Many(fields) => {
                    let field = fields
                        .get_mut(*index)
                        .ok_or_else(|| ReviewError::CustomFieldOutOfRange(name.clone(), *index))?;
                    overwrite(field, new_value);
                }
                CustomFieldValue::Single(_) => {
                    return Err(ReviewError::CustomFieldOutOfRange(name.clone(), *index))
                }
            }
        }
    }

    Ok(())
}

fn overwrite(field: &mut ExtractedField, value: String) {
    field.value = value;
    field.confidence = MANUAL_EDIT_CONFIDENCE;
    field.reason = MANUAL_EDIT_REASON.to_string();
}

fn overwrite_dimension(field: &mut DimensionField, value: String) {
    field.value = value;
    field.confidence = MANUAL_EDIT_CONFIDENCE;
    field.reason = MANUAL_EDIT_REASON.to_string();
}

fn overwrite_note(note: &mut NoteField, content: String) {
    note.content = content;
    note.confidence = MANUAL_EDIT_CONFIDENCE;
    note.reason = MANUAL_EDIT_REASON.to_string();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::drawing::extraction::domain::ExtractedField;

    fn sample_data() -> ExtractionData {
        let mut data = ExtractionData::default();
        data.reference = ExtractedField::new("PL-1042", 87.0, "title block");
        data.dimensions.insert(
            "longueur".to_string(),
            DimensionField {
                value: "2400".to_string(),
                confidence: 62.0,
                reason: "dimension line".to_string(),
                unit: "mm".to_string(),
            },
        );
        data.processes
            .push(ExtractedField::new("sciage", 71.0, "process table"));
        data.custom_fields.insert(
            "tolerance".to_string(),
            CustomFieldValue::Many(vec![ExtractedField::new("±0.5", 55.0, "note")]),
        );
        data
    }

    #[test]
    fn edits_force_confidence_and_reason() {
        let mut data = sample_data();
        let path = FieldPath::parse("dimensions.longueur").expect("path parses");

        apply_edit(&mut data, &path, "2380").expect("edit applies");

        let dimension = data.dimensions.get("longueur").expect("dimension");
        assert_eq!(dimension.value, "2380");
        assert_eq!(dimension.confidence, MANUAL_EDIT_CONFIDENCE);
        assert_eq!(dimension.reason, MANUAL_EDIT_REASON);
        assert_eq!(dimension.unit, "mm");
    }

    #[test]
    fn indexed_custom_field_edits_resolve() {
        let mut data = sample_data();
        let path = FieldPath::parse("customFields.tolerance.0").expect("path parses");

        apply_edit(&mut data, &path, "±0.2").expect("edit applies");

        match data.custom_fields.get("tolerance").expect("field") {
            CustomFieldValue::Many(fields) => {
                assert_eq!(fields[0].value, "±0.2");
                assert_eq!(fields[0].confidence, MANUAL_EDIT_CONFIDENCE);
            }
            other => panic!("expected list-valued custom field, got {other:?}"),
        }
    }

    #[test]
    fn unknown_paths_are_rejected() {
        assert!(FieldPath::parse("dimensions").is_err());
        assert!(FieldPath::parse("processes.x").is_err());
        assert!(FieldPath::parse("nonsense.path").is_err());
        assert!(FieldPath::parse("reference.extra").is_err());
    }

    #[test]
    fn out_of_range_edits_are_scoped_errors() {
        let mut data = sample_data();

        let result = apply_edit(&mut data, &FieldPath::Process(4), "percage");

        assert!(matches!(result, Err(ReviewError::ProcessOutOfRange(4))));
        assert_eq!(data.processes[0].value, "sciage");
    }
}
