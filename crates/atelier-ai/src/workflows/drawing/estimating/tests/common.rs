use chrono::{TimeZone, Utc};
use serde_json::json;

use crate::workflows::drawing::estimating::domain::{CatalogProfile, Formula, Material};
use crate::workflows::drawing::extraction::domain::{
    DimensionField, ExtractedField, ExtractionData, ExtractionResult,
};

pub(super) fn material(id: &str, kind: &str, standard_length: f64, cost: f64) -> Material {
    Material {
        id: id.to_string(),
        kind: kind.to_string(),
        dimensions: "40x40x3".to_string(),
        standard_length,
        unit: "mm".to_string(),
        cost_per_unit: cost,
    }
}

pub(super) fn formula(id: &str, name: &str, condition: &str, formula: &str) -> Formula {
    Formula {
        id: id.to_string(),
        name: name.to_string(),
        condition: condition.to_string(),
        formula: formula.to_string(),
        description: String::new(),
    }
}

pub(super) fn profile(materials: Vec<Material>, formulas: Vec<Formula>) -> CatalogProfile {
    CatalogProfile {
        id: "profile-1".to_string(),
        name: "Atelier standard".to_string(),
        materials,
        formulas,
    }
}

pub(super) fn extraction(piece_type: &str, material: &str, length: &str) -> ExtractionResult {
    let mut data = ExtractionData::default();
    data.reference = ExtractedField::new("PL-1042", 90.0, "title block");
    data.piece_type = ExtractedField::new(piece_type, 85.0, "title block");
    data.material = ExtractedField::new(material, 80.0, "title block");
    data.dimensions.insert(
        "longueur".to_string(),
        DimensionField {
            value: length.to_string(),
            confidence: 75.0,
            reason: "dimension line".to_string(),
            unit: "mm".to_string(),
        },
    );
    data.processes
        .push(ExtractedField::new("sciage", 70.0, "process table"));

    ExtractionResult::new(
        "PL-1042.pdf",
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap(),
        json!([]),
        data,
    )
}
