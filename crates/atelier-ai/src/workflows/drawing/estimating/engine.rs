use tracing::{debug, warn};

use crate::workflows::drawing::extraction::ExtractionResult;

use super::domain::{CalculationOutcome, CalculationResult, CatalogProfile, Material};
use super::expr::{evaluate_condition, evaluate_yield, Bindings, Value};

/// End waste subtracted from the usable bar length by the default formula,
/// in the material's own unit system.
pub const DEFAULT_MARGIN: f64 = 12.0;

/// Cut width added to each piece by the default formula.
pub const DEFAULT_KERF: f64 = 0.25;

/// Generic material tokens that always pass the compatibility filter.
const GENERIC_TOKENS: [&str; 2] = ["acier", "alu"];

/// Piece types matched directly against the material designation.
const SHAPE_TOKENS: [&str; 2] = ["tube", "plat"];

/// Preconditions that abort the whole calculation with no results.
#[derive(Debug, thiserror::Error)]
pub enum CalculationError {
    #[error("piece length '{raw}' is not a positive number")]
    InvalidPieceLength { raw: String },
    #[error("the selected profile has no materials")]
    EmptyCatalog,
}

/// Stateless engine enumerating and ranking (material, formula) candidates
/// for one extraction against one client catalog.
#[derive(Debug, Default)]
pub struct EstimatingEngine;

impl EstimatingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Enumerate every admissible candidate, rank them, and select the top.
    ///
    /// Each compatible material contributes one candidate per applicable
    /// client formula plus exactly one default geometric candidate, so the
    /// ranking is never empty once the preconditions hold.
    pub fn compute_all(
        &self,
        extraction: &ExtractionResult,
        profile: &CatalogProfile,
    ) -> Result<CalculationOutcome, CalculationError> {
        if profile.materials.is_empty() {
            return Err(CalculationError::EmptyCatalog);
        }

        let piece_length = self.piece_length(extraction)?;
        let piece_type = extraction.data.piece_type.value.trim().to_lowercase();
        let material_token = extraction.data.material.value.trim().to_lowercase();

        let compatible = compatible_materials(profile, &piece_type, &material_token);

        let mut ranked = Vec::new();
        for material in compatible {
            let bindings = material_bindings(extraction, material, piece_length);

            for formula in &profile.formulas {
                if !evaluate_condition(&formula.condition, &bindings) {
                    continue;
                }
                match evaluate_yield(&formula.formula, &bindings) {
                    Ok(value) => {
                        let pieces = floor_yield(value);
                        ranked.push(candidate(
                            material,
                            pieces,
                            Some(formula.clone()),
                            format!(
                                "formula '{}' yields {} piece(s) per bar of {}",
                                formula.name, pieces, material.kind
                            ),
                            bindings.clone(),
                        ));
                    }
                    Err(err) => {
                        // Scoped failure: drop this one candidate, keep the rest.
                        warn!(
                            formula = %formula.name,
                            material = %material.kind,
                            error = %err,
                            "yield formula failed, dropping candidate"
                        );
                    }
                }
            }

            let default_pieces =
                floor_yield((material.standard_length - DEFAULT_MARGIN) / (piece_length + DEFAULT_KERF));
            ranked.push(candidate(
                material,
                default_pieces,
                None,
                format!(
                    "default geometric yield: {} piece(s) per bar of {}",
                    default_pieces, material.kind
                ),
                bindings,
            ));
        }

        ranked.sort_by(|a, b| {
            b.pieces_per_bar
                .cmp(&a.pieces_per_bar)
                .then(a.estimated_cost.total_cmp(&b.estimated_cost))
        });

        debug!(candidates = ranked.len(), "calculation ranked");

        Ok(CalculationOutcome {
            ranked,
            selected: 0,
        })
    }

    fn piece_length(&self, extraction: &ExtractionResult) -> Result<f64, CalculationError> {
        let raw = extraction
            .piece_length_field()
            .map(|field| field.value.clone())
            .unwrap_or_default();

        parse_length(&raw).ok_or(CalculationError::InvalidPieceLength { raw })
    }
}

/// Strip everything non-numeric, accept `,` as a decimal separator, and
/// require a strictly positive result.
fn parse_length(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ','))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|length| *length > 0.0)
}

/// Case-insensitive token filter over the material designation. An empty
/// match set waives the filter: estimating proceeds over the whole catalog
/// rather than failing closed.
fn compatible_materials<'a>(
    profile: &'a CatalogProfile,
    piece_type: &str,
    material_token: &str,
) -> Vec<&'a Material> {
    let matched: Vec<&Material> = profile
        .materials
        .iter()
        .filter(|material| {
            let kind = material.kind.to_lowercase();
            (!piece_type.is_empty() && kind.contains(piece_type))
                || (!material_token.is_empty() && kind.contains(material_token))
                || GENERIC_TOKENS.iter().any(|token| kind.contains(token))
                || SHAPE_TOKENS
                    .iter()
                    .any(|token| piece_type == *token && kind.contains(token))
        })
        .collect();

    if matched.is_empty() {
        profile.materials.iter().collect()
    } else {
        matched
    }
}

fn material_bindings(
    extraction: &ExtractionResult,
    material: &Material,
    piece_length: f64,
) -> Bindings {
    let mut bindings = Bindings::new();
    bindings.insert("longueur_piece".to_string(), Value::Number(piece_length));
    bindings.insert(
        "longueur_barre".to_string(),
        Value::Number(material.standard_length),
    );
    bindings.insert(
        "type_piece".to_string(),
        Value::from(extraction.data.piece_type.value.trim().to_lowercase()),
    );
    bindings.insert(
        "materiau".to_string(),
        Value::from(extraction.data.material.value.trim().to_lowercase()),
    );
    bindings.insert(
        "procedes".to_string(),
        Value::List(
            extraction
                .data
                .processes
                .iter()
                .map(|process| Value::from(process.value.clone()))
                .collect(),
        ),
    );
    bindings.insert(
        "cout_materiau".to_string(),
        Value::Number(material.cost_per_unit),
    );
    bindings
}

fn floor_yield(value: f64) -> u32 {
    value.floor().max(0.0) as u32
}

fn candidate(
    material: &Material,
    pieces: u32,
    applied_formula: Option<super::domain::Formula>,
    details: String,
    variables: Bindings,
) -> CalculationResult {
    // A zero-piece candidate costs one full bar: "does not fit" must rank as
    // expensive, never as infinite.
    let estimated_cost = if pieces > 0 {
        material.cost_per_unit / pieces as f64
    } else {
        material.cost_per_unit
    };

    CalculationResult {
        pieces_per_bar: pieces,
        estimated_cost,
        material: material.clone(),
        applied_formula,
        details,
        variables,
    }
}
