use serde::{Deserialize, Serialize};

use super::expr::Bindings;

/// Stock material owned by a client profile. Immutable reference data; the
/// engine never mutates the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: String,
    /// Commercial designation, e.g. "Tube acier 40x40". The compatibility
    /// filter matches piece tokens against it.
    pub kind: String,
    pub dimensions: String,
    pub standard_length: f64,
    pub unit: String,
    pub cost_per_unit: f64,
}

/// Client-defined yield formula with its eligibility condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub id: String,
    pub name: String,
    pub condition: String,
    pub formula: String,
    pub description: String,
}

/// The material/formula catalog of one client profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProfile {
    pub id: String,
    pub name: String,
    pub materials: Vec<Material>,
    pub formulas: Vec<Formula>,
}

/// One candidate estimate: a material paired with either a client formula or
/// the default geometric formula (`applied_formula = None`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    pub pieces_per_bar: u32,
    pub estimated_cost: f64,
    pub material: Material,
    pub applied_formula: Option<Formula>,
    pub details: String,
    pub variables: Bindings,
}

/// Ranked candidate list plus the index of the currently selected estimate.
///
/// The top of the ranking is selected initially; overriding the pick is a
/// first-class operation, not an error path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationOutcome {
    pub ranked: Vec<CalculationResult>,
    pub selected: usize,
}

impl CalculationOutcome {
    pub fn selected_result(&self) -> &CalculationResult {
        &self.ranked[self.selected]
    }

    /// Manually override the selected candidate.
    pub fn select(&mut self, index: usize) -> Result<(), SelectionError> {
        if index >= self.ranked.len() {
            return Err(SelectionError::OutOfRange {
                index,
                len: self.ranked.len(),
            });
        }
        self.selected = index;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("candidate index {index} out of range (ranked list has {len})")]
    OutOfRange { index: usize, len: usize },
}
