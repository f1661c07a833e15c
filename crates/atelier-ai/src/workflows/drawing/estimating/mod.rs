//! Cutting-yield estimation: the expression evaluator, the candidate
//! enumeration engine, and the ranked outcome surfaced to the review flow.

pub mod domain;
mod engine;
pub mod expr;

#[cfg(test)]
mod tests;

pub use domain::{
    CalculationOutcome, CalculationResult, CatalogProfile, Formula, Material, SelectionError,
};
pub use engine::{CalculationError, EstimatingEngine, DEFAULT_KERF, DEFAULT_MARGIN};
pub use expr::{evaluate_condition, evaluate_yield, Bindings, EvalError, Value};
