//! Expression language for formula conditions and yield formulas.
//!
//! Expressions are tokenized and parsed into a tree, then evaluated against a
//! typed binding map by whole-identifier lookup. Grammar: arithmetic
//! (`+ - * /`), comparisons (`== != < <= > >=`), boolean combinators
//! (`&& || !`), parentheses, quoted string literals, and the aggregates
//! `sum`/`avg`/`max`/`min`/`count` over an identifier or dotted
//! `field.property` path resolving to a list.

mod eval;
mod lexer;
mod parser;

pub use eval::{Bindings, Value};

use eval::eval;
use parser::parse;

/// Errors raised while parsing or evaluating an expression.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("property '{property}' missing on items of '{path}'")]
    MissingProperty { path: String, property: String },
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("aggregate over an empty list")]
    EmptyAggregate,
}

/// Evaluate an expression to its raw value.
pub fn evaluate(source: &str, bindings: &Bindings) -> Result<Value, EvalError> {
    let expr = parse(source)?;
    eval(&expr, bindings)
}

/// Evaluate an eligibility condition.
///
/// A blank condition is always applicable; any parse or evaluation failure
/// makes the formula inapplicable rather than failing the calculation.
pub fn evaluate_condition(source: &str, bindings: &Bindings) -> bool {
    if source.trim().is_empty() {
        return true;
    }

    match evaluate(source, bindings) {
        Ok(Value::Bool(value)) => value,
        Ok(Value::Number(value)) => value != 0.0,
        Ok(_) | Err(_) => false,
    }
}

/// Evaluate a yield formula to a number. Errors propagate so the caller can
/// drop the single (material, formula) candidate that produced them.
pub fn evaluate_yield(source: &str, bindings: &Bindings) -> Result<f64, EvalError> {
    match evaluate(source, bindings)? {
        Value::Number(value) => Ok(value),
        other => Err(EvalError::TypeMismatch {
            expected: "number",
            found: other.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn bindings() -> Bindings {
        let mut bindings = BTreeMap::new();
        bindings.insert("longueur_piece".to_string(), Value::Number(24.0));
        bindings.insert("longueur_barre".to_string(), Value::Number(288.0));
        bindings.insert("type_piece".to_string(), Value::from("tube"));
        bindings.insert(
            "procedes".to_string(),
            Value::List(vec![Value::from("sciage"), Value::from("percage")]),
        );
        bindings.insert(
            "percages".to_string(),
            Value::List(vec![
                Value::Record(BTreeMap::from([("diametre".to_string(), Value::Number(8.0))])),
                Value::Record(BTreeMap::from([("diametre".to_string(), Value::Number(12.0))])),
            ]),
        );
        bindings
    }

    #[test]
    fn arithmetic_follows_precedence_and_parentheses() {
        let bindings = bindings();

        let value = evaluate("(longueur_barre - 12) / (longueur_piece + 0.25)", &bindings)
            .expect("evaluates");

        match value {
            Value::Number(n) => assert!((n - 276.0 / 24.25).abs() < 1e-9),
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn conditions_mix_comparisons_and_boolean_logic() {
        let bindings = bindings();

        assert!(evaluate_condition(
            "type_piece == 'tube' && longueur_piece < 100",
            &bindings
        ));
        assert!(!evaluate_condition("type_piece == 'plat'", &bindings));
        assert!(evaluate_condition(
            "type_piece == 'plat' || longueur_barre >= 288",
            &bindings
        ));
        assert!(evaluate_condition("!(longueur_piece > 50)", &bindings));
    }

    #[test]
    fn blank_conditions_are_always_applicable() {
        assert!(evaluate_condition("", &bindings()));
        assert!(evaluate_condition("   ", &bindings()));
    }

    #[test]
    fn condition_errors_mean_inapplicable() {
        let bindings = bindings();

        assert!(!evaluate_condition("inconnue > 3", &bindings));
        assert!(!evaluate_condition("longueur_piece >", &bindings));
        assert!(!evaluate_condition("type_piece + 3 == 4", &bindings));
    }

    #[test]
    fn aggregates_cover_counts_and_dotted_paths() {
        let bindings = bindings();

        assert!(evaluate_condition("count(procedes) == 2", &bindings));
        assert!(evaluate_condition("sum(percages.diametre) == 20", &bindings));
        assert!(evaluate_condition("avg(percages.diametre) == 10", &bindings));
        assert!(evaluate_condition("max(percages.diametre) == 12", &bindings));
        assert!(evaluate_condition("min(percages.diametre) == 8", &bindings));
    }

    #[test]
    fn yield_errors_propagate() {
        let bindings = bindings();

        assert!(matches!(
            evaluate_yield("longueur_barre / inconnue", &bindings),
            Err(EvalError::UnknownIdentifier(name)) if name == "inconnue"
        ));
        assert!(matches!(
            evaluate_yield("longueur_barre / (longueur_piece - 24)", &bindings),
            Err(EvalError::DivisionByZero)
        ));
        assert!(matches!(
            evaluate_yield("type_piece", &bindings),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn whole_identifier_resolution_never_matches_substrings() {
        let mut bindings = Bindings::new();
        bindings.insert("x".to_string(), Value::Number(2.0));

        // `xyz` is unbound even though `x` is: no partial-identifier
        // substitution survives in this evaluator.
        assert!(matches!(
            evaluate_yield("xyz * 2", &bindings),
            Err(EvalError::UnknownIdentifier(name)) if name == "xyz"
        ));
        assert!(matches!(
            evaluate_yield("x * 2", &bindings),
            Ok(value) if value == 4.0
        ));
    }
}
