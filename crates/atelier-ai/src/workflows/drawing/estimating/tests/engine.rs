use super::common::*;
use crate::workflows::drawing::estimating::{
    CalculationError, EstimatingEngine,
};

#[test]
fn default_formula_matches_worked_example() {
    // floor((288 - 12) / (24 + 0.25)) = floor(276 / 24.25) = 11
    let engine = EstimatingEngine::new();
    let profile = profile(vec![material("m1", "Tube acier 40x40", 288.0, 45.50)], vec![]);
    let extraction = extraction("tube", "acier", "24");

    let outcome = engine.compute_all(&extraction, &profile).expect("computes");

    assert_eq!(outcome.ranked.len(), 1);
    let result = outcome.selected_result();
    assert_eq!(result.pieces_per_bar, 11);
    assert!((result.estimated_cost - 45.50 / 11.0).abs() < 1e-9);
    assert!(result.applied_formula.is_none());
}

#[test]
fn zero_yield_costs_one_full_bar() {
    let engine = EstimatingEngine::new();
    // Piece longer than the bar: nothing fits.
    let profile = profile(vec![material("m1", "Tube acier 40x40", 100.0, 45.50)], vec![]);
    let extraction = extraction("tube", "acier", "400");

    let outcome = engine.compute_all(&extraction, &profile).expect("computes");

    let result = outcome.selected_result();
    assert_eq!(result.pieces_per_bar, 0);
    assert_eq!(result.estimated_cost, 45.50);
}

#[test]
fn ties_break_on_cheaper_cost_per_piece() {
    let engine = EstimatingEngine::new();
    // Same geometry, different bar prices: both yield 11, B is cheaper.
    let profile = profile(
        vec![
            material("a", "Tube acier A", 288.0, 45.54),
            material("b", "Tube acier B", 288.0, 42.90),
        ],
        vec![],
    );
    let extraction = extraction("tube", "acier", "24");

    let outcome = engine.compute_all(&extraction, &profile).expect("computes");

    assert_eq!(outcome.ranked[0].pieces_per_bar, outcome.ranked[1].pieces_per_bar);
    assert_eq!(outcome.ranked[0].material.id, "b");
    assert!(outcome.ranked[0].estimated_cost < outcome.ranked[1].estimated_cost);
}

#[test]
fn applicable_formulas_add_candidates_alongside_the_default() {
    let engine = EstimatingEngine::new();
    let profile = profile(
        vec![material("m1", "Tube acier 40x40", 288.0, 45.50)],
        vec![
            formula(
                "f1",
                "coupe optimisee",
                "type_piece == 'tube'",
                "(longueur_barre - 6) / longueur_piece",
            ),
            formula("f2", "plats seulement", "type_piece == 'plat'", "longueur_barre"),
        ],
    );
    let extraction = extraction("tube", "acier", "24");

    let outcome = engine.compute_all(&extraction, &profile).expect("computes");

    // One candidate from the applicable formula, one default; the ineligible
    // formula contributes nothing.
    assert_eq!(outcome.ranked.len(), 2);
    let best = outcome.selected_result();
    assert_eq!(best.pieces_per_bar, 11);
    assert_eq!(
        best.applied_formula.as_ref().map(|f| f.id.as_str()),
        Some("f1")
    );
    // floor(282 / 24) = 11 ties the default's 11; the formula candidate wins
    // the tie only through cost equality ordering, so just check both exist.
    assert!(outcome.ranked.iter().any(|r| r.applied_formula.is_none()));
}

#[test]
fn broken_formula_drops_only_its_own_candidate() {
    let engine = EstimatingEngine::new();
    let profile = profile(
        vec![material("m1", "Tube acier 40x40", 288.0, 45.50)],
        vec![formula("f1", "cassee", "", "longueur_barre / inconnu")],
    );
    let extraction = extraction("tube", "acier", "24");

    let outcome = engine.compute_all(&extraction, &profile).expect("computes");

    assert_eq!(outcome.ranked.len(), 1);
    assert!(outcome.ranked[0].applied_formula.is_none());
}

#[test]
fn missing_piece_length_aborts_with_no_results() {
    let engine = EstimatingEngine::new();
    let profile = profile(vec![material("m1", "Tube acier 40x40", 288.0, 45.50)], vec![]);
    let extraction = extraction("tube", "acier", "indetermine");

    let result = engine.compute_all(&extraction, &profile);

    assert!(matches!(
        result,
        Err(CalculationError::InvalidPieceLength { .. })
    ));
}

#[test]
fn length_parsing_strips_units_and_accepts_comma_decimals() {
    let engine = EstimatingEngine::new();
    let profile = profile(vec![material("m1", "Tube acier 40x40", 288.0, 45.50)], vec![]);
    let extraction = extraction("tube", "acier", "24,0 mm");

    let outcome = engine.compute_all(&extraction, &profile).expect("computes");

    assert_eq!(outcome.selected_result().pieces_per_bar, 11);
}

#[test]
fn empty_catalog_is_a_precondition_error() {
    let engine = EstimatingEngine::new();
    let profile = profile(vec![], vec![]);
    let extraction = extraction("tube", "acier", "24");

    assert!(matches!(
        engine.compute_all(&extraction, &profile),
        Err(CalculationError::EmptyCatalog)
    ));
}

#[test]
fn variables_travel_with_each_candidate() {
    let engine = EstimatingEngine::new();
    let profile = profile(vec![material("m1", "Tube acier 40x40", 288.0, 45.50)], vec![]);
    let extraction = extraction("tube", "acier", "24");

    let outcome = engine.compute_all(&extraction, &profile).expect("computes");

    let variables = &outcome.selected_result().variables;
    assert!(variables.contains_key("longueur_piece"));
    assert!(variables.contains_key("longueur_barre"));
    assert!(variables.contains_key("cout_materiau"));
    assert!(variables.contains_key("procedes"));
}

#[test]
fn selection_override_is_first_class() {
    let engine = EstimatingEngine::new();
    let profile = profile(
        vec![
            material("a", "Tube acier A", 288.0, 45.54),
            material("b", "Tube acier B", 288.0, 42.90),
        ],
        vec![],
    );
    let extraction = extraction("tube", "acier", "24");

    let mut outcome = engine.compute_all(&extraction, &profile).expect("computes");

    outcome.select(1).expect("override in range");
    assert_eq!(outcome.selected_result().material.id, "a");
    assert!(outcome.select(7).is_err());
}
