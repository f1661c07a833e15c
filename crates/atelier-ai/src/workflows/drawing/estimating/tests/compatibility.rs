use super::common::*;
use crate::workflows::drawing::estimating::EstimatingEngine;

#[test]
fn piece_type_token_selects_matching_materials() {
    let engine = EstimatingEngine::new();
    let profile = profile(
        vec![
            material("tube", "Tube inox 30x30", 288.0, 60.0),
            material("plat", "Plat inox 40x5", 288.0, 30.0),
        ],
        vec![],
    );
    let extraction = extraction("tube", "inox", "24");

    let outcome = engine.compute_all(&extraction, &profile).expect("computes");

    // Both materials contain "inox"; both pass. The tube is not the only one.
    assert_eq!(outcome.ranked.len(), 2);
}

#[test]
fn generic_tokens_always_pass() {
    let engine = EstimatingEngine::new();
    let profile = profile(
        vec![
            material("m1", "Barre acier etire", 288.0, 20.0),
            material("m2", "Profil alu 6060", 288.0, 25.0),
            material("m3", "Tube inox 30x30", 288.0, 60.0),
        ],
        vec![],
    );
    // Piece tokens match nothing, but acier/alu are generic.
    let extraction = extraction("corniere", "laiton", "24");

    let outcome = engine.compute_all(&extraction, &profile).expect("computes");

    let kinds: Vec<&str> = outcome
        .ranked
        .iter()
        .map(|result| result.material.kind.as_str())
        .collect();
    assert_eq!(kinds.len(), 2);
    assert!(kinds.iter().all(|kind| !kind.contains("inox")));
}

#[test]
fn no_match_waives_the_filter_entirely() {
    let engine = EstimatingEngine::new();
    let profile = profile(
        vec![
            material("m1", "Tube inox 30x30", 288.0, 60.0),
            material("m2", "Plat laiton 20x2", 288.0, 80.0),
        ],
        vec![],
    );
    // Nothing matches: no piece token, no material token, no generic token.
    let extraction = extraction("corniere", "titane", "24");

    let outcome = engine.compute_all(&extraction, &profile).expect("computes");

    // Fail-open: the whole catalog is used.
    assert_eq!(outcome.ranked.len(), 2);
}

#[test]
fn matching_is_case_insensitive() {
    let engine = EstimatingEngine::new();
    let profile = profile(
        vec![material("m1", "TUBE ACIER 40X40", 288.0, 45.50)],
        vec![],
    );
    let extraction = extraction("Tube", "Acier", "24");

    let outcome = engine.compute_all(&extraction, &profile).expect("computes");

    assert_eq!(outcome.ranked.len(), 1);
}
