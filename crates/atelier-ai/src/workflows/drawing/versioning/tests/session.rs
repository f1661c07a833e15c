use super::common::*;
use crate::workflows::drawing::extraction::{MANUAL_EDIT_CONFIDENCE, MANUAL_EDIT_REASON};
use crate::workflows::drawing::versioning::domain::{AnalysisStatus, WorkflowStep};
use crate::workflows::drawing::versioning::session::{
    AnalysisSession, SessionError, SessionEvent, SessionService,
};

fn started_session(service: &SessionService<InMemoryAnalysisStore>) -> AnalysisSession {
    let mut session = session();
    service
        .handle(
            &mut session,
            SessionEvent::ExtractionCompleted {
                extraction: extraction(),
            },
            t0(),
        )
        .expect("extraction event applies");
    session
}

fn edit(path: &str, value: &str) -> SessionEvent {
    SessionEvent::FieldEdited {
        path: path.to_string(),
        value: value.to_string(),
    }
}

#[test]
fn edits_route_through_the_review_contract() {
    let (_store, service) = service();
    let mut session = started_session(&service);

    service
        .handle(&mut session, edit("dimensions.longueur", "23"), at(1))
        .expect("edit applies");

    let extraction = session.extraction.as_ref().expect("extraction kept");
    let dimension = extraction.data.dimensions.get("longueur").expect("dimension");
    assert_eq!(dimension.value, "23");
    assert_eq!(dimension.confidence, MANUAL_EDIT_CONFIDENCE);
    assert_eq!(dimension.reason, MANUAL_EDIT_REASON);
}

#[test]
fn editing_after_validation_revokes_it_and_returns_to_review() {
    let (store, service) = service();
    let mut session = started_session(&service);

    service
        .handle(&mut session, SessionEvent::ValidateExtraction, at(5))
        .expect("validation applies");
    service
        .handle(
            &mut session,
            SessionEvent::GoToStep {
                step: WorkflowStep::Calculate,
                preserve_flags: false,
            },
            at(6),
        )
        .expect("step advances");
    assert_eq!(session.current_step, WorkflowStep::Calculate);
    let records_before = store.record_count();

    service
        .handle(&mut session, edit("dimensions.longueur", "23"), at(10))
        .expect("edit applies");

    assert!(!session.is_validated);
    assert!(!session.calculations_validated);
    assert_eq!(session.current_step, WorkflowStep::Review);
    // Revocation schedules an immediate save, not a debounce.
    assert!(store.record_count() > records_before);
    let latest = store
        .record(session.current_analysis_id.as_ref().expect("current id"))
        .expect("record");
    assert_eq!(latest.status, AnalysisStatus::Analyzed);
    assert!(!latest.validated);
}

#[test]
fn revalidation_always_takes_an_explicit_action() {
    let (_store, service) = service();
    let mut session = started_session(&service);

    service
        .handle(&mut session, SessionEvent::ValidateExtraction, at(5))
        .expect("validation applies");
    service
        .handle(&mut session, edit("dimensions.longueur", "23"), at(6))
        .expect("edit applies");
    assert!(!session.is_validated);

    // Editing the value back does not restore validation.
    service
        .handle(&mut session, edit("dimensions.longueur", "24"), at(7))
        .expect("edit applies");
    assert!(!session.is_validated);

    service
        .handle(&mut session, SessionEvent::ValidateExtraction, at(8))
        .expect("validation applies");
    assert!(session.is_validated);
}

#[test]
fn advancing_past_review_requires_validation() {
    let (_store, service) = service();
    let mut session = started_session(&service);

    let result = service.handle(
        &mut session,
        SessionEvent::GoToStep {
            step: WorkflowStep::Calculate,
            preserve_flags: false,
        },
        at(3),
    );

    assert!(matches!(result, Err(SessionError::ValidationRequired)));
    assert_eq!(session.current_step, WorkflowStep::Review);
}

#[test]
fn going_backward_resets_downstream_flags_unless_preserved() {
    let (_store, service) = service();
    let mut session = started_session(&service);

    service
        .handle(&mut session, SessionEvent::ValidateExtraction, at(5))
        .expect("validation applies");
    service.calculate(&mut session, at(6)).expect("calculation runs");
    service
        .handle(&mut session, SessionEvent::ValidateCalculations, at(7))
        .expect("calculations validated");

    service
        .handle(
            &mut session,
            SessionEvent::GoToStep {
                step: WorkflowStep::Review,
                preserve_flags: false,
            },
            at(8),
        )
        .expect("step applies");
    assert!(!session.is_validated);
    assert!(!session.calculations_validated);

    // With preserve_flags the same transition keeps both flags.
    service
        .handle(&mut session, SessionEvent::ValidateExtraction, at(9))
        .expect("validation applies");
    service
        .handle(&mut session, SessionEvent::ValidateCalculations, at(10))
        .expect("calculations validated");
    service
        .handle(
            &mut session,
            SessionEvent::GoToStep {
                step: WorkflowStep::Calculate,
                preserve_flags: false,
            },
            at(11),
        )
        .expect("step advances");
    service
        .handle(
            &mut session,
            SessionEvent::GoToStep {
                step: WorkflowStep::Review,
                preserve_flags: true,
            },
            at(12),
        )
        .expect("step applies");
    assert!(session.is_validated);
    assert!(session.calculations_validated);
}

#[test]
fn status_walks_the_lifecycle_with_the_flags() {
    let (_store, service) = service();
    let mut session = started_session(&service);

    assert_eq!(
        session.view().status,
        AnalysisStatus::Analyzed.label()
    );

    service
        .handle(&mut session, SessionEvent::ValidateExtraction, at(5))
        .expect("validation applies");
    assert_eq!(session.view().status, AnalysisStatus::Validated.label());

    service.calculate(&mut session, at(6)).expect("calculation runs");
    service
        .handle(&mut session, SessionEvent::ValidateCalculations, at(7))
        .expect("calculations validated");
    assert_eq!(session.view().status, AnalysisStatus::Completed.label());
}

#[test]
fn field_edits_arm_a_trailing_debounce() {
    let (store, service) = service();
    let mut session = started_session(&service);
    let records_before = store.record_count();

    service
        .handle(&mut session, edit("dimensions.longueur", "23"), at(0))
        .expect("edit applies");
    assert_eq!(store.record_count(), records_before);

    // Not due yet.
    let flushed = service.poll(&mut session, at(1)).expect("poll runs");
    assert!(flushed.is_none());

    let flushed = service.poll(&mut session, at(2)).expect("poll runs");
    assert!(flushed.is_some());
    assert_eq!(store.record_count(), records_before + 1);

    // Fired once: the deadline is consumed.
    let flushed = service.poll(&mut session, at(10)).expect("poll runs");
    assert!(flushed.is_none());
}

#[test]
fn every_edit_replaces_the_debounce_deadline() {
    let (store, service) = service();
    let mut session = started_session(&service);
    let records_before = store.record_count();

    service
        .handle(&mut session, edit("dimensions.longueur", "23"), at(0))
        .expect("edit applies");
    service
        .handle(&mut session, edit("dimensions.longueur", "22"), at(1))
        .expect("edit applies");

    // First deadline (t0+2) is gone; only the rescheduled one (t1+2) fires.
    let flushed = service.poll(&mut session, at(2)).expect("poll runs");
    assert!(flushed.is_none());

    let flushed = service.poll(&mut session, at(3)).expect("poll runs");
    assert!(flushed.is_some());
    assert_eq!(store.record_count(), records_before + 1);
}

#[test]
fn calculation_keeps_the_selected_candidate_in_the_saved_record() {
    let (store, service) = service();
    let mut session = started_session(&service);

    service
        .handle(&mut session, SessionEvent::ValidateExtraction, at(5))
        .expect("validation applies");
    let outcome = service.calculate(&mut session, at(6)).expect("calculation runs");
    assert!(!outcome.ranked.is_empty());

    service
        .handle(&mut session, SessionEvent::ValidateCalculations, at(7))
        .expect("calculations validated");

    let record = store
        .record(session.current_analysis_id.as_ref().expect("current id"))
        .expect("record");
    let result = record.calculation_result.expect("calculation persisted");
    assert_eq!(
        result.pieces_per_bar,
        outcome.selected_result().pieces_per_bar
    );
    assert_eq!(record.status, AnalysisStatus::Completed);
}
