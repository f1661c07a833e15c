use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::workflows::drawing::estimating::{
    CalculationError, CalculationOutcome, CatalogProfile, EstimatingEngine, SelectionError,
};
use crate::workflows::drawing::extraction::{
    apply_edit, ExtractionData, ExtractionResult, FieldPath, ReviewError,
};

use super::domain::{
    AnalysisId, AnalysisStatus, ClientRef, NewAnalysis, SavedAnalysis, WorkflowStep,
};
use super::store::{AnalysisStore, StoreError};

/// Quiet period between the last field edit and the autosave it arms.
pub const AUTOSAVE_DEBOUNCE_SECS: i64 = 2;

/// Errors surfaced to the caller of a session operation.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no extraction result yet")]
    MissingExtraction,
    #[error("no client selected")]
    MissingClient,
    #[error("no profile selected")]
    MissingProfile,
    #[error("no calculation to validate")]
    MissingCalculation,
    #[error("extraction must be validated before calculating")]
    ValidationRequired,
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error(transparent)]
    Calculation(#[from] CalculationError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Discrete external events driving the session state machine. Each event
/// runs to completion before the next is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The external service finished analyzing the drawing. Always forces
    /// the first checkpoint, whatever change detection says.
    ExtractionCompleted { extraction: ExtractionResult },
    /// A reviewed field was corrected.
    FieldEdited { path: String, value: String },
    /// Title/context/quantity form fields changed.
    DetailsChanged {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        quantity: Option<u32>,
    },
    /// The estimating engine produced a ranked outcome.
    CalculationCompleted { outcome: CalculationOutcome },
    /// The user overrode the selected candidate.
    CandidateSelected { index: usize },
    ValidateExtraction,
    ValidateCalculations,
    GoToStep {
        step: WorkflowStep,
        #[serde(default)]
        preserve_flags: bool,
    },
    /// Explicit save action offered on the final step.
    ManualSave,
}

/// What an applied event asks the service to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveSignal {
    None,
    /// Arm (or re-arm) the trailing debounce.
    Debounced,
    /// Run a checkpoint now.
    Immediate { force: bool },
}

/// Why a checkpoint decided not to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoExtraction,
    NoClient,
    NoProfile,
    SaveInFlight,
    Unchanged,
}

/// Where the next version number comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionPlan {
    /// First version of a new lineage: v1, no parent.
    Initial,
    /// The session was resumed from (or just created) a record that has no
    /// lineage yet: that record becomes the parent and this save is v2.
    AdoptCurrent { parent: AnalysisId },
    /// Lineage known: read its max version and append.
    NextInLineage { parent: AnalysisId },
}

/// Pure checkpoint decision computed from the session state alone.
#[derive(Debug)]
pub enum CheckpointDecision {
    Skip(SkipReason),
    Persist {
        status: AnalysisStatus,
        version: VersionPlan,
        snapshot: String,
    },
}

/// Serialized form state used for change detection. Two checkpoints with an
/// identical snapshot persist exactly one record.
#[derive(Debug, Serialize)]
struct FormSnapshot<'a> {
    title: &'a str,
    context: &'a str,
    quantity: u32,
    extracted: Option<&'a ExtractionData>,
    selected_material: Option<&'a str>,
    selected_formula: Option<&'a str>,
    validated: bool,
    calculations_validated: bool,
    step: u8,
}

/// In-progress analysis session: one explicit struct owning every flag the
/// checkpoint algorithm reads.
#[derive(Debug)]
pub struct AnalysisSession {
    pub title: String,
    pub context: String,
    pub quantity: u32,
    pub client: Option<ClientRef>,
    pub profile: Option<CatalogProfile>,
    pub extraction: Option<ExtractionResult>,
    pub calculation: Option<CalculationOutcome>,
    pub current_step: WorkflowStep,
    pub is_validated: bool,
    pub calculations_validated: bool,
    pub current_analysis_id: Option<AnalysisId>,
    pub parent_analysis_id: Option<AnalysisId>,
    validated_snapshot: Option<String>,
    last_saved_snapshot: Option<String>,
    is_saving: bool,
    debounce_deadline: Option<DateTime<Utc>>,
}

impl AnalysisSession {
    pub fn new(client: ClientRef, profile: CatalogProfile, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            context: String::new(),
            quantity: 1,
            client: Some(client),
            profile: Some(profile),
            extraction: None,
            calculation: None,
            current_step: WorkflowStep::Configure,
            is_validated: false,
            calculations_validated: false,
            current_analysis_id: None,
            parent_analysis_id: None,
            validated_snapshot: None,
            last_saved_snapshot: None,
            is_saving: false,
            debounce_deadline: None,
        }
    }

    /// Resume editing from a previously persisted version.
    pub fn resume(record: SavedAnalysis, profile: CatalogProfile) -> Self {
        let parent_analysis_id = record.parent_id.clone();
        Self {
            title: record.title,
            context: String::new(),
            quantity: record.quantity,
            client: Some(ClientRef {
                id: record.client_id,
                name: record.client_name,
            }),
            profile: Some(profile),
            extraction: Some(record.analysis_result),
            calculation: None,
            current_step: record.current_step,
            is_validated: record.validated,
            calculations_validated: record.status == AnalysisStatus::Completed,
            current_analysis_id: Some(record.id),
            parent_analysis_id,
            validated_snapshot: None,
            last_saved_snapshot: None,
            is_saving: false,
            debounce_deadline: None,
        }
    }

    fn snapshot(&self) -> String {
        let selected = self
            .calculation
            .as_ref()
            .map(|outcome| outcome.selected_result());
        let snapshot = FormSnapshot {
            title: &self.title,
            context: &self.context,
            quantity: self.quantity,
            extracted: self.extraction.as_ref().map(|extraction| &extraction.data),
            selected_material: selected.map(|result| result.material.id.as_str()),
            selected_formula: selected
                .and_then(|result| result.applied_formula.as_ref())
                .map(|formula| formula.id.as_str()),
            validated: self.is_validated,
            calculations_validated: self.calculations_validated,
            step: self.current_step.number(),
        };
        serde_json::to_string(&snapshot).unwrap_or_default()
    }

    fn extracted_snapshot(&self) -> Option<String> {
        self.extraction
            .as_ref()
            .and_then(|extraction| serde_json::to_string(&extraction.data).ok())
    }

    /// Decide what the event means for persistence. Pure state transition;
    /// all I/O stays in the service.
    fn apply(&mut self, event: SessionEvent) -> Result<SaveSignal, SessionError> {
        match event {
            SessionEvent::ExtractionCompleted { extraction } => {
                self.extraction = Some(extraction);
                self.calculation = None;
                self.is_validated = false;
                self.calculations_validated = false;
                self.validated_snapshot = None;
                self.current_step = WorkflowStep::Review;
                Ok(SaveSignal::Immediate { force: true })
            }
            SessionEvent::FieldEdited { path, value } => {
                let extraction = self
                    .extraction
                    .as_mut()
                    .ok_or(SessionError::MissingExtraction)?;
                let path = FieldPath::parse(&path)?;
                apply_edit(&mut extraction.data, &path, value)?;

                if self.revoke_validation_if_stale() {
                    return Ok(SaveSignal::Immediate { force: false });
                }
                Ok(self.debounce_signal())
            }
            SessionEvent::DetailsChanged {
                title,
                context,
                quantity,
            } => {
                if let Some(title) = title {
                    self.title = title;
                }
                if let Some(context) = context {
                    self.context = context;
                }
                if let Some(quantity) = quantity {
                    self.quantity = quantity;
                }
                Ok(self.debounce_signal())
            }
            SessionEvent::CalculationCompleted { outcome } => {
                self.calculation = Some(outcome);
                Ok(self.debounce_signal())
            }
            SessionEvent::CandidateSelected { index } => {
                let calculation = self
                    .calculation
                    .as_mut()
                    .ok_or(SessionError::MissingCalculation)?;
                calculation.select(index)?;
                Ok(self.debounce_signal())
            }
            SessionEvent::ValidateExtraction => {
                if self.extraction.is_none() {
                    return Err(SessionError::MissingExtraction);
                }
                self.is_validated = true;
                self.validated_snapshot = self.extracted_snapshot();
                Ok(SaveSignal::Immediate { force: false })
            }
            SessionEvent::ValidateCalculations => {
                if self.calculation.is_none() {
                    return Err(SessionError::MissingCalculation);
                }
                self.calculations_validated = true;
                Ok(SaveSignal::Immediate { force: false })
            }
            SessionEvent::GoToStep {
                step,
                preserve_flags,
            } => {
                if step > self.current_step
                    && step > WorkflowStep::Review
                    && !self.is_validated
                {
                    return Err(SessionError::ValidationRequired);
                }
                if step < self.current_step && !preserve_flags {
                    if step <= WorkflowStep::Review {
                        self.is_validated = false;
                        self.validated_snapshot = None;
                    }
                    if step <= WorkflowStep::Calculate {
                        self.calculations_validated = false;
                    }
                }
                self.current_step = step;
                Ok(SaveSignal::Immediate { force: false })
            }
            // Manual saves surface store errors but still honor change
            // detection: clicking save twice never duplicates a version.
            SessionEvent::ManualSave => Ok(SaveSignal::Immediate { force: false }),
        }
    }

    /// One-way automatic demotion: any divergence from the snapshot taken at
    /// validation time revokes validation; re-granting it always takes an
    /// explicit user action.
    fn revoke_validation_if_stale(&mut self) -> bool {
        if !self.is_validated {
            return false;
        }
        if self.extracted_snapshot() == self.validated_snapshot {
            return false;
        }

        self.is_validated = false;
        self.calculations_validated = false;
        if self.current_step > WorkflowStep::Review {
            self.current_step = WorkflowStep::Review;
        }
        debug!("extracted data changed after validation, validation revoked");
        true
    }

    /// Field edits only autosave once a first version exists and the user is
    /// past the configure screen.
    fn debounce_signal(&self) -> SaveSignal {
        if self.current_step >= WorkflowStep::Review && self.current_analysis_id.is_some() {
            SaveSignal::Debounced
        } else {
            SaveSignal::None
        }
    }

    fn arm_debounce(&mut self, now: DateTime<Utc>) {
        // Trailing debounce: every edit replaces the previous deadline.
        self.debounce_deadline = Some(now + Duration::seconds(AUTOSAVE_DEBOUNCE_SECS));
    }

    pub fn debounce_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.debounce_deadline, Some(deadline) if deadline <= now)
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            step: self.current_step.number(),
            step_label: self.current_step.label(),
            status: AnalysisStatus::from_flags(
                self.current_step,
                self.is_validated,
                self.calculations_validated,
            )
            .label(),
            validated: self.is_validated,
            calculations_validated: self.calculations_validated,
            current_analysis_id: self.current_analysis_id.clone(),
            parent_analysis_id: self.parent_analysis_id.clone(),
            has_extraction: self.extraction.is_some(),
            candidate_count: self
                .calculation
                .as_ref()
                .map(|outcome| outcome.ranked.len())
                .unwrap_or(0),
        }
    }

    /// Pure checkpoint planner: `(state, force) -> decision`, no I/O.
    pub fn plan_checkpoint(&self, force: bool) -> CheckpointDecision {
        if self.extraction.is_none() {
            return CheckpointDecision::Skip(SkipReason::NoExtraction);
        }
        if self.client.is_none() {
            return CheckpointDecision::Skip(SkipReason::NoClient);
        }
        if self.profile.is_none() {
            return CheckpointDecision::Skip(SkipReason::NoProfile);
        }
        if self.is_saving {
            return CheckpointDecision::Skip(SkipReason::SaveInFlight);
        }

        let snapshot = self.snapshot();
        if !force && self.last_saved_snapshot.as_deref() == Some(snapshot.as_str()) {
            return CheckpointDecision::Skip(SkipReason::Unchanged);
        }

        let version = match (&self.parent_analysis_id, &self.current_analysis_id) {
            (Some(parent), _) => VersionPlan::NextInLineage {
                parent: parent.clone(),
            },
            (None, Some(current)) => VersionPlan::AdoptCurrent {
                parent: current.clone(),
            },
            (None, None) => VersionPlan::Initial,
        };

        CheckpointDecision::Persist {
            status: AnalysisStatus::from_flags(
                self.current_step,
                self.is_validated,
                self.calculations_validated,
            ),
            version,
            snapshot,
        }
    }

    fn build_record(
        &self,
        status: AnalysisStatus,
        parent_id: Option<AnalysisId>,
        version_number: u32,
        now: DateTime<Utc>,
    ) -> Result<NewAnalysis, SessionError> {
        let client = self.client.as_ref().ok_or(SessionError::MissingClient)?;
        let profile = self.profile.as_ref().ok_or(SessionError::MissingProfile)?;
        let extraction = self
            .extraction
            .as_ref()
            .ok_or(SessionError::MissingExtraction)?;

        let title = if self.title.trim().is_empty() {
            format!("Analyse {}", extraction.file_name)
        } else {
            self.title.clone()
        };

        Ok(NewAnalysis {
            title,
            client_id: client.id.clone(),
            client_name: client.name.clone(),
            profile_id: profile.id.clone(),
            profile_name: profile.name.clone(),
            file_name: extraction.file_name.clone(),
            file_url: extraction.file_url.clone(),
            file_type: extraction.file_type.clone(),
            analysis_result: extraction.clone(),
            calculation_result: self
                .calculation
                .as_ref()
                .map(|outcome| outcome.selected_result().clone()),
            status,
            validated: self.is_validated,
            quantity: self.quantity,
            created_at: now,
            updated_at: now,
            current_step: self.current_step,
            parent_id,
            version_number,
            is_latest: true,
        })
    }
}

/// Sanitized session state for API responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub step: u8,
    pub step_label: &'static str,
    pub status: &'static str,
    pub validated: bool,
    pub calculations_validated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_analysis_id: Option<AnalysisId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_analysis_id: Option<AnalysisId>,
    pub has_extraction: bool,
    pub candidate_count: usize,
}

/// Service composing the session state machine, the estimating engine, and
/// the document-store boundary.
pub struct SessionService<S> {
    store: Arc<S>,
    engine: EstimatingEngine,
}

impl<S> SessionService<S>
where
    S: AnalysisStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            engine: EstimatingEngine::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Apply one event and run whatever persistence it calls for.
    ///
    /// Automatic checkpoints fail silently (logged, state left stale so the
    /// next checkpoint retries); the explicit manual save propagates store
    /// errors to the caller.
    pub fn handle(
        &self,
        session: &mut AnalysisSession,
        event: SessionEvent,
        now: DateTime<Utc>,
    ) -> Result<Option<SavedAnalysis>, SessionError> {
        let surface_errors = matches!(event, SessionEvent::ManualSave);
        let signal = session.apply(event)?;

        match signal {
            SaveSignal::None => Ok(None),
            SaveSignal::Debounced => {
                session.arm_debounce(now);
                Ok(None)
            }
            SaveSignal::Immediate { force } => {
                session.debounce_deadline = None;
                self.checkpoint(session, force, surface_errors, now)
            }
        }
    }

    /// Fire the trailing debounce if its quiet period elapsed.
    pub fn poll(
        &self,
        session: &mut AnalysisSession,
        now: DateTime<Utc>,
    ) -> Result<Option<SavedAnalysis>, SessionError> {
        if !session.debounce_due(now) {
            return Ok(None);
        }
        session.debounce_deadline = None;
        self.checkpoint(session, false, false, now)
    }

    /// Run the estimating engine against the session's extraction and
    /// catalog, keeping the outcome on the session.
    pub fn calculate(
        &self,
        session: &mut AnalysisSession,
        now: DateTime<Utc>,
    ) -> Result<CalculationOutcome, SessionError> {
        let extraction = session
            .extraction
            .as_ref()
            .ok_or(SessionError::MissingExtraction)?;
        let profile = session
            .profile
            .as_ref()
            .ok_or(SessionError::MissingProfile)?;

        let outcome = self.engine.compute_all(extraction, profile)?;
        self.handle(
            session,
            SessionEvent::CalculationCompleted {
                outcome: outcome.clone(),
            },
            now,
        )?;
        Ok(outcome)
    }

    fn checkpoint(
        &self,
        session: &mut AnalysisSession,
        force: bool,
        surface_errors: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<SavedAnalysis>, SessionError> {
        let (status, version, snapshot) = match session.plan_checkpoint(force) {
            CheckpointDecision::Skip(reason) => {
                debug!(?reason, "checkpoint skipped");
                return Ok(None);
            }
            CheckpointDecision::Persist {
                status,
                version,
                snapshot,
            } => (status, version, snapshot),
        };

        session.is_saving = true;
        let result = self.persist(session, status, version, snapshot, now);
        session.is_saving = false;

        match result {
            Ok(record) => Ok(Some(record)),
            Err(err) if surface_errors => Err(err),
            Err(err) => {
                // Background checkpoints never interrupt the user; stale
                // snapshots make the next checkpoint retry.
                error!(error = %err, "automatic checkpoint failed");
                Ok(None)
            }
        }
    }

    fn persist(
        &self,
        session: &mut AnalysisSession,
        status: AnalysisStatus,
        version: VersionPlan,
        snapshot: String,
        now: DateTime<Utc>,
    ) -> Result<SavedAnalysis, SessionError> {
        let (parent_id, version_number) = match version {
            VersionPlan::Initial => (None, 1),
            VersionPlan::AdoptCurrent { parent } => (Some(parent), 2),
            VersionPlan::NextInLineage { parent } => {
                let versions = self.store.lineage(&parent)?;
                let next = versions
                    .iter()
                    .map(|analysis| analysis.version_number)
                    .max()
                    .unwrap_or(1)
                    + 1;
                (Some(parent), next)
            }
        };

        if let Some(previous) = &session.current_analysis_id {
            // Best effort only: a failed flip leaves a stale flag, repaired
            // by deriving latest from the lineage's max version.
            if let Err(err) = self.store.mark_latest(previous, false) {
                warn!(id = %previous.0, error = %err, "could not clear latest flag on previous version");
            }
        }

        let record = session.build_record(status, parent_id.clone(), version_number, now)?;
        let saved = self.store.create(record)?;

        session.current_analysis_id = Some(saved.id.clone());
        session.parent_analysis_id = parent_id.or_else(|| Some(saved.id.clone()));
        session.last_saved_snapshot = Some(snapshot);

        debug!(id = %saved.id.0, version = saved.version_number, status = status.label(), "analysis version persisted");
        Ok(saved)
    }

    /// Delete latest-version drafts untouched since the cutoff.
    pub fn purge_stale_drafts(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let drafts = self.store.stale_drafts(cutoff)?;
        let mut purged = 0;
        for draft in &drafts {
            match self.store.delete(&draft.id) {
                Ok(()) => purged += 1,
                Err(err) => warn!(id = %draft.id.0, error = %err, "stale draft not deleted"),
            }
        }
        Ok(purged)
    }
}
