//! Versioned persistence of analyses: the session state machine deciding
//! when a checkpoint becomes a new stored version, the document-store
//! boundary, and the list/export surfaces built on top of it.

pub mod domain;
pub mod export;
pub mod router;
pub mod session;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    AnalysisId, AnalysisStatus, AnalysisSummaryView, ClientRef, NewAnalysis, SavedAnalysis,
    WorkflowStep,
};
pub use export::export_csv;
pub use router::{analysis_router, AnalysisWorkflow};
pub use session::{
    AnalysisSession, CheckpointDecision, SessionError, SessionEvent, SessionService, SessionView,
    SkipReason, VersionPlan, AUTOSAVE_DEBOUNCE_SECS,
};
pub use store::{AnalysisStore, HttpDocumentStore, StoreError};
