use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::drawing::estimating::CalculationResult;
use crate::workflows::drawing::extraction::ExtractionResult;

/// Identifier wrapper for persisted analyses. Real ids are assigned by the
/// document store on create, never chosen client-side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisId(pub String);

/// Checkpoint status derived from the session flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Draft,
    Analyzed,
    Validated,
    Completed,
}

impl AnalysisStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AnalysisStatus::Draft => "draft",
            AnalysisStatus::Analyzed => "analyzed",
            AnalysisStatus::Validated => "validated",
            AnalysisStatus::Completed => "completed",
        }
    }

    /// Later rules win: completed over validated over analyzed over draft.
    pub fn from_flags(step: WorkflowStep, validated: bool, calculations_validated: bool) -> Self {
        if calculations_validated {
            AnalysisStatus::Completed
        } else if validated {
            AnalysisStatus::Validated
        } else if step >= WorkflowStep::Review {
            AnalysisStatus::Analyzed
        } else {
            AnalysisStatus::Draft
        }
    }
}

/// The four screens of the analysis workflow, persisted as their ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum WorkflowStep {
    Configure,
    Review,
    Calculate,
    Save,
}

impl WorkflowStep {
    pub const fn number(self) -> u8 {
        match self {
            WorkflowStep::Configure => 1,
            WorkflowStep::Review => 2,
            WorkflowStep::Calculate => 3,
            WorkflowStep::Save => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            WorkflowStep::Configure => "configure",
            WorkflowStep::Review => "review",
            WorkflowStep::Calculate => "calculate",
            WorkflowStep::Save => "save",
        }
    }
}

impl From<WorkflowStep> for u8 {
    fn from(step: WorkflowStep) -> Self {
        step.number()
    }
}

impl TryFrom<u8> for WorkflowStep {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(WorkflowStep::Configure),
            2 => Ok(WorkflowStep::Review),
            3 => Ok(WorkflowStep::Calculate),
            4 => Ok(WorkflowStep::Save),
            other => Err(format!("workflow step must be 1-4, got {other}")),
        }
    }
}

/// Client owning an analysis, carried by id and display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRef {
    pub id: String,
    pub name: String,
}

/// One persisted version of an analysis. Records are immutable once created;
/// "updating" an analysis means appending the next version. The only stored
/// mutation is the best-effort `is_latest` flip on superseded versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAnalysis {
    pub id: AnalysisId,
    pub title: String,
    pub client_id: String,
    pub client_name: String,
    pub profile_id: String,
    pub profile_name: String,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    pub analysis_result: ExtractionResult,
    pub calculation_result: Option<CalculationResult>,
    pub status: AnalysisStatus,
    pub validated: bool,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub current_step: WorkflowStep,
    /// Id of version 1 of this lineage; absent on the first version, which is
    /// the implicit parent of everything after it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<AnalysisId>,
    pub version_number: u32,
    pub is_latest: bool,
}

impl SavedAnalysis {
    pub fn from_parts(id: AnalysisId, record: NewAnalysis) -> Self {
        Self {
            id,
            title: record.title,
            client_id: record.client_id,
            client_name: record.client_name,
            profile_id: record.profile_id,
            profile_name: record.profile_name,
            file_name: record.file_name,
            file_url: record.file_url,
            file_type: record.file_type,
            analysis_result: record.analysis_result,
            calculation_result: record.calculation_result,
            status: record.status,
            validated: record.validated,
            quantity: record.quantity,
            created_at: record.created_at,
            updated_at: record.updated_at,
            current_step: record.current_step,
            parent_id: record.parent_id,
            version_number: record.version_number,
            is_latest: record.is_latest,
        }
    }

    pub fn summary_view(&self) -> AnalysisSummaryView {
        AnalysisSummaryView {
            id: self.id.clone(),
            title: self.title.clone(),
            client_name: self.client_name.clone(),
            file_name: self.file_name.clone(),
            status: self.status.label(),
            version_number: self.version_number,
            is_latest: self.is_latest,
            updated_at: self.updated_at,
            pieces_per_bar: self
                .calculation_result
                .as_ref()
                .map(|result| result.pieces_per_bar),
            estimated_cost: self
                .calculation_result
                .as_ref()
                .map(|result| result.estimated_cost),
        }
    }
}

/// A version about to be created; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnalysis {
    pub title: String,
    pub client_id: String,
    pub client_name: String,
    pub profile_id: String,
    pub profile_name: String,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    pub analysis_result: ExtractionResult,
    pub calculation_result: Option<CalculationResult>,
    pub status: AnalysisStatus,
    pub validated: bool,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub current_step: WorkflowStep,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<AnalysisId>,
    pub version_number: u32,
    pub is_latest: bool,
}

/// Sanitized listing entry for API responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummaryView {
    pub id: AnalysisId,
    pub title: String,
    pub client_name: String,
    pub file_name: String,
    pub status: &'static str,
    pub version_number: u32,
    pub is_latest: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pieces_per_bar: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
}
