//! Extraction boundary and review model: the agent response shapes, their
//! normalization into the structured field model, and the path-addressed
//! correction contract the review screens use.

pub mod domain;
pub mod gateway;
pub mod normalizer;
pub mod review;

pub use domain::{
    CustomFieldValue, DimensionField, ExtractedField, ExtractionData, ExtractionId,
    ExtractionResult, NoteField,
};
pub use gateway::{
    standard_instruction, ExtractionError, ExtractionGateway, ExtractionRequest,
    HttpExtractionClient,
};
pub use normalizer::{normalize, AgentField, AgentResponse, KeyedAgentField};
pub use review::{
    apply_edit, FieldPath, ReviewError, MANUAL_EDIT_CONFIDENCE, MANUAL_EDIT_REASON,
};
