use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;

use atelier_ai::workflows::drawing::estimating::{CatalogProfile, Formula, Material};
use atelier_ai::workflows::drawing::extraction::{
    normalize, AgentResponse, ExtractionError, ExtractionGateway, ExtractionRequest,
    ExtractionResult,
};
use atelier_ai::workflows::drawing::versioning::{
    AnalysisId, AnalysisStatus, AnalysisStore, NewAnalysis, SavedAnalysis, StoreError,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) extractor: Arc<dyn ExtractionGateway>,
}

/// Mutex-guarded map standing in for the document store when no external
/// store is configured (demos, tests, local development).
#[derive(Default)]
pub(crate) struct InMemoryAnalysisStore {
    records: Mutex<HashMap<String, SavedAnalysis>>,
    sequence: AtomicU64,
}

impl AnalysisStore for InMemoryAnalysisStore {
    fn create(&self, record: NewAnalysis) -> Result<SavedAnalysis, StoreError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let saved = SavedAnalysis::from_parts(AnalysisId(format!("an-{id:06}")), record);
        let mut guard = self.records.lock().expect("store mutex poisoned");
        guard.insert(saved.id.0.clone(), saved.clone());
        Ok(saved)
    }

    fn fetch(&self, id: &AnalysisId) -> Result<Option<SavedAnalysis>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard.get(&id.0).cloned())
    }

    fn mark_latest(&self, id: &AnalysisId, is_latest: bool) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        match guard.get_mut(&id.0) {
            Some(record) => {
                record.is_latest = is_latest;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn lineage(&self, root: &AnalysisId) -> Result<Vec<SavedAnalysis>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        let mut versions: Vec<SavedAnalysis> = guard
            .values()
            .filter(|record| record.id == *root || record.parent_id.as_ref() == Some(root))
            .cloned()
            .collect();
        versions.sort_by_key(|record| record.version_number);
        Ok(versions)
    }

    fn list_for_client(&self, client_id: &str) -> Result<Vec<SavedAnalysis>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| record.client_id == client_id)
            .cloned()
            .collect())
    }

    fn stale_drafts(&self, cutoff: DateTime<Utc>) -> Result<Vec<SavedAnalysis>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| {
                record.status == AnalysisStatus::Draft
                    && record.is_latest
                    && record.updated_at < cutoff
            })
            .cloned()
            .collect())
    }

    fn delete(&self, id: &AnalysisId) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        guard.remove(&id.0).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

/// Offline extraction stand-in used when no extraction endpoint is
/// configured: every drawing yields the same plausible field list.
#[derive(Default)]
pub(crate) struct CannedExtractionGateway;

impl ExtractionGateway for CannedExtractionGateway {
    fn analyze_drawing(
        &self,
        request: ExtractionRequest,
    ) -> Result<ExtractionResult, ExtractionError> {
        let payload = serde_json::json!([
            {"name": "reference", "data_type": "text", "value": "PL-1042", "confidence": 92, "justification": "title block"},
            {"name": "description", "data_type": "text", "value": "Traverse de garde-corps", "confidence": 85, "justification": "title block"},
            {"name": "matiere", "data_type": "text", "value": "acier", "confidence": 81, "justification": "title block"},
            {"name": "type_piece", "data_type": "text", "value": "tube", "confidence": 88, "justification": "shape analysis"},
            {"name": "longueur", "data_type": "dimension", "value": "24 mm", "confidence": 74, "justification": "dimension line"},
            {"name": "procedes", "data_type": "list", "value": ["sciage", "ebavurage"], "confidence": 66}
        ]);

        let response: AgentResponse = serde_json::from_value(payload.clone())
            .map_err(|err| ExtractionError::InvalidPayload(err.to_string()))?;
        let data = normalize(response);

        let mut result = ExtractionResult::new(request.file_name, Utc::now(), payload, data);
        result.file_type = request.file_type;
        Ok(result)
    }
}

/// Demo catalog used by the CLI demo and local development.
pub(crate) fn default_catalog() -> CatalogProfile {
    CatalogProfile {
        id: "profile-standard".to_string(),
        name: "Atelier standard".to_string(),
        materials: vec![
            Material {
                id: "mat-tube-40".to_string(),
                kind: "Tube acier 40x40".to_string(),
                dimensions: "40x40x3".to_string(),
                standard_length: 288.0,
                unit: "mm".to_string(),
                cost_per_unit: 45.50,
            },
            Material {
                id: "mat-tube-50".to_string(),
                kind: "Tube acier 50x50".to_string(),
                dimensions: "50x50x3".to_string(),
                standard_length: 288.0,
                unit: "mm".to_string(),
                cost_per_unit: 52.10,
            },
            Material {
                id: "mat-plat-40".to_string(),
                kind: "Plat acier 40x5".to_string(),
                dimensions: "40x5".to_string(),
                standard_length: 240.0,
                unit: "mm".to_string(),
                cost_per_unit: 19.80,
            },
        ],
        formulas: vec![Formula {
            id: "form-coupe".to_string(),
            name: "coupe optimisee".to_string(),
            condition: "type_piece == 'tube' && longueur_piece < 150".to_string(),
            formula: "(longueur_barre - 6) / longueur_piece".to_string(),
            description: "Scie a ruban, pince courte".to_string(),
        }],
    }
}
