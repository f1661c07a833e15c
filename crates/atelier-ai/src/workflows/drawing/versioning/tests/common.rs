use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use crate::workflows::drawing::estimating::domain::{CatalogProfile, Formula, Material};
use crate::workflows::drawing::extraction::domain::{
    DimensionField, ExtractedField, ExtractionData, ExtractionResult,
};
use crate::workflows::drawing::versioning::domain::{
    AnalysisId, AnalysisStatus, ClientRef, NewAnalysis, SavedAnalysis,
};
use crate::workflows::drawing::versioning::session::{AnalysisSession, SessionService};
use crate::workflows::drawing::versioning::store::{AnalysisStore, StoreError};

/// Mutex-guarded map standing in for the document store, with switches to
/// simulate partial failures.
#[derive(Default)]
pub(super) struct InMemoryAnalysisStore {
    records: Mutex<HashMap<String, SavedAnalysis>>,
    sequence: AtomicU64,
    pub(super) fail_create: AtomicBool,
    pub(super) fail_mark_latest: AtomicBool,
}

impl InMemoryAnalysisStore {
    pub(super) fn record_count(&self) -> usize {
        self.records.lock().expect("store mutex poisoned").len()
    }

    pub(super) fn record(&self, id: &AnalysisId) -> Option<SavedAnalysis> {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .get(&id.0)
            .cloned()
    }
}

impl AnalysisStore for InMemoryAnalysisStore {
    fn create(&self, record: NewAnalysis) -> Result<SavedAnalysis, StoreError> {
        if self.fail_create.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
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
        if self.fail_mark_latest.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
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
            .filter(|record| {
                record.id == *root || record.parent_id.as_ref() == Some(root)
            })
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

pub(super) fn service() -> (Arc<InMemoryAnalysisStore>, SessionService<InMemoryAnalysisStore>) {
    let store = Arc::new(InMemoryAnalysisStore::default());
    (store.clone(), SessionService::new(store))
}

pub(super) fn client() -> ClientRef {
    ClientRef {
        id: "client-7".to_string(),
        name: "Serrurerie Morel".to_string(),
    }
}

pub(super) fn profile() -> CatalogProfile {
    CatalogProfile {
        id: "profile-1".to_string(),
        name: "Atelier standard".to_string(),
        materials: vec![Material {
            id: "m1".to_string(),
            kind: "Tube acier 40x40".to_string(),
            dimensions: "40x40x3".to_string(),
            standard_length: 288.0,
            unit: "mm".to_string(),
            cost_per_unit: 45.50,
        }],
        formulas: vec![Formula {
            id: "f1".to_string(),
            name: "coupe optimisee".to_string(),
            condition: "type_piece == 'tube'".to_string(),
            formula: "(longueur_barre - 6) / longueur_piece".to_string(),
            description: String::new(),
        }],
    }
}

pub(super) fn extraction() -> ExtractionResult {
    let mut data = ExtractionData::default();
    data.reference = ExtractedField::new("PL-1042", 90.0, "title block");
    data.piece_type = ExtractedField::new("tube", 85.0, "title block");
    data.material = ExtractedField::new("acier", 80.0, "title block");
    data.dimensions.insert(
        "longueur".to_string(),
        DimensionField {
            value: "24".to_string(),
            confidence: 75.0,
            reason: "dimension line".to_string(),
            unit: "mm".to_string(),
        },
    );

    ExtractionResult::new("PL-1042.pdf", t0(), json!([]), data)
}

pub(super) fn session() -> AnalysisSession {
    AnalysisSession::new(client(), profile(), "Analyse PL-1042")
}

pub(super) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn at(seconds: i64) -> DateTime<Utc> {
    t0() + chrono::Duration::seconds(seconds)
}
