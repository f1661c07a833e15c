use std::sync::Arc;

use chrono::Utc;
use clap::Args;

use atelier_ai::error::AppError;
use atelier_ai::workflows::drawing::extraction::{ExtractionGateway, ExtractionRequest};
use atelier_ai::workflows::drawing::versioning::{
    AnalysisSession, AnalysisStore, ClientRef, SessionEvent, SessionService,
};

use crate::infra::{default_catalog, CannedExtractionGateway, InMemoryAnalysisStore};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Client name shown in the demo output
    #[arg(long, default_value = "Serrurerie Morel")]
    pub(crate) client: String,
    /// Drawing file name fed to the extraction stand-in
    #[arg(long, default_value = "PL-1042.pdf")]
    pub(crate) file: String,
    /// Print the full ranked candidate list instead of the top pick only
    #[arg(long)]
    pub(crate) list_candidates: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(InMemoryAnalysisStore::default());
    let service = SessionService::new(store.clone());

    let client = ClientRef {
        id: "client-demo".to_string(),
        name: args.client.clone(),
    };
    let profile = default_catalog();
    let mut session = AnalysisSession::new(client, profile, format!("Analyse {}", args.file));

    println!("=== Drawing analysis demo ===");
    println!("drawing: {}", args.file);

    let gateway = CannedExtractionGateway;
    let extraction =
        gateway.analyze_drawing(ExtractionRequest::new(args.file.clone(), Vec::new()))?;

    println!(
        "extraction: reference '{}', piece type '{}', material '{}'",
        extraction.data.reference.value,
        extraction.data.piece_type.value,
        extraction.data.material.value
    );

    let saved = service.handle(
        &mut session,
        SessionEvent::ExtractionCompleted { extraction },
        Utc::now(),
    )?;
    if let Some(record) = saved {
        println!("checkpoint: v{} ({})", record.version_number, record.status.label());
    }

    let saved = service.handle(&mut session, SessionEvent::ValidateExtraction, Utc::now())?;
    if let Some(record) = saved {
        println!("checkpoint: v{} ({})", record.version_number, record.status.label());
    }

    let outcome = service.calculate(&mut session, Utc::now())?;
    let best = outcome.selected_result();
    println!(
        "best estimate: {} piece(s) per bar of {} at {:.2} per piece",
        best.pieces_per_bar, best.material.kind, best.estimated_cost
    );
    if args.list_candidates {
        for (index, candidate) in outcome.ranked.iter().enumerate() {
            println!(
                "  {}. {} -> {} piece(s), {:.2} per piece ({})",
                index + 1,
                candidate.material.kind,
                candidate.pieces_per_bar,
                candidate.estimated_cost,
                candidate
                    .applied_formula
                    .as_ref()
                    .map(|formula| formula.name.as_str())
                    .unwrap_or("default formula")
            );
        }
    }

    let saved = service.handle(&mut session, SessionEvent::ValidateCalculations, Utc::now())?;
    if let Some(record) = saved {
        println!("checkpoint: v{} ({})", record.version_number, record.status.label());
    }

    if let Some(root) = session.parent_analysis_id.clone() {
        let versions = store.lineage(&root)?;
        println!("version history:");
        for record in versions {
            println!(
                "  v{} {} {}",
                record.version_number,
                record.status.label(),
                if record.is_latest { "(latest)" } else { "" }
            );
        }
    }

    Ok(())
}
