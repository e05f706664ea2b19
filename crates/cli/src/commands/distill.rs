//! `atlas distill` — Rebuild the essence artifact offline.

use atlas_agent::{DistillSummary, KnowledgeBase, KnowledgeSettings};
use atlas_config::AppConfig;
use atlas_knowledge::{CorpusScan, DistillOutcome, Distiller};

pub async fn run(convert: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let settings = KnowledgeSettings::from_config(&config)?;

    println!("Atlas Distill");
    println!("   Corpus:   {}", settings.documents_dir.display());
    println!("   Essence:  {}", settings.essence_path.display());

    if convert {
        // full reload: converter, distill, index
        let kb = KnowledgeBase::empty(settings);
        let report = kb.reload().await?;
        match report.distill {
            DistillSummary::Written {
                chars,
                documents_included,
                documents_total,
            } => println!("   Written:  {chars} chars from {documents_included}/{documents_total} documents"),
            DistillSummary::SourceMissing => println!("   Corpus directory missing, essence left untouched"),
            DistillSummary::Skipped => {}
        }
        println!("   Index:    {} chunks", report.index.chunks);
        return Ok(());
    }

    let scan = CorpusScan::read_dir(&settings.documents_dir);
    for skipped in &scan.skipped {
        println!("   Skipped:  {} ({})", skipped.file_name, skipped.reason);
    }

    match Distiller::new(settings.distill).distill_to_artifact(&scan, &settings.essence_path)? {
        DistillOutcome::Written(essence) => {
            println!(
                "   Written:  {} chars from {}/{} documents",
                essence.chars, essence.documents_included, essence.documents_total
            );
            if essence.truncated() {
                println!("   Budget reached; later documents were left out");
            }
        }
        DistillOutcome::SourceMissing => {
            println!("   Corpus directory missing, essence left untouched");
        }
    }

    Ok(())
}
