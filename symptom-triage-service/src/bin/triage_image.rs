use anyhow::{Context, Result};
use std::env;
use symptom_triage_service::{AppConfig, create_app_state};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter("info").init();

    println!("Symptom Triage: image -> OCR -> specialist");
    println!("==========================================");

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <image_path> [--drugs]", args[0]);
        eprintln!("Example: {} ./note.png --drugs", args[0]);
        std::process::exit(1);
    }
    let image_path = &args[1];
    let with_drugs = args.iter().skip(2).any(|a| a == "--drugs");

    let config = AppConfig::from_env()?;
    let state = create_app_state(&config)?;

    let image = std::fs::read(image_path)
        .with_context(|| format!("Failed to read image {}", image_path))?;
    println!("Processing image: {} ({} bytes)", image_path, image.len());
    println!();

    let report = state.workflow.run(&image).await?;

    println!("Extracted Text:");
    println!("───────────────");
    println!("{}", report.extracted_text);
    println!();
    println!("Specialist: {}", report.specialist);
    println!("Treatment:  {}", report.treatment);
    if report.matched_medicines.is_empty() {
        println!("Medicines:  none recognised");
    } else {
        println!("Medicines:  {}", report.matched_medicines.join(", "));
    }

    if with_drugs {
        println!();
        println!("Looking up related conditions and drugs...");
        let recommendation = state.recommender.recommend(&report.extracted_text).await?;
        println!("Conditions: {}", recommendation.conditions.join(", "));
        println!("Drugs:      {}", recommendation.recommended_drugs.join(", "));
    }

    Ok(())
}
