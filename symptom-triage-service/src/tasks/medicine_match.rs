use std::sync::Arc;

use async_trait::async_trait;
use regex::RegexSet;
use tracing::{info, warn};
use triage_flow::{Context, NextAction, Result, Task, TaskResult};

use super::session_keys;
use crate::clients::OpenFdaClient;

/// Finds which listed brand names are mentioned in the extracted text.
pub struct MedicineMatchTask {
    openfda: Arc<OpenFdaClient>,
    limit: usize,
}

impl MedicineMatchTask {
    pub fn new(openfda: Arc<OpenFdaClient>, limit: usize) -> Self {
        Self { openfda, limit }
    }
}

#[async_trait]
impl Task for MedicineMatchTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let text: String = context.require(session_keys::EXTRACTED_TEXT).await?;

        let medicines = self.openfda.brand_names(self.limit).await;
        let matched = identify_medicines(&text, &medicines);
        info!(
            "Matched {} of {} listed medicines",
            matched.len(),
            medicines.len()
        );

        context.set(session_keys::MATCHED_MEDICINES, matched).await;
        Ok(TaskResult::new_with_status(
            None,
            NextAction::End,
            Some("Medicine matching completed".to_string()),
        ))
    }
}

/// Medicines occurring in the text as whole words, case-insensitively, in listing order.
/// The whole listing is compiled into one [`RegexSet`] so overlapping names all match.
pub fn identify_medicines(text: &str, medicines: &[String]) -> Vec<String> {
    let candidates: Vec<&String> = medicines
        .iter()
        .filter(|medicine| !medicine.trim().is_empty())
        .collect();
    if candidates.is_empty() {
        return Vec::new();
    }

    let patterns = candidates
        .iter()
        .map(|medicine| format!(r"\b{}\b", regex::escape(&medicine.to_lowercase())));
    let set = match RegexSet::new(patterns) {
        Ok(set) => set,
        Err(e) => {
            warn!("Failed to compile medicine listing: {}", e);
            return Vec::new();
        }
    };

    let matches = set.matches(&text.to_lowercase());
    candidates
        .into_iter()
        .enumerate()
        .filter(|(index, _)| matches.matched(*index))
        .map(|(_, medicine)| medicine.clone())
        .collect()
}
