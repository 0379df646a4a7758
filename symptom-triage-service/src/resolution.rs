//! Specialist/treatment resolution.
//!
//! Combines the classifier's prediction with the lookup table. A table match always wins over
//! the model; among matching rows the first in table order wins. Specialist names shorter than
//! [`MIN_SPECIALIST_LEN`] characters are replaced by [`FALLBACK_SPECIALIST`]. The treatment is
//! not re-derived after that replacement.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::inference::{SpecialistClassifier, SymptomExtractor};
use crate::knowledge::{LookupTable, SpecialistIndex};
use crate::models::ResolvedAnswer;

pub const FALLBACK_SPECIALIST: &str = "General Physician";
pub const NO_TREATMENT_FOUND: &str = "No treatment found";
pub const MIN_SPECIALIST_LEN: usize = 7;

pub struct ResolutionCascade {
    table: Arc<LookupTable>,
    index: SpecialistIndex,
    extractor: Arc<dyn SymptomExtractor>,
    classifier: Arc<dyn SpecialistClassifier>,
}

impl ResolutionCascade {
    pub fn new(
        table: Arc<LookupTable>,
        extractor: Arc<dyn SymptomExtractor>,
        classifier: Arc<dyn SpecialistClassifier>,
    ) -> Self {
        let index = SpecialistIndex::from_table(&table);
        Self {
            table,
            index,
            extractor,
            classifier,
        }
    }

    /// Lower-cases free text and resolves it.
    pub async fn analyze(&self, text: &str) -> Result<ResolvedAnswer> {
        self.resolve(&text.to_lowercase()).await
    }

    /// Resolve already lower-cased symptom text into a specialist and a treatment.
    pub async fn resolve(&self, text: &str) -> Result<ResolvedAnswer> {
        let mut symptoms = self.extractor.extract(text).await?;
        if symptoms.is_empty() {
            symptoms.push(text.to_string());
        }
        debug!("Symptoms for resolution: {:?}", symptoms);

        let predicted_index = self.classifier.predict(&symptoms.join(", ")).await?;
        let predicted = self.index.name(predicted_index)?;
        debug!(predicted_index, predicted_specialist = %predicted, "Classifier prediction");

        let (specialist, treatment) = match self.table.first_match(&symptoms) {
            Some(row) => (row.specialist.clone(), row.treatments.clone()),
            None => (
                predicted.to_string(),
                self.table
                    .treatment_for(predicted)
                    .unwrap_or(NO_TREATMENT_FOUND)
                    .to_string(),
            ),
        };

        let specialist = guard_specialist(specialist);
        info!(specialist = %specialist, "Resolved specialist");

        Ok(ResolvedAnswer {
            specialist,
            treatment,
        })
    }
}

/// Replaces implausibly short specialist names with the fallback.
pub fn guard_specialist(specialist: String) -> String {
    if specialist.chars().count() < MIN_SPECIALIST_LEN {
        FALLBACK_SPECIALIST.to_string()
    } else {
        specialist
    }
}
