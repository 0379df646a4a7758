use std::collections::BTreeSet;
use std::sync::Arc;

use reqwest::Client;
use tracing::info;

use crate::clients::{OpenFdaClient, UmlsClient, map_symptom_to_conditions};
use crate::config::UmlsSettings;
use crate::error::Result;
use crate::models::DrugRecommendation;

/// Symptom -> related conditions -> candidate drugs.
pub struct DrugRecommender {
    client: Client,
    umls: UmlsSettings,
    openfda: Arc<OpenFdaClient>,
    max_conditions: usize,
}

impl DrugRecommender {
    pub fn new(
        client: Client,
        umls: UmlsSettings,
        openfda: Arc<OpenFdaClient>,
        max_conditions: usize,
    ) -> Self {
        Self {
            client,
            umls,
            openfda,
            max_conditions,
        }
    }

    /// Each call authenticates its own UMLS session; sessions are not shared between requests.
    pub async fn recommend(&self, symptom: &str) -> Result<DrugRecommendation> {
        let session = UmlsClient::authenticate(self.client.clone(), &self.umls).await?;
        let conditions = map_symptom_to_conditions(symptom, &session, self.max_conditions).await?;

        let mut drugs = BTreeSet::new();
        for condition in &conditions {
            drugs.extend(self.openfda.drugs_for_condition(condition).await);
        }

        info!(
            "Recommended {} drugs across {} conditions",
            drugs.len(),
            conditions.len()
        );
        Ok(DrugRecommendation {
            conditions,
            recommended_drugs: drugs.into_iter().collect(),
        })
    }
}
