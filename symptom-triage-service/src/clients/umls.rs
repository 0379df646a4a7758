//! UMLS terminology service: CAS ticket authentication, concept search and concept relations.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::LOCATION};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::UmlsSettings;
use crate::error::{Result, TriageError};

/// Identifier UMLS uses for "no concept found".
const NO_CONCEPT: &str = "NONE";

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub ui: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedConcept {
    #[serde(default)]
    pub relation_label: String,
    #[serde(default)]
    pub additional_relation_label: String,
    #[serde(default)]
    pub related_id_name: String,
}

impl RelatedConcept {
    /// "RO" (has relationship) or an additional label containing "RQ" (related qualifier).
    pub fn is_clinically_related(&self) -> bool {
        self.relation_label == "RO" || self.additional_relation_label.contains("RQ")
    }
}

#[derive(Deserialize)]
struct SearchEnvelope {
    result: SearchPage,
}

#[derive(Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct RelationsEnvelope {
    #[serde(default)]
    result: Vec<RelatedConcept>,
}

/// Concept search and relation lookup against a terminology service.
#[async_trait]
pub trait TerminologyService: Send + Sync {
    async fn search_term(&self, term: &str) -> Result<Vec<SearchResult>>;
    async fn related_concepts(&self, cui: &str) -> Result<Vec<RelatedConcept>>;
}

/// An authenticated UMLS session holding a ticket-granting ticket.
pub struct UmlsClient {
    client: Client,
    settings: UmlsSettings,
    tgt_url: String,
}

impl UmlsClient {
    /// Obtain a ticket-granting ticket. Failure here is fatal for the session.
    pub async fn authenticate(client: Client, settings: &UmlsSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .ok_or(TriageError::MissingConfig("UMLS_API_KEY"))?;

        let response = client
            .post(&settings.auth_url)
            .form(&[("apikey", api_key)])
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            return Err(TriageError::UmlsAuthentication(format!(
                "ticket-granting ticket request returned {}",
                response.status()
            )));
        }

        let tgt_url = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                TriageError::UmlsAuthentication("no Location header in TGT response".to_string())
            })?;

        info!("Obtained UMLS ticket-granting ticket");
        Ok(Self {
            client,
            settings: settings.clone(),
            tgt_url,
        })
    }

    /// Single-use service ticket, requested fresh for every API call.
    async fn service_ticket(&self) -> Result<String> {
        let response = self
            .client
            .post(&self.tgt_url)
            .form(&[("service", self.settings.service.as_str())])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(TriageError::UmlsAuthentication(format!(
                "service ticket request returned {}",
                response.status()
            )));
        }

        Ok(response.text().await?.trim().to_string())
    }
}

#[async_trait]
impl TerminologyService for UmlsClient {
    async fn search_term(&self, term: &str) -> Result<Vec<SearchResult>> {
        let ticket = self.service_ticket().await?;
        let url = format!(
            "{}/rest/search/{}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.version
        );

        let response = self
            .client
            .get(&url)
            .query(&[("string", term), ("ticket", ticket.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TriageError::Umls(format!(
                "search for {:?} returned {}",
                term,
                response.status()
            )));
        }

        let envelope: SearchEnvelope = response.json().await?;
        debug!("UMLS search {:?} returned {} results", term, envelope.result.results.len());
        Ok(envelope.result.results)
    }

    async fn related_concepts(&self, cui: &str) -> Result<Vec<RelatedConcept>> {
        let ticket = self.service_ticket().await?;
        let url = format!(
            "{}/rest/content/{}/CUI/{}/relations",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.version,
            urlencoding::encode(cui)
        );

        let response = self
            .client
            .get(&url)
            .query(&[("ticket", ticket.as_str())])
            .send()
            .await?;

        // Concepts without relations answer 404.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(TriageError::Umls(format!(
                "relations for {} returned {}",
                cui,
                response.status()
            )));
        }

        let envelope: RelationsEnvelope = response.json().await?;
        Ok(envelope.result)
    }
}

fn keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Related condition names for a symptom, in discovery order.
///
/// A related concept is kept when it is clinically related and its name shares at least one
/// lower-cased whitespace token with the symptom. At most `max_conditions` names are returned.
pub async fn map_symptom_to_conditions<T>(
    symptom: &str,
    service: &T,
    max_conditions: usize,
) -> Result<Vec<String>>
where
    T: TerminologyService + ?Sized,
{
    let mut conditions: Vec<String> = Vec::new();
    if max_conditions == 0 {
        return Ok(conditions);
    }

    let symptom_keywords = keywords(symptom);
    let search_results = service.search_term(symptom).await?;

    'results: for result in search_results {
        if result.ui == NO_CONCEPT || result.ui.is_empty() {
            continue;
        }

        for concept in service.related_concepts(&result.ui).await? {
            if !concept.is_clinically_related() {
                continue;
            }
            let name = concept.related_id_name;
            if name.is_empty() || conditions.contains(&name) {
                continue;
            }
            if keywords(&name).is_disjoint(&symptom_keywords) {
                continue;
            }

            conditions.push(name);
            if conditions.len() >= max_conditions {
                break 'results;
            }
        }
    }

    info!("Mapped {:?} to {} conditions", symptom, conditions.len());
    Ok(conditions)
}
