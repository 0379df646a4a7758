//! Model collaborators used by the resolution cascade.
//!
//! Both models run behind hosted inference endpoints; this module only speaks their
//! request/response formats.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{Result, TriageError};
use crate::knowledge::LookupTable;

/// Turns free text into an ordered list of symptom phrases.
#[async_trait]
pub trait SymptomExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Vec<String>>;
}

/// Predicts the specialist class index for a symptom description.
#[async_trait]
pub trait SpecialistClassifier: Send + Sync {
    async fn predict(&self, text: &str) -> Result<usize>;
}

const SYMPTOM_LABEL: &str = "SYMPTOM";

#[derive(Debug, Deserialize)]
struct EntitySpan {
    #[serde(alias = "entity")]
    entity_group: String,
    word: String,
}

/// Named-entity recognizer exposed as a token-classification endpoint.
pub struct HttpSymptomExtractor {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpSymptomExtractor {
    pub fn new(client: Client, endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            token,
        }
    }
}

#[async_trait]
impl SymptomExtractor for HttpSymptomExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<String>> {
        let mut request = self.client.post(&self.endpoint).json(&json!({ "inputs": text }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(TriageError::Inference(format!(
                "NER endpoint returned {}",
                response.status()
            )));
        }

        let spans: Vec<EntitySpan> = response.json().await?;
        let symptoms: Vec<String> = spans
            .into_iter()
            .filter(|span| span.entity_group == SYMPTOM_LABEL)
            .map(|span| span.word.trim().to_string())
            .filter(|word| !word.is_empty())
            .collect();

        debug!("NER extracted symptoms: {:?}", symptoms);
        Ok(symptoms)
    }
}

/// Offline extractor that recognises the symptom phrases listed in the lookup table.
pub struct LexiconSymptomExtractor {
    patterns: Vec<(String, Regex)>,
}

impl LexiconSymptomExtractor {
    pub fn from_table(table: &LookupTable) -> Result<Self> {
        let patterns = table
            .symptom_vocabulary()
            .into_iter()
            .map(|phrase| {
                let pattern = format!(r"\b{}\b", regex::escape(phrase));
                Regex::new(&pattern)
                    .map(|re| (phrase.to_string(), re))
                    .map_err(|e| TriageError::LookupTable(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Symptom lexicon built with {} phrases", patterns.len());
        Ok(Self { patterns })
    }
}

#[async_trait]
impl SymptomExtractor for LexiconSymptomExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<String>> {
        let text = text.to_lowercase();
        Ok(self
            .patterns
            .iter()
            .filter(|(_, re)| re.is_match(&text))
            .map(|(phrase, _)| phrase.clone())
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassificationOutput {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl ClassificationOutput {
    fn into_scores(self) -> Vec<LabelScore> {
        match self {
            ClassificationOutput::Nested(batches) => {
                batches.into_iter().next().unwrap_or_default()
            }
            ClassificationOutput::Flat(scores) => scores,
        }
    }
}

/// Parses `LABEL_<n>` (or a bare number) into a class index.
fn parse_label_index(label: &str) -> Option<usize> {
    label.strip_prefix("LABEL_").unwrap_or(label).parse().ok()
}

/// Sequence classifier served by a hosted inference API.
pub struct HostedClassifier {
    client: Client,
    url: String,
    token: Option<String>,
}

impl HostedClassifier {
    pub fn new(
        client: Client,
        base_url: &str,
        model: &str,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            url: format!("{}/{}", base_url.trim_end_matches('/'), model),
            token,
        }
    }
}

#[async_trait]
impl SpecialistClassifier for HostedClassifier {
    async fn predict(&self, text: &str) -> Result<usize> {
        let payload = json!({
            "inputs": text,
            "parameters": { "truncation": true, "max_length": 512 }
        });

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(TriageError::Inference(format!(
                "classifier returned {}",
                response.status()
            )));
        }

        let output: ClassificationOutput = response.json().await?;
        let best = output
            .into_scores()
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .ok_or_else(|| TriageError::Inference("classifier returned no labels".to_string()))?;

        parse_label_index(&best.label).ok_or_else(|| {
            TriageError::Inference(format!("unexpected classifier label {}", best.label))
        })
    }
}
