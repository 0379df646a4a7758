use serde::{Deserialize, Serialize};

/// Final (specialist, treatment) pair produced by the resolution cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAnswer {
    pub specialist: String,
    pub treatment: String,
}

/// Outcome of the image upload pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageReport {
    pub extracted_text: String,
    pub specialist: String,
    pub treatment: String,
    pub matched_medicines: Vec<String>,
}

/// Conditions related to a symptom and the drugs indicated for them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrugRecommendation {
    pub conditions: Vec<String>,
    pub recommended_drugs: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MedicineRequest {
    pub extracted_text: String,
}

/// Body of `/agent-response`: either a bare JSON string or an object with `input_text`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AgentRequest {
    Text(String),
    Object { input_text: String },
}

impl AgentRequest {
    pub fn into_text(self) -> String {
        match self {
            AgentRequest::Text(text) => text,
            AgentRequest::Object { input_text } => input_text,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentResponse {
    pub response: String,
}
