//! Free-form query agent backed by an OpenRouter model with the triage tools attached.

pub mod tools;

use std::sync::Arc;

use rig::agent::Agent;
use rig::completion::Prompt;
use rig::prelude::*;
use rig::providers::openrouter;
use tracing::info;

use crate::error::{Result, TriageError};
use crate::recommendation::DrugRecommender;
use crate::resolution::ResolutionCascade;

pub use tools::{AnalyzeSymptomTool, DrugRecommendationTool};

const AGENT_PREAMBLE: &str = r#"You are a medical triage assistant.
You can call two tools:
- analyze_symptom: recommends a specialist and a treatment for a symptom description.
- drug_recommendation: finds related conditions and candidate drugs for a symptom.
Use the tools whenever the user describes symptoms or asks about medicines, then answer in plain
language. Always remind the user that the answer is not a diagnosis and that they should consult
a qualified doctor."#;

pub struct TriageAgent {
    agent: Agent<openrouter::CompletionModel>,
    max_turns: usize,
}

impl TriageAgent {
    pub fn new(
        api_key: &str,
        model: &str,
        max_turns: usize,
        cascade: Arc<ResolutionCascade>,
        recommender: Arc<DrugRecommender>,
    ) -> Self {
        let client = openrouter::Client::new(api_key);
        let agent = client
            .agent(model)
            .preamble(AGENT_PREAMBLE)
            .tool(AnalyzeSymptomTool::new(cascade))
            .tool(DrugRecommendationTool::new(recommender))
            .build();

        info!(model = %model, "Triage agent ready");
        Self { agent, max_turns }
    }

    pub async fn respond(&self, input: &str) -> Result<String> {
        self.agent
            .prompt(input)
            .multi_turn(self.max_turns)
            .await
            .map_err(|e| TriageError::Agent(e.to_string()))
    }
}
