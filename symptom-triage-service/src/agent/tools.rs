use std::sync::Arc;

use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::Deserialize;
use serde_json::json;

use crate::error::TriageError;
use crate::models::DrugRecommendation;
use crate::recommendation::DrugRecommender;
use crate::resolution::ResolutionCascade;

#[derive(Debug, Deserialize)]
pub struct AnalyzeSymptomArgs {
    pub text: String,
}

/// Predicts the specialist and treatment from input text.
pub struct AnalyzeSymptomTool {
    cascade: Arc<ResolutionCascade>,
}

impl AnalyzeSymptomTool {
    pub fn new(cascade: Arc<ResolutionCascade>) -> Self {
        Self { cascade }
    }
}

impl Tool for AnalyzeSymptomTool {
    const NAME: &'static str = "analyze_symptom";

    type Error = TriageError;
    type Args = AnalyzeSymptomArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Predicts the medical specialist to consult and a suggested treatment \
                          from a free-text description of symptoms."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "Symptom description, e.g. 'chest pain and palpitations'"
                    }
                },
                "required": ["text"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let answer = self.cascade.analyze(&args.text).await?;
        Ok(format!(
            "Specialist: {}, Treatment: {}",
            answer.specialist, answer.treatment
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct DrugRecommendationArgs {
    pub symptom: String,
}

/// Gets drugs for a symptom via related UMLS conditions and OpenFDA labels.
pub struct DrugRecommendationTool {
    recommender: Arc<DrugRecommender>,
}

impl DrugRecommendationTool {
    pub fn new(recommender: Arc<DrugRecommender>) -> Self {
        Self { recommender }
    }
}

impl Tool for DrugRecommendationTool {
    const NAME: &'static str = "drug_recommendation";

    type Error = TriageError;
    type Args = DrugRecommendationArgs;
    type Output = DrugRecommendation;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Finds clinical conditions related to a symptom and drugs whose \
                          approved indications mention those conditions."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "symptom": {
                        "type": "string",
                        "description": "A single symptom, e.g. 'headache'"
                    }
                },
                "required": ["symptom"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        self.recommender.recommend(&args.symptom).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::OpenFdaClient;
    use crate::recommendation::tests::{mock_labels, mock_umls, umls_settings};
    use crate::workflow::tests::{ConstantClassifier, KeywordExtractor, test_table};
    use reqwest::Client;

    #[tokio::test]
    async fn test_analyze_symptom_tool_formats_answer() {
        let cascade = Arc::new(ResolutionCascade::new(
            test_table(),
            Arc::new(KeywordExtractor),
            Arc::new(ConstantClassifier(1)),
        ));
        let tool = AnalyzeSymptomTool::new(cascade);

        let definition = tool.definition(String::new()).await;
        assert_eq!(definition.name, "analyze_symptom");
        assert_eq!(definition.parameters["required"][0], "text");

        let output = tool
            .call(AnalyzeSymptomArgs {
                text: "Sudden CHEST PAIN".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(output, "Specialist: Cardiologist, Treatment: ECG and consult");
    }

    #[tokio::test]
    async fn test_drug_recommendation_tool_returns_recommendation() {
        let mut server = mockito::Server::new_async().await;
        mock_umls(&mut server).await;
        mock_labels(&mut server).await;
        let url = server.url();

        let recommender = Arc::new(DrugRecommender::new(
            Client::new(),
            umls_settings(&url, Some("key")),
            Arc::new(OpenFdaClient::new(Client::new(), url.clone(), 5)),
            5,
        ));
        let tool = DrugRecommendationTool::new(recommender);

        let args: DrugRecommendationArgs =
            serde_json::from_value(json!({ "symptom": "chest pain" })).unwrap();
        let recommendation = tool.call(args).await.unwrap();
        assert_eq!(recommendation.conditions.len(), 2);
        assert!(recommendation.recommended_drugs.contains(&"Nitrostat".to_string()));
    }
}
