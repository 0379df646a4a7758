//! OpenFDA drug-label queries. Every failure is swallowed and reported as "no results".

use std::collections::BTreeSet;

use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Default, Deserialize)]
struct LabelPage {
    #[serde(default)]
    results: Vec<Label>,
}

#[derive(Debug, Default, Deserialize)]
struct Label {
    #[serde(default)]
    openfda: VendorMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct VendorMetadata {
    #[serde(default)]
    brand_name: Vec<String>,
    #[serde(default)]
    generic_name: Vec<String>,
}

pub struct OpenFdaClient {
    client: Client,
    base_url: String,
    search_limit: usize,
}

impl OpenFdaClient {
    pub fn new(client: Client, base_url: impl Into<String>, search_limit: usize) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            search_limit,
        }
    }

    fn label_url(&self) -> String {
        format!("{}/drug/label.json", self.base_url)
    }

    async fn fetch_labels(&self, query: &[(&str, String)]) -> Option<LabelPage> {
        let response = match self.client.get(self.label_url()).query(query).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("OpenFDA request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("OpenFDA returned {}", response.status());
            return None;
        }

        match response.json::<LabelPage>().await {
            Ok(page) => Some(page),
            Err(e) => {
                warn!("Failed to parse OpenFDA response: {}", e);
                None
            }
        }
    }

    /// Brand and generic names of labels whose indications mention the condition.
    pub async fn drugs_for_condition(&self, condition: &str) -> BTreeSet<String> {
        let query = [
            ("search", format!("indications_and_usage:\"{}\"", condition)),
            ("limit", self.search_limit.to_string()),
        ];

        let drugs: BTreeSet<String> = self
            .fetch_labels(&query)
            .await
            .unwrap_or_default()
            .results
            .into_iter()
            .flat_map(|label| {
                let VendorMetadata {
                    brand_name,
                    generic_name,
                } = label.openfda;
                brand_name.into_iter().chain(generic_name)
            })
            .collect();

        info!("Found {} drugs for condition {:?}", drugs.len(), condition);
        drugs
    }

    /// Distinct lower-cased brand names from the general label listing.
    pub async fn brand_names(&self, limit: usize) -> Vec<String> {
        let query = [("limit", limit.to_string())];

        let names: BTreeSet<String> = self
            .fetch_labels(&query)
            .await
            .unwrap_or_default()
            .results
            .into_iter()
            .flat_map(|label| label.openfda.brand_name)
            .map(|name| name.to_lowercase())
            .collect();

        names.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const LABELS: &str = r#"{"results":[
        {"openfda":{"brand_name":["Zestril"],"generic_name":["LISINOPRIL"]}},
        {"openfda":{"brand_name":["Prinivil","Zestril"]}},
        {"id":"no-vendor-block"}
    ]}"#;

    #[tokio::test]
    async fn test_drugs_for_condition_collects_brand_and_generic() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/drug/label.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "search".into(),
                    "indications_and_usage:\"hypertension\"".into(),
                ),
                Matcher::UrlEncoded("limit".into(), "5".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(LABELS)
            .create_async()
            .await;

        let client = OpenFdaClient::new(Client::new(), server.url(), 5);
        let drugs = client.drugs_for_condition("hypertension").await;

        assert_eq!(
            drugs.into_iter().collect::<Vec<_>>(),
            vec!["LISINOPRIL", "Prinivil", "Zestril"]
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_yields_empty_set() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/drug/label.json")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"NOT_FOUND"}}"#)
            .create_async()
            .await;

        let client = OpenFdaClient::new(Client::new(), server.url(), 5);
        assert!(client.drugs_for_condition("rare thing").await.is_empty());
        assert!(client.brand_names(100).await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_service_yields_empty_set() {
        let client = OpenFdaClient::new(Client::new(), "http://127.0.0.1:9", 5);
        assert!(client.drugs_for_condition("fever").await.is_empty());
    }

    #[tokio::test]
    async fn test_brand_names_are_lowercased_and_distinct() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/drug/label.json")
            .match_query(Matcher::UrlEncoded("limit".into(), "100".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(LABELS)
            .create_async()
            .await;

        let client = OpenFdaClient::new(Client::new(), server.url(), 5);
        assert_eq!(client.brand_names(100).await, vec!["prinivil", "zestril"]);
    }
}
