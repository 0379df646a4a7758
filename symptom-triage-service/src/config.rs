//! Process configuration, read once at startup.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Which OCR engine turns the preprocessed image into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrBackend {
    Tesseract,
    Vision,
}

impl FromStr for OcrBackend {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tesseract" => Ok(OcrBackend::Tesseract),
            "vision" => Ok(OcrBackend::Vision),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UmlsSettings {
    pub api_key: Option<String>,
    pub auth_url: String,
    pub base_url: String,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub lookup_table_path: PathBuf,
    pub umls: UmlsSettings,
    pub openfda_base_url: String,
    pub medicine_list_limit: usize,
    pub drug_search_limit: usize,
    pub max_conditions: usize,
    pub inference_base_url: String,
    pub classifier_model: String,
    pub hf_api_token: Option<String>,
    pub ner_endpoint_url: Option<String>,
    pub ocr_backend: OcrBackend,
    pub tesseract_cmd: String,
    pub openrouter_api_key: Option<String>,
    pub agent_model: String,
    pub agent_max_turns: usize,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let string_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let ocr_backend = match get("OCR_BACKEND") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                var: "OCR_BACKEND",
                value,
            })?,
            None => OcrBackend::Tesseract,
        };

        Ok(Self {
            port: parse_or(&get, "PORT", 8000)?,
            lookup_table_path: PathBuf::from(string_or(
                "LOOKUP_TABLE_PATH",
                "data/symptoms_specialists.csv",
            )),
            umls: UmlsSettings {
                api_key: get("UMLS_API_KEY"),
                auth_url: string_or(
                    "UMLS_AUTH_URL",
                    "https://utslogin.nlm.nih.gov/cas/v1/api-key",
                ),
                base_url: string_or("UMLS_BASE_URL", "https://uts-ws.nlm.nih.gov"),
                version: string_or("UMLS_VERSION", "current"),
                service: string_or("UMLS_SERVICE", "http://umlsks.nlm.nih.gov"),
            },
            openfda_base_url: string_or("OPENFDA_BASE_URL", "https://api.fda.gov"),
            medicine_list_limit: parse_or(&get, "MEDICINE_LIST_LIMIT", 100)?,
            drug_search_limit: parse_or(&get, "DRUG_SEARCH_LIMIT", 5)?,
            max_conditions: parse_or(&get, "MAX_CONDITIONS", 5)?,
            inference_base_url: string_or(
                "INFERENCE_BASE_URL",
                "https://api-inference.huggingface.co/models",
            ),
            classifier_model: string_or("CLASSIFIER_MODEL", "shouryamishra55/Hybrid-Pharma-Model"),
            hf_api_token: get("HF_API_TOKEN"),
            ner_endpoint_url: get("NER_ENDPOINT_URL"),
            ocr_backend,
            tesseract_cmd: string_or("TESSERACT_CMD", "tesseract"),
            openrouter_api_key: get("OPENROUTER_API_KEY"),
            agent_model: string_or("AGENT_MODEL", "openai/gpt-4.1-mini"),
            agent_max_turns: parse_or(&get, "AGENT_MAX_TURNS", 5)?,
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_source(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_conditions, 5);
        assert_eq!(config.drug_search_limit, 5);
        assert_eq!(config.medicine_list_limit, 100);
        assert_eq!(config.ocr_backend, OcrBackend::Tesseract);
        assert_eq!(config.umls.version, "current");
        assert!(config.umls.api_key.is_none());
        assert!(config.openrouter_api_key.is_none());
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let config = config_from(&[
            ("PORT", "9100"),
            ("OCR_BACKEND", "Vision"),
            ("UMLS_API_KEY", "secret"),
            ("OPENROUTER_API_KEY", "  "),
            ("MAX_CONDITIONS", "3"),
        ])
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.ocr_backend, OcrBackend::Vision);
        assert_eq!(config.umls.api_key.as_deref(), Some("secret"));
        assert!(config.openrouter_api_key.is_none());
        assert_eq!(config.max_conditions, 3);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "PORT", .. }));

        let err = config_from(&[("OCR_BACKEND", "easyocr")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "OCR_BACKEND", .. }));
    }
}
