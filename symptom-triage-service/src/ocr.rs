//! OCR engines. Both receive the already binarized greyscale image.

use std::process::Stdio;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::GrayImage;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::info;

use crate::error::{Result, TriageError};
use crate::imaging::encode_png;

const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const TRANSCRIBE_PROMPT: &str = "You are an OCR system for handwritten and printed medical notes and prescriptions. \
Transcribe ALL text in the image exactly as written, preserving line breaks. \
Return ONLY the transcribed text without any commentary.";

#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn extract_text(&self, image: &GrayImage) -> Result<String>;
}

/// Runs the `tesseract` command line tool, streaming the PNG through stdin/stdout.
pub struct TesseractOcr {
    command: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn extract_text(&self, image: &GrayImage) -> Result<String> {
        let png = encode_png(image)?;

        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TriageError::Ocr(format!("failed to start {}: {}", self.command, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&png).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(TriageError::Ocr(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        info!("Tesseract extracted {} characters", text.len());
        Ok(text)
    }
}

/// Uses a vision-capable chat model on OpenRouter as the OCR engine.
pub struct VisionOcr {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl VisionOcr {
    pub fn new(client: Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            endpoint: OPENROUTER_CHAT_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn call_chat_api(&self, content: Vec<Value>, max_tokens: u32) -> Result<String> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": content
                }
            ],
            "max_tokens": max_tokens
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TriageError::Ocr(format!(
                "vision request failed: {}",
                response.status()
            )));
        }

        let response_json: Value = response.json().await?;
        response_json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TriageError::Ocr("invalid response format from vision model".to_string()))
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    async fn extract_text(&self, image: &GrayImage) -> Result<String> {
        let encoded = STANDARD.encode(encode_png(image)?);
        let content = vec![
            json!({ "type": "text", "text": TRANSCRIBE_PROMPT }),
            json!({
                "type": "image_url",
                "image_url": { "url": format!("data:image/png;base64,{}", encoded) }
            }),
        ];

        let text = self.call_chat_api(content, 2000).await?;
        info!("Vision OCR extracted {} characters", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};
    use mockito::Matcher;

    fn blank() -> GrayImage {
        ImageBuffer::from_pixel(4, 4, Luma([255]))
    }

    #[tokio::test]
    async fn test_missing_tesseract_binary_is_an_ocr_error() {
        let engine = TesseractOcr::new("tesseract-binary-that-does-not-exist");
        let err = engine.extract_text(&blank()).await.unwrap_err();
        assert!(matches!(err, TriageError::Ocr(msg) if msg.contains("failed to start")));
    }

    #[tokio::test]
    async fn test_vision_ocr_reads_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat")
            .match_header("authorization", "Bearer or-key")
            .match_body(Matcher::PartialJson(json!({ "model": "vision-model" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"fever and cough"}}]}"#)
            .create_async()
            .await;

        let engine = VisionOcr::new(Client::new(), "or-key", "vision-model")
            .with_endpoint(format!("{}/chat", server.url()));
        assert_eq!(engine.extract_text(&blank()).await.unwrap(), "fever and cough");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_vision_ocr_rejects_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat")
            .with_status(401)
            .create_async()
            .await;

        let engine = VisionOcr::new(Client::new(), "bad", "vision-model")
            .with_endpoint(format!("{}/chat", server.url()));
        assert!(matches!(
            engine.extract_text(&blank()).await,
            Err(TriageError::Ocr(_))
        ));
    }
}
