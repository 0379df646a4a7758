use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use tracing::{info, warn};
use triage_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};

use super::session_keys;
use crate::imaging::prepare_for_ocr;
use crate::ocr::OcrEngine;

/// Image -> greyscale -> Otsu binarization -> OCR text.
pub struct OcrExtractTask {
    ocr: Arc<dyn OcrEngine>,
}

impl OcrExtractTask {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }
}

#[async_trait]
impl Task for OcrExtractTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let encoded: String = context.require(session_keys::IMAGE_BASE64).await?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| GraphError::ContextError(format!("image is not valid base64: {}", e)))?;

        info!("Preparing {} byte image for OCR", bytes.len());
        let prepared = tokio::task::spawn_blocking(move || prepare_for_ocr(&bytes))
            .await
            .map_err(|e| GraphError::TaskExecutionFailed(e.to_string()))??;

        // Blank text still goes through resolution as a single symptom.
        let extracted_text = self.ocr.extract_text(&prepared).await?;
        if extracted_text.trim().is_empty() {
            warn!("OCR found no readable text");
        } else {
            info!("OCR extracted {} characters", extracted_text.len());
        }
        context.remove(session_keys::IMAGE_BASE64).await;
        context
            .set(session_keys::EXTRACTED_TEXT, extracted_text)
            .await;

        Ok(TaskResult::new_with_status(
            None,
            NextAction::Continue,
            Some("Text extracted from image".to_string()),
        ))
    }
}
