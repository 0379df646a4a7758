use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use tracing::info;
use triage_flow::{Context, Graph, GraphBuilder, Result, Task};

use crate::clients::OpenFdaClient;
use crate::models::{ResolvedAnswer, TriageReport};
use crate::ocr::OcrEngine;
use crate::resolution::ResolutionCascade;
use crate::tasks::{MedicineMatchTask, OcrExtractTask, SpecialistResolutionTask, session_keys};

pub fn build_triage_workflow(
    ocr: Arc<dyn OcrEngine>,
    cascade: Arc<ResolutionCascade>,
    openfda: Arc<OpenFdaClient>,
    medicine_list_limit: usize,
) -> Graph {
    let ocr_task = Arc::new(OcrExtractTask::new(ocr));
    let ocr_id = ocr_task.id().to_string();

    let resolution_task = Arc::new(SpecialistResolutionTask::new(cascade));
    let resolution_id = resolution_task.id().to_string();

    let medicine_task = Arc::new(MedicineMatchTask::new(openfda, medicine_list_limit));
    let medicine_id = medicine_task.id().to_string();

    GraphBuilder::new("triage_workflow")
        .add_task(ocr_task)
        .add_task(resolution_task)
        .add_task(medicine_task)
        .add_edge(&ocr_id, &resolution_id)
        .add_edge(&resolution_id, &medicine_id)
        .build()
}

/// Upload pipeline: OCR, specialist resolution, then medicine matching.
pub struct TriageWorkflow {
    graph: Graph,
}

impl TriageWorkflow {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    pub async fn run(&self, image: &[u8]) -> Result<TriageReport> {
        let context = Context::new();
        context
            .set(session_keys::IMAGE_BASE64, STANDARD.encode(image))
            .await;

        let result = self.graph.execute_from_start(context.clone()).await?;
        info!(
            last_task = %result.task_id,
            status = ?result.status_message,
            "Triage workflow finished"
        );

        let extracted_text: String = context.require(session_keys::EXTRACTED_TEXT).await?;
        let resolution: ResolvedAnswer = context.require(session_keys::RESOLUTION).await?;
        let matched_medicines: Vec<String> =
            context.require(session_keys::MATCHED_MEDICINES).await?;

        Ok(TriageReport {
            extracted_text,
            specialist: resolution.specialist,
            treatment: resolution.treatment,
            matched_medicines,
        })
    }
}
