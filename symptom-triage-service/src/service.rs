use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::{Json, Response},
    routing::{get, post},
};
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    agent::TriageAgent,
    clients::OpenFdaClient,
    config::{AppConfig, OcrBackend},
    error::{Result, TriageError},
    inference::{
        HostedClassifier, HttpSymptomExtractor, LexiconSymptomExtractor, SpecialistClassifier,
        SymptomExtractor,
    },
    knowledge::LookupTable,
    models::{AgentRequest, AgentResponse, DrugRecommendation, MedicineRequest, TriageReport},
    ocr::{OcrEngine, TesseractOcr, VisionOcr},
    recommendation::DrugRecommender,
    resolution::ResolutionCascade,
    workflow::{TriageWorkflow, build_triage_workflow},
};

type ApiResult<T> = std::result::Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn error_response(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "error": message })))
}

fn bad_request_error(message: &str) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, message)
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<TriageWorkflow>,
    pub recommender: Arc<DrugRecommender>,
    pub agent: Option<Arc<TriageAgent>>,
}

pub fn create_app(config: AppConfig) -> Result<Router> {
    let app_state = create_app_state(&config)?;
    Ok(build_router(app_state, config.max_upload_bytes))
}

/// Loads the lookup table and wires every collaborator. Runs once at startup.
pub fn create_app_state(config: &AppConfig) -> Result<AppState> {
    let http = Client::new();
    let table = Arc::new(LookupTable::from_path(&config.lookup_table_path)?);

    let extractor: Arc<dyn SymptomExtractor> = match &config.ner_endpoint_url {
        Some(url) => {
            info!("Using NER endpoint {}", url);
            Arc::new(HttpSymptomExtractor::new(
                http.clone(),
                url.clone(),
                config.hf_api_token.clone(),
            ))
        }
        None => {
            warn!("NER_ENDPOINT_URL not set, falling back to the lookup-table lexicon");
            Arc::new(LexiconSymptomExtractor::from_table(&table)?)
        }
    };
    let classifier: Arc<dyn SpecialistClassifier> = Arc::new(HostedClassifier::new(
        http.clone(),
        &config.inference_base_url,
        &config.classifier_model,
        config.hf_api_token.clone(),
    ));
    let cascade = Arc::new(ResolutionCascade::new(table, extractor, classifier));

    let ocr: Arc<dyn OcrEngine> = match config.ocr_backend {
        OcrBackend::Tesseract => Arc::new(TesseractOcr::new(config.tesseract_cmd.clone())),
        OcrBackend::Vision => {
            let api_key = config
                .openrouter_api_key
                .as_deref()
                .ok_or(TriageError::MissingConfig("OPENROUTER_API_KEY"))?;
            Arc::new(VisionOcr::new(http.clone(), api_key, config.agent_model.clone()))
        }
    };

    let openfda = Arc::new(OpenFdaClient::new(
        http.clone(),
        config.openfda_base_url.clone(),
        config.drug_search_limit,
    ));
    let workflow = Arc::new(TriageWorkflow::new(build_triage_workflow(
        ocr,
        cascade.clone(),
        openfda.clone(),
        config.medicine_list_limit,
    )));
    let recommender = Arc::new(DrugRecommender::new(
        http,
        config.umls.clone(),
        openfda,
        config.max_conditions,
    ));

    let agent = match &config.openrouter_api_key {
        Some(api_key) => Some(Arc::new(TriageAgent::new(
            api_key,
            &config.agent_model,
            config.agent_max_turns,
            cascade,
            recommender.clone(),
        ))),
        None => {
            warn!("OPENROUTER_API_KEY not set, /agent-response is disabled");
            None
        }
    };

    Ok(AppState {
        workflow,
        recommender,
        agent,
    })
}

pub fn build_router(app_state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/upload", post(upload_image))
        .route("/suggest-medicines", post(suggest_medicines))
        .route("/agent-response", post(agent_response))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .with_state(app_state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(mut request: Request<axum::body::Body>, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Symptom Triage Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "OCR-based symptom triage with specialist, treatment and drug suggestions",
        "endpoints": {
            "POST /upload": "Multipart image upload (field 'image') -> specialist, treatment, matched medicines",
            "POST /suggest-medicines": "{\"extracted_text\": ...} -> related conditions and drugs",
            "POST /agent-response": "Free-text question answered by the triage agent",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn upload_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<TriageReport> {
    let image = read_image_field(multipart).await?;
    info!("Received image upload of {} bytes", image.len());

    match state.workflow.run(&image).await {
        Ok(report) => {
            info!(
                specialist = %report.specialist,
                matched_medicines = report.matched_medicines.len(),
                "Triage completed"
            );
            Ok(Json(report))
        }
        Err(e) => {
            error!("Triage workflow failed: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &e.to_string(),
            ))
        }
    }
}

/// Returns the bytes of the `image` field, or of the first file field if none is named so.
/// Empty fields count as missing.
async fn read_image_field(mut multipart: Multipart) -> std::result::Result<Vec<u8>, ApiError> {
    let mut fallback: Option<Vec<u8>> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(bad_request_error(&format!("Invalid multipart body: {}", e))),
        };

        let is_image = field.name() == Some("image");
        let is_file = field.file_name().is_some();
        if !is_image && !is_file {
            continue;
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request_error(&format!("Failed to read upload: {}", e)))?;

        if bytes.is_empty() {
            continue;
        }
        if is_image {
            return Ok(bytes.to_vec());
        }
        if fallback.is_none() {
            fallback = Some(bytes.to_vec());
        }
    }

    fallback.ok_or_else(|| bad_request_error("An image file is required"))
}

async fn suggest_medicines(
    State(state): State<AppState>,
    Json(request): Json<MedicineRequest>,
) -> ApiResult<DrugRecommendation> {
    if request.extracted_text.trim().is_empty() {
        return Err(bad_request_error("extracted_text is required"));
    }
    info!("Suggesting medicines for {:?}", request.extracted_text);

    match state.recommender.recommend(&request.extracted_text).await {
        Ok(recommendation) => Ok(Json(recommendation)),
        Err(e) if e.is_upstream() => {
            error!("Drug recommendation failed upstream: {}", e);
            Err(error_response(StatusCode::BAD_GATEWAY, &e.to_string()))
        }
        Err(e) => {
            error!("Drug recommendation failed: {}", e);
            Err(internal_error("Failed to suggest medicines", &e.to_string()))
        }
    }
}

async fn agent_response(
    State(state): State<AppState>,
    Json(request): Json<AgentRequest>,
) -> ApiResult<AgentResponse> {
    let Some(agent) = state.agent.as_ref() else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Agent is not configured: set OPENROUTER_API_KEY",
        ));
    };

    let input = request.into_text();
    if input.trim().is_empty() {
        return Err(bad_request_error("input_text is required"));
    }

    match agent.respond(&input).await {
        Ok(response) => Ok(Json(AgentResponse { response })),
        Err(e) => {
            error!("Agent failed: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &e.to_string(),
            ))
        }
    }
}
