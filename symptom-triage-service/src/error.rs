use thiserror::Error;

/// Errors raised while serving a triage request.
#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Model inference failed: {0}")]
    Inference(String),

    #[error("Classifier returned index {index} but only {known} specialists are known")]
    UnknownClassIndex { index: usize, known: usize },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("UMLS authentication failed: {0}")]
    UmlsAuthentication(String),

    #[error("UMLS request failed: {0}")]
    Umls(String),

    #[error("Failed to load lookup table: {0}")]
    LookupTable(String),

    #[error("Agent failed: {0}")]
    Agent(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TriageError>;

impl From<csv::Error> for TriageError {
    fn from(e: csv::Error) -> Self {
        TriageError::LookupTable(e.to_string())
    }
}

impl TriageError {
    /// True for failures of the remote terminology or transport layer, as opposed to
    /// problems with the request or the local configuration.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            TriageError::Http(_) | TriageError::UmlsAuthentication(_) | TriageError::Umls(_)
        )
    }
}

impl From<TriageError> for triage_flow::GraphError {
    fn from(e: TriageError) -> Self {
        triage_flow::GraphError::TaskExecutionFailed(e.to_string())
    }
}
