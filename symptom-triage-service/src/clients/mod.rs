pub mod openfda;
pub mod umls;

pub use openfda::OpenFdaClient;
pub use umls::{TerminologyService, UmlsClient, map_symptom_to_conditions};
