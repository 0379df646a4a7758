pub mod medicine_match;
pub mod ocr_extract;
pub mod specialist_resolution;

pub use medicine_match::MedicineMatchTask;
pub use ocr_extract::OcrExtractTask;
pub use specialist_resolution::SpecialistResolutionTask;

/// Context keys shared by the upload workflow tasks.
pub mod session_keys {
    pub const IMAGE_BASE64: &str = "image_base64";
    pub const EXTRACTED_TEXT: &str = "extracted_text";
    pub const RESOLUTION: &str = "resolution";
    pub const MATCHED_MEDICINES: &str = "matched_medicines";
}
