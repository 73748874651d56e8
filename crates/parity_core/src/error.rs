use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParityError {
    /// The contract document is malformed or disagrees with the codec.
    #[error("contract {location}: {message}")]
    ContractValidation { location: String, message: String },

    /// A stored `text-hash` no longer matches the text behind the case id.
    #[error(
        "manifest {path}: case '{case_id}' text-hash for '{backend}' is {expected} but recomputed {actual}; \
         the case text changed without a new case id"
    )]
    ManifestCorruption {
        path: PathBuf,
        case_id: String,
        backend: String,
        expected: String,
        actual: String,
    },

    #[error("manifest {path}: {message}")]
    ManifestFormat { path: PathBuf, message: String },

    #[error("model '{model}' case '{case_id}': {operation} failed: {message}")]
    BackendEncoding {
        model: String,
        case_id: String,
        operation: String,
        message: String,
    },

    #[error("model '{model}': chat template: {message}")]
    ChatTemplate { model: String, message: String },

    #[error("model '{model}': required asset '{file}' not found under {searched}; {hint}")]
    AssetMissing {
        model: String,
        file: String,
        searched: PathBuf,
        hint: String,
    },

    #[error("backend '{backend}' is not available: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("json error: {0}")]
    Json(String),
}

impl ParityError {
    pub fn contract(location: impl Into<String>, message: impl Into<String>) -> Self {
        ParityError::ContractValidation {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Short tag used in reports and `--json` output.
    pub fn kind(&self) -> &'static str {
        match self {
            ParityError::ContractValidation { .. } => "contract_validation",
            ParityError::ManifestCorruption { .. } => "manifest_corruption",
            ParityError::ManifestFormat { .. } => "manifest_format",
            ParityError::BackendEncoding { .. } => "backend_encoding",
            ParityError::ChatTemplate { .. } => "chat_template",
            ParityError::AssetMissing { .. } => "asset_missing",
            ParityError::BackendUnavailable { .. } => "backend_unavailable",
            ParityError::Config(_) => "config",
            ParityError::Io(_) => "io",
            ParityError::Json(_) => "json",
        }
    }
}
