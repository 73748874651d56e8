use parity_core::assets::ResolvedAssets;
use parity_core::backend::{BackendKind, TokenizerBackend};
use parity_core::config::ModelSpec;
use parity_core::pipeline::BackendOpener;
use parity_core::{ParityConfig, ParityError};

/// Backends compiled into this build.
pub fn compiled_backends() -> Vec<BackendKind> {
    let mut kinds = Vec::new();
    if cfg!(feature = "huggingface") {
        kinds.push(BackendKind::HuggingFace);
    }
    if cfg!(feature = "sentencepiece") {
        kinds.push(BackendKind::SentencePiece);
    }
    if cfg!(feature = "tiktoken") {
        kinds.push(BackendKind::Tiktoken);
    }
    kinds
}

/// Opens each model with the adapter for its backend kind.
#[derive(Debug, Clone)]
pub struct BackendFactory {
    /// File in the model directory holding the tiktoken encoding definition.
    definition_file: String,
}

impl BackendFactory {
    pub fn new(definition_file: impl Into<String>) -> Self {
        Self {
            definition_file: definition_file.into(),
        }
    }

    /// tiktoken definitions live in the manifest itself.
    pub fn from_config(config: &ParityConfig) -> Self {
        Self::new(config.manifest.file_name.clone())
    }
}

impl BackendOpener for BackendFactory {
    fn open(
        &self,
        model: &ModelSpec,
        assets: &ResolvedAssets,
    ) -> Result<Box<dyn TokenizerBackend>, ParityError> {
        match model.backend {
            BackendKind::HuggingFace => open_huggingface(model, assets),
            BackendKind::SentencePiece => open_sentencepiece(model, assets),
            BackendKind::Tiktoken => open_tiktoken(model, assets, &self.definition_file),
        }
    }
}

#[cfg(feature = "huggingface")]
fn open_huggingface(
    model: &ModelSpec,
    assets: &ResolvedAssets,
) -> Result<Box<dyn TokenizerBackend>, ParityError> {
    Ok(Box::new(parity_hf::open_from_assets(model, assets)?))
}

#[cfg(not(feature = "huggingface"))]
fn open_huggingface(
    model: &ModelSpec,
    _assets: &ResolvedAssets,
) -> Result<Box<dyn TokenizerBackend>, ParityError> {
    Err(unavailable(model.backend, "huggingface"))
}

#[cfg(feature = "sentencepiece")]
fn open_sentencepiece(
    model: &ModelSpec,
    assets: &ResolvedAssets,
) -> Result<Box<dyn TokenizerBackend>, ParityError> {
    Ok(Box::new(parity_spm::open_from_assets(model, assets)?))
}

#[cfg(not(feature = "sentencepiece"))]
fn open_sentencepiece(
    model: &ModelSpec,
    _assets: &ResolvedAssets,
) -> Result<Box<dyn TokenizerBackend>, ParityError> {
    Err(unavailable(model.backend, "sentencepiece"))
}

#[cfg(feature = "tiktoken")]
fn open_tiktoken(
    model: &ModelSpec,
    assets: &ResolvedAssets,
    definition_file: &str,
) -> Result<Box<dyn TokenizerBackend>, ParityError> {
    Ok(Box::new(parity_tiktoken::open_from_assets(
        model,
        assets,
        definition_file,
    )?))
}

#[cfg(not(feature = "tiktoken"))]
fn open_tiktoken(
    model: &ModelSpec,
    _assets: &ResolvedAssets,
    _definition_file: &str,
) -> Result<Box<dyn TokenizerBackend>, ParityError> {
    Err(unavailable(model.backend, "tiktoken"))
}

#[cfg(not(all(
    feature = "huggingface",
    feature = "sentencepiece",
    feature = "tiktoken"
)))]
fn unavailable(kind: BackendKind, feature: &str) -> ParityError {
    ParityError::BackendUnavailable {
        backend: kind.to_string(),
        reason: format!("built without the `{}` feature", feature),
    }
}
