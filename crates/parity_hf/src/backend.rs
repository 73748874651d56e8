//! Asset conventions for the Hugging Face backend.

use parity_core::assets::ResolvedAssets;
use parity_core::config::ModelSpec;
use parity_core::ParityError;

use crate::adapter_impl::HuggingFaceBackend;

/// Library name; fixture metadata records `tokenizers_version`.
pub const HF_LIBRARY_NAME: &str = "tokenizers";

/// The only asset the fast tokenizer needs.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Opens the backend from a model's resolved `tokenizer.json`.
pub fn open_from_assets(
    model: &ModelSpec,
    assets: &ResolvedAssets,
) -> Result<HuggingFaceBackend, ParityError> {
    let path = assets
        .get(TOKENIZER_FILE)
        .ok_or_else(|| ParityError::AssetMissing {
            model: model.id.clone(),
            file: TOKENIZER_FILE.to_string(),
            searched: assets.model_dir.clone(),
            hint: format!(
                "list \"{}\" in required_files for '{}' and fetch it from {}",
                TOKENIZER_FILE,
                model.id,
                model.repo_id()
            ),
        })?;
    HuggingFaceBackend::from_file(path).map_err(|err| ParityError::BackendUnavailable {
        backend: model.backend.to_string(),
        reason: format!("load {}: {}", path.display(), err),
    })
}
