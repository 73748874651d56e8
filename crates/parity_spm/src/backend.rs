//! Model file discovery for the SentencePiece backend.

use std::fs;
use std::path::{Path, PathBuf};

use parity_core::assets::ResolvedAssets;
use parity_core::config::ModelSpec;
use parity_core::ParityError;
use tracing::debug;

use crate::adapter_impl::SentencePieceBackend;

/// Library name; fixture metadata records `sentencepiece_version`.
pub const SPM_LIBRARY_NAME: &str = "sentencepiece";

/// Preferred model file names, in order. Any other `*.model` file is the
/// fallback, first by name.
pub const MODEL_FILE_CANDIDATES: [&str; 3] =
    ["spiece.model", "sentencepiece.bpe.model", "tokenizer.model"];

/// Finds the model file among resolved assets, then in the model directory.
pub fn detect_model_file(assets: &ResolvedAssets) -> Option<PathBuf> {
    for name in MODEL_FILE_CANDIDATES {
        if let Some(path) = assets.get(name) {
            return Some(path.to_path_buf());
        }
        let path = assets.model_dir.join(name);
        if path.is_file() {
            return Some(path);
        }
    }

    let mut found: Vec<PathBuf> = assets
        .files
        .values()
        .filter(|path| has_model_extension(path))
        .cloned()
        .collect();
    if found.is_empty() {
        if let Ok(entries) = fs::read_dir(&assets.model_dir) {
            found = entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.is_file() && has_model_extension(path))
                .collect();
        }
    }
    found.sort();
    found.into_iter().next()
}

fn has_model_extension(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("model")
}

/// Opens the backend from `model_file` when configured, else the detected file.
pub fn open_from_assets(
    model: &ModelSpec,
    assets: &ResolvedAssets,
) -> Result<SentencePieceBackend, ParityError> {
    let path = match &model.model_file {
        Some(name) => assets
            .get(name)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| assets.model_dir.join(name)),
        None => detect_model_file(assets).ok_or_else(|| ParityError::AssetMissing {
            model: model.id.clone(),
            file: "*.model".to_string(),
            searched: assets.model_dir.clone(),
            hint: format!(
                "place one of {} for '{}' or set model_file",
                MODEL_FILE_CANDIDATES.join(", "),
                model.id
            ),
        })?,
    };
    if !path.is_file() {
        return Err(ParityError::AssetMissing {
            model: model.id.clone(),
            file: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            searched: assets.model_dir.clone(),
            hint: format!("fetch it from {}", model.repo_id()),
        });
    }
    debug!(model = %model.id, path = %path.display(), "opening sentencepiece model");
    SentencePieceBackend::from_file(&path).map_err(|err| ParityError::BackendUnavailable {
        backend: model.backend.to_string(),
        reason: format!("load {}: {}", path.display(), err),
    })
}
