use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{ModelSpec, ParityConfig};
use crate::error::ParityError;

/// Asset files resolved for one model, keyed by file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAssets {
    pub model_dir: PathBuf,
    pub files: BTreeMap<String, PathBuf>,
}

impl ResolvedAssets {
    pub fn get(&self, file_name: &str) -> Option<&Path> {
        self.files.get(file_name).map(PathBuf::as_path)
    }

    /// File name -> path relative to `base`, with `/` separators.
    pub fn relative_to(&self, base: &Path) -> BTreeMap<String, String> {
        self.files
            .iter()
            .map(|(name, path)| {
                let rel = path.strip_prefix(base).unwrap_or(path);
                let rel = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                (name.clone(), rel)
            })
            .collect()
    }
}

/// Resolves a model's files. Download and authentication live outside.
pub trait AssetProvider {
    fn resolve(&self, model: &ModelSpec) -> Result<ResolvedAssets, ParityError>;
}

/// Assets already present under `<data_root>/<model>/`.
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    data_root: PathBuf,
}

impl LocalAssetStore {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn from_config(config: &ParityConfig) -> Self {
        Self::new(config.data_root.clone())
    }
}

impl AssetProvider for LocalAssetStore {
    fn resolve(&self, model: &ModelSpec) -> Result<ResolvedAssets, ParityError> {
        let model_dir = self.data_root.join(&model.id);
        let mut files = BTreeMap::new();
        for name in &model.required_files {
            let path = model_dir.join(name);
            if !path.is_file() {
                return Err(ParityError::AssetMissing {
                    model: model.id.clone(),
                    file: name.clone(),
                    searched: model_dir.clone(),
                    hint: remediation_hint(model),
                });
            }
            files.insert(name.clone(), path);
        }
        for name in &model.optional_files {
            let path = model_dir.join(name);
            if path.is_file() {
                files.insert(name.clone(), path);
            } else {
                debug!(model = %model.id, file = %name, "optional asset not present");
            }
        }
        Ok(ResolvedAssets { model_dir, files })
    }
}

fn remediation_hint(model: &ModelSpec) -> String {
    format!(
        "download the assets for '{}' (repo {}) into this directory before regenerating",
        model.id,
        model.repo_id()
    )
}
