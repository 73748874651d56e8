//! `parity.toml` configuration.
//!
//! Loaded once at process start and passed by reference everywhere; relative
//! paths resolve against the directory holding the config file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::chat::ChatScenarioSet;
use crate::error::ParityError;

pub const DEFAULT_CONFIG_FILE: &str = "parity.toml";
pub const DEFAULT_CONTRACT_PATH: &str = "tests/_testdata_templates/tokenization-cases.json";
pub const DEFAULT_DATA_ROOT: &str = "tests/_TestData";
pub const DEFAULT_MANIFEST_FILE: &str = "tokenx-tests-validation.json";
pub const DEFAULT_FIXTURE_FILE: &str = "rust-benchmark.json";
pub const DEFAULT_SNAPSHOT_NAME: &str = "rs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParityConfig {
    /// File the config was read from; `None` when defaults were used.
    pub source: Option<PathBuf>,
    pub contract_path: PathBuf,
    pub data_root: PathBuf,
    pub manifest: ManifestSettings,
    pub fixture_file: String,
    pub models: Vec<ModelSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSettings {
    #[serde(default = "default_manifest_file")]
    pub file_name: String,
    #[serde(default = "default_snapshot_name")]
    pub snapshot: String,
    #[serde(default = "default_known_backends")]
    pub known_backends: Vec<String>,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            file_name: default_manifest_file(),
            snapshot: default_snapshot_name(),
            known_backends: default_known_backends(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSpec {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub repo_id: Option<String>,
    pub backend: BackendKind,
    #[serde(default)]
    pub required_files: Vec<String>,
    #[serde(default)]
    pub optional_files: Vec<String>,
    /// Recorded as `modelFile` in the manifest, for backends keyed by a model file.
    #[serde(default)]
    pub model_file: Option<String>,
    /// Conversations rendered through the model's chat template during
    /// fixture generation. Unset skips the chat-template fixture.
    #[serde(default)]
    pub chat_scenarios: Option<ChatScenarioSet>,
}

impl ModelSpec {
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }

    pub fn repo_id(&self) -> &str {
        self.repo_id.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParityToml {
    #[serde(default)]
    paths: PathsSection,
    #[serde(default)]
    manifest: ManifestSettings,
    #[serde(default)]
    fixture: FixtureSection,
    #[serde(default)]
    models: Vec<ModelSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathsSection {
    contract: Option<PathBuf>,
    data_root: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureSection {
    file_name: Option<String>,
}

fn default_manifest_file() -> String {
    DEFAULT_MANIFEST_FILE.to_string()
}

fn default_snapshot_name() -> String {
    DEFAULT_SNAPSHOT_NAME.to_string()
}

fn default_known_backends() -> Vec<String> {
    vec!["py".to_string(), "tokenx".to_string()]
}

impl ParityConfig {
    /// Reads `path`, or falls back to defaults rooted at its directory when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ParityError> {
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        if !path.exists() {
            return Self::from_toml(ParityToml::default(), &base, None);
        }
        let raw = fs::read_to_string(path)
            .map_err(|err| ParityError::Config(format!("read {}: {}", path.display(), err)))?;
        let parsed: ParityToml = toml::from_str(&raw)
            .map_err(|err| ParityError::Config(format!("parse {}: {}", path.display(), err)))?;
        Self::from_toml(parsed, &base, Some(path.to_path_buf()))
    }

    pub fn parse(raw: &str, base: &Path) -> Result<Self, ParityError> {
        let parsed: ParityToml = toml::from_str(raw)
            .map_err(|err| ParityError::Config(format!("parse: {}", err)))?;
        Self::from_toml(parsed, base, None)
    }

    fn from_toml(
        parsed: ParityToml,
        base: &Path,
        source: Option<PathBuf>,
    ) -> Result<Self, ParityError> {
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
        let config = Self {
            source,
            contract_path: resolve(
                parsed
                    .paths
                    .contract
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTRACT_PATH)),
            ),
            data_root: resolve(
                parsed
                    .paths
                    .data_root
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT)),
            ),
            manifest: parsed.manifest,
            fixture_file: parsed
                .fixture
                .file_name
                .unwrap_or_else(|| DEFAULT_FIXTURE_FILE.to_string()),
            models: parsed.models,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ParityError> {
        if self.manifest.snapshot.trim().is_empty() {
            return Err(ParityError::Config("manifest.snapshot is empty".to_string()));
        }
        let mut seen = std::collections::BTreeSet::new();
        for model in &self.models {
            if model.id.trim().is_empty() {
                return Err(ParityError::Config("model id is empty".to_string()));
            }
            if model.id.contains(&['/', '\\'][..]) || model.id == ".." {
                return Err(ParityError::Config(format!(
                    "model id '{}' must be a single path segment",
                    model.id
                )));
            }
            if !seen.insert(model.id.as_str()) {
                return Err(ParityError::Config(format!(
                    "model '{}' is configured twice",
                    model.id
                )));
            }
        }
        Ok(())
    }

    pub fn model_dir(&self, model_id: &str) -> PathBuf {
        self.data_root.join(model_id)
    }

    pub fn manifest_path(&self, model_id: &str) -> PathBuf {
        self.model_dir(model_id).join(&self.manifest.file_name)
    }

    pub fn fixture_path(&self, model_id: &str) -> PathBuf {
        self.model_dir(model_id).join(&self.fixture_file)
    }

    /// Models selected by id, or all of them when `ids` is empty.
    pub fn select_models(&self, ids: &[String]) -> Result<Vec<&ModelSpec>, ParityError> {
        if ids.is_empty() {
            return Ok(self.models.iter().collect());
        }
        ids.iter()
            .map(|id| {
                self.models
                    .iter()
                    .find(|m| m.id == *id)
                    .ok_or_else(|| ParityError::Config(format!("unknown model '{}'", id)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_use_defaults() {
        let cfg = ParityConfig::parse("", Path::new("/repo")).unwrap();
        assert_eq!(cfg.contract_path, Path::new("/repo").join(DEFAULT_CONTRACT_PATH));
        assert_eq!(cfg.manifest.snapshot, "rs");
        assert_eq!(cfg.manifest.known_backends, vec!["py", "tokenx"]);
        assert_eq!(cfg.fixture_file, DEFAULT_FIXTURE_FILE);
        assert!(cfg.models.is_empty());
    }

    #[test]
    fn models_parse_with_backend_kind() {
        let raw = r#"
[[models]]
id = "gpt2"
display_name = "GPT-2"
backend = "huggingface"
required_files = ["tokenizer.json"]
"#;
        let cfg = ParityConfig::parse(raw, Path::new(".")).unwrap();
        assert_eq!(cfg.models.len(), 1);
        assert_eq!(cfg.models[0].backend, BackendKind::HuggingFace);
        assert_eq!(cfg.models[0].display_name(), "GPT-2");
        assert_eq!(cfg.models[0].repo_id(), "gpt2");
        assert!(cfg.models[0].chat_scenarios.is_none());
    }

    #[test]
    fn chat_scenarios_parse_as_kebab_case() {
        let raw = r#"
[[models]]
id = "gemma"
backend = "huggingface"
chat_scenarios = "without-system"
"#;
        let cfg = ParityConfig::parse(raw, Path::new(".")).unwrap();
        assert_eq!(
            cfg.models[0].chat_scenarios,
            Some(ChatScenarioSet::WithoutSystem)
        );
    }

    #[test]
    fn duplicate_models_are_rejected() {
        let raw = r#"
[[models]]
id = "a"
backend = "tiktoken"

[[models]]
id = "a"
backend = "tiktoken"
"#;
        assert!(ParityConfig::parse(raw, Path::new(".")).is_err());
    }

    #[test]
    fn unknown_model_selection_fails() {
        let cfg = ParityConfig::parse("", Path::new(".")).unwrap();
        assert!(cfg.select_models(&["nope".to_string()]).is_err());
    }
}
