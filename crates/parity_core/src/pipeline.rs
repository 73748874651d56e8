//! Model-by-model driver: assets, backend, cases, then manifest or fixtures.
//!
//! Contracts are loaded and validated for every target up front so a bad
//! contract stops the run before any backend is touched. After that each
//! model succeeds or fails on its own; earlier writes stay in place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::assets::{AssetProvider, ResolvedAssets};
use crate::backend::{BackendKind, TokenizerBackend};
use crate::chat::{
    build_chat_fixture, write_chat_fixture, ChatTemplate, CHAT_TEMPLATE_FILE, TOKENIZER_CONFIG_FILE,
};
use crate::config::{ModelSpec, ParityConfig};
use crate::contract::{load_contract, LoadedContract};
use crate::error::ParityError;
use crate::fixture::{build_fixture, write_fixture};
use crate::manifest::{compare_snapshots, CaseSnapshot, CompareReport, ManifestFile, ReconcileReport};
use crate::materialize::materialize_all;
use crate::runner::run_cases;

/// Opens the backend for one model from its resolved assets.
pub trait BackendOpener {
    fn open(
        &self,
        model: &ModelSpec,
        assets: &ResolvedAssets,
    ) -> Result<Box<dyn TokenizerBackend>, ParityError>;
}

impl<F> BackendOpener for F
where
    F: Fn(&ModelSpec, &ResolvedAssets) -> Result<Box<dyn TokenizerBackend>, ParityError>,
{
    fn open(
        &self,
        model: &ModelSpec,
        assets: &ResolvedAssets,
    ) -> Result<Box<dyn TokenizerBackend>, ParityError> {
        self(model, assets)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Reconcile and write the manifest when it changed.
    UpdateManifest,
    /// Reconcile in memory and report drift without writing.
    CheckManifest,
    /// Regenerate the benchmark fixture.
    Fixture { generated_at: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelStatus {
    ManifestWritten {
        path: PathBuf,
        report: ReconcileReport,
    },
    ManifestUnchanged {
        path: PathBuf,
    },
    ManifestDrift {
        path: PathBuf,
        existed: bool,
        report: ReconcileReport,
    },
    FixtureWritten {
        path: PathBuf,
        cases: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        chat_template: Option<PathBuf>,
    },
    Compared {
        path: PathBuf,
        report: CompareReport,
    },
    Failed {
        kind: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub model: String,
    pub backend: BackendKind,
    #[serde(flatten)]
    pub status: ModelStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub models: Vec<ModelReport>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.models
            .iter()
            .filter(|m| matches!(m.status, ModelStatus::Failed { .. }))
            .count()
    }

    pub fn drifted(&self) -> usize {
        self.models
            .iter()
            .filter(|m| match &m.status {
                ModelStatus::ManifestDrift { .. } => true,
                ModelStatus::Compared { report, .. } => !report.is_clean(),
                _ => false,
            })
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.drifted() == 0
    }
}

/// Loads the contract once per distinct backend target.
pub fn load_contracts(
    config: &ParityConfig,
    models: &[&ModelSpec],
) -> Result<BTreeMap<BackendKind, LoadedContract>, ParityError> {
    let mut contracts = BTreeMap::new();
    for model in models {
        if contracts.contains_key(&model.backend) {
            continue;
        }
        let contract = load_contract(&config.contract_path, model.backend.target_id())?;
        info!(
            target = model.backend.target_id(),
            cases = contract.cases.len(),
            sha256 = %contract.sha256,
            "contract loaded"
        );
        contracts.insert(model.backend, contract);
    }
    Ok(contracts)
}

pub fn process_models(
    config: &ParityConfig,
    models: &[&ModelSpec],
    mode: &RunMode,
    provider: &dyn AssetProvider,
    opener: &dyn BackendOpener,
) -> Result<BatchReport, ParityError> {
    let contracts = load_contracts(config, models)?;
    let mut batch = BatchReport::default();
    for model in models {
        let status = match contracts.get(&model.backend) {
            Some(contract) => run_model(config, model, contract, mode, provider, opener),
            None => Err(ParityError::Config(format!(
                "no contract loaded for target '{}'",
                model.backend
            ))),
        };
        let status = status.unwrap_or_else(|err| {
            warn!(model = %model.id, error = %err, "model failed");
            ModelStatus::Failed {
                kind: err.kind(),
                message: err.to_string(),
            }
        });
        batch.models.push(ModelReport {
            model: model.id.clone(),
            backend: model.backend,
            status,
        });
    }
    Ok(batch)
}

fn run_model(
    config: &ParityConfig,
    model: &ModelSpec,
    contract: &LoadedContract,
    mode: &RunMode,
    provider: &dyn AssetProvider,
    opener: &dyn BackendOpener,
) -> Result<ModelStatus, ParityError> {
    let assets = provider.resolve(model)?;
    let mut backend = opener.open(model, &assets)?;
    let descriptor = backend.describe();
    info!(
        model = %model.id,
        library = %descriptor.library,
        version = descriptor.version_label(),
        "backend opened"
    );

    let cases = materialize_all(&contract.cases);
    let outcomes = run_cases(backend.as_mut(), &model.id, &cases)?;

    match mode {
        RunMode::UpdateManifest | RunMode::CheckManifest => {
            let path = config.manifest_path(&model.id);
            let mut manifest = ManifestFile::load_or_create(&path, &model.id)?;
            manifest.set_model_file(model.model_file.clone().or_else(|| backend.model_file()));
            let snapshots = outcomes
                .iter()
                .map(CaseSnapshot::from_outcome)
                .collect::<Result<Vec<_>, _>>()?;
            let report = manifest.reconcile(
                &config.manifest.snapshot,
                &config.manifest.known_backends,
                &snapshots,
            )?;

            if *mode == RunMode::CheckManifest {
                if manifest.is_dirty() {
                    warn!(model = %model.id, path = %path.display(), "manifest drift");
                    return Ok(ModelStatus::ManifestDrift {
                        path,
                        existed: manifest.existed(),
                        report,
                    });
                }
                info!(model = %model.id, "manifest up to date");
                return Ok(ModelStatus::ManifestUnchanged { path });
            }

            if manifest.write_if_dirty()? {
                info!(
                    model = %model.id,
                    path = %path.display(),
                    created = report.created.len(),
                    updated = report.updated.len(),
                    pruned = report.pruned.len(),
                    "manifest written"
                );
                Ok(ModelStatus::ManifestWritten { path, report })
            } else {
                info!(model = %model.id, "manifest unchanged");
                Ok(ModelStatus::ManifestUnchanged { path })
            }
        }
        RunMode::Fixture { generated_at } => {
            let path = config.fixture_path(&model.id);
            let fixture_dir = config.model_dir(&model.id);
            let fixture = build_fixture(
                model,
                &descriptor,
                &assets,
                &fixture_dir,
                &outcomes,
                generated_at,
            );
            write_fixture(&path, &fixture)?;
            info!(model = %model.id, path = %path.display(), cases = outcomes.len(), "fixture written");
            let chat_template = write_chat_template(config, model, &assets, backend.as_ref())?;
            Ok(ModelStatus::FixtureWritten {
                path,
                cases: outcomes.len(),
                chat_template,
            })
        }
    }
}

/// Writes `chat-template.json` when the model opts in and ships a template.
fn write_chat_template(
    config: &ParityConfig,
    model: &ModelSpec,
    assets: &ResolvedAssets,
    backend: &dyn TokenizerBackend,
) -> Result<Option<PathBuf>, ParityError> {
    let Some(set) = model.chat_scenarios else {
        return Ok(None);
    };
    let model_dir = config.model_dir(&model.id);
    let config_path = assets
        .get(TOKENIZER_CONFIG_FILE)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| model_dir.join(TOKENIZER_CONFIG_FILE));
    if !config_path.exists() {
        warn!(model = %model.id, "chat scenarios configured but {} is missing", TOKENIZER_CONFIG_FILE);
        return Ok(None);
    }
    let Some(template) = ChatTemplate::load(&config_path, &model.id)? else {
        info!(model = %model.id, "no chat_template; chat fixture skipped");
        return Ok(None);
    };

    let fixture = build_chat_fixture(model, &template, &set.scenarios(), backend)?;
    let path = model_dir.join(CHAT_TEMPLATE_FILE);
    write_chat_fixture(&path, &fixture)?;
    info!(model = %model.id, path = %path.display(), cases = fixture.cases.len(), "chat fixture written");
    Ok(Some(path))
}

/// Compares two snapshot names in each model's existing manifest.
pub fn compare_models(
    config: &ParityConfig,
    models: &[&ModelSpec],
    left: &str,
    right: &str,
) -> BatchReport {
    let mut batch = BatchReport::default();
    for model in models {
        let path = config.manifest_path(&model.id);
        let status = if !path.exists() {
            ModelStatus::Failed {
                kind: "io",
                message: format!("manifest {} does not exist", path.display()),
            }
        } else {
            match ManifestFile::load_or_create(&path, &model.id) {
                Ok(file) => {
                    let report = compare_snapshots(&file.manifest, left, right);
                    if !report.is_clean() {
                        warn!(
                            model = %model.id,
                            mismatched = report.mismatched.len(),
                            "snapshots differ"
                        );
                    }
                    ModelStatus::Compared { path, report }
                }
                Err(err) => ModelStatus::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                },
            }
        };
        batch.models.push(ModelReport {
            model: model.id.clone(),
            backend: model.backend,
            status,
        });
    }
    batch
}
