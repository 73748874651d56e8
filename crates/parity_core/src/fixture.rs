//! Benchmark fixture documents.
//!
//! Regenerated in full on every run. Field order comes from the struct
//! layout and the output is pretty JSON with a trailing newline, so equal
//! inputs produce equal bytes.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assets::ResolvedAssets;
use crate::backend::BackendDescriptor;
use crate::config::ModelSpec;
use crate::contract::CaseOptions;
use crate::error::ParityError;
use crate::files::write_file;
use crate::runner::CaseOutcome;
use crate::summary::EncodingSummary;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkFixture {
    pub metadata: FixtureMetadata,
    pub cases: Vec<FixtureCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureMetadata {
    pub model: String,
    pub display_name: String,
    pub repo_id: String,
    pub generated_at: String,
    /// `<library>_version` entries.
    #[serde(flatten)]
    pub versions: BTreeMap<String, String>,
    pub assets: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureCase {
    pub contract_id: String,
    pub length: String,
    pub description: String,
    pub options: CaseOptions,
    pub single: FixtureSingle,
    pub batch: FixtureBatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureSingle {
    pub text: String,
    pub text_hash: String,
    pub encoding: EncodingSummary,
    pub decoded_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_text_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureBatch {
    pub count: usize,
    pub texts: Vec<String>,
    pub texts_hash: String,
    pub encodings: Vec<EncodingSummary>,
    pub decoded_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_texts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_texts_hash: Option<String>,
}

impl From<&CaseOutcome> for FixtureCase {
    fn from(outcome: &CaseOutcome) -> Self {
        FixtureCase {
            contract_id: outcome.id.clone(),
            length: outcome.length.clone(),
            description: outcome.description.clone(),
            options: outcome.options.clone(),
            single: FixtureSingle {
                text: outcome.single.text.clone(),
                text_hash: outcome.single.text_hash.clone(),
                encoding: outcome.single.encoding.clone(),
                decoded_hash: outcome.single.decoded_hash.clone(),
                pair_text: outcome.single.pair_text.clone(),
                pair_text_hash: outcome.single.pair_text_hash.clone(),
            },
            batch: FixtureBatch {
                count: outcome.batch.texts.len(),
                texts: outcome.batch.texts.clone(),
                texts_hash: outcome.batch.texts_hash.clone(),
                encodings: outcome.batch.encodings.clone(),
                decoded_hash: outcome.batch.decoded_hash.clone(),
                pair_texts: outcome.batch.pair_texts.clone(),
                pair_texts_hash: outcome.batch.pair_texts_hash.clone(),
            },
        }
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn build_fixture(
    model: &ModelSpec,
    backend: &BackendDescriptor,
    assets: &ResolvedAssets,
    fixture_dir: &Path,
    outcomes: &[CaseOutcome],
    generated_at: &str,
) -> BenchmarkFixture {
    let mut versions = BTreeMap::new();
    versions.insert(
        backend.version_key(),
        backend.version_label().to_string(),
    );
    BenchmarkFixture {
        metadata: FixtureMetadata {
            model: model.id.clone(),
            display_name: model.display_name().to_string(),
            repo_id: model.repo_id().to_string(),
            generated_at: generated_at.to_string(),
            versions,
            assets: assets.relative_to(fixture_dir),
        },
        cases: outcomes.iter().map(FixtureCase::from).collect(),
    }
}

pub fn fixture_bytes(fixture: &BenchmarkFixture) -> Result<Vec<u8>, ParityError> {
    let mut bytes = serde_json::to_vec_pretty(fixture)
        .map_err(|e| ParityError::Json(format!("serialize fixture: {}", e)))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Overwrites `path` unconditionally.
pub fn write_fixture(path: &Path, fixture: &BenchmarkFixture) -> Result<(), ParityError> {
    write_file(path, &fixture_bytes(fixture)?, "fixture")
}
