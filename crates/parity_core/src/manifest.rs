//! Per-model validation manifest shared by every generator.
//!
//! A generator owns exactly one snapshot name inside each case entry. It
//! rewrites its own fields, leaves every other snapshot untouched, prunes
//! retired case ids, and writes the file only when something changed.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ParityError;
use crate::files::write_file;
use crate::hash::hash_uint32_sequence;
use crate::runner::CaseOutcome;

pub const MANIFEST_VERSION: u32 = 1;

pub const TEXT_HASH: &str = "text-hash";
pub const PAIR_TEXT_HASH: &str = "pair-text-hash";
pub const IDS_HASH: &str = "ids-hash";
pub const PIECES_HASH: &str = "pieces-hash";
/// Token ids as a `u32` sequence.
pub const ENCODING_HASH: &str = "encoding-hash";
/// Digest of the full [`EncodingSummary`](crate::summary::EncodingSummary).
pub const SUMMARY_HASH: &str = "summary-hash";
pub const DECODED_HASH: &str = "decoded-hash";
pub const DECODED_IDS_HASH: &str = "decoded-ids-hash";
pub const DECODED_PIECES_HASH: &str = "decoded-pieces-hash";
pub const BATCH_TEXTS_HASH: &str = "batch-texts-hash";
pub const BATCH_DECODED_HASH: &str = "batch-decoded-hash";

/// Fields this generator writes. Any of them missing from a fresh snapshot
/// is removed from the stored one; other keys are left alone.
pub const OWNED_FIELDS: &[&str] = &[
    TEXT_HASH,
    PAIR_TEXT_HASH,
    IDS_HASH,
    PIECES_HASH,
    ENCODING_HASH,
    SUMMARY_HASH,
    DECODED_HASH,
    DECODED_IDS_HASH,
    DECODED_PIECES_HASH,
    BATCH_TEXTS_HASH,
    BATCH_DECODED_HASH,
];

/// Backend name -> flat map of named fingerprints.
pub type CaseEntry = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationManifest {
    /// Older manifests carry no version; they are read as version 1.
    #[serde(default = "default_version")]
    pub version: u32,
    pub model: String,
    #[serde(rename = "modelFile", default, skip_serializing_if = "Option::is_none")]
    pub model_file: Option<String>,
    #[serde(default)]
    pub cases: BTreeMap<String, CaseEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_version() -> u32 {
    MANIFEST_VERSION
}

impl ValidationManifest {
    pub fn empty(model: &str) -> Self {
        Self {
            version: MANIFEST_VERSION,
            model: model.to_string(),
            model_file: None,
            cases: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    pub fn snapshot(&self, case_id: &str, backend: &str) -> Option<&Map<String, Value>> {
        self.cases.get(case_id)?.get(backend)?.as_object()
    }
}

/// Fingerprints one backend computed for one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseSnapshot {
    pub case_id: String,
    pub text_hash: String,
    /// Ordered `(field, fingerprint)` pairs, `text-hash` first.
    pub fields: Vec<(&'static str, String)>,
}

impl CaseSnapshot {
    pub fn from_outcome(outcome: &CaseOutcome) -> Result<Self, ParityError> {
        let single = &outcome.single;
        let mut fields = vec![(TEXT_HASH, single.text_hash.clone())];
        if let Some(pair_hash) = &single.pair_text_hash {
            fields.push((PAIR_TEXT_HASH, pair_hash.clone()));
        }
        fields.push((IDS_HASH, single.encoding.ids_hash.clone()));
        fields.push((PIECES_HASH, single.encoding.tokens_hash.clone()));
        fields.push((ENCODING_HASH, hash_uint32_sequence(&single.sequence.ids)));
        fields.push((SUMMARY_HASH, single.encoding.fingerprint()?));
        fields.push((DECODED_HASH, single.decoded_hash.clone()));
        for (name, value) in &single.extra {
            fields.push((*name, value.clone()));
        }
        fields.push((BATCH_TEXTS_HASH, outcome.batch.texts_hash.clone()));
        fields.push((BATCH_DECODED_HASH, outcome.batch.decoded_hash.clone()));
        Ok(Self {
            case_id: outcome.id.clone(),
            text_hash: single.text_hash.clone(),
            fields,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub pruned: Vec<String>,
    pub unchanged: usize,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        !(self.created.is_empty() && self.updated.is_empty() && self.pruned.is_empty())
    }
}

/// Merges `snapshots` for `backend` into `manifest`.
///
/// Every snapshot is checked for a changed `text-hash` before anything is
/// mutated, so a corruption error leaves the manifest as loaded.
pub fn reconcile(
    manifest: &mut ValidationManifest,
    path: &Path,
    backend: &str,
    known_backends: &[String],
    snapshots: &[CaseSnapshot],
) -> Result<ReconcileReport, ParityError> {
    for snap in snapshots {
        let stored = manifest
            .snapshot(&snap.case_id, backend)
            .and_then(|fields| fields.get(TEXT_HASH))
            .and_then(Value::as_str);
        if let Some(stored) = stored {
            if stored != snap.text_hash {
                return Err(ParityError::ManifestCorruption {
                    path: path.to_path_buf(),
                    case_id: snap.case_id.clone(),
                    backend: backend.to_string(),
                    expected: stored.to_string(),
                    actual: snap.text_hash.clone(),
                });
            }
        }
    }

    let before = manifest.cases.clone();
    let mut report = ReconcileReport::default();

    for snap in snapshots {
        let entry = manifest
            .cases
            .entry(snap.case_id.clone())
            .or_insert_with(|| placeholder_entry(backend, known_backends));
        let slot = entry
            .entry(backend.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(fields) = slot {
            fields.retain(|name, _| {
                !OWNED_FIELDS.contains(&name.as_str())
                    || snap.fields.iter().any(|(owned, _)| *owned == name.as_str())
            });
            for (name, value) in &snap.fields {
                fields.insert((*name).to_string(), Value::String(value.clone()));
            }
        }
    }

    let active: BTreeSet<&str> = snapshots.iter().map(|s| s.case_id.as_str()).collect();
    manifest.cases.retain(|id, _| {
        let keep = active.contains(id.as_str());
        if !keep {
            report.pruned.push(id.clone());
        }
        keep
    });

    for (id, entry) in &manifest.cases {
        match before.get(id) {
            None => report.created.push(id.clone()),
            Some(prior) if prior != entry => report.updated.push(id.clone()),
            Some(_) => report.unchanged += 1,
        }
    }

    debug!(
        backend,
        created = report.created.len(),
        updated = report.updated.len(),
        pruned = report.pruned.len(),
        "reconciled manifest"
    );
    Ok(report)
}

fn placeholder_entry(backend: &str, known_backends: &[String]) -> CaseEntry {
    let mut entry = Map::new();
    for name in known_backends.iter().map(String::as_str).chain([backend]) {
        if !entry.contains_key(name) {
            entry.insert(name.to_string(), Value::Object(Map::new()));
        }
    }
    entry
}

/// A manifest bound to its file, remembering the state it was loaded in.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
    loaded: Option<ValidationManifest>,
    pub manifest: ValidationManifest,
}

impl ManifestFile {
    pub fn load_or_create(path: &Path, model: &str) -> Result<Self, ParityError> {
        if !path.exists() {
            return Ok(Self {
                path: path.to_path_buf(),
                loaded: None,
                manifest: ValidationManifest::empty(model),
            });
        }
        let bytes = fs::read(path)
            .map_err(|e| ParityError::Io(format!("read manifest {}: {}", path.display(), e)))?;
        let manifest: ValidationManifest =
            serde_json::from_slice(&bytes).map_err(|e| ParityError::ManifestFormat {
                path: path.to_path_buf(),
                message: format!("parse failed: {}", e),
            })?;
        if manifest.version != MANIFEST_VERSION {
            return Err(ParityError::ManifestFormat {
                path: path.to_path_buf(),
                message: format!(
                    "unsupported version {} (expected {})",
                    manifest.version, MANIFEST_VERSION
                ),
            });
        }
        if manifest.model != model {
            return Err(ParityError::ManifestFormat {
                path: path.to_path_buf(),
                message: format!("belongs to model '{}', not '{}'", manifest.model, model),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            loaded: Some(manifest.clone()),
            manifest,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn existed(&self) -> bool {
        self.loaded.is_some()
    }

    /// True when the file is missing or differs from what was loaded.
    pub fn is_dirty(&self) -> bool {
        self.loaded.as_ref() != Some(&self.manifest)
    }

    pub fn set_model_file(&mut self, model_file: Option<String>) {
        if model_file.is_some() {
            self.manifest.model_file = model_file;
        }
    }

    pub fn reconcile(
        &mut self,
        backend: &str,
        known_backends: &[String],
        snapshots: &[CaseSnapshot],
    ) -> Result<ReconcileReport, ParityError> {
        reconcile(
            &mut self.manifest,
            &self.path,
            backend,
            known_backends,
            snapshots,
        )
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ParityError> {
        let mut bytes = serde_json::to_vec_pretty(&self.manifest)
            .map_err(|e| ParityError::Json(format!("serialize manifest: {}", e)))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Writes the manifest when dirty. Returns whether a write happened.
    pub fn write_if_dirty(&mut self) -> Result<bool, ParityError> {
        if !self.is_dirty() {
            return Ok(false);
        }
        write_file(&self.path, &self.to_bytes()?, "manifest")?;
        self.loaded = Some(self.manifest.clone());
        Ok(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMismatch {
    pub case_id: String,
    pub field: String,
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompareReport {
    pub matched: Vec<String>,
    pub mismatched: Vec<FieldMismatch>,
    /// Cases where either side has no comparable fingerprints.
    pub incomplete: Vec<String>,
}

impl CompareReport {
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty()
    }
}

/// Exact comparison of every fingerprint field both snapshots carry.
pub fn compare_snapshots(manifest: &ValidationManifest, left: &str, right: &str) -> CompareReport {
    let mut report = CompareReport::default();
    for case_id in manifest.cases.keys() {
        let (Some(lhs), Some(rhs)) = (
            manifest.snapshot(case_id, left),
            manifest.snapshot(case_id, right),
        ) else {
            report.incomplete.push(case_id.clone());
            continue;
        };

        let mut shared = 0usize;
        let mut clean = true;
        for (field, lvalue) in lhs {
            let (Some(lvalue), Some(rvalue)) =
                (lvalue.as_str(), rhs.get(field).and_then(Value::as_str))
            else {
                continue;
            };
            shared += 1;
            if lvalue != rvalue {
                clean = false;
                report.mismatched.push(FieldMismatch {
                    case_id: case_id.clone(),
                    field: field.clone(),
                    left: lvalue.to_string(),
                    right: rvalue.to_string(),
                });
            }
        }

        if shared == 0 {
            report.incomplete.push(case_id.clone());
        } else if clean {
            report.matched.push(case_id.clone());
        }
    }
    report
}
