//! Tokenization case contract: typed records, applicability filtering and
//! ingress validation against the codec.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ParityError;
use crate::hash::{canonical_json_bytes, hash_string, hash_string_sequence, sha256_hex};
use crate::materialize::batch_texts;

pub const WILDCARD_TARGET: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TokenizationCase {
    pub id: String,
    pub length: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    #[serde(default)]
    pub options: CaseOptions,
    pub single: SingleInput,
    pub batch: BatchInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CaseOptions {
    #[serde(default)]
    pub add_special_tokens: bool,
    #[serde(default = "default_skip_special")]
    pub decode_skip_special_tokens: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation: Option<TruncationWindow>,
}

impl Default for CaseOptions {
    fn default() -> Self {
        Self {
            add_special_tokens: false,
            decode_skip_special_tokens: default_skip_special(),
            truncation: None,
        }
    }
}

fn default_skip_special() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TruncationWindow {
    pub max_length: usize,
    #[serde(default)]
    pub stride: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SingleInput {
    pub text: String,
    pub text_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_text_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoded_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BatchInput {
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texts_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_texts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_texts_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoded_hash: Option<String>,
}

/// Cases applicable to one target, plus the digest of the whole document.
#[derive(Debug, Clone)]
pub struct LoadedContract {
    pub location: String,
    pub sha256: String,
    pub total_cases: usize,
    pub cases: Vec<TokenizationCase>,
}

impl LoadedContract {
    pub fn case_ids(&self) -> Vec<String> {
        self.cases.iter().map(|case| case.id.clone()).collect()
    }
}

/// Empty targets, a case-insensitive match, or the wildcard.
pub fn applies_to_target(targets: &[String], target: &str) -> bool {
    targets.is_empty()
        || targets
            .iter()
            .any(|t| t == WILDCARD_TARGET || t.eq_ignore_ascii_case(target))
}

pub fn load_contract(path: &Path, target: &str) -> Result<LoadedContract, ParityError> {
    let location = path.display().to_string();
    let bytes = fs::read(path)
        .map_err(|err| ParityError::contract(&location, format!("unreadable: {}", err)))?;
    parse_contract(&bytes, &location, target)
}

pub fn parse_contract(
    bytes: &[u8],
    location: &str,
    target: &str,
) -> Result<LoadedContract, ParityError> {
    if target.trim().is_empty() {
        return Err(ParityError::contract(location, "target identifier is empty"));
    }
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|err| ParityError::contract(location, format!("not valid JSON: {}", err)))?;
    let sha256 = sha256_hex(&canonical_json_bytes(&value)?);

    let entries = value
        .get("cases")
        .and_then(Value::as_array)
        .ok_or_else(|| ParityError::contract(location, "document must contain a 'cases' array"))?;

    let mut seen_ids = BTreeSet::new();
    let mut cases = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        let targets = raw_targets(entry)
            .map_err(|msg| ParityError::contract(location, format!("cases[{}]: {}", idx, msg)))?;
        let applicable = applies_to_target(&targets, target);
        let label = entry
            .get("id")
            .and_then(Value::as_str)
            .map(|id| format!("cases[{}] ('{}')", idx, id))
            .unwrap_or_else(|| format!("cases[{}]", idx));

        let case: TokenizationCase = match serde_json::from_value(entry.clone()) {
            Ok(case) => case,
            Err(err) if applicable => {
                return Err(ParityError::contract(location, format!("{}: {}", label, err)));
            }
            Err(err) => {
                debug!(case = %label, error = %err, "skipping unparsed case for another target");
                continue;
            }
        };

        validate_case(&case).map_err(|msg| {
            ParityError::contract(location, format!("{}: {}", label, msg))
        })?;
        if !seen_ids.insert(case.id.clone()) {
            return Err(ParityError::contract(
                location,
                format!("duplicate case id '{}'", case.id),
            ));
        }
        if applicable {
            cases.push(case);
        }
    }

    if cases.is_empty() {
        return Err(ParityError::contract(
            location,
            format!("no tokenization cases registered for target '{}'", target),
        ));
    }

    debug!(
        contract = location,
        target,
        total = entries.len(),
        applicable = cases.len(),
        "loaded tokenization contract"
    );
    Ok(LoadedContract {
        location: location.to_string(),
        sha256,
        total_cases: entries.len(),
        cases,
    })
}

fn raw_targets(entry: &Value) -> Result<Vec<String>, String> {
    let obj = entry
        .as_object()
        .ok_or_else(|| "case entry is not an object".to_string())?;
    match obj.get("targets") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| "targets must be strings".to_string())
            })
            .collect(),
        Some(_) => Err("targets must be an array".to_string()),
    }
}

/// Cross-checks every author-supplied fingerprint and count.
pub fn validate_case(case: &TokenizationCase) -> Result<(), String> {
    if case.id.trim().is_empty() {
        return Err("case id is empty".to_string());
    }

    check_hash("single.textHash", &case.single.text_hash, &hash_string(&case.single.text))?;
    match (&case.single.pair_text, &case.single.pair_text_hash) {
        (Some(pair), Some(stored)) => {
            check_hash("single.pairTextHash", stored, &hash_string(pair))?;
        }
        (None, Some(_)) => {
            return Err("single.pairTextHash given without single.pairText".to_string());
        }
        _ => {}
    }

    let batch = &case.batch;
    if let Some(texts) = &batch.texts {
        if texts.len() != batch.count {
            return Err(format!(
                "batch.texts has {} entries but batch.count is {}",
                texts.len(),
                batch.count
            ));
        }
    }
    if let Some(stored) = &batch.texts_hash {
        check_hash("batch.textsHash", stored, &hash_string_sequence(&batch_texts(case)))?;
    }
    match (&batch.pair_texts, &batch.pair_texts_hash) {
        (Some(pairs), stored) => {
            if pairs.len() != batch.count {
                return Err(format!(
                    "batch.pairTexts has {} entries but batch.count is {}",
                    pairs.len(),
                    batch.count
                ));
            }
            if let Some(stored) = stored {
                check_hash("batch.pairTextsHash", stored, &hash_string_sequence(pairs))?;
            }
        }
        (None, Some(_)) => {
            return Err("batch.pairTextsHash given without batch.pairTexts".to_string());
        }
        (None, None) => {}
    }

    if let Some(window) = case.options.truncation {
        if window.max_length == 0 {
            return Err("options.truncation.maxLength must be positive".to_string());
        }
        if window.stride >= window.max_length {
            return Err(format!(
                "options.truncation.stride {} must be smaller than maxLength {}",
                window.stride, window.max_length
            ));
        }
    }
    Ok(())
}

/// Stored fingerprints must be the exact lowercase hex digest.
fn check_hash(field: &str, stored: &str, computed: &str) -> Result<(), String> {
    if stored == computed {
        Ok(())
    } else {
        Err(format!("{} mismatch: stored {} but computed {}", field, stored, computed))
    }
}
