//! Encoding files for the tiktoken backend.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parity_core::assets::ResolvedAssets;
use parity_core::backend::BackendError;
use parity_core::config::ModelSpec;
use parity_core::ParityError;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::adapter_impl::TiktokenBackend;

/// Library name; fixture metadata records `tiktoken_version`.
pub const TIKTOKEN_LIBRARY_NAME: &str = "tiktoken";

/// One `<base64 token> <rank>` pair per line.
pub const MERGEABLE_RANKS_FILE: &str = "mergeable_ranks.tiktoken";

/// Encoding parameters stored at the top level of a model's manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingDefinition {
    pub encoding: String,
    pub pattern: String,
    /// Absent means the table was never recorded, not that it is empty.
    #[serde(default)]
    pub special_tokens: Option<BTreeMap<String, u32>>,
}

impl EncodingDefinition {
    pub fn load(path: &Path) -> Result<Self, BackendError> {
        let bytes = fs::read(path)
            .map_err(|e| BackendError::new(format!("read {}: {}", path.display(), e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| BackendError::new(format!("parse {}: {}", path.display(), e)))
    }
}

pub fn parse_mergeable_ranks(raw: &str) -> Result<Vec<(Vec<u8>, u32)>, BackendError> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let mut parts = line.split_whitespace();
            let (Some(token), Some(rank), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(BackendError::new(format!(
                    "line {}: expected '<base64> <rank>'",
                    idx + 1
                )));
            };
            let bytes = STANDARD
                .decode(token)
                .map_err(|e| BackendError::new(format!("line {}: {}", idx + 1, e)))?;
            let rank = rank
                .parse::<u32>()
                .map_err(|e| BackendError::new(format!("line {}: rank: {}", idx + 1, e)))?;
            Ok((bytes, rank))
        })
        .collect()
}

fn asset_path(assets: &ResolvedAssets, name: &str) -> PathBuf {
    assets
        .get(name)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| assets.model_dir.join(name))
}

/// Opens the encoding described by `definition_file` in the model directory.
///
/// A definition without `specialTokens` is refused: special-token ids are
/// never guessed.
pub fn open_from_assets(
    model: &ModelSpec,
    assets: &ResolvedAssets,
    definition_file: &str,
) -> Result<TiktokenBackend, ParityError> {
    let unavailable = |reason: String| ParityError::BackendUnavailable {
        backend: model.backend.to_string(),
        reason,
    };

    let ranks_path = asset_path(assets, MERGEABLE_RANKS_FILE);
    if !ranks_path.is_file() {
        return Err(ParityError::AssetMissing {
            model: model.id.clone(),
            file: MERGEABLE_RANKS_FILE.to_string(),
            searched: assets.model_dir.clone(),
            hint: format!("export the ranks of the encoding behind {}", model.repo_id()),
        });
    }
    let definition_path = asset_path(assets, definition_file);
    let definition = EncodingDefinition::load(&definition_path).map_err(|e| unavailable(e.0))?;
    if definition.special_tokens.is_none() {
        warn!(
            model = %model.id,
            encoding = %definition.encoding,
            "no specialTokens recorded; refusing to rebuild the encoding"
        );
        return Err(unavailable(format!(
            "{} does not record specialTokens for encoding '{}'",
            definition_path.display(),
            definition.encoding
        )));
    }

    let raw = fs::read_to_string(&ranks_path)
        .map_err(|e| ParityError::Io(format!("read {}: {}", ranks_path.display(), e)))?;
    let ranks = parse_mergeable_ranks(&raw)
        .map_err(|e| unavailable(format!("{}: {}", ranks_path.display(), e)))?;
    debug!(model = %model.id, encoding = %definition.encoding, ranks = ranks.len(), "tiktoken ranks loaded");
    TiktokenBackend::new(&definition, ranks).map_err(|e| unavailable(e.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_parse_base64_and_rank() {
        let ranks = parse_mergeable_ranks("aGk= 0\nIQ== 1\n\n").unwrap();
        assert_eq!(ranks, vec![(b"hi".to_vec(), 0), (b"!".to_vec(), 1)]);
    }

    #[test]
    fn malformed_rank_lines_are_rejected() {
        assert!(parse_mergeable_ranks("aGk=").is_err());
        assert!(parse_mergeable_ranks("aGk= x").is_err());
        assert!(parse_mergeable_ranks("!!! 0").is_err());
        assert!(parse_mergeable_ranks("aGk= 0 extra").is_err());
    }

    #[test]
    fn definition_distinguishes_missing_and_empty_special_tokens() {
        let missing: EncodingDefinition =
            serde_json::from_str(r#"{"encoding": "e", "pattern": "p"}"#).unwrap();
        assert!(missing.special_tokens.is_none());
        let empty: EncodingDefinition =
            serde_json::from_str(r#"{"encoding": "e", "pattern": "p", "specialTokens": {}}"#)
                .unwrap();
        assert_eq!(empty.special_tokens, Some(BTreeMap::new()));
    }
}
