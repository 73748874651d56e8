//! Backend adapter seam.
//!
//! Each tokenizer library is wrapped once behind [`TokenizerBackend`]; the
//! contract, runner, manifest and fixture code never branch on the library.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contract::{CaseOptions, TruncationWindow};
use crate::summary::{EncodingSummary, TokenSequence};

pub const UNKNOWN_VERSION: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    HuggingFace,
    SentencePiece,
    Tiktoken,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [
        BackendKind::HuggingFace,
        BackendKind::SentencePiece,
        BackendKind::Tiktoken,
    ];

    /// Identifier used in contract `targets`.
    pub fn target_id(self) -> &'static str {
        match self {
            BackendKind::HuggingFace => "huggingface",
            BackendKind::SentencePiece => "sentencepiece",
            BackendKind::Tiktoken => "tiktoken",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target_id())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.target_id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown backend '{}' (expected one of: huggingface, sentencepiece, tiktoken)",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    /// Library name, e.g. `tokenizers`; fixture metadata keys its version by it.
    pub library: String,
    pub library_version: Option<String>,
}

impl BackendDescriptor {
    pub fn version_label(&self) -> &str {
        self.library_version.as_deref().unwrap_or(UNKNOWN_VERSION)
    }

    pub fn version_key(&self) -> String {
        format!("{}_version", self.library)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        BackendError(message.into())
    }
}

/// One tokenizer library behind a uniform encode/decode surface.
///
/// Truncation is stateful because that is how the libraries expose it; the
/// runner sets it before a case and clears it afterwards.
pub trait TokenizerBackend {
    fn describe(&self) -> BackendDescriptor;

    /// Model file the backend was opened from, when the manifest should record it.
    fn model_file(&self) -> Option<String> {
        None
    }

    fn set_truncation(&mut self, window: Option<TruncationWindow>) -> Result<(), BackendError>;

    fn encode(
        &self,
        text: &str,
        pair: Option<&str>,
        options: &CaseOptions,
    ) -> Result<TokenSequence, BackendError>;

    /// Default: encodes each input in order.
    fn encode_batch(
        &self,
        inputs: &[(&str, Option<&str>)],
        options: &CaseOptions,
    ) -> Result<Vec<TokenSequence>, BackendError> {
        inputs
            .iter()
            .map(|(text, pair)| self.encode(text, *pair, options))
            .collect()
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String, BackendError>;

    /// Default: decodes each sequence in order.
    fn decode_batch(
        &self,
        batch: &[&[u32]],
        skip_special_tokens: bool,
    ) -> Result<Vec<String>, BackendError> {
        batch
            .iter()
            .map(|ids| self.decode(ids, skip_special_tokens))
            .collect()
    }

    fn summarize(&self, sequence: &TokenSequence) -> Result<EncodingSummary, BackendError> {
        sequence.validate().map_err(BackendError)?;
        Ok(EncodingSummary::from_sequence(sequence))
    }

    /// Additional named fingerprints for the single-input encode.
    ///
    /// `decoded` is the result of decoding `sequence.ids`. Default: none.
    fn extra_fingerprints(
        &self,
        _sequence: &TokenSequence,
        _decoded: &str,
    ) -> Result<Vec<(&'static str, String)>, BackendError> {
        Ok(Vec::new())
    }
}
