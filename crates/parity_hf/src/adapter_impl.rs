//! `TokenizerBackend` over `tokenizers::Tokenizer`.
//!
//! Encodes with character offsets, matching what the Python bindings report.

use std::path::Path;
use std::str::FromStr;

use parity_core::backend::{BackendDescriptor, BackendError, BackendKind, TokenizerBackend};
use parity_core::contract::{CaseOptions, TruncationWindow};
use parity_core::summary::TokenSequence;
use tokenizers::utils::truncation::{TruncationDirection, TruncationParams, TruncationStrategy};
use tokenizers::{EncodeInput, Encoding, Tokenizer};
use tracing::debug;

use crate::backend::HF_LIBRARY_NAME;

pub struct HuggingFaceBackend {
    inner: Tokenizer,
}

impl std::fmt::Debug for HuggingFaceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceBackend")
            .field("vocab_size", &self.inner.get_vocab_size(true))
            .finish()
    }
}

impl HuggingFaceBackend {
    pub fn from_file(path: &Path) -> Result<Self, BackendError> {
        let inner = Tokenizer::from_file(path).map_err(|e| BackendError::new(e.to_string()))?;
        Self::from_tokenizer(inner)
    }

    pub fn from_json(json: &str) -> Result<Self, BackendError> {
        let inner = Tokenizer::from_str(json).map_err(|e| BackendError::new(e.to_string()))?;
        Self::from_tokenizer(inner)
    }

    /// Padding and truncation stored in `tokenizer.json` are switched off;
    /// only case options may turn truncation back on.
    pub fn from_tokenizer(mut inner: Tokenizer) -> Result<Self, BackendError> {
        inner.with_padding(None);
        inner
            .with_truncation(None)
            .map_err(|e| BackendError::new(e.to_string()))?;
        debug!(vocab_size = inner.get_vocab_size(true), "hf tokenizer loaded");
        Ok(Self { inner })
    }

    pub fn truncation(&self) -> Option<&TruncationParams> {
        self.inner.get_truncation()
    }
}

fn encode_input<'s>(text: &'s str, pair: Option<&'s str>) -> EncodeInput<'s> {
    match pair {
        Some(pair) => EncodeInput::Dual(text.into(), pair.into()),
        None => EncodeInput::Single(text.into()),
    }
}

fn to_sequence(encoding: &Encoding) -> Result<TokenSequence, BackendError> {
    let offsets = encoding
        .get_offsets()
        .iter()
        .map(|(start, end)| Ok((to_i32(*start, "offset")?, to_i32(*end, "offset")?)))
        .collect::<Result<Vec<_>, BackendError>>()?;
    let word_ids = encoding
        .get_word_ids()
        .iter()
        .map(|id| id.map(|v| to_i32(v as usize, "word id")).transpose())
        .collect::<Result<Vec<_>, BackendError>>()?;
    let sequence_ids = encoding
        .get_sequence_ids()
        .into_iter()
        .map(|id| id.map(|v| to_i32(v, "sequence id")).transpose())
        .collect::<Result<Vec<_>, BackendError>>()?;
    let overflowing = encoding
        .get_overflowing()
        .iter()
        .map(to_sequence)
        .collect::<Result<Vec<_>, BackendError>>()?;

    Ok(TokenSequence {
        ids: encoding.get_ids().to_vec(),
        tokens: encoding.get_tokens().to_vec(),
        type_ids: encoding.get_type_ids().to_vec(),
        attention_mask: encoding.get_attention_mask().to_vec(),
        special_tokens_mask: encoding.get_special_tokens_mask().to_vec(),
        offsets,
        word_ids,
        sequence_ids,
        overflowing,
    })
}

fn to_i32(value: usize, what: &str) -> Result<i32, BackendError> {
    i32::try_from(value)
        .map_err(|_| BackendError::new(format!("{} {} does not fit in i32", what, value)))
}

impl TokenizerBackend for HuggingFaceBackend {
    fn describe(&self) -> BackendDescriptor {
        BackendDescriptor {
            kind: BackendKind::HuggingFace,
            library: HF_LIBRARY_NAME.to_string(),
            // The crate exposes no runtime version string.
            library_version: None,
        }
    }

    fn set_truncation(&mut self, window: Option<TruncationWindow>) -> Result<(), BackendError> {
        let params = window.map(|w| TruncationParams {
            direction: TruncationDirection::Right,
            max_length: w.max_length,
            strategy: TruncationStrategy::LongestFirst,
            stride: w.stride,
        });
        self.inner
            .with_truncation(params)
            .map_err(|e| BackendError::new(e.to_string()))?;
        Ok(())
    }

    fn encode(
        &self,
        text: &str,
        pair: Option<&str>,
        options: &CaseOptions,
    ) -> Result<TokenSequence, BackendError> {
        let encoding = self
            .inner
            .encode_char_offsets(encode_input(text, pair), options.add_special_tokens)
            .map_err(|e| BackendError::new(e.to_string()))?;
        to_sequence(&encoding)
    }

    fn encode_batch(
        &self,
        inputs: &[(&str, Option<&str>)],
        options: &CaseOptions,
    ) -> Result<Vec<TokenSequence>, BackendError> {
        let batch: Vec<EncodeInput> = inputs
            .iter()
            .map(|(text, pair)| encode_input(text, *pair))
            .collect();
        let encodings = self
            .inner
            .encode_batch_char_offsets(batch, options.add_special_tokens)
            .map_err(|e| BackendError::new(e.to_string()))?;
        encodings.iter().map(to_sequence).collect()
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String, BackendError> {
        self.inner
            .decode(ids, skip_special_tokens)
            .map_err(|e| BackendError::new(e.to_string()))
    }

    fn decode_batch(
        &self,
        batch: &[&[u32]],
        skip_special_tokens: bool,
    ) -> Result<Vec<String>, BackendError> {
        self.inner
            .decode_batch(batch, skip_special_tokens)
            .map_err(|e| BackendError::new(e.to_string()))
    }
}
