use serde::{Deserialize, Serialize};

use crate::contract::TruncationWindow;
use crate::error::ParityError;
use crate::hash::{
    canonical_json_bytes, hash_offsets, hash_optional_int32_sequence, hash_string_sequence,
    hash_uint32_sequence, sha256_hex,
};

/// One encode result, normalized across backends.
///
/// Backends that do not produce a field (SentencePiece has no type ids,
/// tiktoken has no offsets) leave it empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSequence {
    pub ids: Vec<u32>,
    pub tokens: Vec<String>,
    pub type_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub special_tokens_mask: Vec<u32>,
    pub offsets: Vec<(i32, i32)>,
    pub word_ids: Vec<Option<i32>>,
    pub sequence_ids: Vec<Option<i32>>,
    pub overflowing: Vec<TokenSequence>,
}

impl TokenSequence {
    /// Plain ids with a full attention mask and no special tokens.
    pub fn from_ids(ids: Vec<u32>, tokens: Vec<String>) -> Self {
        let len = ids.len();
        Self {
            ids,
            tokens,
            type_ids: vec![0; len],
            attention_mask: vec![1; len],
            special_tokens_mask: vec![0; len],
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Copy of `from..to` without overflow segments.
    pub fn slice(&self, from: usize, to: usize) -> TokenSequence {
        fn part<T: Clone>(values: &[T], from: usize, to: usize) -> Vec<T> {
            values.get(from..to.min(values.len())).map(<[T]>::to_vec).unwrap_or_default()
        }
        TokenSequence {
            ids: part(&self.ids, from, to),
            tokens: part(&self.tokens, from, to),
            type_ids: part(&self.type_ids, from, to),
            attention_mask: part(&self.attention_mask, from, to),
            special_tokens_mask: part(&self.special_tokens_mask, from, to),
            offsets: part(&self.offsets, from, to),
            word_ids: part(&self.word_ids, from, to),
            sequence_ids: part(&self.sequence_ids, from, to),
            overflowing: Vec::new(),
        }
    }

    /// Keeps the first `max_length` tokens and moves the rest into
    /// overflow windows that start `max_length - stride` tokens apart.
    ///
    /// For libraries without native truncation. Windows are assumed
    /// validated (`stride < max_length`).
    pub fn into_windows(self, window: TruncationWindow) -> TokenSequence {
        if self.len() <= window.max_length {
            return self;
        }
        let step = window.max_length.saturating_sub(window.stride).max(1);
        let mut head = self.slice(0, window.max_length);
        let mut start = step;
        while start < self.len() {
            let end = (start + window.max_length).min(self.len());
            head.overflowing.push(self.slice(start, end));
            if end == self.len() {
                break;
            }
            start += step;
        }
        head
    }

    /// Negative indices would collide with the absent-value sentinel.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(bad) = self.word_ids.iter().flatten().find(|v| **v < 0) {
            return Err(format!("negative word id {}", bad));
        }
        if let Some(bad) = self.sequence_ids.iter().flatten().find(|v| **v < 0) {
            return Err(format!("negative sequence id {}", bad));
        }
        for nested in &self.overflowing {
            nested.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingSummary {
    pub length: usize,
    pub ids_hash: String,
    pub tokens_hash: String,
    pub type_ids_hash: String,
    pub attention_mask_hash: String,
    pub special_tokens_mask_hash: String,
    pub offsets_hash: String,
    pub word_ids_hash: String,
    pub sequence_ids_hash: String,
    pub overflowing: Vec<EncodingSummary>,
}

impl EncodingSummary {
    pub fn from_sequence(sequence: &TokenSequence) -> Self {
        Self {
            length: sequence.ids.len(),
            ids_hash: hash_uint32_sequence(&sequence.ids),
            tokens_hash: hash_string_sequence(&sequence.tokens),
            type_ids_hash: hash_uint32_sequence(&sequence.type_ids),
            attention_mask_hash: hash_uint32_sequence(&sequence.attention_mask),
            special_tokens_mask_hash: hash_uint32_sequence(&sequence.special_tokens_mask),
            offsets_hash: hash_offsets(&sequence.offsets),
            word_ids_hash: hash_optional_int32_sequence(&sequence.word_ids),
            sequence_ids_hash: hash_optional_int32_sequence(&sequence.sequence_ids),
            overflowing: sequence
                .overflowing
                .iter()
                .map(EncodingSummary::from_sequence)
                .collect(),
        }
    }

    /// Digest of the whole summary, overflow segments included.
    pub fn fingerprint(&self) -> Result<String, ParityError> {
        let value = serde_json::to_value(self)
            .map_err(|err| ParityError::Json(format!("encode summary: {}", err)))?;
        Ok(sha256_hex(&canonical_json_bytes(&value)?))
    }
}
