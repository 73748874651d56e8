//! `TokenizerBackend` over `sentencepiece::SentencePieceProcessor`.

use std::path::Path;

use parity_core::backend::{BackendDescriptor, BackendError, BackendKind, TokenizerBackend};
use parity_core::contract::{CaseOptions, TruncationWindow};
use parity_core::hash::hash_string;
use parity_core::manifest::{DECODED_IDS_HASH, DECODED_PIECES_HASH};
use parity_core::summary::TokenSequence;
use sentencepiece::SentencePieceProcessor;
use tracing::debug;

use crate::backend::SPM_LIBRARY_NAME;

pub struct SentencePieceBackend {
    inner: SentencePieceProcessor,
    model_file: Option<String>,
    truncation: Option<TruncationWindow>,
}

impl std::fmt::Debug for SentencePieceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentencePieceBackend")
            .field("vocab_size", &self.inner.len())
            .field("model_file", &self.model_file)
            .finish()
    }
}

impl SentencePieceBackend {
    pub fn from_file(path: &Path) -> Result<Self, BackendError> {
        let inner =
            SentencePieceProcessor::open(path).map_err(|e| BackendError::new(e.to_string()))?;
        debug!(vocab_size = inner.len(), "sentencepiece model loaded");
        Ok(Self {
            inner,
            model_file: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            truncation: None,
        })
    }

    fn pieces(&self, text: &str) -> Result<Vec<(u32, String)>, BackendError> {
        let pieces = self
            .inner
            .encode(text)
            .map_err(|e| BackendError::new(e.to_string()))?;
        Ok(pieces.into_iter().map(|p| (p.id, p.piece)).collect())
    }
}

/// Lays out pieces the way the Python bindings summarize them: zero type
/// ids, full attention, no special tokens, `(0, 0)` offsets and no word ids.
///
/// `sequence_id` is 0 for the first text and 1 for a pair.
pub fn pieces_to_sequence(pieces: Vec<(u32, String)>, sequence_id: i32) -> TokenSequence {
    let len = pieces.len();
    let (ids, tokens) = pieces.into_iter().unzip();
    TokenSequence {
        ids,
        tokens,
        type_ids: vec![sequence_id as u32; len],
        attention_mask: vec![1; len],
        special_tokens_mask: vec![0; len],
        offsets: vec![(0, 0); len],
        word_ids: vec![None; len],
        sequence_ids: vec![Some(sequence_id); len],
        overflowing: Vec::new(),
    }
}

fn append(into: &mut TokenSequence, from: TokenSequence) {
    into.ids.extend(from.ids);
    into.tokens.extend(from.tokens);
    into.type_ids.extend(from.type_ids);
    into.attention_mask.extend(from.attention_mask);
    into.special_tokens_mask.extend(from.special_tokens_mask);
    into.offsets.extend(from.offsets);
    into.word_ids.extend(from.word_ids);
    into.sequence_ids.extend(from.sequence_ids);
}

impl TokenizerBackend for SentencePieceBackend {
    fn describe(&self) -> BackendDescriptor {
        BackendDescriptor {
            kind: BackendKind::SentencePiece,
            library: SPM_LIBRARY_NAME.to_string(),
            library_version: None,
        }
    }

    fn model_file(&self) -> Option<String> {
        self.model_file.clone()
    }

    fn set_truncation(&mut self, window: Option<TruncationWindow>) -> Result<(), BackendError> {
        self.truncation = window;
        Ok(())
    }

    /// Special tokens are never added; SentencePiece control pieces come
    /// only from the model's own normalization.
    fn encode(
        &self,
        text: &str,
        pair: Option<&str>,
        _options: &CaseOptions,
    ) -> Result<TokenSequence, BackendError> {
        let mut sequence = pieces_to_sequence(self.pieces(text)?, 0);
        if let Some(pair) = pair {
            append(&mut sequence, pieces_to_sequence(self.pieces(pair)?, 1));
        }
        Ok(match self.truncation {
            Some(window) => sequence.into_windows(window),
            None => sequence,
        })
    }

    /// Control pieces are dropped by the library whatever the flag says.
    fn decode(&self, ids: &[u32], _skip_special_tokens: bool) -> Result<String, BackendError> {
        self.inner
            .decode_piece_ids(ids)
            .map_err(|e| BackendError::new(e.to_string()))
    }

    fn extra_fingerprints(
        &self,
        sequence: &TokenSequence,
        decoded: &str,
    ) -> Result<Vec<(&'static str, String)>, BackendError> {
        let from_pieces = self
            .inner
            .decode_pieces(sequence.tokens.as_slice())
            .map_err(|e| BackendError::new(e.to_string()))?;
        Ok(vec![
            (DECODED_IDS_HASH, hash_string(decoded)),
            (DECODED_PIECES_HASH, hash_string(&from_pieces)),
        ])
    }
}
