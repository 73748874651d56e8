//! `TokenizerBackend` over `tiktoken_rs::CoreBPE`.
//!
//! Encoding goes through the library; decoding and token pieces come from
//! the rank table kept here, so they need no library support.

use std::collections::{BTreeSet, HashMap};

use parity_core::backend::{BackendDescriptor, BackendError, BackendKind, TokenizerBackend};
use parity_core::contract::{CaseOptions, TruncationWindow};
use parity_core::summary::TokenSequence;
use tiktoken_rs::CoreBPE;
use tracing::debug;

use crate::backend::{EncodingDefinition, TIKTOKEN_LIBRARY_NAME};

pub struct TiktokenBackend {
    encoding: String,
    bpe: CoreBPE,
    decoder: HashMap<u32, Vec<u8>>,
    special_ids: BTreeSet<u32>,
    truncation: Option<TruncationWindow>,
}

impl std::fmt::Debug for TiktokenBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenBackend")
            .field("encoding", &self.encoding)
            .field("vocab_size", &self.decoder.len())
            .finish()
    }
}

impl TiktokenBackend {
    /// Fails when the definition has no special-token table.
    pub fn new(
        definition: &EncodingDefinition,
        ranks: Vec<(Vec<u8>, u32)>,
    ) -> Result<Self, BackendError> {
        let special = definition.special_tokens.as_ref().ok_or_else(|| {
            BackendError::new(format!(
                "encoding '{}' has no specialTokens table",
                definition.encoding
            ))
        })?;

        let encoder = ranks
            .iter()
            .map(|(bytes, rank)| {
                (*rank)
                    .try_into()
                    .map(|rank| (bytes.clone(), rank))
                    .map_err(|_| BackendError::new(format!("rank {} out of range", rank)))
            })
            .collect::<Result<_, BackendError>>()?;
        let special_encoder = special
            .iter()
            .map(|(token, id)| {
                (*id)
                    .try_into()
                    .map(|id| (token.clone(), id))
                    .map_err(|_| BackendError::new(format!("special id {} out of range", id)))
            })
            .collect::<Result<_, BackendError>>()?;
        let bpe = CoreBPE::new(encoder, special_encoder, &definition.pattern)
            .map_err(|e| BackendError::new(format!("build encoding: {}", e)))?;

        let mut decoder: HashMap<u32, Vec<u8>> = ranks
            .into_iter()
            .map(|(bytes, rank)| (rank, bytes))
            .collect();
        for (token, id) in special {
            decoder.insert(*id, token.as_bytes().to_vec());
        }
        debug!(
            encoding = %definition.encoding,
            vocab_size = decoder.len(),
            special = special.len(),
            "tiktoken encoding built"
        );
        Ok(Self {
            encoding: definition.encoding.clone(),
            bpe,
            decoder,
            special_ids: special.values().copied().collect(),
            truncation: None,
        })
    }

    pub fn encoding_name(&self) -> &str {
        &self.encoding
    }

    fn bytes_of(&self, id: u32) -> Result<&[u8], BackendError> {
        self.decoder
            .get(&id)
            .map(Vec::as_slice)
            .ok_or_else(|| BackendError::new(format!("unknown token id {}", id)))
    }

    /// Special-token text is encoded as ordinary text.
    fn encode_ordinary(&self, text: &str, type_id: u32) -> Result<TokenSequence, BackendError> {
        let ids = self
            .bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|id| {
                id.try_into()
                    .map_err(|_| BackendError::new("token id exceeds u32"))
            })
            .collect::<Result<Vec<u32>, BackendError>>()?;
        let tokens = ids
            .iter()
            .map(|id| Ok(String::from_utf8_lossy(self.bytes_of(*id)?).into_owned()))
            .collect::<Result<Vec<_>, BackendError>>()?;
        let mut sequence = TokenSequence::from_ids(ids, tokens);
        sequence.type_ids.iter_mut().for_each(|t| *t = type_id);
        Ok(sequence)
    }
}

impl TokenizerBackend for TiktokenBackend {
    fn describe(&self) -> BackendDescriptor {
        BackendDescriptor {
            kind: BackendKind::Tiktoken,
            library: TIKTOKEN_LIBRARY_NAME.to_string(),
            library_version: None,
        }
    }

    fn set_truncation(&mut self, window: Option<TruncationWindow>) -> Result<(), BackendError> {
        self.truncation = window;
        Ok(())
    }

    /// tiktoken adds no special tokens of its own.
    fn encode(
        &self,
        text: &str,
        pair: Option<&str>,
        _options: &CaseOptions,
    ) -> Result<TokenSequence, BackendError> {
        let mut sequence = self.encode_ordinary(text, 0)?;
        if let Some(pair) = pair {
            let second = self.encode_ordinary(pair, 1)?;
            sequence.ids.extend(second.ids);
            sequence.tokens.extend(second.tokens);
            sequence.type_ids.extend(second.type_ids);
            sequence.attention_mask.extend(second.attention_mask);
            sequence.special_tokens_mask.extend(second.special_tokens_mask);
        }
        Ok(match self.truncation {
            Some(window) => sequence.into_windows(window),
            None => sequence,
        })
    }

    /// Invalid UTF-8 is replaced, as the Python bindings do.
    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String, BackendError> {
        let mut bytes = Vec::new();
        for id in ids {
            if skip_special_tokens && self.special_ids.contains(id) {
                continue;
            }
            bytes.extend_from_slice(self.bytes_of(*id)?);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
