#![allow(dead_code)]

use std::cell::RefCell;

use parity_core::backend::{BackendDescriptor, BackendError, BackendKind, TokenizerBackend};
use parity_core::contract::{CaseOptions, TruncationWindow};
use parity_core::hash::{hash_string, hash_string_sequence};
use parity_core::summary::TokenSequence;
use serde_json::{json, Value};

pub const CLS: &str = "[CLS]";

/// Whitespace tokenizer with a vocabulary grown on demand.
///
/// Records the truncation window in force at every encode call so tests can
/// check that case options never leak.
#[derive(Debug, Default)]
pub struct FakeBackend {
    pub truncation: Option<TruncationWindow>,
    pub encode_log: RefCell<Vec<(String, Option<TruncationWindow>)>>,
    pub fail_on_text: Option<String>,
    pub fail_clear_truncation: bool,
    pub version: Option<String>,
    vocab: RefCell<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        backend.vocab.borrow_mut().push(CLS.to_string());
        backend
    }

    pub fn failing_on(text: &str) -> Self {
        Self {
            fail_on_text: Some(text.to_string()),
            ..Self::new()
        }
    }

    fn id_for(&self, word: &str) -> u32 {
        let mut vocab = self.vocab.borrow_mut();
        if let Some(pos) = vocab.iter().position(|w| w == word) {
            return pos as u32;
        }
        vocab.push(word.to_string());
        (vocab.len() - 1) as u32
    }

    fn encode_segment(&self, text: &str, sequence_id: i32, base_word: i32, out: &mut TokenSequence) {
        let mut word_idx = base_word;
        let mut start = None;
        let bytes: Vec<(usize, char)> = text.char_indices().collect();
        for (pos, (offset, ch)) in bytes.iter().enumerate() {
            let boundary = ch.is_whitespace();
            if !boundary && start.is_none() {
                start = Some(*offset);
            }
            let last = pos + 1 == bytes.len();
            if let Some(begin) = start {
                if boundary || last {
                    let end = if boundary { *offset } else { offset + ch.len_utf8() };
                    let word = &text[begin..end];
                    out.ids.push(self.id_for(word));
                    out.tokens.push(word.to_string());
                    out.type_ids.push(sequence_id as u32);
                    out.attention_mask.push(1);
                    out.special_tokens_mask.push(0);
                    out.offsets.push((begin as i32, end as i32));
                    out.word_ids.push(Some(word_idx));
                    out.sequence_ids.push(Some(sequence_id));
                    word_idx += 1;
                    start = None;
                }
            }
        }
    }
}

impl TokenizerBackend for FakeBackend {
    fn describe(&self) -> BackendDescriptor {
        BackendDescriptor {
            kind: BackendKind::HuggingFace,
            library: "faketok".to_string(),
            library_version: self.version.clone(),
        }
    }

    fn set_truncation(&mut self, window: Option<TruncationWindow>) -> Result<(), BackendError> {
        if window.is_none() && self.fail_clear_truncation {
            return Err(BackendError::new("cannot clear truncation"));
        }
        self.truncation = window;
        Ok(())
    }

    fn encode(
        &self,
        text: &str,
        pair: Option<&str>,
        options: &CaseOptions,
    ) -> Result<TokenSequence, BackendError> {
        self.encode_log
            .borrow_mut()
            .push((text.to_string(), self.truncation));
        if self.fail_on_text.as_deref() == Some(text) {
            return Err(BackendError::new(format!("refusing to encode '{}'", text)));
        }

        let mut seq = TokenSequence::default();
        if options.add_special_tokens {
            seq.ids.push(0);
            seq.tokens.push(CLS.to_string());
            seq.type_ids.push(0);
            seq.attention_mask.push(1);
            seq.special_tokens_mask.push(1);
            seq.offsets.push((0, 0));
            seq.word_ids.push(None);
            seq.sequence_ids.push(None);
        }
        self.encode_segment(text, 0, 0, &mut seq);
        if let Some(pair) = pair {
            self.encode_segment(pair, 1, 0, &mut seq);
        }

        if let Some(window) = self.truncation {
            seq = seq.into_windows(window);
        }
        Ok(seq)
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String, BackendError> {
        let vocab = self.vocab.borrow();
        let mut words = Vec::new();
        for id in ids {
            let word = vocab
                .get(*id as usize)
                .ok_or_else(|| BackendError::new(format!("unknown id {}", id)))?;
            if skip_special_tokens && word == CLS {
                continue;
            }
            words.push(word.as_str());
        }
        Ok(words.join(" "))
    }
}

pub fn case_json(id: &str, text: &str) -> Value {
    json!({
        "id": id,
        "length": "short",
        "description": format!("case {}", id),
        "single": {"text": text, "textHash": hash_string(text)},
        "batch": {"count": 2}
    })
}

pub fn case_with_targets(id: &str, text: &str, targets: &[&str]) -> Value {
    let mut case = case_json(id, text);
    case["targets"] = json!(targets);
    case
}

pub fn batch_hash(texts: &[&str]) -> String {
    hash_string_sequence(texts)
}

pub fn contract_bytes(cases: Vec<Value>) -> Vec<u8> {
    serde_json::to_vec_pretty(&json!({ "cases": cases })).expect("serialize contract")
}
