use serde::Serialize;

use crate::contract::{CaseOptions, TokenizationCase};

/// Backend-facing inputs for one contract case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializedCase {
    pub id: String,
    pub length: String,
    pub description: String,
    pub options: CaseOptions,
    pub single: SingleRequest,
    pub batch: BatchRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingleRequest {
    pub text: String,
    pub pair_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRequest {
    pub texts: Vec<String>,
    pub pair_texts: Option<Vec<String>>,
}

impl BatchRequest {
    pub fn count(&self) -> usize {
        self.texts.len()
    }

    /// `(text, pair)` inputs in batch order.
    pub fn inputs(&self) -> Vec<(&str, Option<&str>)> {
        self.texts
            .iter()
            .enumerate()
            .map(|(idx, text)| {
                let pair = self
                    .pair_texts
                    .as_ref()
                    .and_then(|pairs| pairs.get(idx))
                    .map(String::as_str);
                (text.as_str(), pair)
            })
            .collect()
    }
}

pub fn synthetic_batch_text(base: &str, index: usize) -> String {
    format!("{} [sample:{:02}]", base, index)
}

/// Explicit batch texts, or `count` synthetic variants of the single text.
pub fn batch_texts(case: &TokenizationCase) -> Vec<String> {
    match &case.batch.texts {
        Some(texts) => texts.clone(),
        None => (0..case.batch.count)
            .map(|idx| synthetic_batch_text(&case.single.text, idx))
            .collect(),
    }
}

pub fn materialize(case: &TokenizationCase) -> MaterializedCase {
    MaterializedCase {
        id: case.id.clone(),
        length: case.length.clone(),
        description: case.description.clone(),
        options: case.options.clone(),
        single: SingleRequest {
            text: case.single.text.clone(),
            pair_text: case.single.pair_text.clone(),
        },
        batch: BatchRequest {
            texts: batch_texts(case),
            pair_texts: case.batch.pair_texts.clone(),
        },
    }
}

pub fn materialize_all(cases: &[TokenizationCase]) -> Vec<MaterializedCase> {
    cases.iter().map(materialize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_index_is_zero_padded() {
        assert_eq!(synthetic_batch_text("hi", 3), "hi [sample:03]");
        assert_eq!(synthetic_batch_text("hi", 12), "hi [sample:12]");
    }
}
