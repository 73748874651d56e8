use std::path::PathBuf;

use parity_core::config::{DEFAULT_CONFIG_FILE, DEFAULT_CONTRACT_PATH, DEFAULT_DATA_ROOT};
use parity_core::files::{create_dir_if_absent, write_if_absent};
use parity_core::hash::{hash_string, hash_string_sequence};
use parity_core::materialize::synthetic_batch_text;
use parity_core::ParityError;
use serde_json::json;

const PARITY_TOML_TEMPLATE: &str = r#"[paths]
contract = "tests/_testdata_templates/tokenization-cases.json"
data_root = "tests/_TestData"

[manifest]
file_name = "tokenx-tests-validation.json"
snapshot = "rs"
known_backends = ["py", "tokenx"]

[fixture]
file_name = "rust-benchmark.json"

# [[models]]
# id = "gpt2"
# display_name = "GPT-2"
# repo_id = "gpt2"
# backend = "huggingface"
# required_files = ["tokenizer.json"]
# optional_files = ["vocab.json", "merges.txt", "tokenizer_config.json"]
# chat_scenarios = "standard"
#
# [[models]]
# id = "t5-small"
# backend = "sentencepiece"
# model_file = "spiece.model"
#
# [[models]]
# id = "cl100k_base"
# backend = "tiktoken"
# required_files = ["mergeable_ranks.tiktoken"]
"#;

const DATA_README: &str = "# Tokenizer assets\n\nOne directory per model id. Manifests and fixtures are written next to the assets.\n";

#[derive(Debug, Clone)]
pub struct InitProjectInput {
    pub root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct InitProjectOutput {
    pub root: PathBuf,
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

/// Labels of scaffold entries, split by whether this run created them.
#[derive(Default)]
struct Scaffold {
    created: Vec<String>,
    existing: Vec<String>,
}

impl Scaffold {
    fn record(&mut self, fresh: bool, label: &str) {
        let list = if fresh {
            &mut self.created
        } else {
            &mut self.existing
        };
        list.push(label.to_string());
    }
}

pub fn init_project(input: InitProjectInput) -> Result<InitProjectOutput, ParityError> {
    let root = input.root;
    create_dir_if_absent(&root)?;

    let mut scaffold = Scaffold::default();
    let fresh = write_if_absent(
        &root.join(DEFAULT_CONFIG_FILE),
        PARITY_TOML_TEMPLATE.as_bytes(),
        DEFAULT_CONFIG_FILE,
    )?;
    scaffold.record(fresh, DEFAULT_CONFIG_FILE);

    let fresh = write_if_absent(
        &root.join(DEFAULT_CONTRACT_PATH),
        starter_contract()?.as_bytes(),
        DEFAULT_CONTRACT_PATH,
    )?;
    scaffold.record(fresh, DEFAULT_CONTRACT_PATH);

    let fresh = create_dir_if_absent(&root.join(DEFAULT_DATA_ROOT))?;
    scaffold.record(fresh, DEFAULT_DATA_ROOT);

    let readme = format!("{}/README.md", DEFAULT_DATA_ROOT);
    let fresh = write_if_absent(&root.join(&readme), DATA_README.as_bytes(), &readme)?;
    scaffold.record(fresh, &readme);

    Ok(InitProjectOutput {
        root,
        created: scaffold.created,
        existing: scaffold.existing,
    })
}

/// One universal case with its fingerprints filled in.
fn starter_contract() -> Result<String, ParityError> {
    let text = "Hello, world!";
    let batch: Vec<String> = (0..2).map(|idx| synthetic_batch_text(text, idx)).collect();
    let doc = json!({
        "cases": [{
            "id": "short-1",
            "length": "short",
            "description": "Short greeting",
            "targets": ["*"],
            "options": {"addSpecialTokens": false, "decodeSkipSpecialTokens": true},
            "single": {"text": text, "textHash": hash_string(text)},
            "batch": {"count": batch.len(), "textsHash": hash_string_sequence(&batch)}
        }]
    });
    let mut out = serde_json::to_string_pretty(&doc)
        .map_err(|err| ParityError::Json(format!("starter contract: {}", err)))?;
    out.push('\n');
    Ok(out)
}
