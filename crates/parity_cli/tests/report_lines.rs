use std::path::PathBuf;

use parity_cli::render_report_lines;
use parity_core::manifest::{CompareReport, FieldMismatch, ReconcileReport};
use parity_core::pipeline::{BatchReport, ModelReport, ModelStatus};
use parity_core::BackendKind;

fn entry(model: &str, status: ModelStatus) -> ModelReport {
    ModelReport {
        model: model.to_string(),
        backend: BackendKind::HuggingFace,
        status,
    }
}

#[test]
fn written_manifest_lists_counts() {
    let report = BatchReport {
        models: vec![entry(
            "gpt2",
            ModelStatus::ManifestWritten {
                path: PathBuf::from("data/gpt2/m.json"),
                report: ReconcileReport {
                    created: vec!["a".to_string(), "b".to_string()],
                    updated: Vec::new(),
                    pruned: vec!["old".to_string()],
                    unchanged: 3,
                },
            },
        )],
    };
    let lines = render_report_lines(&report);
    assert_eq!(lines[0], "model=gpt2");
    assert_eq!(lines[1], "backend=huggingface");
    assert!(lines.contains(&"status=manifest_written".to_string()));
    assert!(lines.contains(&"created=2".to_string()));
    assert!(lines.contains(&"pruned=1".to_string()));
    assert!(lines.contains(&"unchanged=3".to_string()));
    assert_eq!(lines.last().map(String::as_str), Some("drifted=0"));
    assert!(report.is_success());
}

#[test]
fn failures_and_mismatches_are_reported() {
    let report = BatchReport {
        models: vec![
            entry(
                "broken",
                ModelStatus::Failed {
                    kind: "asset_missing",
                    message: "tokenizer.json not found".to_string(),
                },
            ),
            entry(
                "gpt2",
                ModelStatus::Compared {
                    path: PathBuf::from("m.json"),
                    report: CompareReport {
                        matched: Vec::new(),
                        mismatched: vec![FieldMismatch {
                            case_id: "case-1".to_string(),
                            field: "ids-hash".to_string(),
                            left: "aa".to_string(),
                            right: "bb".to_string(),
                        }],
                        incomplete: Vec::new(),
                    },
                },
            ),
        ],
    };
    let lines = render_report_lines(&report);
    assert!(lines.contains(&"error_kind=asset_missing".to_string()));
    assert!(lines.contains(&"mismatch=case-1:ids-hash left=aa right=bb".to_string()));
    assert!(lines.contains(&"failed=1".to_string()));
    assert!(lines.contains(&"drifted=1".to_string()));
    assert!(!report.is_success());
}

#[test]
fn fixture_lines_name_the_chat_template_when_written() {
    let report = BatchReport {
        models: vec![
            entry(
                "gpt2",
                ModelStatus::FixtureWritten {
                    path: PathBuf::from("data/gpt2/rust-benchmark.json"),
                    cases: 4,
                    chat_template: None,
                },
            ),
            entry(
                "qwen",
                ModelStatus::FixtureWritten {
                    path: PathBuf::from("data/qwen/rust-benchmark.json"),
                    cases: 4,
                    chat_template: Some(PathBuf::from("data/qwen/chat-template.json")),
                },
            ),
        ],
    };
    let lines = render_report_lines(&report);
    let chat: Vec<&String> = lines
        .iter()
        .filter(|line| line.starts_with("chat_template="))
        .collect();
    assert_eq!(chat, vec!["chat_template=data/qwen/chat-template.json"]);
    assert!(report.is_success());
}
