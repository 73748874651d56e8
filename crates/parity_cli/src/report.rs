use parity_core::pipeline::{BatchReport, ModelStatus};

/// Renders a batch report as `key=value` lines, one block per model.
pub fn render_report_lines(report: &BatchReport) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in &report.models {
        lines.push(format!("model={}", entry.model));
        lines.push(format!("backend={}", entry.backend));
        match &entry.status {
            ModelStatus::ManifestWritten { path, report } => {
                lines.push("status=manifest_written".to_string());
                lines.push(format!("path={}", path.display()));
                lines.push(format!("created={}", report.created.len()));
                lines.push(format!("updated={}", report.updated.len()));
                lines.push(format!("pruned={}", report.pruned.len()));
                lines.push(format!("unchanged={}", report.unchanged));
            }
            ModelStatus::ManifestUnchanged { path } => {
                lines.push("status=manifest_unchanged".to_string());
                lines.push(format!("path={}", path.display()));
            }
            ModelStatus::ManifestDrift {
                path,
                existed,
                report,
            } => {
                lines.push("status=manifest_drift".to_string());
                lines.push(format!("path={}", path.display()));
                lines.push(format!("existed={}", existed));
                for id in &report.created {
                    lines.push(format!("missing_case={}", id));
                }
                for id in &report.updated {
                    lines.push(format!("stale_case={}", id));
                }
                for id in &report.pruned {
                    lines.push(format!("orphan_case={}", id));
                }
            }
            ModelStatus::FixtureWritten {
                path,
                cases,
                chat_template,
            } => {
                lines.push("status=fixture_written".to_string());
                lines.push(format!("path={}", path.display()));
                lines.push(format!("cases={}", cases));
                if let Some(chat) = chat_template {
                    lines.push(format!("chat_template={}", chat.display()));
                }
            }
            ModelStatus::Compared { path, report } => {
                lines.push("status=compared".to_string());
                lines.push(format!("path={}", path.display()));
                lines.push(format!("matched={}", report.matched.len()));
                lines.push(format!("incomplete={}", report.incomplete.len()));
                lines.push(format!("mismatched={}", report.mismatched.len()));
                for m in &report.mismatched {
                    lines.push(format!(
                        "mismatch={}:{} left={} right={}",
                        m.case_id, m.field, m.left, m.right
                    ));
                }
            }
            ModelStatus::Failed { kind, message } => {
                lines.push("status=failed".to_string());
                lines.push(format!("error_kind={}", kind));
                lines.push(format!("error={}", message));
            }
        }
    }
    lines.push(format!("models={}", report.models.len()));
    lines.push(format!("failed={}", report.failed()));
    lines.push(format!("drifted={}", report.drifted()));
    lines
}
