//! Chat-template fixtures.
//!
//! A model's Jinja chat template (from `tokenizer_config.json`) is rendered
//! for a fixed set of conversations. Each rendering is stored with its
//! fingerprint and the token ids the backend produces for it, so other
//! implementations can check both the template engine and the tokenizer.

use std::fs;
use std::path::Path;

use minijinja::{Environment, Error as JinjaError, ErrorKind as JinjaErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::backend::TokenizerBackend;
use crate::config::ModelSpec;
use crate::contract::CaseOptions;
use crate::error::ParityError;
use crate::files::write_file;
use crate::hash::{hash_string, hash_uint32_sequence};

pub const CHAT_TEMPLATE_FILE: &str = "chat-template.json";
pub const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";

/// Special-token names exposed to templates as `{{ bos_token }}` etc.
const TEMPLATE_TOKENS: [&str; 7] = [
    "bos_token",
    "eos_token",
    "unk_token",
    "pad_token",
    "sep_token",
    "cls_token",
    "mask_token",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// Which conversations a model's template is exercised with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatScenarioSet {
    /// System, user and assistant turns.
    Standard,
    /// For templates that reject a `system` role.
    WithoutSystem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatScenario {
    pub description: &'static str,
    pub add_generation_prompt: bool,
    pub messages: Vec<ChatMessage>,
}

impl ChatScenarioSet {
    pub fn scenarios(self) -> Vec<ChatScenario> {
        let system = ChatMessage::new(
            "system",
            "You are a terse assistant for a build farm. Answer in one paragraph.",
        );
        let question = ChatMessage::new(
            "user",
            "The nightly job failed with exit code 137. What usually causes that?",
        );
        let answer = ChatMessage::new(
            "assistant",
            "Exit code 137 means the process was killed with SIGKILL, most often by the out-of-memory killer.",
        );
        let follow_up = ChatMessage::new(
            "user",
            "How do I confirm it was the OOM killer and not a manual kill?",
        );
        let closing = ChatMessage::new(
            "assistant",
            "Check the kernel log for an oom-kill entry naming the process around the failure time.",
        );

        let mut first = vec![question.clone(), answer, follow_up];
        let mut second = vec![question, closing];
        if self == ChatScenarioSet::Standard {
            first.insert(0, system.clone());
            second.insert(0, system);
        }
        vec![
            ChatScenario {
                description: "Follow-up question awaiting a reply",
                add_generation_prompt: true,
                messages: first,
            },
            ChatScenario {
                description: "Completed exchange without a generation prompt",
                add_generation_prompt: false,
                messages: second,
            },
        ]
    }
}

/// A chat template plus the special-token variables it may reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTemplate {
    pub source: String,
    pub variables: Map<String, Value>,
}

impl ChatTemplate {
    /// Reads the template from a parsed `tokenizer_config.json`.
    ///
    /// Returns `None` when the config has no `chat_template`. A list of named
    /// templates resolves to the one named `default`, else the first.
    pub fn from_tokenizer_config(config: &Value) -> Option<Self> {
        let source = match config.get("chat_template")? {
            Value::String(source) => source.clone(),
            Value::Array(named) => {
                let pick = named
                    .iter()
                    .find(|entry| entry.get("name").and_then(Value::as_str) == Some("default"))
                    .or_else(|| named.first())?;
                pick.get("template")?.as_str()?.to_string()
            }
            _ => return None,
        };

        let mut variables = Map::new();
        for name in TEMPLATE_TOKENS {
            let token = match config.get(name) {
                Some(Value::String(token)) => Some(token.clone()),
                Some(Value::Object(added)) => added
                    .get("content")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            };
            if let Some(token) = token {
                variables.insert(name.to_string(), Value::String(token));
            }
        }
        Some(Self { source, variables })
    }

    /// Loads `tokenizer_config.json`; `Ok(None)` when it has no template.
    pub fn load(path: &Path, model: &str) -> Result<Option<Self>, ParityError> {
        let bytes = fs::read(path)
            .map_err(|e| ParityError::Io(format!("read {}: {}", path.display(), e)))?;
        let config: Value = serde_json::from_slice(&bytes).map_err(|e| ParityError::ChatTemplate {
            model: model.to_string(),
            message: format!("{} is not valid JSON: {}", path.display(), e),
        })?;
        Ok(Self::from_tokenizer_config(&config))
    }

    pub fn render(
        &self,
        messages: &[ChatMessage],
        add_generation_prompt: bool,
    ) -> Result<String, JinjaError> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_unknown_method_callback(minijinja_contrib::pycompat::unknown_method_callback);
        env.add_function("raise_exception", raise_exception);

        let mut context = self.variables.clone();
        context.insert(
            "messages".to_string(),
            Value::Array(
                messages
                    .iter()
                    .map(|m| {
                        let mut message = Map::new();
                        message.insert("role".to_string(), Value::String(m.role.clone()));
                        message.insert("content".to_string(), Value::String(m.content.clone()));
                        Value::Object(message)
                    })
                    .collect(),
            ),
        );
        context.insert(
            "add_generation_prompt".to_string(),
            Value::Bool(add_generation_prompt),
        );
        env.render_str(&self.source, Value::Object(context))
    }
}

fn raise_exception(message: String) -> Result<String, JinjaError> {
    Err(JinjaError::new(JinjaErrorKind::InvalidOperation, message))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTemplateCase {
    pub description: String,
    pub add_generation_prompt: bool,
    pub messages: Vec<ChatMessage>,
    pub rendered: String,
    pub rendered_hash: String,
    pub token_ids: Vec<u32>,
    pub token_ids_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTemplateFixture {
    pub model: String,
    pub repo_id: String,
    pub cases: Vec<ChatTemplateCase>,
}

/// Renders every scenario and tokenizes the result without adding special
/// tokens, since the template already places them.
pub fn build_chat_fixture(
    model: &ModelSpec,
    template: &ChatTemplate,
    scenarios: &[ChatScenario],
    backend: &dyn TokenizerBackend,
) -> Result<ChatTemplateFixture, ParityError> {
    let options = CaseOptions::default();
    let mut cases = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let rendered = template
            .render(&scenario.messages, scenario.add_generation_prompt)
            .map_err(|e| ParityError::ChatTemplate {
                model: model.id.clone(),
                message: format!("render '{}': {}", scenario.description, e),
            })?;
        let sequence = backend
            .encode(&rendered, None, &options)
            .map_err(|e| ParityError::BackendEncoding {
                model: model.id.clone(),
                case_id: scenario.description.to_string(),
                operation: "encode".to_string(),
                message: e.0,
            })?;
        cases.push(ChatTemplateCase {
            description: scenario.description.to_string(),
            add_generation_prompt: scenario.add_generation_prompt,
            messages: scenario.messages.clone(),
            rendered_hash: hash_string(&rendered),
            rendered,
            token_ids_hash: hash_uint32_sequence(&sequence.ids),
            token_ids: sequence.ids,
        });
    }
    Ok(ChatTemplateFixture {
        model: model.id.clone(),
        repo_id: model.repo_id().to_string(),
        cases,
    })
}

pub fn write_chat_fixture(path: &Path, fixture: &ChatTemplateFixture) -> Result<(), ParityError> {
    let mut bytes = serde_json::to_vec_pretty(fixture)
        .map_err(|e| ParityError::Json(format!("serialize chat fixture: {}", e)))?;
    bytes.push(b'\n');
    write_file(path, &bytes, "chat fixture")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SIMPLE: &str = "{{ bos_token }}{% for m in messages %}<{{ m.role }}>{{ m.content }}\n{% endfor %}{% if add_generation_prompt %}<assistant>{% endif %}";

    #[test]
    fn template_and_token_objects_are_read() {
        let config = json!({
            "chat_template": SIMPLE,
            "bos_token": {"content": "<s>", "lstrip": false},
            "eos_token": "</s>"
        });
        let template = ChatTemplate::from_tokenizer_config(&config).unwrap();
        assert_eq!(template.variables["bos_token"], "<s>");
        assert_eq!(template.variables["eos_token"], "</s>");
        assert!(template.variables.get("pad_token").is_none());
    }

    #[test]
    fn missing_template_is_none() {
        assert!(ChatTemplate::from_tokenizer_config(&json!({"bos_token": "<s>"})).is_none());
    }

    #[test]
    fn named_templates_prefer_default() {
        let config = json!({"chat_template": [
            {"name": "tool_use", "template": "tools"},
            {"name": "default", "template": "plain"}
        ]});
        let template = ChatTemplate::from_tokenizer_config(&config).unwrap();
        assert_eq!(template.source, "plain");
    }

    #[test]
    fn renders_messages_and_generation_prompt() {
        let template =
            ChatTemplate::from_tokenizer_config(&json!({"chat_template": SIMPLE, "bos_token": "<s>"}))
                .unwrap();
        let messages = vec![ChatMessage::new("user", "hi")];
        assert_eq!(
            template.render(&messages, true).unwrap(),
            "<s><user>hi\n<assistant>"
        );
        assert_eq!(template.render(&messages, false).unwrap(), "<s><user>hi\n");
    }

    #[test]
    fn python_string_methods_are_available() {
        let template = ChatTemplate {
            source: "{{ messages[0].content.strip() }}".to_string(),
            variables: Map::new(),
        };
        let rendered = template
            .render(&[ChatMessage::new("user", "  padded  ")], false)
            .unwrap();
        assert_eq!(rendered, "padded");
    }

    #[test]
    fn raise_exception_fails_the_render() {
        let template = ChatTemplate {
            source: "{% if messages[0].role == 'system' %}{{ raise_exception('no system role') }}{% endif %}".to_string(),
            variables: Map::new(),
        };
        let err = template
            .render(&[ChatMessage::new("system", "x")], false)
            .unwrap_err();
        assert!(err.to_string().contains("no system role"));
    }

    #[test]
    fn scenario_sets_differ_only_in_system_turns() {
        let standard = ChatScenarioSet::Standard.scenarios();
        let without = ChatScenarioSet::WithoutSystem.scenarios();
        assert_eq!(standard.len(), without.len());
        assert!(standard[0].add_generation_prompt);
        assert!(!standard[1].add_generation_prompt);
        assert_eq!(standard[0].messages[0].role, "system");
        assert!(without
            .iter()
            .all(|s| s.messages.iter().all(|m| m.role != "system")));
        assert_eq!(standard[0].messages[1..], without[0].messages[..]);
    }
}
