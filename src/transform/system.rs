//! System message rewrite.
//!
//! Every outbound request leads with the CLI's own system message. Short
//! requests additionally get the caller's system text folded into a single
//! tagged block and the model's registered prompt appended, so they carry
//! the same bulk as real CLI traffic.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::body::RequestBody;
use crate::prompts::PromptRegistry;

pub const CLI_SYSTEM_TEXT: &str = "You are Claude Code, Anthropic's official CLI for Claude.";

/// Requests at or above this serialized size keep their system array as-is.
pub const INJECTION_SIZE_THRESHOLD: usize = 20_000;

const EPHEMERAL: &str = "ephemeral";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheControl {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

impl SystemMessage {
    /// A text block with ephemeral cache control.
    pub fn ephemeral_text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
            cache_control: Some(CacheControl {
                kind: EPHEMERAL.to_string(),
            }),
        }
    }

    /// The CLI's own leading system message.
    pub fn canonical() -> Self {
        Self::ephemeral_text(CLI_SYSTEM_TEXT)
    }

    /// Field-wise comparison against the canonical message. Extra fields
    /// on `value` are ignored.
    pub fn is_canonical(value: &Value) -> bool {
        SystemMessage::deserialize(value)
            .map(|message| message == Self::canonical())
            .unwrap_or(false)
    }

    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "type": self.kind,
            "text": self.text,
        });
        if let Some(cache_control) = &self.cache_control {
            value["cache_control"] = json!({ "type": cache_control.kind });
        }
        value
    }
}

/// What the rewrite did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemRewrite {
    /// The body already leads with the CLI message; nothing changed.
    AlreadyDisguised,
    /// Short body: caller text merged and/or model prompt injected.
    Injected {
        size: usize,
        merged_caller_text: bool,
        model_prompt: bool,
    },
    /// Large body: CLI message prepended to the existing array.
    Prepended { size: usize },
}

impl SystemRewrite {
    pub fn describe(&self) -> String {
        match self {
            SystemRewrite::AlreadyDisguised => "already leads with CLI system message".to_string(),
            SystemRewrite::Injected {
                size,
                merged_caller_text,
                model_prompt,
            } => format!(
                "size {size} below threshold, merged caller text: {merged_caller_text}, model prompt: {model_prompt}"
            ),
            SystemRewrite::Prepended { size } => {
                format!("size {size} at or above threshold, prepended CLI message")
            }
        }
    }
}

/// Rewrite `body.system` so it leads with the canonical CLI message.
///
/// Fails only if the body cannot be serialized to measure its size.
pub fn rewrite_system(
    body: &mut RequestBody,
    prompts: &PromptRegistry,
) -> Result<SystemRewrite, serde_json::Error> {
    let leads_with_cli = body
        .system
        .as_deref()
        .and_then(|system| system.first())
        .is_some_and(SystemMessage::is_canonical);
    if leads_with_cli {
        return Ok(SystemRewrite::AlreadyDisguised);
    }

    // Measured as the body stands now, before `system` is replaced.
    let size = serialized_len(body)?;
    let existing = body.system.take().unwrap_or_default();

    let (rest, rewrite) = if size < INJECTION_SIZE_THRESHOLD {
        let mut rest = Vec::new();

        let merged = merge_caller_text(&existing);
        let merged_caller_text = merged.is_some();
        if let Some(merged) = merged {
            rest.push(merged.to_value());
        }

        let model_prompt = body
            .model_name()
            .filter(|model| !model.is_empty())
            .and_then(|model| prompts.get(model));
        let injected_prompt = model_prompt.is_some();
        match model_prompt {
            Some(prompt) => rest.push(SystemMessage::ephemeral_text(prompt).to_value()),
            None => {
                if let Some(model) = body.model_name() {
                    tracing::debug!(model, "no registered prompt for model");
                }
            }
        }

        (
            rest,
            SystemRewrite::Injected {
                size,
                merged_caller_text,
                model_prompt: injected_prompt,
            },
        )
    } else {
        (existing, SystemRewrite::Prepended { size })
    };

    let mut system = Vec::with_capacity(rest.len() + 1);
    system.push(SystemMessage::canonical().to_value());
    system.extend(rest);
    body.system = Some(system);

    Ok(rewrite)
}

/// Join the text of every `type: "text"` entry into one tagged block.
fn merge_caller_text(system: &[Value]) -> Option<SystemMessage> {
    let texts: Vec<&str> = system
        .iter()
        .filter(|entry| entry.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|entry| entry.get("text").and_then(Value::as_str))
        .collect();

    if texts.is_empty() {
        return None;
    }

    Some(SystemMessage::ephemeral_text(format!(
        "<system_prompt>\n{}\n</system_prompt>",
        texts.join("\n\n")
    )))
}

fn serialized_len(body: &RequestBody) -> Result<usize, serde_json::Error> {
    let mut counter = ByteCounter(0);
    serde_json::to_writer(&mut counter, body)?;
    Ok(counter.0)
}

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(value: Value) -> RequestBody {
        let Value::Object(map) = value else {
            panic!("test body must be an object")
        };
        RequestBody::from_map(map).unwrap()
    }

    fn cli() -> Value {
        SystemMessage::canonical().to_value()
    }

    #[test]
    fn canonical_match_is_field_wise() {
        assert!(SystemMessage::is_canonical(&cli()));
        let mut with_extra = cli();
        with_extra["extra"] = json!("ignored");
        assert!(SystemMessage::is_canonical(&with_extra));

        let mut no_cache = cli();
        no_cache.as_object_mut().unwrap().remove("cache_control");
        assert!(!SystemMessage::is_canonical(&no_cache));

        let mut other_cache = cli();
        other_cache["cache_control"]["type"] = json!("persistent");
        assert!(!SystemMessage::is_canonical(&other_cache));

        assert!(!SystemMessage::is_canonical(&json!("You are Claude Code")));
    }

    #[test]
    fn merges_caller_text_and_injects_prompt() {
        let prompts = PromptRegistry::new();
        prompts.set("m1", "P");
        let mut body = body(json!({
            "model": "m1",
            "system": [{"type": "text", "text": "hi"}]
        }));

        let rewrite = rewrite_system(&mut body, &prompts).unwrap();
        assert!(matches!(
            rewrite,
            SystemRewrite::Injected { merged_caller_text: true, model_prompt: true, .. }
        ));
        assert_eq!(
            body.system.unwrap(),
            vec![
                cli(),
                json!({"type": "text", "text": "<system_prompt>\nhi\n</system_prompt>", "cache_control": {"type": "ephemeral"}}),
                json!({"type": "text", "text": "P", "cache_control": {"type": "ephemeral"}}),
            ]
        );
    }

    #[test]
    fn joins_multiple_text_entries_and_skips_others() {
        let prompts = PromptRegistry::new();
        let mut body = body(json!({
            "system": [
                {"type": "text", "text": "one"},
                {"type": "image", "text": "skipped"},
                {"type": "text", "text": "two"}
            ]
        }));
        rewrite_system(&mut body, &prompts).unwrap();
        let system = body.system.unwrap();
        assert_eq!(system.len(), 2);
        assert_eq!(system[1]["text"], "<system_prompt>\none\n\ntwo\n</system_prompt>");
    }

    #[test]
    fn empty_system_without_prompt_gets_only_cli_message() {
        let prompts = PromptRegistry::new();
        let mut body = body(json!({"model": "unknown"}));
        rewrite_system(&mut body, &prompts).unwrap();
        assert_eq!(body.system.unwrap(), vec![cli()]);
    }

    #[test]
    fn already_disguised_is_untouched() {
        let prompts = PromptRegistry::new();
        prompts.set("m1", "P");
        let system = vec![cli(), json!({"type": "text", "text": "caller"})];
        let mut body = body(json!({"model": "m1", "system": system.clone()}));
        assert_eq!(
            rewrite_system(&mut body, &prompts).unwrap(),
            SystemRewrite::AlreadyDisguised
        );
        assert_eq!(body.system.unwrap(), system);
    }

    #[test]
    fn large_body_only_gets_prepended() {
        let prompts = PromptRegistry::new();
        prompts.set("m1", "P");
        let caller = json!({"type": "text", "text": "caller"});
        let mut body = body(json!({
            "model": "m1",
            "system": [caller.clone()],
            "messages": [{"role": "user", "content": "x".repeat(INJECTION_SIZE_THRESHOLD)}]
        }));
        let rewrite = rewrite_system(&mut body, &prompts).unwrap();
        assert!(matches!(rewrite, SystemRewrite::Prepended { size } if size >= INJECTION_SIZE_THRESHOLD));
        assert_eq!(body.system.unwrap(), vec![cli(), caller]);
    }

    /// Request for `m1` whose serialized form is exactly `target` bytes.
    fn body_of_size(target: usize) -> RequestBody {
        let shaped = |padding: usize| {
            body(json!({
                "model": "m1",
                "system": [{"type": "text", "text": "caller"}],
                "messages": [{"role": "user", "content": "x".repeat(padding)}]
            }))
        };
        let overhead = serialized_len(&shaped(0)).unwrap();
        let sized = shaped(target - overhead);
        assert_eq!(serialized_len(&sized).unwrap(), target);
        sized
    }

    #[test]
    fn injects_just_below_size_threshold() {
        let prompts = PromptRegistry::new();
        prompts.set("m1", "P");
        let mut body = body_of_size(INJECTION_SIZE_THRESHOLD - 1);

        let rewrite = rewrite_system(&mut body, &prompts).unwrap();
        assert!(matches!(
            rewrite,
            SystemRewrite::Injected { size, model_prompt: true, .. } if size == INJECTION_SIZE_THRESHOLD - 1
        ));
        let system = body.system.unwrap();
        assert_eq!(system.len(), 3);
        assert_eq!(system[1]["text"], "<system_prompt>\ncaller\n</system_prompt>");
    }

    #[test]
    fn prepends_only_at_size_threshold() {
        let prompts = PromptRegistry::new();
        prompts.set("m1", "P");
        let mut body = body_of_size(INJECTION_SIZE_THRESHOLD);

        let rewrite = rewrite_system(&mut body, &prompts).unwrap();
        assert_eq!(rewrite, SystemRewrite::Prepended { size: INJECTION_SIZE_THRESHOLD });
        assert_eq!(
            body.system.unwrap(),
            vec![cli(), json!({"type": "text", "text": "caller"})]
        );
    }

    #[test]
    fn size_is_measured_with_current_system() {
        let mut body = body(json!({"system": [{"type": "text", "text": "abc"}]}));
        let expected = serde_json::to_vec(&body).unwrap().len();
        assert_eq!(serialized_len(&body).unwrap(), expected);
        body.system = None;
        assert!(serialized_len(&body).unwrap() < expected);
    }
}
