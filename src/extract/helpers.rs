//! Shared coercion helpers (§4.4) used by every extractor. Messages are
//! represented as `serde_json::Value` objects (`{role, content}`) rather than
//! a dedicated struct — extractors accept messages in a dozen shapes and
//! normalizing straight to JSON avoids a combinatorial set of intermediate
//! types for content the canonicalizer never interprets beyond text
//! extraction.

use serde_json::{Value as JsonValue, json};

use crate::model::attribute::AttributeValue;

pub use crate::model::attribute::safe_json_parse;

/// `toAttributeValue`: scalar stays scalar, homogeneous scalar array stays
/// an array, anything else becomes a JSON string. `null`/absent yields
/// `None` — callers must treat that as a no-op set.
pub fn to_attribute_value(v: &JsonValue) -> Option<AttributeValue> {
    AttributeValue::from_json(v)
}

/// Accept a JSON number or a numeric string; reject non-finite values.
pub fn as_number(v: &JsonValue) -> Option<f64> {
    match v {
        JsonValue::Number(n) => {
            let f = n.as_f64()?;
            f.is_finite().then_some(f)
        }
        JsonValue::String(s) => {
            let f: f64 = s.trim().parse().ok()?;
            f.is_finite().then_some(f)
        }
        _ => None,
    }
}

/// Wrap a single value into a one-element array, drop empty strings, and
/// return `None` if nothing survives.
pub fn coerce_to_string_array(v: &JsonValue) -> Option<Vec<String>> {
    let candidates: Vec<String> = match v {
        JsonValue::String(s) => vec![s.clone()],
        JsonValue::Array(items) => items
            .iter()
            .filter_map(|i| match i {
                JsonValue::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect(),
        other => vec![other.to_string()],
    };
    let filtered: Vec<String> = candidates.into_iter().filter(|s| !s.is_empty()).collect();
    if filtered.is_empty() {
        None
    } else {
        Some(filtered)
    }
}

/// If `p` is an array, return it as-is; if `{messages: [...]}`, return the
/// inner array; otherwise return `p` unchanged.
pub fn decode_messages_payload(p: &JsonValue) -> JsonValue {
    match p {
        JsonValue::Array(_) => p.clone(),
        JsonValue::Object(map) => match map.get("messages") {
            Some(JsonValue::Array(inner)) => JsonValue::Array(inner.clone()),
            _ => p.clone(),
        },
        other => other.clone(),
    }
}

/// If an array element is `{message: {...}}` with exactly one key, unwrap
/// it to the inner object.
pub fn unwrap_wrapped_messages(msgs: &[JsonValue]) -> Vec<JsonValue> {
    msgs.iter()
        .map(|m| match m {
            JsonValue::Object(map) if map.len() == 1 => {
                if let Some(inner) = map.get("message") {
                    inner.clone()
                } else {
                    m.clone()
                }
            }
            other => other.clone(),
        })
        .collect()
}

/// Coerce arbitrary raw input into a normalized `Vec<{role, content}>`:
/// string -> one message under `default_role`; array -> unwrapped;
/// `{messages: [...]}` -> unwrapped; anything else wrapped as a single
/// message.
pub fn normalize_to_messages(raw: &JsonValue, default_role: &str) -> Vec<JsonValue> {
    match raw {
        JsonValue::String(s) => vec![json!({"role": default_role, "content": s})],
        JsonValue::Array(items) => unwrap_wrapped_messages(items),
        JsonValue::Object(map) if map.contains_key("messages") => {
            let decoded = decode_messages_payload(raw);
            match decoded {
                JsonValue::Array(items) => unwrap_wrapped_messages(&items),
                other => vec![other],
            }
        }
        other => vec![json!({"role": default_role, "content": other})],
    }
}

/// If the first message has role `"system"`, return its extracted text.
/// Content may be a plain string or an array of blocks each shaped like
/// `{type:"text", text|content}`; blocks are concatenated.
pub fn extract_system_instruction_from_messages(msgs: &[JsonValue]) -> Option<String> {
    let first = msgs.first()?;
    let role = first.get("role")?.as_str()?;
    if role != "system" {
        return None;
    }
    let content = first.get("content")?;
    extract_message_text(content)
}

/// Render arbitrary message `content` to text: a string passes through; an
/// array of blocks/strings is joined with newlines, pulling `text` (or
/// `content`) out of text blocks and skipping anything else (e.g. image
/// blocks).
pub fn extract_message_text(content: &JsonValue) -> Option<String> {
    match content {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Array(blocks) => {
            let pieces: Vec<String> = blocks.iter().filter_map(extract_block_text).collect();
            if pieces.is_empty() {
                None
            } else {
                Some(pieces.join("\n"))
            }
        }
        _ => None,
    }
}

fn extract_block_text(block: &JsonValue) -> Option<String> {
    match block {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Object(map) => {
            if let Some(t) = map.get("type").and_then(|v| v.as_str()) {
                if t == "image_url" {
                    return None;
                }
            }
            map.get("text")
                .or_else(|| map.get("content"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        }
        _ => None,
    }
}

/// `"<provider-prefix>/<id>"`, splitting provider on the first `.`; if
/// provider is empty, return `id` unprefixed.
pub fn normalise_model_from_ai_model_object(id: &str, provider: &str) -> String {
    if provider.is_empty() {
        return id.to_string();
    }
    let prefix = provider.split('.').next().unwrap_or(provider);
    format!("{prefix}/{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_number_accepts_numeric_string_rejects_nonfinite() {
        assert_eq!(as_number(&json!("720")), Some(720.0));
        assert_eq!(as_number(&json!(1.5)), Some(1.5));
        assert_eq!(as_number(&json!("not a number")), None);
        assert_eq!(as_number(&json!(f64::NAN)), None);
    }

    #[test]
    fn coerce_to_string_array_drops_empties() {
        assert_eq!(
            coerce_to_string_array(&json!(["a", "", "b"])),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(coerce_to_string_array(&json!("")), None);
    }

    #[test]
    fn decode_messages_payload_unwraps_object_form() {
        let p = json!({"messages": [{"role": "user", "content": "hi"}]});
        let decoded = decode_messages_payload(&p);
        assert_eq!(decoded, json!([{"role": "user", "content": "hi"}]));
    }

    #[test]
    fn normalize_to_messages_wraps_plain_string() {
        let msgs = normalize_to_messages(&json!("hello"), "user");
        assert_eq!(msgs, vec![json!({"role": "user", "content": "hello"})]);
    }

    #[test]
    fn extract_system_instruction_concatenates_text_blocks() {
        let msgs = vec![json!({
            "role": "system",
            "content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]
        })];
        assert_eq!(
            extract_system_instruction_from_messages(&msgs),
            Some("a\nb".to_string())
        );
    }

    #[test]
    fn extract_system_instruction_none_when_first_role_not_system() {
        let msgs = vec![json!({"role": "user", "content": "hi"})];
        assert_eq!(extract_system_instruction_from_messages(&msgs), None);
    }

    #[test]
    fn normalise_model_splits_provider_prefix() {
        assert_eq!(
            normalise_model_from_ai_model_object("gpt-4", "openai.chat"),
            "openai/gpt-4"
        );
        assert_eq!(normalise_model_from_ai_model_object("gpt-4", ""), "gpt-4");
    }
}
