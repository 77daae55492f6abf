//! Placeholder content repair.
//!
//! Some clients send file attachments as a two-part content array whose
//! first part is an empty text block. Upstream rejects empty text, so the
//! placeholder is filled with a label derived from the attachment text.

use serde_json::Value;

use super::body::RequestBody;
use super::stage::{StageError, StageReport};

const FILE_SUFFIX: &str = "文件";

/// Fill empty leading text blocks in two-part message contents.
pub fn repair_placeholder_content(body: &mut RequestBody) -> Result<StageReport, StageError> {
    let Some(messages) = body.messages.as_mut() else {
        return Ok(StageReport::Unchanged);
    };
    let Some(messages) = messages.as_array_mut() else {
        return Err(StageError::UnexpectedShape {
            field: "messages",
            expected: "an array",
        });
    };

    let repaired = messages
        .iter_mut()
        .map(repair_message)
        .filter(|repaired| *repaired)
        .count();

    if repaired == 0 {
        Ok(StageReport::Unchanged)
    } else {
        Ok(StageReport::Changed(format!(
            "filled {repaired} empty placeholder text block(s)"
        )))
    }
}

fn repair_message(message: &mut Value) -> bool {
    let Some(parts) = message
        .get_mut("content")
        .and_then(Value::as_array_mut)
    else {
        return false;
    };
    if parts.len() != 2 || !is_empty_text_block(&parts[0]) {
        return false;
    }
    let Some(attachment) = parts[1]
        .as_object()
        .and_then(|obj| obj.get("text"))
        .and_then(Value::as_str)
    else {
        return false;
    };

    let label = detect_file_label(attachment);
    parts[0]["text"] = Value::String(format!("{label}{FILE_SUFFIX}"));
    tracing::debug!(label, "repaired empty placeholder text");
    true
}

fn is_empty_text_block(part: &Value) -> bool {
    let Some(obj) = part.as_object() else {
        return false;
    };
    obj.get("type").and_then(Value::as_str) == Some("text")
        && obj.get("text").and_then(Value::as_str) == Some("")
}

/// Guess the kind of attachment from its text.
///
/// Temp-file uploads (`temp_file_*.txt`) win over extension matching;
/// extensions are matched case-insensitively.
pub fn detect_file_label(text: &str) -> &'static str {
    if text.contains("temp_file_") && text.contains(".txt") {
        return "text";
    }

    let lower = text.to_lowercase();
    let has_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has_any(&[".jpg", ".png", ".gif", ".jpeg"]) {
        "image"
    } else if has_any(&[".pdf"]) {
        "pdf"
    } else if has_any(&[".doc", ".docx"]) {
        "document"
    } else {
        "text"
    }
}
