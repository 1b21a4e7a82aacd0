//! Question-library search: parse a batch answer, drop repeats, and keep the
//! results in a preview list until the user promotes one into the draft.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Category requested from the library when the caller names none.
pub const DEFAULT_CATEGORY: &str = "technical";

/// One staged library result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewItem {
    pub id: Uuid,
    pub request_id: Uuid,
    pub text: String,
    /// False while the typing reveal is still filling `text`.
    pub revealed: bool,
}

/// Extracts question strings from a batch answer.
///
/// Accepts a JSON array (of strings, or of objects with a `question`/`text`
/// field), an object with a `questions` array, or plain numbered/bulleted lines.
pub fn parse_batch(raw: &str) -> Vec<String> {
    let body = unfence(raw);
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items.iter().filter_map(item_text).collect(),
        Ok(Value::Object(map)) => match map.get("questions") {
            Some(Value::Array(items)) => items.iter().filter_map(item_text).collect(),
            _ => Vec::new(),
        },
        Ok(Value::String(single)) => vec![single],
        _ => body.lines().map(strip_list_marker).collect(),
    }
}

/// Drops a surrounding ``` fence and its language tag, if the model added one.
fn unfence(raw: &str) -> &str {
    let text = raw.trim();
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    match inner.split_once('\n') {
        Some((tag, body)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => body.trim(),
        _ => inner.trim(),
    }
}

fn item_text(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("question")
            .or_else(|| map.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Removes a leading `1.`, `2)`, `-`, `*` or `•` marker.
fn strip_list_marker(line: &str) -> String {
    let line = line.trim();
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    let rest = if digits > 0 {
        let after = &line[digits..];
        after
            .strip_prefix('.')
            .or_else(|| after.strip_prefix(')'))
            .unwrap_or(line)
    } else {
        line.strip_prefix('-')
            .or_else(|| line.strip_prefix('*'))
            .or_else(|| line.strip_prefix('•'))
            .unwrap_or(line)
    };
    rest.trim().to_string()
}

/// Trims, drops blanks and anything already in the draft or earlier in the
/// batch, then keeps at most `limit` questions.
pub fn curate(candidates: Vec<String>, existing: &[String], limit: usize) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();
    for candidate in candidates {
        let text = candidate.trim();
        if text.is_empty()
            || existing.iter().any(|e| e.trim() == text)
            || kept.iter().any(|k| k == text)
        {
            continue;
        }
        kept.push(text.to_string());
        if kept.len() == limit {
            break;
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_array() {
        let parsed = parse_batch(r#"["What is Tokio?", "Explain Send and Sync"]"#);
        assert_eq!(parsed, vec!["What is Tokio?", "Explain Send and Sync"]);
    }

    #[test]
    fn test_parse_fenced_object_with_questions() {
        let raw = "```json\n{\"questions\": [{\"question\": \"A?\"}, {\"text\": \"B?\"}, 3]}\n```";
        assert_eq!(parse_batch(raw), vec!["A?", "B?"]);
    }

    #[test]
    fn test_parse_untagged_and_inline_fences() {
        assert_eq!(parse_batch("```\n[\"A?\"]\n```"), vec!["A?"]);
        assert_eq!(parse_batch("```[\"B?\", \"C?\"]```"), vec!["B?", "C?"]);
    }

    #[test]
    fn test_parse_numbered_lines() {
        let raw = "1. First question?\n2) Second question?\n- Third question?\n\n";
        let parsed = curate(parse_batch(raw), &[], 10);
        assert_eq!(
            parsed,
            vec!["First question?", "Second question?", "Third question?"]
        );
    }

    #[test]
    fn test_curate_drops_repeats_and_truncates() {
        let existing = vec!["Tell me about yourself".to_string()];
        let batch = vec![
            "  Tell me about yourself ".to_string(),
            "Why this company?".to_string(),
            "Why this company?".to_string(),
            "".to_string(),
            "Describe a conflict".to_string(),
            "Where do you see yourself?".to_string(),
        ];
        assert_eq!(
            curate(batch, &existing, 2),
            vec!["Why this company?", "Describe a conflict"]
        );
    }
}
