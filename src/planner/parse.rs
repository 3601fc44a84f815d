//! Tolerant parsing of planner output.
//!
//! Model output is often fenced, wrapped in prose, truncated or sprinkled with
//! trailing commas. Parsing degrades in stages: full JSON, scrubbed JSON,
//! refusal detection, then regex recovery of step descriptions.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{PlannerError, PlannerResponse};
use crate::guide::{Step, StepAction};

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("trailing comma pattern"));

static DESCRIPTION_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""description"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("description pattern")
});

/// Element reference used when a step names none.
pub const DEFAULT_ELEMENT_REF: &str = "body";

const REFUSAL_MARKERS: &[&str] = &[
    "i'm sorry",
    "i am sorry",
    "i apologize",
    "i can't help",
    "i cannot help",
    "i can't assist",
    "i cannot assist",
    "i'm unable to",
    "i am unable to",
    "i'm not able to",
    "unable to comply",
    "as an ai",
];

/// Remove a surrounding markdown code fence.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (`json`, `JSON`, ...)
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// First balanced `{...}` in `text`, or everything from the first `{` when
/// the object is cut off.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    Some(&text[start..])
}

/// Drop trailing commas and raw control characters.
pub fn scrub_json(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    TRAILING_COMMA.replace_all(&cleaned, "$1").into_owned()
}

pub fn is_refusal(text: &str) -> bool {
    let lower = text.to_lowercase();
    REFUSAL_MARKERS.iter().any(|m| lower.contains(m))
}

fn refusal_response(text: &str) -> PlannerResponse {
    let message = text.trim().to_string();
    PlannerResponse {
        steps: vec![Step::new(message.clone(), StepAction::Info)],
        can_complete: false,
        completed: false,
        note: Some(message),
        refused: true,
    }
}

fn str_field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|n| value.get(*n))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn bool_field(value: &Value, names: &[&str]) -> bool {
    names
        .iter()
        .find_map(|n| value.get(*n))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn step_from_value(value: &Value, ordinal: usize) -> Step {
    let description = str_field(value, &["description", "instruction", "text"])
        .map(str::to_string)
        .unwrap_or_else(|| format!("Step {}", ordinal));
    let action = str_field(value, &["action", "type"])
        .map(StepAction::parse_lenient)
        .unwrap_or_default();
    let element = str_field(value, &["elementId", "element_id", "element", "selector", "target"])
        .unwrap_or(DEFAULT_ELEMENT_REF);

    let mut step = Step::new(description, action).with_ref(element);
    step.value = str_field(value, &["value", "text_to_type", "input"]).map(str::to_string);
    step
}

fn response_from_value(value: &Value) -> PlannerResponse {
    let steps_value = match value {
        Value::Array(_) => Some(value),
        _ => value.get("steps"),
    };
    let steps: Vec<Step> = steps_value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(i, v)| step_from_value(v, i + 1))
                .collect()
        })
        .unwrap_or_default();
    let note = str_field(value, &["note", "message", "reason"]).map(str::to_string);

    if steps.is_empty() {
        if let Some(note) = note.as_deref().filter(|n| is_refusal(n)) {
            return refusal_response(note);
        }
    }

    PlannerResponse {
        steps,
        can_complete: bool_field(value, &["canComplete", "can_complete"]),
        completed: bool_field(value, &["completed", "isComplete", "is_complete", "done"]),
        note,
        refused: false,
    }
}

/// Salvage `"description": "..."` fragments from broken output.
fn recover_descriptions(text: &str) -> Vec<Step> {
    DESCRIPTION_FIELD
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().replace("\\\"", "\"").trim().to_string())
        .filter(|d| !d.is_empty())
        .map(|d| Step::new(d, StepAction::Click).with_ref(DEFAULT_ELEMENT_REF))
        .collect()
}

pub fn parse_response(text: &str) -> Result<PlannerResponse, PlannerError> {
    let body = strip_fences(text);

    if let Some(object) = extract_json_object(body) {
        if let Ok(value) = serde_json::from_str::<Value>(object) {
            return Ok(response_from_value(&value));
        }
        if let Ok(value) = serde_json::from_str::<Value>(&scrub_json(object)) {
            log::debug!("planner output needed scrubbing");
            return Ok(response_from_value(&value));
        }
    } else if body.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(&scrub_json(body)) {
            return Ok(response_from_value(&value));
        }
    }

    if is_refusal(body) {
        log::info!("planner declined the task");
        return Ok(refusal_response(body));
    }

    let recovered = recover_descriptions(body);
    if !recovered.is_empty() {
        log::warn!("recovered {} step(s) from malformed planner output", recovered.len());
        return Ok(PlannerResponse {
            steps: recovered,
            note: Some("recovered from a partial response".to_string()),
            ..Default::default()
        });
    }

    let preview: String = body.chars().take(80).collect();
    Err(PlannerError::Malformed(preview))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json_with_defaults() {
        let text = "Here you go:\n```json\n{\"steps\": [{\"elementId\": \"gm-3\", \"description\": \"Click \\\"Edit profile\\\"\"}, {}], \"canComplete\": true}\n```";
        let response = parse_response(text).unwrap();
        assert_eq!(response.steps.len(), 2);
        assert_eq!(response.steps[0].legacy_element_ref.as_deref(), Some("gm-3"));
        assert_eq!(response.steps[0].description, "Click \"Edit profile\"");
        assert_eq!(response.steps[0].action, StepAction::Click);
        assert_eq!(response.steps[1].description, "Step 2");
        assert_eq!(response.steps[1].legacy_element_ref.as_deref(), Some("body"));
        assert!(response.can_complete);
        assert!(!response.completed);
    }

    #[test]
    fn test_trailing_commas_and_control_chars() {
        let text = "{\"steps\": [{\"elementId\": \"gm-1\", \"action\": \"type\", \"value\": \"hi\",},], \"completed\": true,}\u{0007}";
        let response = parse_response(text).unwrap();
        assert_eq!(response.steps[0].action, StepAction::Type);
        assert_eq!(response.steps[0].value.as_deref(), Some("hi"));
        assert!(response.completed);
    }

    #[test]
    fn test_truncated_output_recovers_descriptions() {
        let text = "{\"steps\": [{\"description\": \"Open settings\", \"elementId\": \"gm-2\"}, {\"description\": \"Click Sa";
        let response = parse_response(text).unwrap();
        assert_eq!(response.steps.len(), 1);
        assert_eq!(response.steps[0].description, "Open settings");
    }

    #[test]
    fn test_recovered_descriptions_unescape_quotes() {
        let text = r#"{"steps": [{"description": "Click \"Save\"", "elementId": "gm-4"}, {"description": "  ", "#;
        let steps = recover_descriptions(text);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].description, "Click \"Save\"");
        assert_eq!(scrub_json("[1, 2,\n]"), "[1, 2]");
    }

    #[test]
    fn test_refusal_becomes_info_step() {
        let response = parse_response("I'm sorry, but I can't help with that request.").unwrap();
        assert!(response.refused);
        assert_eq!(response.steps.len(), 1);
        assert_eq!(response.steps[0].action, StepAction::Info);
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(parse_response("???"), Err(PlannerError::Malformed(_))));
    }

    #[test]
    fn test_extract_json_object_respects_strings() {
        let text = "prefix {\"a\": \"}\", \"b\": {\"c\": 1}} suffix";
        assert_eq!(extract_json_object(text), Some("{\"a\": \"}\", \"b\": {\"c\": 1}}"));
    }
}
