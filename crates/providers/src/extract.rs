//! Two-stage decision parsing for schema-prompted backends.
//!
//! Stage one parses the whole output strictly. If that fails, stage two
//! recovers the earliest syntactically valid JSON object in the text, whether
//! it sits in a fenced block or is found by brace matching. Either way the
//! value must pass [`Decision::from_value`]; there is no third stage.

use stepwise_core::{Decision, DecodingFailure};
use tracing::debug;

/// Parse raw model output into a validated [`Decision`].
pub fn parse_decision(raw: &str) -> Result<Decision, DecodingFailure> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(DecodingFailure::Malformed("model returned empty output".into()));
    }

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => Decision::from_value(value),
        Err(strict_err) => {
            debug!(error = %strict_err, "Strict parse failed, recovering embedded JSON");
            let value = recover_json(text).ok_or_else(|| {
                DecodingFailure::Malformed(format!(
                    "no JSON object found in output ({strict_err}): {}",
                    preview(text)
                ))
            })?;
            Decision::from_value(value)
        }
    }
}

/// Find the earliest syntactically valid JSON object embedded in `text`.
pub fn recover_json(text: &str) -> Option<serde_json::Value> {
    let fenced = extract_fenced_json(text)
        .and_then(|(start, body)| parse_object(body.trim()).map(|value| (start, value)));

    let braced = text
        .char_indices()
        .filter(|(_, ch)| *ch == '{')
        .find_map(|(i, _)| {
            extract_balanced_json(&text[i..])
                .and_then(parse_object)
                .map(|value| (i, value))
        });

    match (fenced, braced) {
        (Some((f, fenced)), Some((b, braced))) => Some(if b < f { braced } else { fenced }),
        (fenced, braced) => fenced.or(braced).map(|(_, value)| value),
    }
}

fn parse_object(candidate: &str) -> Option<serde_json::Value> {
    serde_json::from_str::<serde_json::Value>(candidate)
        .ok()
        .filter(serde_json::Value::is_object)
}

/// Start offset and body of the first ``` fenced block, skipping its
/// language tag line.
fn extract_fenced_json(content: &str) -> Option<(usize, &str)> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    let body_start = fence_start + 3 + after_opening.find('\n')? + 1;
    let body_end = body_start + content[body_start..].find("```")?;

    (body_start < body_end).then(|| (body_start, &content[body_start..body_end]))
}

/// The balanced `{...}` object starting at position 0 of `s`.
///
/// Counts brace depth outside string literals to find the matching close.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn preview(text: &str) -> String {
    const MAX: usize = 200;
    match text.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}...", &text[..i]),
        None => text.to_string(),
    }
}
