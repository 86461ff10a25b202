use serde_json::Value;

/// Recovers a JSON value embedded in generated text.
///
/// A fenced code block wins over the surrounding text; inside the chosen
/// region the span runs from the first `{`/`[` to the last `}`/`]`.
pub fn extract_json(raw: &str) -> Option<Value> {
    let region = fenced_block(raw).unwrap_or(raw);
    let start = region.find(['{', '['])?;
    let end = region.rfind(['}', ']'])?;
    if end < start {
        return None;
    }
    serde_json::from_str(&region[start..=end]).ok()
}

/// Like [`extract_json`] but only accepts a top-level array.
pub fn extract_json_array(raw: &str) -> Option<Vec<Value>> {
    match extract_json(raw)? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

fn fenced_block(raw: &str) -> Option<&str> {
    let open = raw.find("```")?;
    let after_fence = &raw[open + 3..];
    // Skip an optional language tag on the fence line.
    let body_start = after_fence
        .find('\n')
        .filter(|nl| {
            after_fence[..*nl]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' ')
        })
        .map(|nl| nl + 1)
        .unwrap_or(0);
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}
