//! Best-effort recovery of JSON from LLM text output.
//!
//! Models frequently wrap JSON in markdown fences, add comments, leave
//! trailing commas, or forget to quote keys. The pipeline tries direct
//! parsing first, then progressively more aggressive cleanup, and finally
//! extraction of the first balanced `{...}` block. Exhaustion yields
//! [`AnalyzerError::Malformed`] — callers fall back to a conservative
//! verdict, never a crash.

use intentgate_core::AnalyzerError;
use regex_lite::Regex;

/// Parse an LLM response into a JSON object, repairing common damage.
pub fn parse_json_output(raw: &str) -> Result<serde_json::Value, AnalyzerError> {
    if let Ok(value) = serde_json::from_str(raw) {
        return Ok(value);
    }

    let mut cleaned = raw.trim().to_string();

    if cleaned.starts_with("```") {
        cleaned = strip_code_fences(&cleaned);
        if let Ok(value) = serde_json::from_str(&cleaned) {
            return Ok(value);
        }
    }

    // Comment stripping is lossy inside string values, so only reach for it
    // once plain parsing has failed.
    if let Ok(value) = serde_json::from_str(&strip_comments(&cleaned)) {
        return Ok(value);
    }

    // Try the first balanced object in the text, with increasingly
    // aggressive fixes applied.
    if let Some(block) = extract_object(&cleaned) {
        if let Ok(value) = serde_json::from_str(&block) {
            return Ok(value);
        }
        let repaired = quote_bare_keys(&remove_trailing_commas(&strip_comments(&block)));
        if let Ok(value) = serde_json::from_str(&repaired) {
            return Ok(value);
        }
    }

    let preview: String = raw.chars().take(200).collect();
    Err(AnalyzerError::Malformed(format!(
        "no parseable JSON object in analyzer output: {preview}"
    )))
}

/// Strip a leading/trailing markdown code fence (```json ... ```).
fn strip_code_fences(text: &str) -> String {
    let re = Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap();
    match re.captures(text) {
        Some(caps) => caps[1].trim().to_string(),
        None => text.trim_matches('`').trim().to_string(),
    }
}

/// Remove `// line` and `/* block */` comments.
fn strip_comments(text: &str) -> String {
    let line = Regex::new(r"//[^\n]*").unwrap();
    let block = Regex::new(r"(?s)/\*.*?\*/").unwrap();
    block.replace_all(&line.replace_all(text, ""), "").to_string()
}

/// Remove trailing commas before `}` or `]`.
fn remove_trailing_commas(text: &str) -> String {
    let obj = Regex::new(r",\s*\}").unwrap();
    let arr = Regex::new(r",\s*\]").unwrap();
    arr.replace_all(&obj.replace_all(text, "}"), "]").to_string()
}

/// Quote bare object keys: `{status: ...}` → `{"status": ...}`.
fn quote_bare_keys(text: &str) -> String {
    let re = Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:"#).unwrap();
    re.replace_all(text, "$1\"$2\":").to_string()
}

/// Extract the first balanced `{...}` block, respecting string literals.
fn extract_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
