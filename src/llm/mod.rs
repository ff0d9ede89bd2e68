pub mod openai;

/// Extract and validate JSON from text that might contain markdown code blocks.
///
/// Uses proper brace-depth tracking that respects string escaping,
/// then validates with serde_json before returning.
pub fn extract_json(text: &str) -> Option<String> {
    if let Some(json) = try_markdown_block(text, "```json") {
        return Some(json);
    }
    if let Some(json) = try_markdown_block(text, "```") {
        return Some(json);
    }
    try_raw_json_value(text, '{', '}').or_else(|| try_raw_json_value(text, '[', ']'))
}

/// Try to extract JSON from a markdown code block.
fn try_markdown_block(text: &str, marker: &str) -> Option<String> {
    let start = text.find(marker)?;
    let json_start = start + marker.len();
    let json_start = text[json_start..]
        .find('\n')
        .map(|n| json_start + n + 1)
        .unwrap_or(json_start);
    let end = text[json_start..].find("```")?;
    let candidate = text[json_start..json_start + end].trim();

    serde_json::from_str::<serde_json::Value>(candidate).ok()?;
    Some(candidate.to_string())
}

/// Extract a JSON object or array from raw text using depth tracking.
///
/// Respects string escaping so nested delimiters inside strings don't
/// cause incorrect extraction.
fn try_raw_json_value(text: &str, open: char, close: char) -> Option<String> {
    let start = text.find(open)?;
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if ch == '\\' && in_string {
            escape_next = true;
            continue;
        }
        if ch == '"' {
            in_string = !in_string;
            continue;
        }
        if !in_string {
            if ch == open {
                depth += 1;
            } else if ch == close {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..start + i + ch.len_utf8()];
                    if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                        return Some(candidate.to_string());
                    }
                    break;
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_raw_object() {
        let text = r#"some text {"key": "value"} more text"#;
        assert_eq!(extract_json(text).unwrap(), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_extract_json_raw_array() {
        let text = r#"Here you go: ["Crest Toothpaste", "Dyson V15 Vacuum"]"#;
        assert_eq!(
            extract_json(text).unwrap(),
            r#"["Crest Toothpaste", "Dyson V15 Vacuum"]"#
        );
    }

    #[test]
    fn test_extract_json_code_block() {
        let text = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json(text).unwrap(), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_extract_json_code_block_without_tag() {
        let text = "```\n[\"a\", \"b\"]\n```";
        assert_eq!(extract_json(text).unwrap(), "[\"a\", \"b\"]");
    }

    #[test]
    fn test_extract_json_nested_braces_in_string() {
        let text = r#"{"key": "value with {braces}", "num": 1}"#;
        let extracted = extract_json(text).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&extracted).is_ok());
    }

    #[test]
    fn test_extract_json_invalid_returns_none() {
        assert!(extract_json("no json here").is_none());
        assert!(extract_json("{incomplete").is_none());
    }
}
