//! Pulls a JSON object out of free-form completer text. Tried in order;
//! first match wins.

use regex::Regex;

/// A fenced code block (```json … ``` or ``` … ```) whose inner text begins
/// with `{`.
fn fenced_block(content: &str) -> Option<String> {
    let mut search_from = 0;
    while let Some(start_rel) = content[search_from..].find("```") {
        let fence_start = search_from + start_rel;
        let after_fence = fence_start + 3;
        let rest = &content[after_fence..];
        let body_start = if let Some(stripped) = rest.strip_prefix("json") {
            after_fence + (rest.len() - stripped.len())
        } else if let Some(stripped) = rest.strip_prefix("JSON") {
            after_fence + (rest.len() - stripped.len())
        } else {
            after_fence
        };
        let body_start = skip_leading_newline(content, body_start);
        if let Some(end_rel) = content[body_start..].find("```") {
            let body = &content[body_start..body_start + end_rel];
            let trimmed = body.trim_start();
            if trimmed.starts_with('{') {
                return Some(trimmed.trim_end().to_string());
            }
            search_from = body_start + end_rel + 3;
        } else {
            return None;
        }
    }
    None
}

fn skip_leading_newline(content: &str, idx: usize) -> usize {
    if content[idx..].starts_with('\n') {
        idx + 1
    } else if content[idx..].starts_with("\r\n") {
        idx + 2
    } else {
        idx
    }
}

/// Balanced-brace scan starting at the first `{`, honoring string literals
/// and escapes.
fn balanced_braces(content: &str) -> Option<String> {
    let bytes = content.as_bytes();
    let start = content.find('{')?;
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(content[start..=i].to_string());
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// The first `{...}` substring matched by a greedy regex.
fn greedy_regex(content: &str) -> Option<String> {
    let re = Regex::new(r"(?s)\{.*\}").ok()?;
    re.find(content).map(|m| m.as_str().to_string())
}

/// Runs the four-stage extraction strategy and returns the best candidate
/// JSON text. Never fails; the last stage always returns something.
pub fn extract_json_candidate(content: &str) -> String {
    if let Some(found) = fenced_block(content) {
        return found;
    }
    if let Some(found) = balanced_braces(content) {
        return found;
    }
    if let Some(found) = greedy_regex(content) {
        return found;
    }
    content.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_fenced_json_block() {
        let content = "here you go\n```json\n{\"a\": 1}\n```\ntrailing text";
        assert_eq!(extract_json_candidate(content), "{\"a\": 1}");
    }

    #[test]
    fn falls_back_to_balanced_braces_without_fence() {
        let content = "sure, {\"a\": {\"b\": 2}} is the plan";
        assert_eq!(extract_json_candidate(content), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn balanced_scan_honors_braces_inside_strings() {
        let content = "{\"note\": \"a } b\", \"n\": 1}";
        assert_eq!(extract_json_candidate(content), content);
    }

    #[test]
    fn falls_back_to_trimmed_original_when_no_braces() {
        let content = "  no json here  ";
        assert_eq!(extract_json_candidate(content), "no json here");
    }
}
