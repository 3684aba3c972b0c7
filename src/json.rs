use serde_json::Value;
use tracing::warn;

/// Parses a model reply as JSON, tolerating prose or code fences around it.
///
/// The whole reply is tried first, then the first balanced `{...}` object in it.
/// Returns `None` (with a warning) when neither parses.
pub fn extract_json(reply: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(reply.trim()) {
        return Some(value);
    }
    let parsed = balanced_fragment(reply, 0, b'{')
        .and_then(|(start, end)| serde_json::from_str(&reply[start..end]).ok());
    if parsed.is_none() {
        warn!("llm did not respond with proper json");
    }
    parsed
}

/// The first balanced `{...}` fragment of `reply`, or `""` when there is none.
pub fn clean_json_response(reply: &str) -> &str {
    match balanced_fragment(reply, 0, b'{') {
        Some((start, end)) => &reply[start..end],
        None => "",
    }
}

/// First JSON object or array at or after byte offset `from` that parses.
///
/// Returns the byte range alongside the value.
pub(crate) fn find_json_fragment(text: &str, from: usize) -> Option<(usize, usize, Value)> {
    json_fragments(text, from).next()
}

/// Every JSON object or array at or after `from` that parses, nested ones
/// included, ordered by where they open.
pub(crate) fn json_fragments(
    text: &str,
    from: usize,
) -> impl Iterator<Item = (usize, usize, Value)> + '_ {
    bracket_pairs(text, from)
        .into_iter()
        .filter_map(move |(start, end)| {
            serde_json::from_str::<Value>(&text[start..end])
                .ok()
                .map(|value| (start, end, value))
        })
}

/// Byte ranges of all matched `{...}` and `[...]` pairs, sorted by start.
///
/// Single pass over `text`. A closer drops any unmatched openers above its
/// partner; openers never closed are ignored. Quotes only open a string
/// literal inside a pair.
fn bracket_pairs(text: &str, from: usize) -> Vec<(usize, usize)> {
    let mut open: Vec<(usize, u8)> = Vec::new();
    // Open braces and open brackets on the stack.
    let mut counts = [0usize; 2];
    let mut pairs = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (index, byte) in text.bytes().enumerate().skip(from) {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' if !open.is_empty() => in_string = true,
            b'{' | b'[' => {
                counts[kind(byte)] += 1;
                open.push((index, byte));
            }
            b'}' | b']' => {
                let opener = if byte == b'}' { b'{' } else { b'[' };
                if counts[kind(opener)] == 0 {
                    continue;
                }
                while let Some((start, popped)) = open.pop() {
                    counts[kind(popped)] -= 1;
                    if popped == opener {
                        pairs.push((start, index + 1));
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    pairs.sort_unstable_by_key(|(start, _)| *start);
    pairs
}

fn kind(opener: u8) -> usize {
    usize::from(opener == b'[')
}

/// Byte range of the first balanced fragment opened by `open` at or after `from`.
///
/// Brackets inside string literals are ignored.
fn balanced_fragment(text: &str, from: usize, open: u8) -> Option<(usize, usize)> {
    let close = if open == b'{' { b'}' } else { b']' };
    let bytes = text.as_bytes();
    let start = bytes.get(from..)?.iter().position(|byte| *byte == open)? + from;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in bytes[start..].iter().enumerate() {
        if in_string {
            match *byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match *byte {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + offset + 1));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_json_parses() {
        assert_eq!(
            extract_json(r#" {"url": "https://toscrape.com"} "#),
            Some(json!({"url": "https://toscrape.com"}))
        );
    }

    #[test]
    fn json_inside_prose_and_fences() {
        let reply = "Sure! Here you go:\n```json\n{\"search_query\": \"rust {async} book\"}\n```\nAnything else?";
        assert_eq!(
            extract_json(reply),
            Some(json!({"search_query": "rust {async} book"}))
        );
    }

    #[test]
    fn no_json_returns_none() {
        assert_eq!(extract_json("I could not decide."), None);
        assert_eq!(extract_json("unbalanced { \"a\": 1"), None);
    }

    #[test]
    fn clean_json_response_keeps_first_object_only() {
        assert_eq!(
            clean_json_response("x {\"a\": {\"b\": 1}} y {\"c\": 2}"),
            "{\"a\": {\"b\": 1}}"
        );
        assert_eq!(clean_json_response("nothing here"), "");
    }

    #[test]
    fn fragment_search_skips_unparseable_brackets() {
        let text = "use add [with care] then [1, 2]";
        let (start, end, value) = find_json_fragment(text, 0).unwrap();
        assert_eq!(&text[start..end], "[1, 2]");
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn nested_fragments_come_after_their_parent() {
        let text = r#"x [{"a": 1}, {"b": 2}] {"c": [3]}"#;
        let found: Vec<Value> = json_fragments(text, 0).map(|(_, _, value)| value).collect();
        assert_eq!(
            found,
            vec![
                json!([{"a": 1}, {"b": 2}]),
                json!({"a": 1}),
                json!({"b": 2}),
                json!({"c": [3]}),
                json!([3]),
            ]
        );
    }

    #[test]
    fn mismatched_closers_do_not_hide_later_fragments() {
        let text = r#"{ [ } ] then {"ok": true}"#;
        let (start, _, value) = find_json_fragment(text, 0).unwrap();
        assert_eq!(value, json!({"ok": true}));
        assert_eq!(start, 13);
    }

    #[test]
    fn degenerate_brackets_scan_in_linear_time() {
        let n = 200_000;
        let text = format!("add {}{}{}", "{".repeat(n), "]".repeat(n), "[".repeat(n));
        let started = std::time::Instant::now();
        assert_eq!(find_json_fragment(&text, 0), None);
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }
}
