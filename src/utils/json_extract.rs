//! Pulls a JSON value out of free-form model output.
//!
//! Replies may be wrapped in Markdown fences, prefixed with chatter, or cut off
//! before the final closing brace. The scanner looks for the first `{` or `[`,
//! walks to its balanced end (string-aware), and hands that slice to serde.
//! If the text ends while only closing brackets are missing, they are appended;
//! any other damage is reported as a malformed response.

use crate::utils::error::{MenuError, Result};
use serde::de::DeserializeOwned;
use std::borrow::Cow;

/// How many opening brackets to try before giving up.
const MAX_CANDIDATES: usize = 16;

/// First balanced JSON object or array in `text`, if any.
pub fn extract_json(text: &str) -> Option<Cow<'_, str>> {
    candidates(text).next()
}

/// Deserializes the first JSON value in `text` that fits `T`.
pub fn parse_first_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let mut first_error = None;

    for candidate in candidates(text) {
        match serde_json::from_str::<T>(&candidate) {
            Ok(value) => return Ok(value),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    Err(match first_error {
        Some(e) => MenuError::malformed(format!("unexpected JSON shape: {}", e)),
        None => MenuError::malformed("no JSON value in response"),
    })
}

fn candidates(text: &str) -> impl Iterator<Item = Cow<'_, str>> {
    text.char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .filter_map(move |(start, _)| balanced_from(&text[start..]))
        .take(MAX_CANDIDATES)
}

fn balanced_from(s: &str) -> Option<Cow<'_, str>> {
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' => {
                if closers.pop() != Some(c) {
                    return None;
                }
                if closers.is_empty() {
                    return Some(Cow::Borrowed(&s[..i + c.len_utf8()]));
                }
            }
            _ => {}
        }
    }

    if in_string || closers.is_empty() {
        return None;
    }

    // 回應被截斷：補上缺少的右括號
    let mut completed = s.trim_end().trim_end_matches("```").trim_end().to_string();
    completed.extend(closers.iter().rev());
    Some(Cow::Owned(completed))
}
