//! # Placeholder Keys and Substitution
//!
//! The parser replaces every directive it extracts with an opaque
//! `{sdir-N}` marker. The key scheme has three properties the rest of the
//! engine relies on: keys are collision-free within a script (monotonic
//! counter), they match a single unambiguous regex, and the `sdir-` prefix
//! inside braces cannot occur in natural SQL source.
//!
//! [`substitute`] is the one text-rewriting routine in the engine. It walks
//! the text once, appends everything before each marker to the output,
//! and hands the matched key plus the output buffer to the caller's
//! callback, which decides what (if anything) to append in place of the
//! marker. There is no nested substitution: replacement text is never
//! rescanned.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{PLACEHOLDER_PATTERN, PLACEHOLDER_PREFIX};

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is a valid regex")
});

/// The regex matching one placeholder marker; capture group 1 is the key.
pub fn placeholder_regex() -> &'static Regex {
    &PLACEHOLDER_RE
}

/// Generates collision-free placeholder keys for a single parse.
#[derive(Debug, Default)]
pub(crate) struct KeyGenerator {
    next: u32,
}

impl KeyGenerator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_key(&mut self) -> String {
        let key = format!("{}{}", PLACEHOLDER_PREFIX, self.next);
        self.next += 1;
        key
    }
}

/// Single-pass marker substitution. For every match of `pattern` the
/// callback receives the captured key and the output buffer; after the walk
/// the trailing tail is appended and the full output returned.
pub fn substitute<E, F>(text: &str, pattern: &Regex, mut replace: F) -> Result<String, E>
where
    F: FnMut(&str, &mut String) -> Result<(), E>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in pattern.captures_iter(text) {
        let (full, key) = match (caps.get(0), caps.get(1)) {
            (Some(full), Some(key)) => (full, key),
            _ => continue,
        };
        out.push_str(&text[last..full.start()]);
        replace(key.as_str(), &mut out)?;
        last = full.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn replace_with(text: &str, f: impl Fn(&str) -> String) -> String {
        let result: Result<String, Infallible> = substitute(text, placeholder_regex(), |key, out| {
            out.push_str(&f(key));
            Ok(())
        });
        result.unwrap()
    }

    #[test]
    fn substitute_single_marker() {
        let out = replace_with("SELECT {sdir-0} FROM t", |_| "x".to_string());
        assert_eq!(out, "SELECT x FROM t");
    }

    #[test]
    fn substitute_passes_key_to_callback() {
        let out = replace_with("{sdir-3}{sdir-14}", |key| format!("<{key}>"));
        assert_eq!(out, "<sdir-3><sdir-14>");
    }

    #[test]
    fn substitute_no_markers_returns_text_unchanged() {
        let out = replace_with("SELECT 1", |_| unreachable!());
        assert_eq!(out, "SELECT 1");
    }

    #[test]
    fn substitute_keeps_tail_after_last_marker() {
        let out = replace_with("a {sdir-0} b", |_| String::new());
        assert_eq!(out, "a  b");
    }

    #[test]
    fn substitute_ignores_ordinary_braces() {
        let out = replace_with("doc#>'{a,b}' {sdir-1}", |_| "X".to_string());
        assert_eq!(out, "doc#>'{a,b}' X");
    }

    #[test]
    fn substitute_callback_error_propagates() {
        let result: Result<String, &str> =
            substitute("{sdir-0}", placeholder_regex(), |_, _| Err("boom"));
        assert_eq!(result.unwrap_err(), "boom");
    }

    #[test]
    fn substitute_does_not_rescan_replacements() {
        let out = replace_with("{sdir-0}", |_| "{sdir-1}".to_string());
        assert_eq!(out, "{sdir-1}");
    }

    #[test]
    fn key_generator_is_monotonic() {
        let mut keys = KeyGenerator::new();
        assert_eq!(keys.next_key(), "sdir-0");
        assert_eq!(keys.next_key(), "sdir-1");
        assert_eq!(keys.next_key(), "sdir-2");
    }
}
