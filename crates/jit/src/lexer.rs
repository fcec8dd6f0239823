//! Literal-scan preprocessing and tokenising.
//!
//! Before any interpretation or compilation, input text is cooked:
//!
//! 1. `( … )` block comments are erased;
//! 2. `s" text"` and `." text"` literal forms are rewritten to the literal
//!    word followed by a sentinel token `sPtr_<addr>`, where `<addr>` is the
//!    decimal address of the interned string's NUL-terminated bytes.
//!
//! The interpreter and compiler then see only well-formed
//! whitespace-separated tokens.

use fjord_core::StringInterner;
use regex::Regex;
use std::sync::LazyLock;

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(.*?\)").expect("comment regex"));

static LITERAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\S*")\s+([^"]*)""#).expect("literal regex"));

/// Strip comments and rewrite string literals to sentinel tokens.
pub fn scan_for_literals(text: &str, interner: &StringInterner) -> String {
    let without_comments = COMMENT_RE.replace_all(text, " ");
    let mut out = String::with_capacity(without_comments.len());
    let mut rest: &str = &without_comments;
    while let Some(caps) = LITERAL_RE.captures(rest) {
        let whole = caps.get(0).expect("match bounds");
        let prefix = caps.get(1).expect("literal prefix").as_str();
        let body = caps.get(2).expect("literal body").as_str();
        let idx = interner.intern(body);
        let addr = interner
            .address_of(idx)
            .expect("freshly interned string has an address") as u64;
        out.push_str(&rest[..whole.start()]);
        out.push_str(prefix);
        out.push_str(&format!(" sPtr_{} ", addr));
        rest = &rest[whole.end()..];
    }
    out.push_str(rest);
    out
}

/// Whitespace-delimited tokens as owned strings.
pub fn split(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Parse a signed decimal cell. Hex is deliberately not accepted here.
pub fn parse_number(token: &str) -> Option<i64> {
    token.parse::<i64>().ok()
}

pub fn is_number(token: &str) -> bool {
    parse_number(token).is_some()
}

/// Recover the address from a `sPtr_<addr>` sentinel.
pub fn strip_sentinel(token: &str) -> Option<u64> {
    token.strip_prefix("sPtr_")?.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_and_numbers() {
        assert_eq!(split("  16 16  + "), vec!["16", "16", "+"]);
        assert_eq!(parse_number("-42"), Some(-42));
        assert_eq!(parse_number("0x10"), None);
        assert!(is_number("1987"));
        assert!(!is_number("dup"));
    }

    #[test]
    fn test_comments_are_erased() {
        let interner = StringInterner::new();
        let cooked = scan_for_literals(": sq ( n -- n*n ) dup * ;", &interner);
        assert_eq!(split(&cooked), vec![":", "sq", "dup", "*", ";"]);
    }

    #[test]
    fn test_string_literal_becomes_sentinel() {
        let interner = StringInterner::new();
        let cooked = scan_for_literals(r#"s" hello world" drop"#, &interner);
        let tokens = split(&cooked);
        assert_eq!(tokens[0], "s\"");
        let addr = strip_sentinel(&tokens[1]).expect("sentinel token");
        assert_eq!(tokens[2], "drop");
        let back = unsafe { std::ffi::CStr::from_ptr(addr as *const std::os::raw::c_char) };
        assert_eq!(back.to_str().unwrap(), "hello world");
    }

    #[test]
    fn test_dot_quote_literal() {
        let interner = StringInterner::new();
        let cooked = scan_for_literals(r#": hi ." hey" ;"#, &interner);
        let tokens = split(&cooked);
        assert_eq!(tokens[2], ".\"");
        assert!(strip_sentinel(&tokens[3]).is_some());
    }

    #[test]
    fn test_sentinel_roundtrip() {
        assert_eq!(strip_sentinel("sPtr_12345"), Some(12345));
        assert_eq!(strip_sentinel("sPtr_x"), None);
        assert_eq!(strip_sentinel("nope"), None);
    }

    #[test]
    fn test_repeated_literal_reuses_interned_string() {
        let interner = StringInterner::new();
        let a = scan_for_literals(r#"s" twice""#, &interner);
        let b = scan_for_literals(r#"s" twice""#, &interner);
        assert_eq!(split(&a)[1], split(&b)[1]);
    }
}
