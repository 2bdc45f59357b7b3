//! Cookie header decoding
//!
//! Request cookies arrive as `name=value` pairs separated by `;` in one or
//! more `Cookie` headers. Values are kept verbatim apart from one level of
//! surrounding double quotes; no percent-decoding is applied.

use super::headers::unquote;
use super::Headers;
use std::collections::BTreeMap;

/// Decode every `Cookie` header into a name to value map
///
/// The first occurrence of a name wins, matching how browsers order the
/// most specific cookie first.
pub fn parse_cookies(headers: &Headers) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();

    for header in headers.get_all("Cookie") {
        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            cookies
                .entry(name.to_string())
                .or_insert_with(|| unquote(value.trim()).to_string());
        }
    }

    cookies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(values: &[&str]) -> Headers {
        values
            .iter()
            .map(|v| ("Cookie".to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_pairs() {
        let cookies = parse_cookies(&headers(&["session=abc123; theme=dark"]));
        assert_eq!(cookies.get("session").map(String::as_str), Some("abc123"));
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
        assert_eq!(cookies.len(), 2);
    }

    #[test]
    fn test_quoted_and_padded_values() {
        let cookies = parse_cookies(&headers(&["  token = \"a b\" ;flag=1"]));
        assert_eq!(cookies.get("token").map(String::as_str), Some("a b"));
        assert_eq!(cookies.get("flag").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_first_occurrence_wins_across_headers() {
        let cookies = parse_cookies(&headers(&["id=first", "id=second; other=x"]));
        assert_eq!(cookies.get("id").map(String::as_str), Some("first"));
        assert_eq!(cookies.get("other").map(String::as_str), Some("x"));
    }

    #[test]
    fn test_malformed_pairs_are_skipped() {
        let cookies = parse_cookies(&headers(&["novalue; =empty; ok=yes; eq=a=b"]));
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies.get("eq").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn test_no_cookie_header() {
        assert!(parse_cookies(&Headers::new()).is_empty());
    }
}
