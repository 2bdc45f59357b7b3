//! Content negotiation
//!
//! Parses `Accept`-style headers into weighted entries and decides whether,
//! and how strongly, the client accepts a candidate value. Matching depends
//! on the header:
//!
//! - `Accept`: media ranges, `type/*` and `*/*` wildcards
//! - `Accept-Language`: language-range prefix matching, `*` wildcard
//! - anything else: case-insensitive equality, `*` wildcard
//!
//! When several entries match a candidate, the most specific one decides its
//! weight, so `text/html;q=0, */*` rejects `text/html` but accepts others.

/// One entry of a negotiation header
#[derive(Debug, Clone, PartialEq)]
pub struct Preference {
    pub value: String,
    pub quality: f32,
}

/// How entries are compared against candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    MediaType,
    Language,
    Token,
}

impl Rule {
    /// Pick the matching rule for a header name
    pub fn for_header(name: &str) -> Self {
        if name.eq_ignore_ascii_case("Accept") {
            Rule::MediaType
        } else if name.eq_ignore_ascii_case("Accept-Language") {
            Rule::Language
        } else {
            Rule::Token
        }
    }

    /// Specificity of `range` matching `candidate`, higher is more specific
    fn specificity(&self, range: &str, candidate: &str) -> Option<u8> {
        match self {
            Rule::MediaType => media_specificity(range, candidate),
            Rule::Language => language_specificity(range, candidate),
            Rule::Token => {
                if range == "*" {
                    Some(0)
                } else if range.eq_ignore_ascii_case(candidate) {
                    Some(1)
                } else {
                    None
                }
            }
        }
    }
}

/// Split a negotiation header into weighted entries
///
/// A missing `q` parameter means 1.0; an unparseable one means 0.
pub fn parse_preferences(header: &str) -> Vec<Preference> {
    header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let value = parts.next()?.trim();
            if value.is_empty() {
                return None;
            }

            let quality = parts
                .filter_map(|p| p.split_once('='))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("q"))
                .map(|(_, q)| q.trim().parse::<f32>().unwrap_or(0.0).clamp(0.0, 1.0))
                .unwrap_or(1.0);

            Some(Preference {
                value: value.to_string(),
                quality,
            })
        })
        .collect()
}

/// The weight the client gives `candidate`, if any entry matches it
pub fn quality_of(preferences: &[Preference], rule: Rule, candidate: &str) -> Option<f32> {
    preferences
        .iter()
        .filter_map(|p| rule.specificity(&p.value, candidate).map(|s| (s, p.quality)))
        .max_by_key(|(specificity, _)| *specificity)
        .map(|(_, quality)| quality)
}

/// True iff at least one candidate matches an entry with non-zero weight
pub fn accepts(preferences: &[Preference], rule: Rule, candidates: &[&str]) -> bool {
    candidates
        .iter()
        .any(|c| quality_of(preferences, rule, c).is_some_and(|q| q > 0.0))
}

/// The acceptable candidate with the highest weight
///
/// Ties keep the order of `candidates`.
pub fn preferred<'a>(preferences: &[Preference], rule: Rule, candidates: &[&'a str]) -> Option<&'a str> {
    let mut best: Option<(&'a str, f32)> = None;
    for candidate in candidates {
        let Some(quality) = quality_of(preferences, rule, candidate) else {
            continue;
        };
        if quality > 0.0 && best.map_or(true, |(_, q)| quality > q) {
            best = Some((*candidate, quality));
        }
    }
    best.map(|(candidate, _)| candidate)
}

fn media_specificity(range: &str, candidate: &str) -> Option<u8> {
    let (range_type, range_sub) = range.split_once('/')?;
    let candidate = candidate.split(';').next().unwrap_or("").trim();
    let (cand_type, cand_sub) = candidate.split_once('/')?;

    match (range_type.trim(), range_sub.trim()) {
        ("*", "*") => Some(0),
        (t, "*") if t.eq_ignore_ascii_case(cand_type) => Some(1),
        (t, s) if t.eq_ignore_ascii_case(cand_type) && s.eq_ignore_ascii_case(cand_sub) => Some(2),
        _ => None,
    }
}

fn language_specificity(range: &str, candidate: &str) -> Option<u8> {
    if range == "*" {
        return Some(0);
    }
    let range = range.to_ascii_lowercase();
    let candidate = candidate.to_ascii_lowercase();
    if candidate == range || candidate.starts_with(&format!("{}-", range)) {
        let subtags = range.split('-').count();
        Some(u8::try_from(subtags).unwrap_or(u8::MAX))
    } else {
        None
    }
}
