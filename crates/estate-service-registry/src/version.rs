//! Semantic version range matching.
//!
//! Ranges use the conventional package-manager dialect, translated onto
//! [`semver::VersionReq`]:
//!
//! ```text
//! 1.2.3            exact           (=1.2.3)
//! 1.2 / 1.2.x      partial exact   (>=1.2.0, <1.3.0)
//! ^1.0.0  ~2.1     caret / tilde
//! >=1.0.0 <2.0.0   intersection    (whitespace separated)
//! 1.0.0 - 1.5.0    inclusive hyphen range
//! ^1 || ^3         union
//! * / x / ""       any version
//! ```
//!
//! A range that cannot be parsed matches nothing.

use semver::{Version, VersionReq};
use std::fmt;

const OPERATORS: [&str; 8] = [">=", "<=", "~>", ">", "<", "=", "^", "~"];

/// A parsed version range: a union of requirement sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Parses a range expression. Returns `None` if any part is invalid.
    pub fn parse(input: &str) -> Option<Self> {
        let alternatives = input
            .split("||")
            .map(|set| translate_set(set).and_then(|req| VersionReq::parse(&req).ok()))
            .collect::<Option<Vec<_>>>()?;

        Some(Self { alternatives })
    }

    /// True if `version` satisfies any alternative.
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Like [`matches`](Self::matches) for an unparsed version. Invalid
    /// versions never match.
    pub fn matches_str(&self, version: &str) -> bool {
        parse_version(version).is_some_and(|version| self.matches(&version))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.alternatives.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(" || "))
    }
}

/// Parses an exact semantic version, tolerating a leading `v`.
pub fn parse_version(input: &str) -> Option<Version> {
    let input = input.trim();
    let input = input.strip_prefix(['v', 'V']).unwrap_or(input);
    Version::parse(input).ok()
}

/// True if `version` satisfies `range`. Invalid input on either side is a miss.
pub fn satisfies(version: &str, range: &str) -> bool {
    VersionRange::parse(range).is_some_and(|range| range.matches_str(version))
}

fn translate_set(set: &str) -> Option<String> {
    let set = set.trim();
    if set.is_empty() {
        return Some("*".to_string());
    }

    if let Some((low, high)) = set.split_once(" - ") {
        let low = translate_comparator(&format!(">={}", low.trim()))?;
        let high = translate_comparator(&format!("<={}", high.trim()))?;
        return Some(format!("{}, {}", low, high));
    }

    let mut comparators = Vec::new();
    let mut pending_op = String::new();
    for token in set.split_whitespace() {
        if token.chars().all(|c| "<>=~^".contains(c)) {
            pending_op.push_str(token);
            continue;
        }
        let token = format!("{}{}", pending_op, token);
        pending_op.clear();
        comparators.push(translate_comparator(&token)?);
    }

    if !pending_op.is_empty() || comparators.is_empty() {
        return None;
    }

    Some(comparators.join(", "))
}

fn translate_comparator(token: &str) -> Option<String> {
    let (op, rest) = split_operator(token.trim());
    let rest = rest.strip_prefix(['v', 'V']).unwrap_or(rest);

    let core_end = rest.find(['-', '+']).unwrap_or(rest.len());
    let (core, suffix) = rest.split_at(core_end);

    let mut parts: Vec<&str> = core.split('.').collect();
    if let Some(first_wildcard) = parts.iter().position(|p| is_wildcard(p)) {
        if !suffix.is_empty() {
            return None;
        }
        parts.truncate(first_wildcard);
    }

    if parts.is_empty() {
        return Some("*".to_string());
    }
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    // Bare versions mean "this version" (or this partial version line), not caret.
    let op = match op {
        "" => "=",
        "~>" => "~",
        other => other,
    };

    Some(format!("{}{}{}", op, parts.join("."), suffix))
}

fn split_operator(token: &str) -> (&str, &str) {
    for op in OPERATORS {
        if let Some(rest) = token.strip_prefix(op) {
            return (op, rest.trim_start());
        }
    }
    ("", token)
}

fn is_wildcard(part: &str) -> bool {
    matches!(part, "*" | "x" | "X")
}
