//! Input validation for free-text location queries.
//!
//! The validator is a pure, synchronous gate that runs before any cache
//! lookup or network call. Rejections never echo the raw input back.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{info, warn};
use unicode_normalization::UnicodeNormalization;

use crate::models::location::{Coordinates, LocationInput, LocationQuery};

/// Maximum length for full lookups.
pub const DEFAULT_MAX_LENGTH: usize = 100;
/// Maximum length for search-as-you-type queries.
pub const SEARCH_MAX_LENGTH: usize = 50;

/// Reasons a location query was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("location query is empty")]
    EmptyInput,

    #[error("location query is {actual} characters, limit is {max}")]
    TooLong { max: usize, actual: usize },

    #[error("location query matched an injection pattern ({0})")]
    InjectionSuspected(InjectionPattern),

    #[error("location query contains disallowed characters")]
    InvalidCharacters,

    #[error("coordinates out of range")]
    CoordinatesOutOfRange,

    #[error("no location supplied")]
    MissingLocation,

    #[error("both a place name and coordinates were supplied")]
    AmbiguousLocation,

    #[error("day count {days} outside {min}..={max}")]
    DaysOutOfRange { days: u32, min: u32, max: u32 },
}

/// Which family of injection idiom triggered a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPattern {
    SqlKeyword,
    BooleanTautology,
    StatementSeparator,
    TemplateOrShell,
    LiteralToken,
}

impl std::fmt::Display for InjectionPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InjectionPattern::SqlKeyword => "sql keyword",
            InjectionPattern::BooleanTautology => "boolean tautology",
            InjectionPattern::StatementSeparator => "statement separator",
            InjectionPattern::TemplateOrShell => "template or shell metacharacter",
            InjectionPattern::LiteralToken => "literal token",
        };
        f.write_str(name)
    }
}

static INJECTION_PATTERNS: LazyLock<Vec<(InjectionPattern, Regex)>> = LazyLock::new(|| {
    [
        (
            InjectionPattern::SqlKeyword,
            r"(?i)\b(select|insert|update|delete|drop|union|alter|create|truncate|exec|execute|grant|revoke|declare|merge)\b",
        ),
        (
            InjectionPattern::BooleanTautology,
            r#"(?i)\b(or|and)\b\s*['"]?\s*\w+\s*['"]?\s*=\s*['"]?\s*\w+"#,
        ),
        (InjectionPattern::StatementSeparator, r"(;|--|/\*|\*/|#)"),
        (
            InjectionPattern::TemplateOrShell,
            r"(\$\{|\$\(|`|\|\||&&|\{\{|\}\}|<%|%>)",
        ),
        (InjectionPattern::LiteralToken, r"(?i)\b(true|false|null|undefined)\b"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("injection pattern compiles")))
    .collect()
});

/// Basic Latin, Latin-1, Latin Extended-A/B, Latin Extended Additional and
/// full-width Latin (folded to ASCII by NFKC).
fn is_latin_letter(c: char) -> bool {
    c.is_alphabetic()
        && matches!(c,
            'A'..='Z'
            | 'a'..='z'
            | '\u{00C0}'..='\u{00D6}'
            | '\u{00D8}'..='\u{00F6}'
            | '\u{00F8}'..='\u{024F}'
            | '\u{1E00}'..='\u{1EFF}'
            | '\u{FF21}'..='\u{FF3A}'
            | '\u{FF41}'..='\u{FF5A}')
}

fn is_allowed_char(c: char) -> bool {
    is_latin_letter(c)
        || c.is_ascii_digit()
        || matches!(c, ' ' | '-' | '\'' | ',' | '.' | '(' | ')')
        // combining accents on decomposed input
        || ('\u{0300}'..='\u{036F}').contains(&c)
}

fn detect_injection(input: &str) -> Option<InjectionPattern> {
    INJECTION_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(input))
        .map(|(kind, _)| *kind)
}

/// Validates and normalizes location queries.
#[derive(Debug, Clone, Copy)]
pub struct InputValidator {
    max_length: usize,
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH)
    }
}

impl InputValidator {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// Validator preconfigured for search-as-you-type input.
    pub fn for_search() -> Self {
        Self::new(SEARCH_MAX_LENGTH)
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Validate a raw place name and return its NFKC-normalized form.
    pub fn validate(&self, raw: &str) -> Result<String, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyInput);
        }

        let length = trimmed.chars().count();
        if length > self.max_length {
            return Err(ValidationError::TooLong {
                max: self.max_length,
                actual: length,
            });
        }

        if let Some(pattern) = detect_injection(trimmed) {
            warn!(target: "input_audit", %pattern, length, "Rejected location query");
            return Err(ValidationError::InjectionSuspected(pattern));
        }

        if !trimmed.chars().all(is_allowed_char) {
            warn!(target: "input_audit", length, "Rejected location query with disallowed characters");
            return Err(ValidationError::InvalidCharacters);
        }

        let normalized: String = trimmed.nfkc().collect();
        if normalized != trimmed {
            // Compatibility forms (full-width letters, ligatures) can fold into
            // something the raw checks never saw.
            if let Some(pattern) = detect_injection(&normalized) {
                warn!(target: "input_audit", %pattern, "Rejected location query after normalization");
                return Err(ValidationError::InjectionSuspected(pattern));
            }
            if !normalized.chars().all(is_allowed_char) {
                return Err(ValidationError::InvalidCharacters);
            }
            info!(
                target: "input_audit",
                original = %trimmed,
                normalized = %normalized,
                "Location query changed by normalization"
            );
        }

        Ok(normalized)
    }

    /// Validate either representation of a location.
    pub fn validate_location(&self, input: &LocationInput) -> Result<LocationQuery, ValidationError> {
        match input {
            LocationInput::Name(raw) => self.validate(raw).map(LocationQuery::City),
            LocationInput::Coordinates { lat, lon } => {
                Coordinates::new(*lat, *lon).map(LocationQuery::Coordinates)
            }
        }
    }
}

/// Check a day-count parameter against an inclusive range.
pub fn validate_days(days: u32, min: u32, max: u32) -> Result<u32, ValidationError> {
    if (min..=max).contains(&days) {
        Ok(days)
    } else {
        Err(ValidationError::DaysOutOfRange { days, min, max })
    }
}
