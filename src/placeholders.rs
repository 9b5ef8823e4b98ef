//! Placeholder Validator
//!
//! Pure check of `[[name]]` tokens against the whitelist snapshot. Names are
//! matched case-sensitively; a body with no placeholders at all is valid.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{ValidationOutcome, Violation, WhitelistSnapshot};

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[(.+?)\]\]").expect("placeholder regex"));

/// Distinct placeholder names used in `body`, in lexical order.
pub fn used_placeholders(body: &str) -> BTreeSet<String> {
    PLACEHOLDER_RE
        .captures_iter(body)
        .map(|c| c[1].to_string())
        .collect()
}

/// First byte offset of `[[name]]` in `body`, if present.
pub fn first_occurrence(body: &str, name: &str) -> Option<usize> {
    body.find(&format!("[[{name}]]"))
}

/// Validate that every placeholder used in `body` belongs to the whitelist.
pub fn validate(body: &str, whitelist: &WhitelistSnapshot) -> ValidationOutcome {
    let violations: Vec<Violation> = used_placeholders(body)
        .into_iter()
        .filter(|name| !whitelist.contains(name))
        .map(Violation::UnauthorizedPlaceholder)
        .collect();
    ValidationOutcome::failed(violations)
}
