//! Structural Validator
//!
//! Pure check of document shape: title heading, ordered header block,
//! signature-style closing, and footer placement. Checks run in precedence
//! order (title, header, closing, footer) and accumulate every violation
//! found rather than stopping at the first.

use serde::{Deserialize, Serialize};

use crate::model::{FooterFragment, ValidationOutcome, Violation, WhitelistSnapshot};
use crate::placeholders::first_occurrence;

/// The standard identifying placeholders, in the exact relative order they
/// must appear near the top of a template. Fields absent from the whitelist
/// snapshot are skipped, never required.
pub const HEADER_FIELDS: [&str; 5] = [
    "customer_id",
    "account_number",
    "branch_name",
    "branch_id",
    "message_creation_date",
];

/// How the engine recognizes that existing content already carries the
/// footer, without re-fetching it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FooterMarker {
    /// A designated sentinel substring embedded in the fragment.
    Sentinel(String),
    /// The exact fragment body, known to the caller up front.
    KnownBody(String),
}

impl FooterMarker {
    pub fn is_present(&self, content: &str) -> bool {
        match self {
            FooterMarker::Sentinel(s) => !s.is_empty() && content.contains(s.as_str()),
            FooterMarker::KnownBody(body) => {
                let body = body.trim();
                !body.is_empty() && content.contains(body)
            }
        }
    }
}

/// Shape contract for generated templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralPolicy {
    /// Ordered header placeholders; intersected with the whitelist snapshot.
    pub header_fields: Vec<String>,
    /// Substring marking the signature-style closing block.
    pub closing_marker: String,
    /// Detection rule for a footer already present in existing content.
    pub footer_marker: FooterMarker,
}

impl Default for StructuralPolicy {
    fn default() -> Self {
        Self {
            header_fields: HEADER_FIELDS.iter().map(|f| f.to_string()).collect(),
            closing_marker: "Sincerely".to_string(),
            footer_marker: FooterMarker::Sentinel("<!-- message-footer -->".to_string()),
        }
    }
}

/// Validate document shape. `footer` is the fetched fragment when this
/// session required one; `None` means no footer checks apply.
pub fn validate(
    body: &str,
    is_new_attempt: bool,
    whitelist: &WhitelistSnapshot,
    footer: Option<&FooterFragment>,
    policy: &StructuralPolicy,
) -> ValidationOutcome {
    let mut violations = Vec::new();

    if is_new_attempt && !starts_with_heading(body) {
        violations.push(Violation::MissingTitle);
    }

    check_header_block(body, whitelist, policy, &mut violations);

    let closing_pos = body.find(&policy.closing_marker);
    if closing_pos.is_none() {
        violations.push(Violation::MissingClosing);
    }

    if let Some(footer) = footer {
        check_footer(body, footer, closing_pos, policy, &mut violations);
    }

    ValidationOutcome::failed(violations)
}

fn starts_with_heading(body: &str) -> bool {
    let head = body.trim_start();
    head.starts_with("<h2") || head.starts_with("<h3")
}

fn check_header_block(
    body: &str,
    whitelist: &WhitelistSnapshot,
    policy: &StructuralPolicy,
    violations: &mut Vec<Violation>,
) {
    let mut last_pos = 0usize;
    let required = policy
        .header_fields
        .iter()
        .filter(|f| whitelist.contains(f.as_str()));
    for field in required {
        match first_occurrence(body, field) {
            None => violations.push(Violation::MissingHeaderField(field.clone())),
            Some(pos) if pos < last_pos => {
                violations.push(Violation::HeaderOrderViolation(field.clone()));
            }
            Some(pos) => last_pos = pos,
        }
    }
}

fn check_footer(
    body: &str,
    footer: &FooterFragment,
    closing_pos: Option<usize>,
    policy: &StructuralPolicy,
    violations: &mut Vec<Violation>,
) {
    let fragment = footer.body.trim_end();
    if fragment.is_empty() {
        return;
    }

    match count_occurrences(body, fragment) {
        0 => {
            // Something footer-like without a byte-exact body is a mismatch,
            // not an absence.
            if policy.footer_marker.is_present(body) {
                violations.push(Violation::FooterMismatch);
            } else {
                violations.push(Violation::MissingFooter);
            }
        }
        1 => {
            let pos = body.find(fragment).expect("counted occurrence");
            let tail_ok = body[pos + fragment.len()..].trim().is_empty();
            let after_closing = closing_pos.map(|c| c < pos).unwrap_or(true);
            if !tail_ok || !after_closing {
                violations.push(Violation::FooterMisplaced);
            }
        }
        _ => violations.push(Violation::DuplicateFooter),
    }
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    let mut count = 0;
    let mut rest = haystack;
    while let Some(pos) = rest.find(needle) {
        count += 1;
        rest = &rest[pos + needle.len()..];
    }
    count
}
