//! Core Data Model
//!
//! Request, provider descriptor, and outcome types shared across the engine.
//! All snapshots taken at session open are immutable for the lifetime of the
//! attempt, even if the backing providers change mid-flight.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One content-generation attempt, supplied once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// What the template should say.
    pub description: String,
    /// Existing template body when refining; `None` (or empty) for a new template.
    pub existing_content: Option<String>,
}

impl GenerationRequest {
    /// Request a brand-new template from a description.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            existing_content: None,
        }
    }

    /// Request a revision of an existing template body.
    pub fn revision(description: impl Into<String>, existing_content: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            existing_content: Some(existing_content.into()),
        }
    }

    /// A revision attempt carries non-empty existing content.
    pub fn is_revision(&self) -> bool {
        self.existing_content
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false)
    }
}

/// A named placeholder the catalog allows inside templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub description: String,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A reference template the synthesizer may imitate for tone and structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    pub name: String,
    pub description: String,
    pub body: String,
}

/// The immutable closing fragment. Equality is byte-exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FooterFragment {
    pub body: String,
}

impl FooterFragment {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

/// The set of placeholder names allowed for one attempt, captured at session
/// open. Names are unique (first descriptor wins) and matched case-sensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistSnapshot {
    descriptors: Vec<ParameterDescriptor>,
    names: HashSet<String>,
}

impl WhitelistSnapshot {
    pub fn new(descriptors: Vec<ParameterDescriptor>) -> Self {
        let mut names = HashSet::new();
        let mut unique = Vec::with_capacity(descriptors.len());
        for d in descriptors {
            if names.insert(d.name.clone()) {
                unique.push(d);
            }
        }
        Self {
            descriptors: unique,
            names,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn descriptors(&self) -> &[ParameterDescriptor] {
        &self.descriptors
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }
}

/// A single rule breach found by one of the validators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Violation {
    #[error("placeholder [[{0}]] is not in the parameter whitelist")]
    UnauthorizedPlaceholder(String),
    #[error("new template does not start with a heading")]
    MissingTitle,
    #[error("header field [[{0}]] is missing")]
    MissingHeaderField(String),
    #[error("header field [[{0}]] appears out of order")]
    HeaderOrderViolation(String),
    #[error("closing block is missing")]
    MissingClosing,
    #[error("required footer is missing")]
    MissingFooter,
    #[error("footer appears more than once")]
    DuplicateFooter,
    #[error("footer content does not match the provided fragment byte-for-byte")]
    FooterMismatch,
    #[error("footer is not the final section of the template")]
    FooterMisplaced,
}

/// Aggregate verdict from a validator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub violations: Vec<Violation>,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    pub fn failed(violations: Vec<Violation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    /// Fold another outcome into this one; the merge passes only if both did.
    pub fn merge(mut self, other: ValidationOutcome) -> Self {
        self.passed = self.passed && other.passed;
        self.violations.extend(other.violations);
        self
    }
}

/// A validated, finalized template body. Never constructed for a body that
/// failed validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizedDocument {
    pub body: String,
    pub session_id: Uuid,
    /// True when the engine appended the footer as a post-processing step.
    pub footer_appended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_existing_content_is_not_a_revision() {
        assert!(!GenerationRequest::new("greeting").is_revision());
        assert!(!GenerationRequest::revision("greeting", "   ").is_revision());
        assert!(GenerationRequest::revision("greeting", "<p>Hi</p>").is_revision());
    }

    #[test]
    fn whitelist_deduplicates_by_name() {
        let snapshot = WhitelistSnapshot::new(vec![
            ParameterDescriptor::new("customer_id", "The customer identifier"),
            ParameterDescriptor::new("customer_id", "Duplicate entry"),
            ParameterDescriptor::new("bank_name", "The bank display name"),
        ]);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("customer_id"));
        assert!(!snapshot.contains("Customer_Id"));
    }

    #[test]
    fn merged_outcome_fails_if_either_fails() {
        let merged = ValidationOutcome::ok().merge(ValidationOutcome::failed(vec![
            Violation::MissingClosing,
        ]));
        assert!(!merged.passed);
        assert_eq!(merged.violations, vec![Violation::MissingClosing]);
    }
}
