//! Error handling for the template generation engine
//!
//! Typed failures using thiserror so callers can enumerate outcomes instead
//! of parsing messages. Every provider or validator failure surfaces as one
//! of these; the engine never degrades silently and never retries.

use thiserror::Error;

use crate::model::Violation;

/// Failure raised by a read-only data provider (catalog, corpus, footer).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Self {
            message: format!("{}: {}", message.into(), source),
        }
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        ProviderError::with_source("I/O error", err)
    }
}

/// Failure raised by the content synthesizer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SynthesisError {
    pub message: String,
}

impl SynthesisError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Self {
            message: format!("{}: {}", message.into(), source),
        }
    }
}

impl From<reqwest::Error> for SynthesisError {
    fn from(err: reqwest::Error) -> Self {
        SynthesisError::with_source("HTTP request failed", err)
    }
}

/// Terminal outcome of a failed generation attempt.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("provider '{provider}' unavailable: {source}")]
    ProviderUnavailable {
        provider: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("content synthesis failed: {0}")]
    SynthesisFailed(#[from] SynthesisError),

    #[error("content synthesis cancelled before completion")]
    SynthesisCancelled,

    #[error("validation failed with {} violation(s)", .0.len())]
    Validation(Vec<Violation>),

    /// Defensive: the engine attempted to fetch or append the footer more
    /// than once in a single session. Unreachable if the protocol state
    /// machine is correct.
    #[error("footer invariant broken: {0}")]
    FooterInvariantBroken(String),

    /// Defensive: internal state machine misuse (state revisited or skipped,
    /// prerequisite provider called twice).
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl GenerationError {
    pub fn provider(provider: &'static str, source: ProviderError) -> Self {
        GenerationError::ProviderUnavailable { provider, source }
    }

    /// Violations carried by a `Validation` failure, empty otherwise.
    pub fn violations(&self) -> &[Violation] {
        match self {
            GenerationError::Validation(v) => v,
            _ => &[],
        }
    }
}
