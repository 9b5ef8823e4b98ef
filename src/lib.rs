//! Protocol-enforced LLM generation of message templates
//!
//! This crate turns a content-generation request into a validated,
//! policy-compliant HTML message template. The correctness contract lives in
//! deterministic code, not in prompt text: a per-request session walks a
//! fixed state machine, read-only providers are snapshotted once, the footer
//! decision is made idempotently, and the synthesized body is checked against
//! a placeholder whitelist and a structural shape contract before anything is
//! returned.
//!
//! ## Architecture
//!
//! ```text
//! GenerationRequest → Session open → Catalog + Corpus snapshot
//!     → Footer decision → Content synthesis (LLM) → Validators → Document
//! ```
//!
//! The synthesizer is pluggable; an Ollama-backed implementation ships in
//! [`ollama_client`]. Set `OLLAMA_BASE_URL` / `OLLAMA_MODEL` to point it at a
//! running instance.

// Provider and synthesizer abstractions
pub mod ollama_client;
pub mod providers;
pub mod synthesizer;

// Core protocol modules
pub mod engine;
pub mod error;
pub mod model;
pub mod placeholders;
pub mod session;
pub mod structure;

// Re-exports for convenience
pub use engine::TemplateEngine;
pub use error::{GenerationError, ProviderError, SynthesisError};
pub use model::{
    FinalizedDocument, FooterFragment, GenerationRequest, ParameterDescriptor,
    TemplateDescriptor, ValidationOutcome, Violation, WhitelistSnapshot,
};
pub use providers::{FooterProvider, ParameterCatalogProvider, TemplateCorpusProvider};
pub use session::{SessionManager, SessionState};
pub use structure::{FooterMarker, StructuralPolicy};
pub use synthesizer::{ContentSynthesizer, SynthesisInput};
