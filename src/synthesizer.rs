//! Content Synthesizer Contract
//!
//! The pluggable capability that turns validated inputs into a template body.
//! The engine invokes it exactly once per session and never retries; it is
//! the only suspension point subject to the caller's deadline.

use async_trait::async_trait;

use crate::error::SynthesisError;
use crate::model::{FooterFragment, GenerationRequest, TemplateDescriptor, WhitelistSnapshot};

/// Everything a synthesizer may see for one attempt. Snapshots are immutable
/// for the session lifetime.
#[derive(Debug, Clone)]
pub struct SynthesisInput<'a> {
    pub request: &'a GenerationRequest,
    pub whitelist: &'a WhitelistSnapshot,
    pub corpus: &'a [TemplateDescriptor],
    /// Present only when the protocol decided the footer must be fetched.
    pub footer: Option<&'a FooterFragment>,
}

/// Produces or revises a template body from the prepared inputs.
#[async_trait]
pub trait ContentSynthesizer: Send + Sync {
    async fn run(&self, input: SynthesisInput<'_>) -> Result<String, SynthesisError>;

    /// Implementation name for logging.
    fn name(&self) -> &str {
        "synthesizer"
    }
}

/// Strip a surrounding markdown code fence from an LLM response, if present.
pub fn strip_code_blocks(text: &str) -> String {
    let text = text.trim();
    if text.starts_with("```") {
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() > 2 {
            // Skip first line (```...) and last line (```)
            return lines[1..lines.len() - 1].join("\n");
        }
    }
    text.to_string()
}
