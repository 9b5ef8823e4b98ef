//! Ollama Synthesizer
//!
//! Content synthesizer backed by a local Ollama chat endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::SynthesisError;
use crate::synthesizer::{strip_code_blocks, ContentSynthesizer, SynthesisInput};

/// Default Ollama model
const DEFAULT_MODEL: &str = "qwen3:0.6b";

/// Default Ollama endpoint
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama-backed content synthesizer
#[derive(Clone)]
pub struct OllamaSynthesizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaSynthesizer {
    /// Create a new synthesizer against the given Ollama base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model,
        }
    }

    /// Create with a specific model
    pub fn with_model(base_url: impl Into<String>, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.to_string(),
        }
    }

    /// Create from environment variables (`OLLAMA_BASE_URL`, `OLLAMA_MODEL`)
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    fn build_system_prompt(input: &SynthesisInput<'_>) -> String {
        let rules = include_str!("prompts/template_system.md");
        let mut prompt = String::from(rules);

        prompt.push_str("\n## Allowed parameters\n\n");
        if input.whitelist.is_empty() {
            prompt.push_str("(none - do not use any placeholders)\n");
        }
        for p in input.whitelist.descriptors() {
            prompt.push_str(&format!("- [[{}]]: {}\n", p.name, p.description));
        }

        if !input.corpus.is_empty() {
            prompt.push_str("\n## Reference templates\n");
            for t in input.corpus {
                prompt.push_str(&format!("\n### {} - {}\n\n{}\n", t.name, t.description, t.body));
            }
        }

        if let Some(footer) = input.footer {
            prompt.push_str("\n## Footer fragment (append verbatim, exactly once, at the end)\n\n");
            prompt.push_str(&footer.body);
            prompt.push('\n');
        }

        prompt
    }

    fn build_user_prompt(input: &SynthesisInput<'_>) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!("Description: {}\n", input.request.description));
        match input.request.existing_content.as_deref() {
            Some(content) if !content.trim().is_empty() => {
                prompt.push_str(&format!(
                    "\nExisting template content to refine:\n\n{}\n",
                    content
                ));
            }
            _ => prompt.push_str("\nGenerate a new template now.\n"),
        }
        prompt
    }

    async fn call_api(&self, system_prompt: &str, user_prompt: &str) -> Result<String, SynthesisError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "model": &self.model,
                "stream": false,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": user_prompt}
                ]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::new(format!(
                "Ollama API error {status}: {body}"
            )));
        }

        #[derive(Deserialize)]
        struct Message {
            content: String,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            message: Message,
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::with_source("invalid Ollama response", e))?;
        if api_response.message.content.is_empty() {
            return Err(SynthesisError::new("empty response from Ollama"));
        }
        Ok(api_response.message.content)
    }
}

#[async_trait]
impl ContentSynthesizer for OllamaSynthesizer {
    async fn run(&self, input: SynthesisInput<'_>) -> Result<String, SynthesisError> {
        let system_prompt = Self::build_system_prompt(&input);
        let user_prompt = Self::build_user_prompt(&input);
        debug!(model = %self.model, "calling Ollama chat endpoint");
        let response = self.call_api(&system_prompt, &user_prompt).await?;
        Ok(strip_code_blocks(&response))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        FooterFragment, GenerationRequest, ParameterDescriptor, WhitelistSnapshot,
    };

    #[test]
    fn system_prompt_lists_parameters_and_footer() {
        let request = GenerationRequest::new("Generate simple greeting template");
        let whitelist = WhitelistSnapshot::new(vec![ParameterDescriptor::new(
            "customer_id",
            "The customer identifier",
        )]);
        let footer = FooterFragment::new("<p>Member FDIC.</p>");
        let input = SynthesisInput {
            request: &request,
            whitelist: &whitelist,
            corpus: &[],
            footer: Some(&footer),
        };
        let prompt = OllamaSynthesizer::build_system_prompt(&input);
        assert!(prompt.contains("[[customer_id]]: The customer identifier"));
        assert!(prompt.contains("<p>Member FDIC.</p>"));
    }

    #[test]
    fn user_prompt_includes_existing_content_for_revisions() {
        let request = GenerationRequest::revision("Tighten the wording", "<h2>Old</h2>");
        let whitelist = WhitelistSnapshot::new(vec![]);
        let input = SynthesisInput {
            request: &request,
            whitelist: &whitelist,
            corpus: &[],
            footer: None,
        };
        let prompt = OllamaSynthesizer::build_user_prompt(&input);
        assert!(prompt.contains("Existing template content"));
        assert!(prompt.contains("<h2>Old</h2>"));
    }
}
