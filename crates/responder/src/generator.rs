//! Reply generation on top of a text-generation provider.

use std::sync::Arc;

use banterbot_config::{GeminiConfig, ResponderConfig};
use banterbot_core::provider::{Provider, ProviderRequest};
use tracing::{debug, warn};

/// Prefix of the reply text produced when the backend fails.
pub const FALLBACK_PREFIX: &str = "(generation error)";

/// Wraps a provider with the persona template and failure fallback.
///
/// One attempt per call, no retries: whatever comes back (or the fallback)
/// is what gets posted.
pub struct ResponseGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    persona: String,
    context_header: String,
    directive: String,
}

impl ResponseGenerator {
    pub fn new(
        provider: Arc<dyn Provider>,
        responder: &ResponderConfig,
        gemini: &GeminiConfig,
    ) -> Self {
        Self {
            provider,
            model: gemini.model.clone(),
            temperature: gemini.temperature,
            max_tokens: Some(gemini.max_output_tokens),
            persona: responder.persona.clone(),
            context_header: responder.context_header.clone(),
            directive: responder.directive.clone(),
        }
    }

    /// The full prompt sent to the backend for `context`.
    pub fn compose_prompt(&self, context: &str) -> String {
        format!(
            "{}\n\n{}\n\n{}\n\n{}",
            self.persona, self.context_header, context, self.directive
        )
    }

    /// Generate a reply. Never fails: backend errors become fallback text.
    pub async fn generate(&self, context: &str) -> String {
        let request = ProviderRequest {
            model: self.model.clone(),
            prompt: self.compose_prompt(context),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        match self.provider.complete(request).await {
            Ok(response) => {
                debug!(
                    provider = self.provider.name(),
                    model = %response.model,
                    len = response.text.len(),
                    "Reply generated"
                );
                response.text.trim().to_string()
            }
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Generation failed, using fallback reply");
                format!("{FALLBACK_PREFIX} {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockProvider;
    use banterbot_core::error::ProviderError;

    fn generator(provider: Arc<MockProvider>) -> ResponseGenerator {
        ResponseGenerator::new(
            provider,
            &ResponderConfig::default(),
            &GeminiConfig::default(),
        )
    }

    #[tokio::test]
    async fn trims_backend_output() {
        let provider = Arc::new(MockProvider::replying("  \n zing! \n"));
        assert_eq!(generator(provider).generate("a: b").await, "zing!");
    }

    #[tokio::test]
    async fn empty_output_stays_empty() {
        let provider = Arc::new(MockProvider::replying("   "));
        assert_eq!(generator(provider).generate("a: b").await, "");
    }

    #[tokio::test]
    async fn backend_failure_becomes_fallback_text() {
        let provider = Arc::new(MockProvider::failing(ProviderError::Timeout(
            "deadline exceeded".into(),
        )));
        let reply = generator(provider.clone()).generate("a: b").await;

        assert!(!reply.is_empty());
        assert!(reply.starts_with(FALLBACK_PREFIX));
        assert!(reply.contains("deadline exceeded"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn prompt_wraps_context_in_template() {
        let provider = Arc::new(MockProvider::replying("ok"));
        let generator = generator(provider.clone());
        generator.generate("alice: hi\nbob: yo").await;

        let prompts = provider.prompts.lock().unwrap();
        let prompt = &prompts[0];
        let defaults = ResponderConfig::default();
        assert!(prompt.starts_with(&defaults.persona));
        assert!(prompt.contains("alice: hi\nbob: yo"));
        assert!(prompt.ends_with(&defaults.directive));
        assert_eq!(*prompt, generator.compose_prompt("alice: hi\nbob: yo"));
    }
}
