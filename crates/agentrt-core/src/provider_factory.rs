// Provider factory: owns named LlmProvider instances built at startup.
// Lookup by unknown name falls back to a default with a warning, mirroring
// the teacher's create_provider/create_default_provider split.

use crate::llm::LlmProvider;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Default)]
pub struct ProviderFactory {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    default_name: Option<String>,
}

impl ProviderFactory {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            default_name: None,
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        let name = name.into();
        if self.default_name.is_none() || name == "openai" {
            self.default_name = Some(name.clone());
        }
        self.providers.insert(name, provider);
    }

    /// Resolve by name; unknown names fall back to the default provider
    /// ("openai" if present, else any one registered provider) with a
    /// warning, rather than failing the call.
    pub fn get(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        if let Some(provider) = self.providers.get(name) {
            return Some(provider.clone());
        }
        if !self.providers.is_empty() {
            warn!(requested = name, "unknown LLM provider, falling back to default");
        }
        self.default_name
            .as_ref()
            .and_then(|default| self.providers.get(default))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::llm::{ChatRequest, ChatResponse, ChatStream, ChatUsage};
    use async_trait::async_trait;

    struct StubProvider(&'static str);

    #[async_trait]
    impl LlmProvider for StubProvider {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse {
                id: self.0.to_string(),
                created: 0,
                model: self.0.to_string(),
                choices: vec![],
                usage: ChatUsage::default(),
                iteration_limit_reached: false,
            })
        }
        async fn chat_stream(&self, _request: ChatRequest) -> Result<ChatStream> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn unknown_provider_falls_back_to_openai_default() {
        let mut factory = ProviderFactory::new();
        factory.register("openai", Arc::new(StubProvider("openai")));
        factory.register("anthropic", Arc::new(StubProvider("anthropic")));

        let fallback = factory.get("nonexistent").unwrap();
        let response = fallback
            .chat(ChatRequest::default())
            .await
            .unwrap();
        assert_eq!(response.id, "openai");
    }

    #[tokio::test]
    async fn known_provider_is_returned_directly() {
        let mut factory = ProviderFactory::new();
        factory.register("anthropic", Arc::new(StubProvider("anthropic")));
        let provider = factory.get("anthropic").unwrap();
        let response = provider.chat(ChatRequest::default()).await.unwrap();
        assert_eq!(response.id, "anthropic");
    }
}
