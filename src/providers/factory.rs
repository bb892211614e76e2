use crate::config::Backend;
use crate::core::error::ChatError;
use crate::providers::{
    LLMProvider, anthropic::AnthropicProvider, openai_compatible::OpenAICompatibleProvider,
};
use std::collections::HashMap;
use std::sync::Arc;

pub struct ProviderFactory {
    providers: HashMap<Backend, Arc<dyn LLMProvider>>,
}

impl ProviderFactory {
    pub fn new() -> Self {
        let mut factory = Self {
            providers: HashMap::new(),
        };
        factory.register(OpenAICompatibleProvider);
        factory.register(AnthropicProvider);
        factory
    }

    pub fn register<P: LLMProvider + 'static>(&mut self, provider: P) {
        self.providers.insert(provider.backend(), Arc::new(provider));
    }

    pub fn create(&self, backend: &Backend) -> Result<Arc<dyn LLMProvider>, ChatError> {
        self.providers
            .get(backend)
            .cloned()
            .ok_or_else(|| ChatError::Config(format!("Backend not available: {}", backend)))
    }
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}
