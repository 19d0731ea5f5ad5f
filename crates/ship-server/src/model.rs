//! Anthropic-backed implementations of the agent's model seams

use async_trait::async_trait;
use std::sync::Arc;

use ship_agent::{KeyValidator, ModelFactory};
use ship_ai::{AnthropicClient, ModelClient};

/// Builds per-request completion clients.
///
/// A user override key replaces the service key for the whole run; everything
/// else about the client stays the same.
pub struct AnthropicFactory {
    service_key: String,
    model: String,
    base_url: Option<String>,
}

impl AnthropicFactory {
    pub fn new(service_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            service_key: service_key.into(),
            model: model.into(),
            base_url: None,
        }
    }

    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn build(&self, api_key: &str) -> AnthropicClient {
        let client = AnthropicClient::new(api_key).with_model(&self.model);
        match self.base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        }
    }
}

impl ModelFactory for AnthropicFactory {
    fn client(&self, api_key_override: Option<&str>) -> Arc<dyn ModelClient> {
        let key = api_key_override.unwrap_or(&self.service_key);
        Arc::new(self.build(key))
    }
}

/// Validates user-supplied keys with a minimal live request.
pub struct AnthropicKeyValidator {
    model: String,
    base_url: Option<String>,
}

impl AnthropicKeyValidator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: None,
        }
    }

    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

#[async_trait]
impl KeyValidator for AnthropicKeyValidator {
    async fn validate(&self, api_key: &str) -> ship_ai::Result<()> {
        let client = AnthropicClient::new(api_key).with_model(&self.model);
        let client = match self.base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        };
        client.validate_key().await
    }
}
