//! Model configuration registry.
//!
//! An explicit, injected configuration provider: handlers resolve a model
//! reference (a name stored in the session record, never the raw secret)
//! through this registry, which owns the provider cache. Tests construct
//! pipelines with their own `Arc<dyn ModelProvider>` instead.

use std::sync::Arc;

use dashmap::DashMap;
use reqwest::Client;

use super::error::LlmError;
use super::openai::OpenAiProvider;
use super::provider::ModelProvider;
use crate::config::ModelConfig;

/// A model reference resolved to a usable provider.
#[derive(Clone)]
pub struct ResolvedModel {
    pub name: String,
    pub temperature: Option<f32>,
    pub provider: Arc<dyn ModelProvider>,
}

/// Registry mapping configured model names to shared providers.
#[derive(Clone)]
pub struct ModelRegistry {
    client: Client,
    configs: Arc<Vec<ModelConfig>>,
    /// Providers cached per base URL.
    cache: Arc<DashMap<String, Arc<dyn ModelProvider>>>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new(configs: Vec<ModelConfig>) -> Self {
        Self {
            client: Client::new(),
            configs: Arc::new(configs),
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Seed the cache so models at `base_url` resolve to the given
    /// provider instead of a fresh HTTP-backed one.
    pub fn seed(&self, base_url: impl Into<String>, provider: Arc<dyn ModelProvider>) {
        self.cache.insert(base_url.into(), provider);
    }

    /// Resolve a model reference, falling back to the first configured model.
    pub fn resolve(&self, name: Option<&str>) -> Result<ResolvedModel, LlmError> {
        let config = match name {
            Some(n) => self
                .configs
                .iter()
                .find(|c| c.name == n)
                .ok_or_else(|| LlmError::UnknownModel(n.to_string()))?,
            None => self
                .configs
                .first()
                .ok_or_else(|| LlmError::UnknownModel("<default>".to_string()))?,
        };

        let provider = self
            .cache
            .entry(config.base_url.clone())
            .or_insert_with(|| {
                Arc::new(OpenAiProvider::new(
                    self.client.clone(),
                    config.base_url.clone(),
                    config.api_key.clone(),
                )) as Arc<dyn ModelProvider>
            })
            .clone();

        Ok(ResolvedModel {
            name: config.name.clone(),
            temperature: config.temperature,
            provider,
        })
    }
}
