//! Reasoning provider implementations for Nexus.
//!
//! All providers implement the `nexus_core::ReasoningProvider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use std::sync::Arc;

use nexus_core::error::ProviderError;
use nexus_core::provider::ReasoningProvider;

/// Build the configured provider.
///
/// Fails with [`ProviderError::NotConfigured`] when no API key is set.
pub fn build_from_config(
    config: &nexus_config::AppConfig,
) -> Result<Arc<dyn ReasoningProvider>, ProviderError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no API key; set OPENAI_API_KEY or api_key in config.toml".into(),
        )
    })?;

    tracing::info!(base_url = %config.base_url, model = %config.model, "Reasoning provider configured");
    Ok(Arc::new(OpenAiCompatProvider::new(
        "openai",
        &config.base_url,
        api_key,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_not_configured() {
        let config = nexus_config::AppConfig::default();
        assert!(matches!(
            build_from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn key_builds_provider() {
        let config = nexus_config::AppConfig {
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }
}
