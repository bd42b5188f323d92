use std::sync::Arc;

use crate::config::types::ModelConfig;
use crate::error::{AgentpadError, Result};
use crate::providers::anthropic::AnthropicProvider;
use crate::providers::openai::OpenAIProvider;
use crate::providers::traits::AIProvider;

/// Build the provider backing one agent.
///
/// The provider name comes from configuration; the model and API key can
/// be overridden per agent by the script that created it. A key must be
/// present somewhere before any network call is attempted.
pub fn create_provider(
    config: &ModelConfig,
    resolved_api_key: &str,
    model_override: Option<&str>,
    key_override: Option<&str>,
) -> Result<Arc<dyn AIProvider>> {
    let api_key = key_override
        .filter(|k| !k.is_empty())
        .unwrap_or(resolved_api_key)
        .to_string();
    if api_key.is_empty() {
        return Err(AgentpadError::ApiKeyMissing {
            provider: config.provider.clone(),
        });
    }

    let model = model_override
        .filter(|m| !m.is_empty())
        .unwrap_or(&config.model)
        .to_string();

    let provider: Arc<dyn AIProvider> = match config.provider.as_str() {
        "anthropic" => Arc::new(AnthropicProvider::new(
            api_key,
            model,
            config.base_url.clone(),
        )),
        "openai" => Arc::new(OpenAIProvider::new(api_key, model, config.base_url.clone())),
        other => {
            return Err(AgentpadError::ProviderNotFound {
                provider: other.to_string(),
            });
        }
    };

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_config(provider: &str) -> ModelConfig {
        ModelConfig {
            provider: provider.to_string(),
            ..ModelConfig::default()
        }
    }

    // Result<Arc<dyn AIProvider>> has no Debug on the Ok side, so these
    // tests match instead of unwrap_err.
    fn expect_err(result: Result<Arc<dyn AIProvider>>) -> AgentpadError {
        match result {
            Ok(provider) => panic!("expected an error, got provider '{}'", provider.name()),
            Err(err) => err,
        }
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = expect_err(create_provider(&model_config("mistral"), "sk-key", None, None));
        assert!(matches!(
            err,
            AgentpadError::ProviderNotFound { ref provider } if provider == "mistral"
        ));
    }

    #[test]
    fn missing_key_fails_before_any_network_call() {
        let err = expect_err(create_provider(&model_config("openai"), "", None, None));
        assert!(matches!(err, AgentpadError::ApiKeyMissing { .. }));

        // an empty script override doesn't shadow the resolved key
        let provider =
            create_provider(&model_config("openai"), "sk-resolved", None, Some("")).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn both_known_providers_construct() {
        assert_eq!(
            create_provider(&model_config("openai"), "sk", None, None)
                .unwrap()
                .name(),
            "openai"
        );
        assert_eq!(
            create_provider(&model_config("anthropic"), "sk", None, None)
                .unwrap()
                .name(),
            "anthropic"
        );
    }
}
