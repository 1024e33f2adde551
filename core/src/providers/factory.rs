use crate::config::Config;
use crate::providers::{OllamaProvider, OpenAIProvider};
use crate::traits::Provider;
use anyhow::{Result, anyhow};
use std::sync::Arc;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

pub fn create_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let provider_name = config.provider.as_deref().unwrap_or("openai");

    match provider_name.to_lowercase().as_str() {
        "ollama" => {
            let mut provider = OllamaProvider::new()
                .with_model(config.model.clone())
                .with_max_tokens(config.max_tokens)
                .with_temperature(config.temperature);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        "openai" => {
            let api_key = resolve_api_key_with_fallback(
                &["OPENAI_API_KEY", "BASEBONE_OPENAI_API_KEY"],
                &config.api_key,
            )?;
            Ok(Arc::new(openai_compatible(api_key, config, None)))
        }
        "openrouter" => {
            let api_key = resolve_api_key_with_fallback(
                &["OPENROUTER_API_KEY", "BASEBONE_OPENROUTER_API_KEY"],
                &config.api_key,
            )?;
            Ok(Arc::new(openai_compatible(
                api_key,
                config,
                Some(OPENROUTER_BASE_URL),
            )))
        }
        _ => Err(anyhow!(
            "Unknown provider: {}. Available: openai, openrouter, ollama",
            provider_name
        )),
    }
}

fn openai_compatible(
    api_key: String,
    config: &Config,
    default_base_url: Option<&str>,
) -> OpenAIProvider {
    let mut provider = OpenAIProvider::new(api_key)
        .with_model(config.model.clone())
        .with_max_tokens(config.max_tokens)
        .with_temperature(config.temperature);
    if let Some(base_url) = config.base_url.as_deref().or(default_base_url) {
        provider = provider.with_base_url(base_url);
    }
    provider
}

fn resolve_api_key_with_fallback(env_vars: &[&str], config_key: &str) -> Result<String> {
    for var_name in env_vars {
        if let Ok(key) = resolve_api_key_from_env(var_name) {
            return Ok(key);
        }
    }
    if !config_key.is_empty() {
        Ok(config_key.to_string())
    } else {
        Err(anyhow!(
            "No API key found. Set {} or api_key in the config file",
            env_vars.join(" or ")
        ))
    }
}

fn resolve_api_key_from_env(var_name: &str) -> Result<String> {
    std::env::var(var_name)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| anyhow!("Environment variable {} not set", var_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_rejected() {
        let config = Config {
            provider: Some("carrier-pigeon".into()),
            ..Config::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown provider: carrier-pigeon"));
    }

    #[test]
    fn ollama_needs_no_key() {
        let config = Config {
            provider: Some("Ollama".into()),
            ..Config::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn config_key_is_used_when_env_is_missing() {
        assert_eq!(
            resolve_api_key_with_fallback(&["BASEBONE_TEST_UNSET_KEY_VAR"], "from-config")
                .unwrap(),
            "from-config"
        );
        assert!(resolve_api_key_with_fallback(&["BASEBONE_TEST_UNSET_KEY_VAR"], "").is_err());
    }
}
