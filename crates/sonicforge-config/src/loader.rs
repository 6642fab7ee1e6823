use std::path::Path;

use crate::{Config, MAX_NUMBERED_LIMIT};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or [`Config::parse`] fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Expand `{{ env.VAR }}` placeholders, deserialize and validate
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, TOML parsing, or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no model is configured, a model points at an
    /// unknown provider or a malformed endpoint, or a numeric setting is
    /// out of range
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_models()?;
        self.validate_providers()?;
        self.validate_telemetry()?;
        Ok(())
    }

    fn validate_models(&self) -> anyhow::Result<()> {
        let generation = &self.generation;

        if generation.models.is_empty() {
            anyhow::bail!("at least one model must be configured under [generation.models]");
        }

        for (id, model) in &generation.models {
            if !generation.providers.contains_key(&model.provider) {
                anyhow::bail!("model '{id}' references unknown provider '{}'", model.provider);
            }

            model
                .resolved_endpoint()
                .map_err(|e| anyhow::anyhow!("model '{id}': {e}"))?;
        }

        generation.attempt_timeout()?;

        Ok(())
    }

    fn validate_providers(&self) -> anyhow::Result<()> {
        for (name, provider) in &self.generation.providers {
            if provider.retry_policy.is_some() && !provider.is_pooled() {
                anyhow::bail!(
                    "provider '{name}': retry_policy only applies to pooled credentials; \
                     single-key and public providers never retry"
                );
            }

            if let Some(ref credentials) = provider.credentials
                && credentials.max_numbered > MAX_NUMBERED_LIMIT
            {
                anyhow::bail!(
                    "provider '{name}': max_numbered {} exceeds maximum of {MAX_NUMBERED_LIMIT}",
                    credentials.max_numbered
                );
            }
        }

        Ok(())
    }

    fn validate_telemetry(&self) -> anyhow::Result<()> {
        if let Some(ref telemetry) = self.telemetry
            && !(0.0..=1.0).contains(&telemetry.sampling_rate)
        {
            anyhow::bail!("telemetry.sampling_rate must be between 0.0 and 1.0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Config, CredentialMode, OutputFormat};

    const MINIMAL: &str = r#"
        [generation.providers.huggingface]
        type = "hugging_face"

        [generation.providers.huggingface.credentials]
        env = "SF_LOADER_HF"

        [generation.models.musicgen]
        provider = "huggingface"
        endpoint = "https://api-inference.huggingface.co/models/facebook/musicgen-small"
    "#;

    #[test]
    fn minimal_config_parses() {
        let config = Config::parse(MINIMAL).unwrap();

        assert_eq!(config.generation.default_format, OutputFormat::Mp3);
        assert!(config.telemetry.is_none());
        assert_eq!(
            config.generation.providers["huggingface"]
                .credentials
                .as_ref()
                .unwrap()
                .mode,
            CredentialMode::Pooled
        );
    }

    #[test]
    fn env_placeholders_are_expanded_before_parsing() {
        let raw = r#"
            [server]
            listen_address = "127.0.0.1:{{ env.SF_LOADER_PORT | default("5000") }}"

            [generation.providers.local]
            type = "json_prompt"

            [generation.models.ace-step]
            provider = "local"
            endpoint = "{{ env.SF_LOADER_ACE_URL }}"
        "#;

        temp_env::with_vars(
            [
                ("SF_LOADER_PORT", None),
                ("SF_LOADER_ACE_URL", Some("http://10.0.0.5:8000/generate")),
            ],
            || {
                let config = Config::parse(raw).unwrap();
                assert_eq!(config.server.listen_address_or_default().port(), 5000);
                assert_eq!(config.generation.models["ace-step"].endpoint, "http://10.0.0.5:8000/generate");
            },
        );
    }

    #[test]
    fn shipped_example_parses() {
        temp_env::with_vars_unset(["SONICFORGE_ADDRESS", "ACE_STEP_URL", "YUE_URL"], || {
            let config = Config::parse(include_str!("../../../sonicforge.toml")).unwrap();

            assert_eq!(config.server.listen_address_or_default().port(), 5000);
            let models: Vec<&str> = config.generation.models.keys().map(String::as_str).collect();
            assert_eq!(
                models,
                vec!["musicgen", "riffusion", "stable-audio", "suno", "ace-step", "yue"]
            );
            assert_eq!(
                config.generation.models["musicgen"].resolved_endpoint().unwrap().as_str(),
                "https://api-inference.huggingface.co/models/facebook/musicgen-small"
            );
            assert!(config.generation.providers["local"].credentials.is_none());
        });
    }

    #[test]
    fn tables_keep_file_order() {
        let raw = r#"
            [generation.providers.zeta]
            type = "json_prompt"

            [generation.providers.alpha]
            type = "json_prompt"

            [generation.models.yue]
            provider = "zeta"
            endpoint = "http://127.0.0.1:9/yue"

            [generation.models.ace-step]
            provider = "alpha"
            endpoint = "http://127.0.0.1:9/ace"
        "#;

        let config = Config::parse(raw).unwrap();

        let providers: Vec<&str> = config.generation.providers.keys().map(String::as_str).collect();
        assert_eq!(providers, vec!["zeta", "alpha"]);
        let models: Vec<&str> = config.generation.models.keys().map(String::as_str).collect();
        assert_eq!(models, vec!["yue", "ace-step"]);
    }

    #[test]
    fn retry_policy_requires_pooled_credentials() {
        let single = r#"
            [generation.providers.stability]
            type = "multipart_form"
            retry_policy = "credential_errors"

            [generation.providers.stability.credentials]
            mode = "single"
            keys = ["sk-master"]

            [generation.models.stable-audio]
            provider = "stability"
            endpoint = "https://api.stability.ai/v2beta/audio"
        "#;
        let err = Config::parse(single).unwrap_err();
        assert!(err.to_string().contains("retry_policy"));

        let public = r#"
            [generation.providers.local]
            type = "json_prompt"
            retry_policy = "any_failure"

            [generation.models.ace-step]
            provider = "local"
            endpoint = "http://127.0.0.1:9/generate"
        "#;
        assert!(Config::parse(public).is_err());

        let pooled = r#"
            [generation.providers.huggingface]
            type = "hugging_face"
            retry_policy = "credential_errors"

            [generation.providers.huggingface.credentials]
            keys = ["hf_a"]

            [generation.models.musicgen]
            provider = "huggingface"
            endpoint = "https://api-inference.huggingface.co/models/facebook/musicgen-small"
        "#;
        assert!(Config::parse(pooled).is_ok());
    }

    #[test]
    fn no_models_fails() {
        let err = Config::parse("").unwrap_err();
        assert!(err.to_string().contains("at least one model"));
    }

    #[test]
    fn unknown_provider_reference_fails() {
        let raw = r#"
            [generation.models.suno]
            provider = "suno"
            endpoint = "https://suno.example/api/generate"
        "#;

        let err = Config::parse(raw).unwrap_err();
        assert!(err.to_string().contains("unknown provider 'suno'"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = format!("{MINIMAL}\n[generation.providers.extra]\ntype = \"json_prompt\"\napi_key = \"x\"\n");
        assert!(Config::parse(&raw).is_err());
    }

    #[test]
    fn oversized_numbered_series_fails() {
        let raw = r#"
            [generation.providers.huggingface]
            type = "hugging_face"

            [generation.providers.huggingface.credentials]
            env = "HF_API_TOKEN"
            max_numbered = 1000

            [generation.models.musicgen]
            provider = "huggingface"
            endpoint = "https://api-inference.huggingface.co/models/facebook/musicgen-small"
        "#;

        let err = Config::parse(raw).unwrap_err();
        assert!(err.to_string().contains("max_numbered"));
    }

    #[test]
    fn sampling_rate_out_of_range_fails() {
        let raw = format!("{MINIMAL}\n[telemetry]\nsampling_rate = 1.5\n");
        let err = Config::parse(&raw).unwrap_err();
        assert!(err.to_string().contains("sampling_rate"));
    }
}
