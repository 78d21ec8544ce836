use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Portainer,
    Docker,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub source: SourceKind,
    /// Seconds to sleep between two polls.
    pub poll_interval: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub docker_endpoint: String,
    pub state_file: PathBuf,
    pub max_attempts: u32,
    pub retry_delay: u64,
    pub request_timeout: u64,
    pub short_circuit_statuses: Vec<u16>,
    pub message_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceKind::Portainer,
            poll_interval: 60,
            webhook_url: None,
            api_url: None,
            api_key: None,
            docker_endpoint: "local".into(),
            state_file: PathBuf::from("data/container_memory.json"),
            max_attempts: 3,
            retry_delay: 10,
            request_timeout: 10,
            // 502 from Portainer means the agent behind the endpoint is gone;
            // retrying within the same poll never helps.
            short_circuit_statuses: vec![502],
            message_limit: 2000,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("portwatch.toml"))
            .merge(Json::file("portwatch.json"))
            .merge(Env::prefixed("PORTWATCH_"));
        let mut config: Config = figment.extract()?;

        // Support Docker-style secrets
        if let Ok(secret_file) = std::env::var("PORTWATCH_API_KEY_FILE") {
            config.api_key = Some(std::fs::read_to_string(secret_file)?.trim().to_string());
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that every setting the selected source needs is present.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if is_blank(&self.webhook_url) {
            return Err(ConfigError::Missing("webhook_url"));
        }
        if self.source == SourceKind::Portainer {
            if is_blank(&self.api_url) {
                return Err(ConfigError::Missing("api_url"));
            }
            if is_blank(&self.api_key) {
                return Err(ConfigError::Missing("api_key"));
            }
        }
        if let Some(url) = self.api_url.as_mut() {
            let trimmed = url.trim_end_matches('/').len();
            url.truncate(trimmed);
        }
        if self.poll_interval == 0 {
            return Err(ConfigError::Invalid {
                key: "poll_interval",
                reason: "must be at least one second".into(),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "max_attempts",
                reason: "must be at least 1".into(),
            });
        }
        if self.message_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "message_limit",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_load_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("PORTWATCH_WEBHOOK_URL", "https://hooks.example/abc");
            jail.set_env("PORTWATCH_API_URL", "https://portainer.example/api/");
            jail.set_env("PORTWATCH_API_KEY", "secret");
            jail.set_env("PORTWATCH_POLL_INTERVAL", "15");

            let config = Config::load().map_err(|e| e.to_string())?;

            assert_eq!(config.source, SourceKind::Portainer);
            assert_eq!(config.poll_interval(), Duration::from_secs(15));
            assert_eq!(config.api_url.as_deref(), Some("https://portainer.example/api"));
            assert_eq!(config.max_attempts, 3);
            assert_eq!(config.short_circuit_statuses, vec![502]);
            Ok(())
        });
    }

    #[test]
    fn test_toml_file_is_overridden_by_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "portwatch.toml",
                r#"
                    webhook_url = "https://hooks.example/file"
                    api_url = "https://portainer.example/api"
                    api_key = "from-file"
                    retry_delay = 1
                "#,
            )?;
            jail.set_env("PORTWATCH_API_KEY", "from-env");

            let config = Config::load().map_err(|e| e.to_string())?;

            assert_eq!(config.api_key.as_deref(), Some("from-env"));
            assert_eq!(config.retry_delay(), Duration::from_secs(1));
            Ok(())
        });
    }

    #[test]
    fn test_api_key_file() {
        Jail::expect_with(|jail| {
            jail.create_file("api_key", "file-secret\n")?;
            jail.set_env("PORTWATCH_WEBHOOK_URL", "https://hooks.example/abc");
            jail.set_env("PORTWATCH_API_URL", "https://portainer.example/api");
            jail.set_env("PORTWATCH_API_KEY_FILE", "api_key");

            let config = Config::load().map_err(|e| e.to_string())?;

            assert_eq!(config.api_key.as_deref(), Some("file-secret"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_required_settings_are_fatal() {
        Jail::expect_with(|jail| {
            jail.set_env("PORTWATCH_WEBHOOK_URL", "https://hooks.example/abc");
            jail.set_env("PORTWATCH_API_URL", "https://portainer.example/api");

            let err = Config::load().unwrap_err();
            assert!(matches!(err, ConfigError::Missing("api_key")));
            Ok(())
        });
    }

    #[test]
    fn test_docker_source_needs_no_api() {
        Jail::expect_with(|jail| {
            jail.set_env("PORTWATCH_SOURCE", "docker");
            jail.set_env("PORTWATCH_WEBHOOK_URL", "https://hooks.example/abc");
            jail.set_env("PORTWATCH_DOCKER_ENDPOINT", "nas");

            let config = Config::load().map_err(|e| e.to_string())?;

            assert_eq!(config.source, SourceKind::Docker);
            assert_eq!(config.docker_endpoint, "nas");
            Ok(())
        });
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = Config {
            webhook_url: Some("https://hooks.example/abc".into()),
            api_url: Some("https://portainer.example/api".into()),
            api_key: Some("k".into()),
            poll_interval: 0,
            ..Config::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "poll_interval",
                ..
            })
        ));
    }
}
