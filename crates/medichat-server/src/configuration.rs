use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use medichat::providers::configs::GeminiProviderConfig;
use medichat::providers::gemini::{GEMINI_DEFAULT_HOST, GEMINI_DEFAULT_MODEL};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Failed to parse socket address")
    }
}

/// Gemini connection settings. Everything has a default; the API key defaults
/// to empty so a bare environment still boots, with calls failing upstream
/// until the key is supplied.
#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_provider_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
}

impl ProviderSettings {
    pub fn into_config(self) -> GeminiProviderConfig {
        GeminiProviderConfig {
            host: self.host,
            api_key: self.api_key,
            model: self.model,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        // Start with default configuration
        let config = Config::builder()
            // Server defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            // Provider defaults
            .set_default("provider.host", default_provider_host())?
            .set_default("provider.model", default_model())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("MEDICHAT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        // Point type errors at the environment variable that holds the bad
        // value, rather than the internal settings path.
        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                if let config::ConfigError::Type { key: Some(key), .. } = &err {
                    Err(ConfigError::InvalidEnvVar {
                        env_var: to_env_var(key),
                        message: err.to_string(),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_provider_host() -> String {
    GEMINI_DEFAULT_HOST.to_string()
}

fn default_model() -> String {
    GEMINI_DEFAULT_MODEL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("MEDICHAT_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.provider.host, GEMINI_DEFAULT_HOST);
        assert_eq!(settings.provider.model, GEMINI_DEFAULT_MODEL);
        // No key in the environment still loads; calls fail later, not here.
        assert_eq!(settings.provider.api_key, "");
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("MEDICHAT_SERVER__PORT", "8080");
        env::set_var("MEDICHAT_PROVIDER__API_KEY", "test-key");
        env::set_var("MEDICHAT_PROVIDER__HOST", "https://gemini.test.local");
        env::set_var("MEDICHAT_PROVIDER__MODEL", "gemini-2.0-pro");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.provider.api_key, "test-key");
        assert_eq!(settings.provider.host, "https://gemini.test.local");
        assert_eq!(settings.provider.model, "gemini-2.0-pro");

        // Clean up
        env::remove_var("MEDICHAT_SERVER__PORT");
        env::remove_var("MEDICHAT_PROVIDER__API_KEY");
        env::remove_var("MEDICHAT_PROVIDER__HOST");
        env::remove_var("MEDICHAT_PROVIDER__MODEL");
    }

    #[test]
    #[serial]
    fn test_invalid_port_is_rejected() {
        clean_env();
        env::set_var("MEDICHAT_SERVER__PORT", "not-a-port");

        let error = Settings::new().unwrap_err();
        assert!(error.to_string().to_lowercase().contains("port"));

        env::remove_var("MEDICHAT_SERVER__PORT");
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
    }
}
