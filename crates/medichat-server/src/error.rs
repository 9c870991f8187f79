use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {env_var}: {message}")]
    InvalidEnvVar { env_var: String, message: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// Map a dotted settings path to the environment variable that sets it,
/// e.g. `provider.api_key` becomes `MEDICHAT_PROVIDER__API_KEY`.
pub fn to_env_var(field: &str) -> String {
    format!("MEDICHAT_{}", field.replace('.', "__").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_nested_fields_to_env_vars() {
        assert_eq!(to_env_var("provider.api_key"), "MEDICHAT_PROVIDER__API_KEY");
        assert_eq!(to_env_var("server.port"), "MEDICHAT_SERVER__PORT");
        assert_eq!(to_env_var("host"), "MEDICHAT_HOST");
    }
}
