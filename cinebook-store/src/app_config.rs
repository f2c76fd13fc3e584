use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Deadline for a whole request. Hitting it drops the handler, rolling back any open transaction.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 { 10 }

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 signing key, exactly 32 bytes.
    pub token_symmetric_key: String,
    pub access_token_duration_seconds: i64,
    pub refresh_token_duration_seconds: i64,
}

impl AuthConfig {
    pub fn access_token_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_token_duration_seconds)
    }

    pub fn refresh_token_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_token_duration_seconds)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked local overrides
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `CINEBOOK__AUTH__TOKEN_SYMMETRIC_KEY=...` sets `auth.token_symmetric_key`
            .add_source(config::Environment::with_prefix("CINEBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_file_deserializes() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../config/default");
        let config: Config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.auth.token_symmetric_key.len(), 32);
        assert!(config.auth.access_token_duration() < config.auth.refresh_token_duration());
        assert!(config.server.request_timeout_seconds > 0);
    }

    #[test]
    fn test_optional_fields_fall_back_to_defaults() {
        let toml = r#"
            [server]
            port = 8080

            [database]
            url = "postgres://localhost/cinebook"

            [auth]
            token_symmetric_key = "12345678901234567890123456789012"
            access_token_duration_seconds = 900
            refresh_token_duration_seconds = 86400
        "#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.request_timeout_seconds, 10);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.auth.access_token_duration(), chrono::Duration::minutes(15));
    }
}
