use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use tracing::{info, warn};

use crate::ai_strategies::DEFAULT_AI_TIMEOUT_MS;

// Import logging macros
use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ai: AiConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// External AI service configuration. `mock_mode` swaps the live strategy
/// for the deterministic mock and also disables rate limiting.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_ms: u64,
    pub mock_mode: bool,
    pub max_retries: u32,
    pub retry_initial_backoff_ms: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Logging system configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Config {
            database: DatabaseConfig::from_env()?,
            ai: AiConfig::from_env()?,
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            database_url_masked = %mask_sensitive_data(&self.database.url),
            ai_model = %self.ai.model,
            ai_mock_mode = self.ai.mock_mode,
            ai_timeout_ms = self.ai.timeout_ms,
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.database.url.contains("sqlite:") && !self.database.url.contains("postgres://") {
            return Err(anyhow!("DATABASE_URL must start with 'sqlite:' or 'postgres://'"));
        }

        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.ai.timeout_ms == 0 {
            return Err(anyhow!("AI_TIMEOUT_MS must be greater than 0"));
        }

        if !self.ai.mock_mode
            && (self.ai.api_key.is_empty() || self.ai.api_key == "your-api-key")
        {
            warn!("AI API key appears to be placeholder or empty - generation will fail");
        }

        if !["trace", "debug", "info", "warn", "error"]
            .contains(&self.logging.level.to_lowercase().as_str())
        {
            warn!("Invalid log level '{}', using 'info' as fallback", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:tenx_cards.db".to_string());

        Ok(DatabaseConfig { url })
    }
}

impl AiConfig {
    fn from_env() -> Result<Self> {
        let api_key = env::var("AI_API_KEY").unwrap_or_else(|_| "your-api-key".to_string());
        let base_url = env::var("AI_BASE_URL").ok();
        let model =
            env::var("AI_MODEL").unwrap_or_else(|_| "openai/gpt-4o-mini".to_string());

        let timeout_ms = parse_env_number("AI_TIMEOUT_MS", DEFAULT_AI_TIMEOUT_MS)?;
        let mock_mode = env::var("AI_MOCK_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);
        let max_retries = parse_env_number("AI_MAX_RETRIES", 3)?;
        let retry_initial_backoff_ms = parse_env_number("AI_RETRY_BACKOFF_MS", 1000)?;

        Ok(AiConfig {
            api_key,
            base_url,
            model,
            timeout_ms,
            mock_mode,
            max_retries,
            retry_initial_backoff_ms,
        })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "3000".to_string());

        let port = port_str.parse::<u16>().map_err(|_| {
            anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str)
        })?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self> {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info,tenx_cards=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY").unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig { level, file_enabled, log_directory })
    }
}

fn parse_env_number<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + Copy,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow!("Invalid {} value: '{}'. Must be a number", name, raw)),
        Err(_) => Ok(default),
    }
}

/// Mask sensitive data in configuration for safe logging. Operates on
/// characters, not bytes, so multi-byte values cannot split a boundary.
fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}***{tail}")
    }
}
