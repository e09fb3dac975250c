use crate::auth::LoginRateLimitConfig;
use crate::error::{Result, TenantryError};
use crate::idle::IdleTimeoutConfig;
use crate::impersonation::ImpersonationConfig;
use crate::session::{ImpersonationCookies, SessionConfig};
use crate::utils::{bool_env_with_prefix, get_env_with_prefix, parse_env_with_prefix};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Main configuration for a tenantry service
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limit: LoginRateLimitConfig,
    #[serde(default)]
    pub idle: IdleTimeoutConfig,
    #[serde(default)]
    pub impersonation: ImpersonationConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Honor `x-forwarded-for` / `x-real-ip` for the client address.
    /// Only enable behind a proxy that overwrites these headers.
    #[serde(default)]
    pub trust_proxy: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            trust_proxy: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_trust_proxy(mut self, trust: bool) -> Self {
        self.config.server.trust_proxy = trust;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: LoginRateLimitConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    pub fn with_idle_timeout(mut self, idle: IdleTimeoutConfig) -> Self {
        self.config.idle = idle;
        self
    }

    pub fn with_impersonation(mut self, impersonation: ImpersonationConfig) -> Self {
        self.config.impersonation = impersonation;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.config.session = session;
        self
    }

    /// Load configuration from environment variables with TENANTRY_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(host) = get_env_with_prefix("HOST") {
            self.config.server.host = host;
        }
        if let Some(port) = parse_env_with_prefix("PORT") {
            self.config.server.port = port;
        }
        if let Some(trust) = bool_env_with_prefix("TRUST_PROXY") {
            self.config.server.trust_proxy = trust;
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = bool_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json;
        }

        self.config.rate_limit = LoginRateLimitConfig::from_env();
        self.config.idle = IdleTimeoutConfig::from_env();
        self.config.impersonation = ImpersonationConfig::from_env();
        self.config.session = SessionConfig::from_env();

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration is invalid:
    /// - Invalid server address (host:port) or port 0
    /// - Invalid log level
    /// - Zero login attempts or a zero-length rate-limit window
    /// - Idle logout not later than the idle warning
    /// - Zero impersonation TTL or relative redirect paths
    /// - Malformed or missing cookie signing key
    pub fn build(self) -> Result<Config> {
        let config = self.config;

        config.server.addr().map_err(|e| {
            TenantryError::bad_request(format!(
                "Invalid server address {}:{} - {}",
                config.server.host, config.server.port, e
            ))
        })?;

        if config.server.port == 0 {
            return Err(TenantryError::bad_request(
                "Server port must be greater than 0",
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(TenantryError::bad_request(format!(
                "Invalid log level: {}. Must be one of: {}",
                config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if config.rate_limit.max_attempts == 0 {
            return Err(TenantryError::bad_request(
                "Login rate limit max_attempts must be greater than 0",
            ));
        }
        if config.rate_limit.window_seconds == 0 {
            return Err(TenantryError::bad_request(
                "Login rate limit window_seconds must be greater than 0",
            ));
        }

        config.idle.validate()?;

        if config.impersonation.ttl_hours == 0 {
            return Err(TenantryError::bad_request(
                "Impersonation TTL must be at least one hour",
            ));
        }
        for path in [
            &config.impersonation.tenant_view_path,
            &config.impersonation.admin_view_path,
        ] {
            if !path.starts_with('/') {
                return Err(TenantryError::bad_request(format!(
                    "Redirect path must be absolute: {}",
                    path
                )));
            }
        }

        ImpersonationCookies::new(&config.session)?;

        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
