use crate::utils::{bool_env_with_prefix, get_env_with_prefix};
use serde::{Deserialize, Serialize};

/// Cookie settings for impersonation state.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Cookie domain (optional)
    #[serde(default)]
    pub cookie_domain: Option<String>,

    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,

    /// Cookie secure flag (HTTPS only)
    #[serde(default = "default_secure")]
    pub cookie_secure: bool,

    /// Signing key, hex-encoded 64 bytes (128 hex chars).
    ///
    /// Generate with: `openssl rand -hex 64`
    #[serde(default)]
    pub signing_key: Option<String>,

    /// Allow a random signing key when none is configured (development only).
    ///
    /// Impersonation cookies then stop verifying after every restart and
    /// across instances.
    #[serde(default)]
    pub allow_insecure_key: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_domain: None,
            cookie_path: default_cookie_path(),
            cookie_secure: default_secure(),
            signing_key: None,
            allow_insecure_key: false,
        }
    }
}

impl SessionConfig {
    /// Load cookie configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(domain) = get_env_with_prefix("SESSION_COOKIE_DOMAIN") {
            config.cookie_domain = Some(domain);
        }

        if let Some(path) = get_env_with_prefix("SESSION_COOKIE_PATH") {
            config.cookie_path = path;
        }

        if let Some(secure) = bool_env_with_prefix("SESSION_COOKIE_SECURE") {
            config.cookie_secure = secure;
        }

        if let Some(key) = get_env_with_prefix("SESSION_SIGNING_KEY") {
            config.signing_key = Some(key);
        }

        if let Some(allow) = bool_env_with_prefix("SESSION_ALLOW_INSECURE_KEY") {
            config.allow_insecure_key = allow;
        }

        config
    }
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_secure() -> bool {
    true
}
