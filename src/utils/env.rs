use std::str::FromStr;

/// Get environment variable with TENANTRY_ prefix, falling back to unprefixed version
///
/// This helper function checks for `TENANTRY_{key}` first, then falls back to `{key}`.
///
/// # Examples
///
/// ```rust
/// use tenantry::utils::get_env_with_prefix;
///
/// // Checks TENANTRY_PORT first, then PORT
/// let port = get_env_with_prefix("PORT");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("TENANTRY_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse a prefixed environment variable, ignoring values that fail to parse.
pub fn parse_env_with_prefix<T: FromStr>(key: &str) -> Option<T> {
    let raw = get_env_with_prefix(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(
                target: "config.env",
                key = key,
                value = %raw,
                "Ignoring unparseable environment value"
            );
            None
        }
    }
}

/// Parse a boolean flag. Accepts `true`/`1`/`yes` and `false`/`0`/`no`.
pub fn bool_env_with_prefix(key: &str) -> Option<bool> {
    let raw = get_env_with_prefix(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
