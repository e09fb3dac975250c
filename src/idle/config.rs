use crate::error::{Result, TenantryError};
use crate::utils::parse_env_with_prefix;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Idle session timeout thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleTimeoutConfig {
    /// Inactivity before the warning is shown.
    pub warning_after: Duration,
    /// Inactivity before the session is ended.
    pub logout_after: Duration,
    /// Minimum spacing between activity resets.
    pub activity_throttle: Duration,
    pub login_path: String,
}

impl Default for IdleTimeoutConfig {
    fn default() -> Self {
        Self {
            warning_after: Duration::from_secs(25 * 60),
            logout_after: Duration::from_secs(30 * 60),
            activity_throttle: Duration::from_secs(1),
            login_path: "/login".to_string(),
        }
    }
}

/// Longest accepted logout threshold. Keeps deadlines within `Instant` range.
const MAX_LOGOUT_AFTER: Duration = Duration::from_secs(7 * 24 * 60 * 60);

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.saturating_mul(60))
}

impl IdleTimeoutConfig {
    pub fn from_minutes(warning: u64, logout: u64) -> Self {
        Self {
            warning_after: minutes(warning),
            logout_after: minutes(logout),
            ..Self::default()
        }
    }

    /// Load from `IDLE_WARNING_MINUTES` and `IDLE_LOGOUT_MINUTES`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(value) = parse_env_with_prefix::<u64>("IDLE_WARNING_MINUTES") {
            config.warning_after = minutes(value);
        }
        if let Some(value) = parse_env_with_prefix::<u64>("IDLE_LOGOUT_MINUTES") {
            config.logout_after = minutes(value);
        }
        config
    }

    /// Length of the visible countdown.
    pub fn countdown(&self) -> Duration {
        self.logout_after.saturating_sub(self.warning_after)
    }

    /// Where to send the browser after a forced logout.
    pub fn timeout_redirect(&self) -> String {
        format!("{}?reason=timeout", self.login_path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.warning_after.is_zero() {
            return Err(TenantryError::bad_request(
                "Idle warning threshold must be greater than zero",
            ));
        }
        if self.logout_after <= self.warning_after {
            return Err(TenantryError::bad_request(
                "Idle logout threshold must be later than the warning threshold",
            ));
        }
        if self.logout_after > MAX_LOGOUT_AFTER {
            return Err(TenantryError::bad_request(
                "Idle logout threshold must be at most 7 days",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IdleTimeoutConfig::default();
        assert_eq!(config.countdown(), Duration::from_secs(5 * 60));
        assert_eq!(config.timeout_redirect(), "/login?reason=timeout");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_logout_must_follow_warning() {
        assert!(IdleTimeoutConfig::from_minutes(30, 30).validate().is_err());
        assert!(IdleTimeoutConfig::from_minutes(0, 5).validate().is_err());
        assert!(IdleTimeoutConfig::from_minutes(10, 12).validate().is_ok());
    }

    #[test]
    fn test_huge_minutes_saturate_and_are_rejected() {
        let config = IdleTimeoutConfig::from_minutes(10, u64::MAX);
        assert_eq!(config.logout_after, Duration::from_secs(u64::MAX));
        assert!(config.validate().is_err());
    }
}
