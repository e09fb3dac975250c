use super::config::IdleTimeoutConfig;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleState {
    Active,
    Warning { logout_at: Instant },
    LoggedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleEvent {
    WarningShown { countdown: Duration },
    LoggedOut { redirect_to: String },
}

/// Inactivity state machine for one session.
///
/// Time is passed in by the caller, so the machine has no timers of its own.
/// [`IdleTimeoutDriver`](super::IdleTimeoutDriver) runs it on tokio timers.
///
/// Activity only counts while `Active`. Once the warning is showing, only
/// [`acknowledge`](Self::acknowledge) returns the session to `Active`.
#[derive(Debug, Clone)]
pub struct IdleMonitor {
    config: IdleTimeoutConfig,
    state: IdleState,
    last_activity: Instant,
}

impl IdleMonitor {
    pub fn new(config: IdleTimeoutConfig, now: Instant) -> Self {
        Self {
            config,
            state: IdleState::Active,
            last_activity: now,
        }
    }

    pub fn state(&self) -> IdleState {
        self.state
    }

    pub fn config(&self) -> &IdleTimeoutConfig {
        &self.config
    }

    /// Register user activity. Returns `true` if the inactivity clock was
    /// reset; resets closer together than the throttle are coalesced.
    pub fn record_activity(&mut self, now: Instant) -> bool {
        if self.state != IdleState::Active {
            return false;
        }
        if now.saturating_duration_since(self.last_activity) < self.config.activity_throttle {
            return false;
        }
        self.last_activity = now;
        true
    }

    /// "Stay logged in". Restores the full budget unless already logged out.
    pub fn acknowledge(&mut self, now: Instant) {
        if self.state == IdleState::LoggedOut {
            return;
        }
        self.state = IdleState::Active;
        self.last_activity = now;
    }

    /// Advance the machine to `now`, returning the transition taken, if any.
    pub fn poll(&mut self, now: Instant) -> Option<IdleEvent> {
        match self.state {
            IdleState::Active => {
                let logout_at = self.last_activity + self.config.logout_after;
                if now >= logout_at {
                    return Some(self.log_out());
                }
                if now >= self.last_activity + self.config.warning_after {
                    self.state = IdleState::Warning { logout_at };
                    return Some(IdleEvent::WarningShown {
                        countdown: logout_at.saturating_duration_since(now),
                    });
                }
                None
            }
            IdleState::Warning { logout_at } if now >= logout_at => Some(self.log_out()),
            IdleState::Warning { .. } | IdleState::LoggedOut => None,
        }
    }

    /// When [`poll`](Self::poll) should next be called. `None` once logged out.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            IdleState::Active => Some(self.last_activity + self.config.warning_after),
            IdleState::Warning { logout_at } => Some(logout_at),
            IdleState::LoggedOut => None,
        }
    }

    fn log_out(&mut self) -> IdleEvent {
        self.state = IdleState::LoggedOut;
        IdleEvent::LoggedOut {
            redirect_to: self.config.timeout_redirect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    fn monitor() -> (IdleMonitor, Instant) {
        let start = Instant::now();
        (IdleMonitor::new(IdleTimeoutConfig::default(), start), start)
    }

    #[test]
    fn test_warning_at_25_minutes() {
        let (mut m, start) = monitor();
        assert_eq!(m.poll(start + 24 * MINUTE), None);
        assert_eq!(
            m.poll(start + 25 * MINUTE),
            Some(IdleEvent::WarningShown { countdown: 5 * MINUTE })
        );
        assert_eq!(
            m.state(),
            IdleState::Warning {
                logout_at: start + 30 * MINUTE
            }
        );
    }

    #[test]
    fn test_activity_during_warning_ignored() {
        let (mut m, start) = monitor();
        m.poll(start + 25 * MINUTE);
        assert!(!m.record_activity(start + 26 * MINUTE));
        assert_eq!(
            m.poll(start + 30 * MINUTE),
            Some(IdleEvent::LoggedOut {
                redirect_to: "/login?reason=timeout".to_string()
            })
        );
        assert_eq!(m.poll(start + 31 * MINUTE), None);
        assert_eq!(m.next_deadline(), None);
    }

    #[test]
    fn test_acknowledge_restores_full_budget() {
        let (mut m, start) = monitor();
        m.poll(start + 25 * MINUTE);
        m.acknowledge(start + 26 * MINUTE);
        assert_eq!(m.state(), IdleState::Active);
        assert_eq!(m.poll(start + 30 * MINUTE), None);
        assert_eq!(m.next_deadline(), Some(start + 51 * MINUTE));
    }

    #[test]
    fn test_activity_throttled() {
        let (mut m, start) = monitor();
        let half = Duration::from_millis(500);
        assert!(!m.record_activity(start + half));
        assert!(m.record_activity(start + 2 * half));
        assert!(!m.record_activity(start + 3 * half));
        assert!(m.record_activity(start + 4 * half));
        assert_eq!(m.next_deadline(), Some(start + 4 * half + 25 * MINUTE));
    }

    #[test]
    fn test_late_poll_logs_out_directly() {
        let (mut m, start) = monitor();
        assert!(matches!(
            m.poll(start + 45 * MINUTE),
            Some(IdleEvent::LoggedOut { .. })
        ));
    }
}
