//! Idle session timeout.
//!
//! After a period of inactivity the user is warned; if they do not
//! acknowledge the warning the session is ended and the browser sent back to
//! the login page.
//!
//! # Tracing Events
//!
//! - `session.idle.warning` - Warning threshold reached
//! - `session.idle.acknowledged` - User chose to stay logged in
//! - `session.idle.logged_out` - Session ended for inactivity

mod config;
mod driver;
mod monitor;

pub use config::IdleTimeoutConfig;
pub use driver::{IdleHandle, IdleTimeoutDriver};
pub use monitor::{IdleEvent, IdleMonitor, IdleState};
