//! Password login and logout.
//!
//! # Tracing Events
//!
//! - `auth.login.succeeded` - Credentials accepted
//! - `auth.login.failed` - Credentials rejected
//! - `auth.login.inactive` - Credentials accepted for a deactivated account
//! - `auth.login.rate_limited` - Origin exceeded the attempt budget
//! - `auth.logout` - Session ended

use super::identity::{IdentityProvider, ProfileStore};
use super::rate_limit::LoginRateLimiter;
use crate::audit::{AuditEvent, AuditEventType, AuditLogger, TargetType};
use crate::clock::{SharedClock, system_clock};
use crate::error::{Result, TenantryError};
use crate::impersonation::ImpersonationManager;
use crate::request::RequestContext;
use crate::session::{ImpersonationCookies, SessionContext, set_cookie_headers};
use axum::http::HeaderValue;
use cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Where a logged-out browser is sent.
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A successful login.
///
/// `session` never carries impersonation state, and `cookies` holds removals
/// for every impersonation cookie a previous session may have left behind.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session: SessionContext,
    pub must_change_password: bool,
    pub redirect_to: String,
    pub cookies: CookieJar,
}

impl LoginOutcome {
    /// `Set-Cookie` values to send with the login response.
    pub fn set_cookie_headers(&self) -> Vec<HeaderValue> {
        set_cookie_headers(&self.cookies)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogoutOutcome {
    pub redirect_to: String,
    pub ended_impersonation: bool,
}

/// Login and logout against an external identity provider.
#[derive(Clone)]
pub struct LoginFlow {
    limiter: LoginRateLimiter,
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    audit: AuditLogger,
    impersonation: Arc<ImpersonationManager>,
    cookies: ImpersonationCookies,
    clock: SharedClock,
}

impl LoginFlow {
    pub fn new(
        limiter: LoginRateLimiter,
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        audit: AuditLogger,
        impersonation: Arc<ImpersonationManager>,
        cookies: ImpersonationCookies,
    ) -> Self {
        Self {
            limiter,
            identity,
            profiles,
            audit,
            impersonation,
            cookies,
            clock: system_clock(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn limiter(&self) -> &LoginRateLimiter {
        &self.limiter
    }

    /// Verify credentials and open a fresh session.
    ///
    /// # Errors
    ///
    /// - `TooManyRequests` if the origin has used its attempt budget
    /// - `Unauthenticated` if the credentials are rejected
    /// - `Forbidden` if the account is deactivated or has no profile
    pub async fn login(&self, request: &RequestContext, login: &LoginRequest) -> Result<LoginOutcome> {
        let key = request.rate_limit_key();
        self.limiter.ensure_not_limited(key).await?;

        let email = login.email.trim().to_lowercase();
        let Some(identity) = self.identity.verify_credentials(&email, &login.password).await? else {
            self.reject(request, &email, "invalid_credentials").await;
            tracing::info!(
                target: "auth.login.failed",
                ip = ?request.ip_address,
                "Login failed"
            );
            return Err(TenantryError::unauthenticated(INVALID_CREDENTIALS));
        };

        let profile = match self.profiles.find_profile(&identity.user_id).await? {
            Some(profile) if profile.is_active => profile,
            _ => {
                self.reject(request, &email, "inactive").await;
                if let Err(e) = self.identity.sign_out(&identity).await {
                    tracing::warn!(
                        target: "auth.login.inactive",
                        user_id = %identity.user_id,
                        error = %e,
                        "Failed to sign out deactivated account"
                    );
                }
                tracing::info!(
                    target: "auth.login.inactive",
                    user_id = %identity.user_id,
                    "Login refused for deactivated account"
                );
                return Err(TenantryError::forbidden("This account has been deactivated"));
            }
        };

        self.limiter.clear_rate_limit(key).await?;

        if let Err(e) = self
            .profiles
            .record_last_login(&profile.id, self.clock.now())
            .await
        {
            tracing::warn!(
                target: "auth.login.succeeded",
                user_id = %profile.id,
                error = %e,
                "Failed to record last login"
            );
        }

        let session = SessionContext::new(identity);
        self.audit
            .record(
                &session,
                request,
                AuditEvent::new(AuditEventType::LoginSucceeded, TargetType::Session)
                    .with_target(profile.id.clone()),
            )
            .await;

        tracing::info!(
            target: "auth.login.succeeded",
            user_id = %profile.id,
            role = %profile.role,
            "Login succeeded"
        );

        let config = self.impersonation.config();
        let redirect_to = if profile.role.is_admin() {
            config.admin_view_path.clone()
        } else {
            config.tenant_view_path.clone()
        };

        let mut cookies = CookieJar::new();
        self.cookies.clear(&mut cookies);

        Ok(LoginOutcome {
            session,
            must_change_password: profile.must_change_password,
            redirect_to,
            cookies,
        })
    }

    /// End the session. Any impersonation is stopped and its record closed.
    ///
    /// Never fails; provider sign-out errors are logged.
    pub async fn logout(&self, session: &mut SessionContext, request: &RequestContext) -> LogoutOutcome {
        let stopped = self.impersonation.stop_impersonation(session, request).await;

        if let Some(identity) = session.identity.as_ref() {
            if let Err(e) = self.identity.sign_out(identity).await {
                tracing::warn!(
                    target: "auth.logout",
                    user_id = %identity.user_id,
                    error = %e,
                    "Identity provider sign-out failed"
                );
            }

            self.audit
                .record(
                    session,
                    request,
                    AuditEvent::new(AuditEventType::Logout, TargetType::Session)
                        .with_target(identity.user_id.clone()),
                )
                .await;

            tracing::info!(target: "auth.logout", user_id = %identity.user_id, "Logged out");
        }

        *session = SessionContext::anonymous();

        LogoutOutcome {
            redirect_to: LOGIN_PATH.to_string(),
            ended_impersonation: stopped.was_impersonating,
        }
    }

    async fn reject(&self, request: &RequestContext, email: &str, reason: &str) {
        if let Err(e) = self.limiter.record_failed_attempt(request.rate_limit_key()).await {
            tracing::warn!(
                target: "auth.login.failed",
                error = %e,
                "Failed to record login attempt"
            );
        }

        self.audit
            .record(
                &SessionContext::anonymous(),
                request,
                AuditEvent::new(AuditEventType::LoginFailed, TargetType::Session)
                    .with_metadata(serde_json::json!({ "email": email, "reason": reason })),
            )
            .await;
    }
}
