//! Impersonation cookies.
//!
//! Impersonation state travels as three cookies written and cleared together.
//! The tenant id and audit reference are signed with a [`cookie::Key`] so a
//! client cannot forge or retarget them; the tenant name is plain so the
//! banner UI can read it, and is only ever used for display.
//!
//! The signed tenant id cookie also names the admin who started the
//! impersonation. It is only honored for that same user, so cookies left
//! behind in a shared browser never carry over to the next login.
//!
//! # Tracing Events
//!
//! - `session.cookie.foreign_owner` - Impersonation cookie presented by a different user

use super::config::SessionConfig;
use super::context::{ImpersonationContext, SessionContext};
use crate::error::{Result, TenantryError};
use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, Utc};
use cookie::{Cookie, CookieJar, Key, SameSite};
use std::sync::Arc;

pub const TENANT_ID_COOKIE: &str = "impersonation-tenant-id";
pub const TENANT_NAME_COOKIE: &str = "impersonation-tenant-name";
pub const AUDIT_REF_COOKIE: &str = "impersonation-audit-ref";

const ALL_COOKIES: [&str; 3] = [TENANT_ID_COOKIE, TENANT_NAME_COOKIE, AUDIT_REF_COOKIE];

/// Reads and writes impersonation state on a [`CookieJar`].
#[derive(Clone)]
pub struct ImpersonationCookies {
    key: Arc<Key>,
    config: SessionConfig,
}

impl std::fmt::Debug for ImpersonationCookies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImpersonationCookies")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ImpersonationCookies {
    /// Create the cookie codec.
    ///
    /// # Errors
    ///
    /// Fails if `signing_key` is not 128 hex characters, or if no key is
    /// configured and `allow_insecure_key` is `false`.
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let key = if let Some(ref key_str) = config.signing_key {
            let key_bytes = hex::decode(key_str.trim()).map_err(|e| {
                TenantryError::internal(format!("Invalid signing key format: {}", e))
            })?;

            if key_bytes.len() != 64 {
                return Err(TenantryError::internal(
                    "Signing key must be 64 bytes (128 hex characters). Generate with: openssl rand -hex 64",
                ));
            }

            Key::from(&key_bytes)
        } else if config.allow_insecure_key {
            tracing::error!(
                target: "session.insecure_key",
                "Using a randomly generated cookie signing key. Impersonation cookies will not \
                 survive restarts or work across instances. Set SESSION_SIGNING_KEY in production."
            );
            Key::generate()
        } else {
            return Err(TenantryError::internal(
                "Impersonation cookies require a signing key. \
                Set SESSION_SIGNING_KEY or config.session.signing_key. \
                Generate a key with: openssl rand -hex 64. \
                For development only, set SESSION_ALLOW_INSECURE_KEY=true.",
            ));
        };

        Ok(Self {
            key: Arc::new(key),
            config: config.clone(),
        })
    }

    /// Load `user_id`'s impersonation context from request cookies.
    ///
    /// Returns `None` when the tenant id cookie is missing, fails
    /// verification, or was issued to another user. Expired contexts are
    /// returned as-is; callers decide.
    pub fn read(&self, jar: &CookieJar, user_id: &str) -> Option<ImpersonationContext> {
        let signed = jar.signed(&self.key);

        let raw = signed.get(TENANT_ID_COOKIE)?;
        let mut parts = raw.value().splitn(3, ':');
        let expires = parts.next()?;
        let admin_id = urlencoding::decode(parts.next()?).ok()?.into_owned();
        let tenant_id = parts.next()?;
        let expires_at = DateTime::<Utc>::from_timestamp(expires.parse().ok()?, 0)?;
        if tenant_id.is_empty() {
            return None;
        }
        if admin_id != user_id {
            tracing::warn!(
                target: "session.cookie.foreign_owner",
                user_id = %user_id,
                admin_id = %admin_id,
                tenant_id = %tenant_id,
                "Ignoring impersonation cookie issued to another user"
            );
            return None;
        }

        let tenant_name = jar
            .get(TENANT_NAME_COOKIE)
            .and_then(|c| urlencoding::decode(c.value()).ok().map(|s| s.into_owned()))
            .unwrap_or_else(|| tenant_id.to_string());

        let audit_log_id = signed
            .get(AUDIT_REF_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty());

        Some(ImpersonationContext {
            admin_id,
            tenant_id: tenant_id.to_string(),
            tenant_name,
            audit_log_id,
            expires_at,
        })
    }

    /// Write all three cookies for `context`.
    pub fn write(&self, jar: &mut CookieJar, context: &ImpersonationContext, now: DateTime<Utc>) {
        let max_age = (context.expires_at - now).num_seconds().max(0);

        let tenant_value = format!(
            "{}:{}:{}",
            context.expires_at.timestamp(),
            urlencoding::encode(&context.admin_id),
            context.tenant_id
        );
        jar.signed_mut(&self.key)
            .add(self.build(TENANT_ID_COOKIE, tenant_value, true, max_age));

        jar.add(self.build(
            TENANT_NAME_COOKIE,
            urlencoding::encode(&context.tenant_name).into_owned(),
            false,
            max_age,
        ));

        match context.audit_log_id {
            Some(ref id) => jar
                .signed_mut(&self.key)
                .add(self.build(AUDIT_REF_COOKIE, id.clone(), true, max_age)),
            None => jar.add(self.removal(AUDIT_REF_COOKIE)),
        }
    }

    /// Emit removal cookies for all three names, whether or not the
    /// request carried them.
    pub fn clear(&self, jar: &mut CookieJar) {
        for name in ALL_COOKIES {
            jar.add(self.removal(name));
        }
    }

    /// Write or clear cookies so they mirror `session`.
    pub fn sync(&self, jar: &mut CookieJar, session: &SessionContext, now: DateTime<Utc>) {
        match session.impersonation() {
            Some(context) => self.write(jar, context, now),
            None => self.clear(jar),
        }
    }

    fn build(&self, name: &'static str, value: String, http_only: bool, max_age: i64) -> Cookie<'static> {
        let mut builder = Cookie::build((name, value))
            .path(self.config.cookie_path.clone())
            .http_only(http_only)
            .secure(self.config.cookie_secure)
            .same_site(SameSite::Lax)
            .max_age(cookie::time::Duration::seconds(max_age));
        if let Some(ref domain) = self.config.cookie_domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }

    fn removal(&self, name: &'static str) -> Cookie<'static> {
        let mut cookie = self.build(name, String::new(), true, 0);
        cookie.make_removal();
        cookie
    }
}

/// Build a jar from the request's `Cookie` headers.
pub fn jar_from_headers(headers: &HeaderMap) -> CookieJar {
    let mut jar = CookieJar::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for cookie in Cookie::split_parse(value.to_string()).flatten() {
            jar.add_original(cookie);
        }
    }
    jar
}

/// `Set-Cookie` header values for every change made to `jar`.
pub fn set_cookie_headers(jar: &CookieJar) -> Vec<HeaderValue> {
    jar.delta()
        .filter_map(|c| HeaderValue::from_str(&c.to_string()).ok())
        .collect()
}
