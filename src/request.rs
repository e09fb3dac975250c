//! Network origin and user-agent capture for audit records.

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::{HeaderMap, header, request::Parts};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;

/// Maximum IP address length (IPv6 textual max).
const MAX_IP_LENGTH: usize = 45;

const MAX_USER_AGENT_LENGTH: usize = 512;

/// Whether proxy headers may be trusted for the client address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustProxy(pub bool);

/// Where a request came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: Some(truncate(&ip_address.into(), MAX_IP_LENGTH)),
            user_agent: Some(truncate(&user_agent.into(), MAX_USER_AGENT_LENGTH)),
        }
    }

    /// Derive the origin from headers and the peer address.
    ///
    /// Proxy headers (`x-forwarded-for`, `x-real-ip`) are only consulted when
    /// `trust_proxy` is set; otherwise a client could spoof its address.
    pub fn from_headers(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> Self {
        let forwarded = || {
            headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .or_else(|| {
                    headers
                        .get("x-real-ip")
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.trim().to_string())
                })
        };

        let ip = (if trust_proxy { forwarded() } else { None })
            .or_else(|| peer.map(|addr| addr.ip().to_string()));

        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|s| truncate(s, MAX_USER_AGENT_LENGTH));

        Self {
            ip_address: ip.map(|s| truncate(&s, MAX_IP_LENGTH)),
            user_agent,
        }
    }

    /// Key used for per-origin rate limiting.
    pub fn rate_limit_key(&self) -> &str {
        self.ip_address.as_deref().unwrap_or("unknown")
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
    TrustProxy: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TrustProxy(trust_proxy) = TrustProxy::from_ref(state);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self::from_headers(&parts.headers, peer, trust_proxy))
    }
}

/// Truncate to at most `max_len` bytes on a char boundary.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        s[..end].to_string()
    }
}
