//! Session resolution and route-level guards.
//!
//! # Tracing Events
//!
//! - `http.session.stale_cookies` - Expired, forged or foreign impersonation cookies cleared

use super::state::AppState;
use crate::auth::AuthenticatedIdentity;
use crate::error::TenantryError;
use crate::impersonation::{RestrictedOperation, enforce_operation_restriction};
use crate::session::{SessionContext, TENANT_ID_COOKIE, jar_from_headers, set_cookie_headers};
use crate::tenancy::TenantScope;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::{header, request::Parts};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use cookie::CookieJar;
use std::convert::Infallible;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Request id generator for `x-request-id`.
#[derive(Clone, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let request_id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(request_id))
    }
}

/// Build the [`SessionContext`] and resolve the [`TenantScope`] for every
/// request.
///
/// The identity comes from an [`AuthenticatedIdentity`] extension inserted
/// by upstream authentication. Impersonation state comes from the signed
/// cookies, and only counts while unexpired and owned by the caller.
/// Anonymous requests get an anonymous session and no scope.
///
/// Use with [`axum::middleware::from_fn_with_state`].
pub async fn resolve_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let now = state.impersonation.now();
    let jar = jar_from_headers(request.headers());
    let identity = request.extensions().get::<AuthenticatedIdentity>().cloned();

    let live = identity
        .as_ref()
        .and_then(|identity| state.cookies.read(&jar, &identity.user_id))
        .filter(|context| !context.is_expired(now));
    // Expired, forged, or issued to someone else.
    let stale = jar.get(TENANT_ID_COOKIE).is_some() && live.is_none();

    let session = match identity {
        Some(identity) => {
            let mut session = SessionContext::new(identity);
            if let Some(context) = live {
                session.set_impersonation(context);
            }
            session
        }
        None => SessionContext::anonymous(),
    };

    if session.identity.is_some() {
        match state.resolver.resolve_effective_tenant(&session).await {
            Ok(scope) => {
                request.extensions_mut().insert(scope);
            }
            Err(e) => return e.into_response(),
        }
    }
    request.extensions_mut().insert(session);

    let mut response = next.run(request).await;

    if stale && !response.headers().contains_key(header::SET_COOKIE) {
        tracing::debug!(
            target: "http.session.stale_cookies",
            "Clearing stale impersonation cookies"
        );
        let mut jar = CookieJar::new();
        state.cookies.clear(&mut jar);
        for value in set_cookie_headers(&jar) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

/// Refuse the route while the caller is impersonating.
///
/// Mount after [`resolve_session`]:
///
/// ```rust,ignore
/// Router::new()
///     .route("/tenants/{id}", delete(delete_tenant))
///     .route_layer(from_fn_with_state(
///         RestrictedOperation::DeleteTenant,
///         require_unrestricted,
///     ))
/// ```
pub async fn require_unrestricted(
    State(operation): State<RestrictedOperation>,
    request: Request,
    next: Next,
) -> Response {
    let Some(scope) = request.extensions().get::<TenantScope>() else {
        return TenantryError::unauthenticated("Authentication required").into_response();
    };
    if let Err(e) = enforce_operation_restriction(scope, operation) {
        return e.into_response();
    }
    next.run(request).await
}

/// Resolved scope. Rejects with 401 when [`resolve_session`] found no
/// identity.
impl<S> FromRequestParts<S> for TenantScope
where
    S: Send + Sync,
{
    type Rejection = TenantryError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantScope>()
            .cloned()
            .ok_or_else(|| TenantryError::unauthenticated("Authentication required"))
    }
}

/// Current session. Anonymous when [`resolve_session`] did not run.
impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .unwrap_or_else(SessionContext::anonymous))
    }
}
