use super::state::AppState;
use crate::error::Result;
use crate::impersonation::ImpersonationStatus;
use crate::request::RequestContext;
use crate::session::{SessionContext, set_cookie_headers};
use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use cookie::CookieJar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StartImpersonationRequest {
    pub tenant_id: String,
}

/// `POST /admin/impersonation`
pub async fn start_impersonation(
    State(state): State<AppState>,
    request: RequestContext,
    mut session: SessionContext,
    Json(body): Json<StartImpersonationRequest>,
) -> Result<Response> {
    let started = state
        .impersonation
        .start_impersonation(&mut session, &request, body.tenant_id.trim())
        .await?;

    let mut jar = CookieJar::new();
    state
        .cookies
        .write(&mut jar, &started.context, state.impersonation.now());
    Ok(redirect_with_cookies(&started.redirect_to, &jar))
}

/// `DELETE /admin/impersonation`. Always redirects to the admin view.
pub async fn stop_impersonation(
    State(state): State<AppState>,
    request: RequestContext,
    mut session: SessionContext,
) -> Response {
    let stopped = state
        .impersonation
        .stop_impersonation(&mut session, &request)
        .await;

    let mut jar = CookieJar::new();
    state.cookies.clear(&mut jar);
    redirect_with_cookies(&stopped.redirect_to, &jar)
}

/// `GET /admin/impersonation`
pub async fn impersonation_status(
    State(state): State<AppState>,
    session: SessionContext,
) -> Json<ImpersonationStatus> {
    Json(state.impersonation.get_impersonation_status(&session))
}

fn redirect_with_cookies(to: &str, jar: &CookieJar) -> Response {
    let mut response = Redirect::to(to).into_response();
    for value in set_cookie_headers(jar) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}
