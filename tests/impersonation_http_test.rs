//! End-to-end tests for the impersonation routes.

use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::middleware::{Next, from_fn, from_fn_with_state};
use axum::response::Response;
use axum::routing::delete;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tenantry::audit::{AuditEventType, AuditStore};
use tenantry::auth::{AuthenticatedIdentity, Profile, Role};
use tenantry::http::{AppState, require_unrestricted, resolve_session, router};
use tenantry::session::{SessionConfig, TENANT_ID_COOKIE};
use tenantry::tenancy::Tenant;
use tenantry::testing::{InMemoryAuditStore, InMemoryDirectory, InMemoryImpersonationStore};
use tenantry::{
    AuditLogger, ImpersonationCookies, ImpersonationManager, MockClock, RestrictedOperation,
    TenantResolver,
};
use tower::ServiceExt;

const USER_HEADER: &str = "x-test-user";

struct Harness {
    state: AppState,
    clock: Arc<MockClock>,
    records: Arc<InMemoryImpersonationStore>,
    audit: Arc<InMemoryAuditStore>,
}

fn harness() -> Harness {
    let clock = Arc::new(MockClock::new(Utc::now()));
    let directory = Arc::new(InMemoryDirectory::new());
    directory.insert_profile(Profile::admin("ops", "ops@ats.io", Role::Admin));
    directory.insert_profile(Profile::admin("ops2", "ops2@ats.io", Role::Admin));
    directory.insert_profile(Profile::customer("cust", "cust@acme.io", "tenant-a"));
    for (id, name) in [("tenant-a", "Acme"), ("tenant-b", "Globex")] {
        directory.insert_tenant(Tenant {
            id: id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        });
    }

    let records = Arc::new(InMemoryImpersonationStore::new());
    let audit = Arc::new(InMemoryAuditStore::new());
    let manager = ImpersonationManager::new(
        directory.clone(),
        directory.clone(),
        records.clone(),
        AuditLogger::new(audit.clone()).with_clock(clock.clone()),
    )
    .with_clock(clock.clone());

    let cookies = ImpersonationCookies::new(&SessionConfig {
        signing_key: Some("5a".repeat(64)),
        ..SessionConfig::default()
    })
    .unwrap();

    let state = AppState::new(
        Arc::new(manager),
        TenantResolver::new(directory).with_clock(clock.clone()),
        cookies,
    );

    Harness {
        state,
        clock,
        records,
        audit,
    }
}

/// Stand-in for upstream authentication.
async fn header_auth(mut request: Request, next: Next) -> Response {
    let user = request
        .headers()
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if let Some(user) = user {
        request
            .extensions_mut()
            .insert(AuthenticatedIdentity::new(user));
    }
    next.run(request).await
}

fn app(h: &Harness) -> Router {
    router(h.state.clone()).layer(from_fn(header_auth))
}

fn request(method: &str, uri: &str, user: Option<&str>, cookies: &str, body: Option<Value>) -> Request {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_HEADER, user);
    }
    if !cookies.is_empty() {
        builder = builder.header(header::COOKIE, cookies);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Turn Set-Cookie values into a request Cookie header, dropping removals.
fn cookie_header(set_cookies: &[String]) -> String {
    set_cookies
        .iter()
        .filter_map(|c| cookie::Cookie::parse(c.clone()).ok())
        .filter(|c| !c.value().is_empty())
        .map(|c| format!("{}={}", c.name(), c.value()))
        .collect::<Vec<_>>()
        .join("; ")
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn start(h: &Harness, user: Option<&str>, tenant_id: &str) -> Response {
    app(h)
        .oneshot(request(
            "POST",
            "/admin/impersonation",
            user,
            "",
            Some(serde_json::json!({ "tenant_id": tenant_id })),
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_admin_start_redirects_with_cookies() {
    let h = harness();
    let response = start(&h, Some("ops"), "tenant-a").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/dashboard");
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 3);
    assert!(cookies.iter().any(|c| c.starts_with(TENANT_ID_COOKIE)));

    assert_eq!(h.records.open_count(), 1);
    let recent = h.audit.list_recent(1).await.unwrap();
    assert_eq!(recent[0].event_type, AuditEventType::ImpersonationStarted);
    assert_eq!(recent[0].actor_id.as_deref(), Some("ops"));
}

#[tokio::test]
async fn test_start_errors_are_json() {
    let h = harness();

    let anonymous = start(&h, None, "tenant-a").await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(anonymous).await["reason"], "unauthenticated");

    let customer = start(&h, Some("cust"), "tenant-b").await;
    assert_eq!(customer.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(customer).await["reason"], "forbidden");

    let missing = start(&h, Some("ops"), "tenant-zzz").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    assert_eq!(h.records.open_count(), 0);
}

#[tokio::test]
async fn test_status_then_stop() {
    let h = harness();
    let started = start(&h, Some("ops"), "tenant-a").await;
    let cookies = cookie_header(&set_cookies(&started));

    let status = app(&h)
        .oneshot(request("GET", "/admin/impersonation", Some("ops"), &cookies, None))
        .await
        .unwrap();
    assert_eq!(status.status(), StatusCode::OK);
    let body = json_body(status).await;
    assert_eq!(body["is_impersonating"], true);
    assert_eq!(body["tenant_id"], "tenant-a");
    assert_eq!(body["tenant_name"], "Acme");

    let stopped = app(&h)
        .oneshot(request("DELETE", "/admin/impersonation", Some("ops"), &cookies, None))
        .await
        .unwrap();
    assert_eq!(stopped.status(), StatusCode::SEE_OTHER);
    assert_eq!(stopped.headers()[header::LOCATION], "/admin");
    let cleared = set_cookies(&stopped);
    assert_eq!(cleared.len(), 3);
    assert!(cleared.iter().all(|c| c.contains("Max-Age=0")));

    assert_eq!(h.records.open_count(), 0);
    assert!(h.records.all()[0].ended_at.is_some());
}

#[tokio::test]
async fn test_stop_without_impersonation_still_redirects() {
    let h = harness();
    let response = app(&h)
        .oneshot(request("DELETE", "/admin/impersonation", Some("ops"), "", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/admin");
    assert!(h.audit.entries().is_empty());
}

#[tokio::test]
async fn test_expired_cookies_ignored_and_cleared() {
    let h = harness();
    let started = start(&h, Some("ops"), "tenant-a").await;
    let cookies = cookie_header(&set_cookies(&started));

    h.clock.advance(Duration::from_secs(8 * 3600 + 60));

    let status = app(&h)
        .oneshot(request("GET", "/admin/impersonation", Some("ops"), &cookies, None))
        .await
        .unwrap();
    let cleared = set_cookies(&status);
    assert_eq!(cleared.len(), 3);
    assert_eq!(json_body(status).await["is_impersonating"], false);
}

#[tokio::test]
async fn test_forged_cookie_ignored() {
    let h = harness();
    let forged = format!("{}={}:tenant-b", TENANT_ID_COOKIE, Utc::now().timestamp() + 3600);
    let status = app(&h)
        .oneshot(request("GET", "/admin/impersonation", Some("ops"), &forged, None))
        .await
        .unwrap();
    assert_eq!(json_body(status).await["is_impersonating"], false);
}

#[tokio::test]
async fn test_cookies_left_by_another_admin_are_ignored() {
    let h = harness();
    let started = start(&h, Some("ops"), "tenant-a").await;
    let cookies = cookie_header(&set_cookies(&started));

    let status = app(&h)
        .oneshot(request("GET", "/admin/impersonation", Some("ops2"), &cookies, None))
        .await
        .unwrap();
    assert_eq!(set_cookies(&status).len(), 3);
    assert_eq!(json_body(status).await["is_impersonating"], false);

    let stopped = app(&h)
        .oneshot(request("DELETE", "/admin/impersonation", Some("ops2"), &cookies, None))
        .await
        .unwrap();
    assert_eq!(stopped.status(), StatusCode::SEE_OTHER);

    // The first admin's record is untouched.
    assert_eq!(h.records.open_count(), 1);
    let stops = h
        .audit
        .entries()
        .iter()
        .filter(|e| e.event_type == AuditEventType::ImpersonationStopped)
        .count();
    assert_eq!(stops, 0);
}

#[tokio::test]
async fn test_route_guard_blocks_while_impersonating() {
    let h = harness();
    let guarded = Router::new()
        .route(
            "/tenants/{id}",
            delete(|| async { StatusCode::NO_CONTENT }),
        )
        .route_layer(from_fn_with_state(
            RestrictedOperation::DeleteTenant,
            require_unrestricted,
        ))
        .layer(from_fn_with_state(h.state.clone(), resolve_session))
        .layer(from_fn(header_auth));

    let plain = guarded
        .clone()
        .oneshot(request("DELETE", "/tenants/tenant-b", Some("ops"), "", None))
        .await
        .unwrap();
    assert_eq!(plain.status(), StatusCode::NO_CONTENT);

    let started = start(&h, Some("ops"), "tenant-a").await;
    let cookies = cookie_header(&set_cookies(&started));
    let blocked = guarded
        .clone()
        .oneshot(request("DELETE", "/tenants/tenant-b", Some("ops"), &cookies, None))
        .await
        .unwrap();
    assert_eq!(blocked.status(), StatusCode::FORBIDDEN);
    let body = json_body(blocked).await;
    assert!(body["error"].as_str().unwrap().contains("delete a tenant"));

    let anonymous = guarded
        .oneshot(request("DELETE", "/tenants/tenant-b", None, "", None))
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let response = app(&h)
        .oneshot(request("GET", "/health", None, "", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(json_body(response).await["status"], "healthy");
}
