//! Isolation, guardrail and audit properties across the whole stack.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tenantry::admin::{NewUser, UserAdmin};
use tenantry::audit::AuditEventType;
use tenantry::auth::{AuthenticatedIdentity, Profile, Role, can_modify_user};
use tenantry::impersonation::{OperationGuard, actions, authorize};
use tenantry::tenancy::{Tenant, TenantFilter, TenantOwned};
use tenantry::testing::{InMemoryAuditStore, InMemoryDirectory, InMemoryImpersonationStore};
use tenantry::{
    AuditLogger, ConflictReason, ImpersonationManager, MockClock, RequestContext, SessionContext,
    TenantResolver, TenantScope, TenantryError,
};

#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    name: &'static str,
    tenant: &'static str,
}

impl TenantOwned for Candidate {
    fn tenant_id(&self) -> &str {
        self.tenant
    }
}

fn candidates() -> Vec<Candidate> {
    vec![
        Candidate { name: "ada", tenant: "tenant-a" },
        Candidate { name: "bo", tenant: "tenant-b" },
        Candidate { name: "cy", tenant: "tenant-a" },
    ]
}

struct World {
    directory: Arc<InMemoryDirectory>,
    records: Arc<InMemoryImpersonationStore>,
    audit: Arc<InMemoryAuditStore>,
    clock: Arc<MockClock>,
    manager: ImpersonationManager,
    resolver: TenantResolver,
    users: UserAdmin,
}

fn world() -> World {
    let clock = Arc::new(MockClock::new(
        DateTime::<Utc>::from_timestamp(1_750_000_000, 0).unwrap(),
    ));
    let directory = Arc::new(InMemoryDirectory::new());
    directory.insert_profile(Profile::admin("root", "root@ats.io", Role::SuperAdmin));
    directory.insert_profile(Profile::admin("ops", "ops@ats.io", Role::Admin));
    directory.insert_profile(Profile::customer("cust-a", "a@acme.io", "tenant-a"));
    directory.insert_profile(Profile::customer("cust-b", "b@globex.io", "tenant-b"));
    for (id, name) in [("tenant-a", "Acme"), ("tenant-b", "Globex")] {
        directory.insert_tenant(Tenant {
            id: id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        });
    }

    let records = Arc::new(InMemoryImpersonationStore::new());
    let audit = Arc::new(InMemoryAuditStore::new());
    let logger = AuditLogger::new(audit.clone()).with_clock(clock.clone());
    let manager = ImpersonationManager::new(
        directory.clone(),
        directory.clone(),
        records.clone(),
        logger.clone(),
    )
    .with_clock(clock.clone());
    let resolver = TenantResolver::new(directory.clone()).with_clock(clock.clone());
    let users = UserAdmin::new(directory.clone(), directory.clone(), logger);

    World {
        directory,
        records,
        audit,
        clock,
        manager,
        resolver,
        users,
    }
}

fn session(user_id: &str) -> SessionContext {
    SessionContext::new(AuthenticatedIdentity::new(user_id))
}

fn origin() -> RequestContext {
    RequestContext::new("198.51.100.4", "support-console")
}

#[tokio::test]
async fn test_customer_sees_only_own_tenant() {
    let w = world();
    let scope = w.resolver.resolve_effective_tenant(&session("cust-a")).await.unwrap();
    assert_eq!(scope.filter(), TenantFilter::Tenant("tenant-a".to_string()));

    let visible = scope.filter().apply(candidates());
    assert!(visible.iter().all(|c| c.tenant == "tenant-a"));
    assert_eq!(visible.len(), 2);

    let users = w.users.list_users(&scope).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, "cust-a");
}

#[tokio::test]
async fn test_unknown_caller_sees_nothing() {
    let w = world();
    let scope = w.resolver.resolve_effective_tenant(&session("ghost")).await.unwrap();
    assert_eq!(scope, TenantScope::least_privilege());
    assert_eq!(scope.filter(), TenantFilter::MatchNothing);
    assert!(scope.filter().apply(candidates()).is_empty());
    assert!(w.users.list_users(&scope).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_impersonation_overrides_home_tenant() {
    let w = world();
    let mut admin = session("ops");

    let before = w.resolver.resolve_effective_tenant(&admin).await.unwrap();
    assert_eq!(before.filter(), TenantFilter::AllTenants);

    w.manager
        .start_impersonation(&mut admin, &origin(), "tenant-b")
        .await
        .unwrap();
    let during = w.resolver.resolve_effective_tenant(&admin).await.unwrap();
    assert_eq!(during.tenant_id.as_deref(), Some("tenant-b"));
    assert!(during.is_admin);
    assert!(during.is_impersonating);

    let visible = during.filter().apply(candidates());
    assert_eq!(visible, vec![Candidate { name: "bo", tenant: "tenant-b" }]);

    // Hard ceiling: no sliding extension.
    w.clock.advance(Duration::from_secs(8 * 3600));
    let after = w.resolver.resolve_effective_tenant(&admin).await.unwrap();
    assert!(!after.is_impersonating);
    assert_eq!(after.filter(), TenantFilter::AllTenants);
}

#[tokio::test]
async fn test_customer_cannot_impersonate() {
    let w = world();
    let mut customer = session("cust-a");
    let err = w
        .manager
        .start_impersonation(&mut customer, &origin(), "tenant-b")
        .await
        .unwrap_err();
    assert!(matches!(err, TenantryError::Forbidden(_)));
    assert!(customer.impersonation().is_none());
    assert!(w.records.all().is_empty());
}

#[tokio::test]
async fn test_restricted_operations_blocked_while_impersonating() {
    let w = world();
    let mut admin = session("root");
    w.manager
        .start_impersonation(&mut admin, &origin(), "tenant-a")
        .await
        .unwrap();
    let scope = w.resolver.resolve_effective_tenant(&admin).await.unwrap();

    assert!(authorize::<actions::DeleteTenant>(&scope).is_err());
    assert!(authorize::<actions::DeleteUser>(&scope).is_err());
    assert!(authorize::<actions::ChangePassword>(&scope).is_err());
    assert!(authorize::<actions::UpdateBilling>(&scope).is_err());
    assert!(authorize::<actions::TransferOwnership>(&scope).is_err());
    assert!(authorize::<actions::ManageAdminUsers>(&scope).is_err());
    assert!(authorize::<actions::ManageTenantRecords>(&scope).is_ok());

    let ran = AtomicBool::new(false);
    let result = OperationGuard::run::<actions::DeleteUser, _, _, _>(&scope, |permit| async {
        ran.store(true, Ordering::SeqCst);
        w.users.delete_user(&admin, &origin(), "cust-a", permit).await
    })
    .await;
    assert!(matches!(result, Err(TenantryError::Forbidden(_))));
    assert!(!ran.load(Ordering::SeqCst));
    assert!(w.directory.profile("cust-a").is_some());
}

#[tokio::test]
async fn test_start_and_stop_are_paired_in_audit() {
    let w = world();
    let mut admin = session("ops");
    let started = w
        .manager
        .start_impersonation(&mut admin, &origin(), "tenant-a")
        .await
        .unwrap();
    let record_id = started.context.audit_log_id.clone().unwrap();

    w.clock.advance(Duration::from_secs(600));
    let stopped = w.manager.stop_impersonation(&mut admin, &origin()).await;
    assert_eq!(stopped.closed_record_id.as_deref(), Some(record_id.as_str()));

    let record = &w.records.all()[0];
    assert_eq!(record.admin_id, "ops");
    assert_eq!(record.ip_address.as_deref(), Some("198.51.100.4"));
    assert_eq!(record.ended_at, Some(record.started_at + TimeDelta::minutes(10)));

    let events: Vec<_> = w.audit.entries().iter().map(|e| e.event_type).collect();
    assert_eq!(
        events,
        vec![
            AuditEventType::ImpersonationStarted,
            AuditEventType::ImpersonationStopped
        ]
    );
}

#[tokio::test]
async fn test_failed_close_still_ends_session_and_sweep_recovers() {
    let w = world();
    let mut admin = session("ops");
    w.manager
        .start_impersonation(&mut admin, &origin(), "tenant-a")
        .await
        .unwrap();

    w.records.fail_writes(true);
    let stopped = w.manager.stop_impersonation(&mut admin, &origin()).await;
    assert!(stopped.was_impersonating);
    assert!(admin.impersonation().is_none());
    assert_eq!(w.records.open_count(), 1);

    w.records.fail_writes(false);
    w.clock.advance(Duration::from_secs(9 * 3600));
    assert_eq!(w.manager.close_stale_records().await.unwrap(), 1);

    let record = &w.records.all()[0];
    assert_eq!(record.ended_at, Some(record.started_at + TimeDelta::hours(8)));
}

#[tokio::test]
async fn test_switching_tenant_closes_previous_record() {
    let w = world();
    let mut admin = session("ops");
    w.manager
        .start_impersonation(&mut admin, &origin(), "tenant-a")
        .await
        .unwrap();
    w.manager
        .start_impersonation(&mut admin, &origin(), "tenant-b")
        .await
        .unwrap();

    assert_eq!(w.records.all().len(), 2);
    assert_eq!(w.records.open_count(), 1);
    assert_eq!(admin.impersonation().unwrap().tenant_id, "tenant-b");
}

#[test]
fn test_role_matrix() {
    use Role::*;
    let expected = [
        (SuperAdmin, SuperAdmin, false),
        (SuperAdmin, Admin, true),
        (SuperAdmin, Customer, true),
        (Admin, SuperAdmin, false),
        (Admin, Admin, false),
        (Admin, Customer, true),
        (Customer, SuperAdmin, false),
        (Customer, Admin, false),
        (Customer, Customer, false),
    ];
    for (actor, target, allowed) in expected {
        assert_eq!(can_modify_user(actor, target), allowed, "{actor} -> {target}");
    }
    assert_eq!(Role::parse("recruiter"), Customer);
}

#[tokio::test]
async fn test_last_admin_cannot_be_deleted() {
    let w = world();
    let scope = w.resolver.resolve_effective_tenant(&session("root")).await.unwrap();
    w.directory.override_admin_count(Some(1));

    let permit = authorize::<actions::DeleteUser>(&scope).unwrap();
    let err = w
        .users
        .delete_user(&session("root"), &origin(), "ops", permit)
        .await
        .unwrap_err();
    assert!(matches!(err, TenantryError::Conflict(ConflictReason::LastAdmin)));
    assert!(w.directory.profile("ops").is_some());
    assert!(w.audit.entries().is_empty());
}

#[tokio::test]
async fn test_admin_can_provision_customer_into_tenant() {
    let w = world();
    let scope = w.resolver.resolve_effective_tenant(&session("ops")).await.unwrap();
    let permit = authorize::<actions::ManageTenantRecords>(&scope).unwrap();
    let created = w
        .users
        .create_customer(
            &session("ops"),
            &origin(),
            "tenant-b",
            NewUser {
                email: "new@globex.io".to_string(),
                full_name: Some("New Hire".to_string()),
            },
            permit,
        )
        .await
        .unwrap();

    assert_eq!(created.tenant_id.as_deref(), Some("tenant-b"));
    assert!(created.is_consistent());
    let globex = w
        .users
        .list_users(&TenantScope {
            tenant_id: Some("tenant-b".to_string()),
            is_admin: false,
            is_impersonating: false,
        })
        .await
        .unwrap();
    assert_eq!(globex.len(), 2);
}
