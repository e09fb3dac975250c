use crate::admin::UserStore;
use crate::audit::{AuditEntry, AuditStore};
use crate::auth::{AuthenticatedIdentity, IdentityProvider, Profile, ProfileStore, Role};
use crate::error::{Result, TenantryError};
use crate::impersonation::{ImpersonationAuditRecord, ImpersonationStore};
use crate::tenancy::{Tenant, TenantFilter, TenantStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

fn injected(flag: &AtomicBool, what: &str) -> Result<()> {
    if flag.load(Ordering::SeqCst) {
        Err(TenantryError::store(format!("injected {} failure", what)))
    } else {
        Ok(())
    }
}

/// Users, tenants and credentials in one in-memory directory.
///
/// Implements [`ProfileStore`], [`UserStore`], [`TenantStore`] and
/// [`IdentityProvider`].
#[derive(Default)]
pub struct InMemoryDirectory {
    profiles: RwLock<BTreeMap<String, Profile>>,
    tenants: RwLock<BTreeMap<String, Tenant>>,
    passwords: RwLock<HashMap<String, String>>,
    admin_count_override: RwLock<Option<usize>>,
    fail_profile_reads: AtomicBool,
    fail_last_login: AtomicBool,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_profile(&self, profile: Profile) {
        write(&self.profiles).insert(profile.id.clone(), profile);
    }

    pub fn insert_tenant(&self, tenant: Tenant) {
        write(&self.tenants).insert(tenant.id.clone(), tenant);
    }

    pub fn set_password(&self, user_id: &str, password: &str) {
        write(&self.passwords).insert(user_id.to_string(), password.to_string());
    }

    pub fn password_of(&self, user_id: &str) -> Option<String> {
        read(&self.passwords).get(user_id).cloned()
    }

    pub fn profile(&self, user_id: &str) -> Option<Profile> {
        read(&self.profiles).get(user_id).cloned()
    }

    pub fn deactivate(&self, user_id: &str) {
        if let Some(profile) = write(&self.profiles).get_mut(user_id) {
            profile.is_active = false;
        }
    }

    /// Force `count_admins` to report `count`. `None` restores the real count.
    pub fn override_admin_count(&self, count: Option<usize>) {
        *write(&self.admin_count_override) = count;
    }

    pub fn fail_profile_reads(&self, fail: bool) {
        self.fail_profile_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_last_login(&self, fail: bool) {
        self.fail_last_login.store(fail, Ordering::SeqCst);
    }

    fn update<F: FnOnce(&mut Profile)>(&self, user_id: &str, f: F) -> Result<()> {
        let mut profiles = write(&self.profiles);
        let profile = profiles
            .get_mut(user_id)
            .ok_or_else(|| TenantryError::not_found("User not found"))?;
        f(profile);
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryDirectory {
    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        injected(&self.fail_profile_reads, "profile read")?;
        Ok(read(&self.profiles).get(user_id).cloned())
    }

    async fn record_last_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        injected(&self.fail_last_login, "last login")?;
        self.update(user_id, |p| p.last_login_at = Some(at))
    }
}

#[async_trait]
impl UserStore for InMemoryDirectory {
    async fn list_users(&self, filter: &TenantFilter) -> Result<Vec<Profile>> {
        Ok(read(&self.profiles)
            .values()
            .filter(|p| match (filter, &p.tenant_id) {
                (TenantFilter::AllTenants, _) => true,
                (_, Some(tenant_id)) => filter.permits(tenant_id),
                (_, None) => false,
            })
            .cloned()
            .collect())
    }

    async fn insert_user(&self, profile: &Profile) -> Result<()> {
        let mut profiles = write(&self.profiles);
        if profiles.values().any(|p| p.email.eq_ignore_ascii_case(&profile.email)) {
            return Err(TenantryError::bad_request("Email already in use"));
        }
        profiles.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn count_admins(&self) -> Result<usize> {
        if let Some(count) = *read(&self.admin_count_override) {
            return Ok(count);
        }
        Ok(read(&self.profiles)
            .values()
            .filter(|p| p.role.is_admin())
            .count())
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        write(&self.passwords).remove(user_id);
        Ok(write(&self.profiles).remove(user_id).is_some())
    }

    async fn set_active(&self, user_id: &str, active: bool) -> Result<()> {
        self.update(user_id, |p| p.is_active = active)
    }

    async fn set_role(&self, user_id: &str, role: Role, tenant_id: Option<String>) -> Result<()> {
        self.update(user_id, |p| {
            p.role = role;
            p.tenant_id = tenant_id;
        })
    }

    async fn set_must_change_password(&self, user_id: &str, value: bool) -> Result<()> {
        self.update(user_id, |p| p.must_change_password = value)
    }
}

#[async_trait]
impl TenantStore for InMemoryDirectory {
    async fn find_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>> {
        Ok(read(&self.tenants).get(tenant_id).cloned())
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        Ok(read(&self.tenants).values().cloned().collect())
    }

    async fn create_tenant(&self, tenant: &Tenant) -> Result<()> {
        write(&self.tenants).insert(tenant.id.clone(), tenant.clone());
        Ok(())
    }

    async fn rename_tenant(&self, tenant_id: &str, name: &str) -> Result<bool> {
        match write(&self.tenants).get_mut(tenant_id) {
            Some(tenant) => {
                tenant.name = name.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_tenant(&self, tenant_id: &str) -> Result<bool> {
        let removed = write(&self.tenants).remove(tenant_id).is_some();
        if removed {
            write(&self.profiles).retain(|_, p| p.tenant_id.as_deref() != Some(tenant_id));
        }
        Ok(removed)
    }
}

#[async_trait]
impl IdentityProvider for InMemoryDirectory {
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AuthenticatedIdentity>> {
        let user = read(&self.profiles)
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .map(|p| (p.id.clone(), p.email.clone()));

        let Some((user_id, email)) = user else {
            return Ok(None);
        };
        let matches = read(&self.passwords)
            .get(&user_id)
            .is_some_and(|stored| stored == password);

        Ok(matches.then(|| AuthenticatedIdentity::new(user_id).with_email(email)))
    }

    async fn update_password(&self, user_id: &str, new_password: &str) -> Result<()> {
        if !read(&self.profiles).contains_key(user_id) {
            return Err(TenantryError::not_found("User not found"));
        }
        self.set_password(user_id, new_password);
        Ok(())
    }
}

/// Impersonation audit records in memory.
#[derive(Default)]
pub struct InMemoryImpersonationStore {
    records: RwLock<Vec<ImpersonationAuditRecord>>,
    fail_writes: AtomicBool,
}

impl InMemoryImpersonationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_record` and `close_record` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<ImpersonationAuditRecord> {
        read(&self.records).clone()
    }

    pub fn open_count(&self) -> usize {
        read(&self.records).iter().filter(|r| r.is_open()).count()
    }
}

#[async_trait]
impl ImpersonationStore for InMemoryImpersonationStore {
    async fn create_record(&self, record: &ImpersonationAuditRecord) -> Result<()> {
        injected(&self.fail_writes, "impersonation record write")?;
        write(&self.records).push(record.clone());
        Ok(())
    }

    async fn get_record(&self, record_id: &str) -> Result<Option<ImpersonationAuditRecord>> {
        Ok(read(&self.records).iter().find(|r| r.id == record_id).cloned())
    }

    async fn close_record(&self, record_id: &str, ended_at: DateTime<Utc>) -> Result<bool> {
        injected(&self.fail_writes, "impersonation record write")?;
        let mut records = write(&self.records);
        match records.iter_mut().find(|r| r.id == record_id && r.is_open()) {
            Some(record) => {
                record.ended_at = Some(ended_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn open_records_for_admin(&self, admin_id: &str) -> Result<Vec<ImpersonationAuditRecord>> {
        Ok(read(&self.records)
            .iter()
            .filter(|r| r.admin_id == admin_id && r.is_open())
            .cloned()
            .collect())
    }

    async fn open_records_started_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ImpersonationAuditRecord>> {
        Ok(read(&self.records)
            .iter()
            .filter(|r| r.is_open() && r.started_at < cutoff)
            .cloned()
            .collect())
    }
}

/// Audit log in memory.
#[derive(Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
    fail_writes: AtomicBool,
}

impl InMemoryAuditStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        read(&self.entries).clone()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        injected(&self.fail_writes, "audit write")?;
        write(&self.entries).push(entry.clone());
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        Ok(read(&self.entries).iter().rev().take(limit).cloned().collect())
    }

    async fn list_for_actor(&self, actor_id: &str, limit: usize) -> Result<Vec<AuditEntry>> {
        Ok(read(&self.entries)
            .iter()
            .rev()
            .filter(|e| e.actor_id.as_deref() == Some(actor_id))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_record_only_once() {
        let store = InMemoryImpersonationStore::new();
        let started = Utc::now();
        store
            .create_record(&ImpersonationAuditRecord {
                id: "r1".to_string(),
                admin_id: "a".to_string(),
                tenant_id: "t".to_string(),
                started_at: started,
                ended_at: None,
                ip_address: None,
                user_agent: None,
            })
            .await
            .unwrap();

        let first = started + chrono::TimeDelta::minutes(5);
        assert!(store.close_record("r1", first).await.unwrap());
        assert!(!store.close_record("r1", first + chrono::TimeDelta::minutes(5)).await.unwrap());
        assert_eq!(store.get_record("r1").await.unwrap().unwrap().ended_at, Some(first));
    }

    #[tokio::test]
    async fn test_verify_credentials() {
        let directory = InMemoryDirectory::new();
        directory.insert_profile(Profile::customer("u1", "Rae@Acme.io", "t1"));
        directory.set_password("u1", "hunter22");

        let identity = directory
            .verify_credentials("rae@acme.io", "hunter22")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.user_id, "u1");
        assert!(directory.verify_credentials("rae@acme.io", "nope").await.unwrap().is_none());
        assert!(directory.verify_credentials("x@acme.io", "hunter22").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let store = InMemoryAuditStore::new();
        for (i, event_type) in [
            crate::audit::AuditEventType::LoginSucceeded,
            crate::audit::AuditEventType::Logout,
        ]
        .into_iter()
        .enumerate()
        {
            store
                .append(&AuditEntry {
                    id: i.to_string(),
                    event_type,
                    actor_id: Some("u1".to_string()),
                    target_type: crate::audit::TargetType::Session,
                    target_id: None,
                    target_name: None,
                    metadata: None,
                    ip_address: None,
                    user_agent: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let recent = store.list_recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "1");
        assert_eq!(store.list_for_actor("u1", 10).await.unwrap().len(), 2);
    }
}
