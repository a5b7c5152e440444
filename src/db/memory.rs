use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{Principal, Role, RoleProfile};
use crate::db::store::CredentialStore;
use crate::error::StorageError;

#[derive(Default)]
struct Tables {
    principals: HashMap<Uuid, Principal>,
    by_email: HashMap<String, Uuid>,
    profiles: HashMap<Uuid, RoleProfile>,
}

/// Process-local credential store. Used by the test suites and for running
/// the service without a database.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn insert_principal_locked(tables: &mut Tables, principal: &Principal) -> Result<Uuid, StorageError> {
    if tables.by_email.contains_key(&principal.email) || tables.principals.contains_key(&principal.id) {
        return Err(StorageError::Duplicate);
    }
    tables.by_email.insert(principal.email.clone(), principal.id);
    tables.principals.insert(principal.id, principal.clone());
    Ok(principal.id)
}

fn insert_profile_locked(tables: &mut Tables, principal_id: Uuid, role: Role) -> Result<(), StorageError> {
    if !tables.principals.contains_key(&principal_id) {
        return Err(StorageError::NotFound);
    }
    if tables.profiles.contains_key(&principal_id) {
        return Err(StorageError::Duplicate);
    }
    if let Some(profile) = RoleProfile::empty_for(role) {
        tables.profiles.insert(principal_id, profile);
    }
    Ok(())
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_email
            .get(email)
            .and_then(|id| tables.principals.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, StorageError> {
        Ok(self.tables.read().await.principals.get(&id).cloned())
    }

    async fn insert_principal(&self, principal: &Principal) -> Result<Uuid, StorageError> {
        let mut tables = self.tables.write().await;
        insert_principal_locked(&mut tables, principal)
    }

    async fn insert_role_profile(&self, principal_id: Uuid, role: Role) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        insert_profile_locked(&mut tables, principal_id, role)
    }

    async fn create_principal(&self, principal: &Principal) -> Result<Uuid, StorageError> {
        // One write guard for both inserts keeps the pair atomic.
        let mut tables = self.tables.write().await;
        let id = insert_principal_locked(&mut tables, principal)?;
        if let Err(e) = insert_profile_locked(&mut tables, id, principal.role) {
            tables.principals.remove(&id);
            tables.by_email.remove(&principal.email);
            return Err(e);
        }
        Ok(id)
    }

    async fn find_role_profile(
        &self,
        principal_id: Uuid,
        _role: Role,
    ) -> Result<Option<RoleProfile>, StorageError> {
        Ok(self.tables.read().await.profiles.get(&principal_id).cloned())
    }

    async fn set_active(&self, principal_id: Uuid, active: bool) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        match tables.principals.get_mut(&principal_id) {
            Some(principal) => {
                principal.active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_principals(&self, role: Option<Role>) -> Result<Vec<Principal>, StorageError> {
        let tables = self.tables.read().await;
        let mut principals: Vec<Principal> = tables
            .principals
            .values()
            .filter(|p| role.map_or(true, |r| p.role == r))
            .cloned()
            .collect();
        principals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(principals)
    }
}
