use async_trait::async_trait;
use uuid::Uuid;

use crate::db::models::{Principal, Role, RoleProfile};
use crate::error::StorageError;

/// Persistence boundary for principals and their role profiles.
///
/// Implementations own all concurrency discipline: a second insert for an
/// email that already exists must fail with [`StorageError::Duplicate`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StorageError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, StorageError>;

    async fn insert_principal(&self, principal: &Principal) -> Result<Uuid, StorageError>;

    async fn insert_role_profile(&self, principal_id: Uuid, role: Role) -> Result<(), StorageError>;

    /// Inserts the principal row and its role profile. Either both land or
    /// the call fails. The default runs the two inserts back to back and is
    /// only suitable for stores without transactions.
    async fn create_principal(&self, principal: &Principal) -> Result<Uuid, StorageError> {
        let id = self.insert_principal(principal).await?;
        if RoleProfile::empty_for(principal.role).is_some() {
            self.insert_role_profile(id, principal.role).await?;
        }
        Ok(id)
    }

    async fn find_role_profile(
        &self,
        principal_id: Uuid,
        role: Role,
    ) -> Result<Option<RoleProfile>, StorageError>;

    /// Returns `false` when no principal has this id.
    async fn set_active(&self, principal_id: Uuid, active: bool) -> Result<bool, StorageError>;

    /// Newest first. `role` narrows the listing to one role.
    async fn list_principals(&self, role: Option<Role>) -> Result<Vec<Principal>, StorageError>;

    async fn close(&self) {}
}
