use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::PasswordHasher;
use crate::auth::token::{Claims, TokenError, TokenService};
use crate::db::models::{Principal, PrincipalListing, PrincipalSummary, ProfileView, Role};
use crate::db::store::CredentialStore;
use crate::error::{AppError, AuthError, StorageError};

/// Validated registration input. The password is consumed by hashing and
/// never stored or logged.
#[derive(Clone)]
pub struct NewRegistration {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

impl fmt::Debug for NewRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewRegistration")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Token plus redacted principal, returned by register and login.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub token: String,
    pub user: PrincipalSummary,
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: Arc<TokenService>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    pub async fn register(&self, registration: NewRegistration) -> Result<AuthOutcome, AppError> {
        if self.store.find_by_email(&registration.email).await?.is_some() {
            return Err(AuthError::DuplicateEmail.into());
        }

        let password_hash = self.hash_password(registration.password).await?;

        let principal = Principal::new(
            registration.email,
            password_hash,
            registration.role,
            registration.first_name,
            registration.last_name,
            registration.phone,
        );

        // A concurrent registration can still win the race to the store.
        match self.store.create_principal(&principal).await {
            Ok(_) => {}
            Err(StorageError::Duplicate) => return Err(AuthError::DuplicateEmail.into()),
            Err(e) => return Err(e.into()),
        }

        info!(principal_id = %principal.id, role = %principal.role, "Principal registered");
        self.issue_outcome(&principal)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthOutcome, AppError> {
        let principal = match self.store.find_by_email(email).await? {
            Some(principal) => principal,
            None => {
                self.burn_verification(password.to_string()).await?;
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !principal.active {
            return Err(AuthError::AccountDeactivated.into());
        }

        let valid = self
            .verify_password(password.to_string(), principal.password_hash.clone())
            .await?;
        if !valid {
            return Err(AuthError::InvalidCredentials.into());
        }

        info!(principal_id = %principal.id, "Principal logged in");
        self.issue_outcome(&principal)
    }

    pub async fn get_profile(&self, principal_id: Uuid) -> Result<ProfileView, AppError> {
        let principal = self
            .store
            .find_by_id(principal_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        let role_profile = self
            .store
            .find_role_profile(principal.id, principal.role)
            .await?;

        Ok(ProfileView {
            id: principal.id,
            email: principal.email,
            role: principal.role,
            first_name: principal.first_name,
            last_name: principal.last_name,
            phone: principal.phone,
            created_at: principal.created_at,
            role_profile,
        })
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.tokens.verify(token)
    }

    /// Soft (de)activation. Tokens already issued stay valid until expiry;
    /// deactivation only blocks new logins.
    pub async fn set_active(&self, principal_id: Uuid, active: bool) -> Result<(), AppError> {
        if !self.store.set_active(principal_id, active).await? {
            return Err(AuthError::NotFound.into());
        }
        info!(principal_id = %principal_id, active, "Principal status updated");
        Ok(())
    }

    pub async fn list_principals(&self, role: Option<Role>) -> Result<Vec<PrincipalListing>, AppError> {
        let principals = self.store.list_principals(role).await?;
        Ok(principals.iter().map(PrincipalListing::from).collect())
    }

    fn issue_outcome(&self, principal: &Principal) -> Result<AuthOutcome, AppError> {
        let token = self
            .tokens
            .issue(principal.id, &principal.email, principal.role)?;
        Ok(AuthOutcome {
            token,
            user: principal.summary(),
        })
    }

    async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::HashingError(e.to_string()))?
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::HashingError(e.to_string()))
    }

    async fn burn_verification(&self, password: String) -> Result<(), AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify_dummy(&password))
            .await
            .map_err(|e| {
                warn!("Dummy verification task failed: {}", e);
                AppError::HashingError(e.to_string())
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryCredentialStore;
    use crate::db::models::RoleProfile;
    use crate::db::store::MockCredentialStore;
    use chrono::Duration;

    fn tokens() -> Arc<TokenService> {
        Arc::new(TokenService::new("test_secret", Duration::hours(1)))
    }

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(1024, 1, 1).unwrap()
    }

    fn service_with(store: Arc<dyn CredentialStore>) -> AuthService {
        AuthService::new(store, hasher(), tokens())
    }

    fn registration(email: &str, password: &str, role: Role) -> NewRegistration {
        NewRegistration {
            email: email.to_string(),
            password: password.to_string(),
            role,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: None,
        }
    }

    #[tokio::test]
    async fn test_register_then_login_preserves_role() {
        let service = service_with(Arc::new(InMemoryCredentialStore::new()));

        for (email, role) in [
            ("s@x.com", Role::Student),
            ("c@x.com", Role::Counselor),
            ("a@x.com", Role::Admin),
        ] {
            let registered = service.register(registration(email, "secret1", role)).await.unwrap();
            assert_eq!(registered.user.role, role);

            let outcome = service.login(email, "secret1").await.unwrap();
            let claims = service.verify_token(&outcome.token).unwrap();
            assert_eq!(claims.role, role);
            assert_eq!(claims.sub, registered.user.id);
            assert_eq!(claims.email, email);
        }
    }

    #[tokio::test]
    async fn test_password_is_stored_hashed() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let service = service_with(store.clone());
        service.register(registration("s@x.com", "secret1", Role::Student)).await.unwrap();

        let stored = store.find_by_email("s@x.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "secret1");
        assert!(!stored.password_hash.contains("secret1"));
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let service = service_with(Arc::new(InMemoryCredentialStore::new()));
        service.register(registration("s@x.com", "secret1", Role::Student)).await.unwrap();

        let err = service
            .register(registration("s@x.com", "other12", Role::Counselor))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_store_duplicate_race_maps_to_duplicate_email() {
        let mut store = MockCredentialStore::new();
        store.expect_find_by_email().returning(|_| Ok(None));
        store
            .expect_create_principal()
            .returning(|_| Err(StorageError::Duplicate));

        let service = service_with(Arc::new(store));
        let err = service
            .register(registration("s@x.com", "secret1", Role::Student))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_are_indistinguishable() {
        let service = service_with(Arc::new(InMemoryCredentialStore::new()));
        service.register(registration("s@x.com", "secret1", Role::Student)).await.unwrap();

        let wrong = service.login("s@x.com", "wrong").await.unwrap_err();
        let unknown = service.login("nobody@x.com", "secret1").await.unwrap_err();

        assert!(matches!(wrong, AppError::AuthError(AuthError::InvalidCredentials)));
        assert!(matches!(unknown, AppError::AuthError(AuthError::InvalidCredentials)));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_deactivated_account() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let service = service_with(store.clone());
        let outcome = service
            .register(registration("c@x.com", "secret1", Role::Counselor))
            .await
            .unwrap();

        service.set_active(outcome.user.id, false).await.unwrap();

        let correct = service.login("c@x.com", "secret1").await.unwrap_err();
        assert!(matches!(correct, AppError::AuthError(AuthError::AccountDeactivated)));

        // Independent of password correctness
        let wrong = service.login("c@x.com", "wrong").await.unwrap_err();
        assert!(matches!(wrong, AppError::AuthError(AuthError::AccountDeactivated)));

        service.set_active(outcome.user.id, true).await.unwrap();
        assert!(service.login("c@x.com", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn test_get_profile_includes_role_fields() {
        let service = service_with(Arc::new(InMemoryCredentialStore::new()));
        let outcome = service
            .register(registration("s@x.com", "secret1", Role::Student))
            .await
            .unwrap();

        let profile = service.get_profile(outcome.user.id).await.unwrap();
        assert_eq!(profile.email, "s@x.com");
        assert!(matches!(profile.role_profile, Some(RoleProfile::Student(_))));
    }

    #[tokio::test]
    async fn test_get_profile_of_deactivated_principal_still_resolves() {
        let service = service_with(Arc::new(InMemoryCredentialStore::new()));
        let outcome = service
            .register(registration("s@x.com", "secret1", Role::Student))
            .await
            .unwrap();
        service.set_active(outcome.user.id, false).await.unwrap();

        assert!(service.get_profile(outcome.user.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_get_profile_of_vanished_principal() {
        let service = service_with(Arc::new(InMemoryCredentialStore::new()));
        let err = service.get_profile(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_set_active_unknown_principal() {
        let service = service_with(Arc::new(InMemoryCredentialStore::new()));
        let err = service.set_active(Uuid::new_v4(), false).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let mut store = MockCredentialStore::new();
        store
            .expect_find_by_email()
            .returning(|_| Err(StorageError::ConnectionError("pool closed".into())));

        let service = service_with(Arc::new(store));

        let err = service.login("s@x.com", "secret1").await.unwrap_err();
        assert!(matches!(err, AppError::StorageError(StorageError::ConnectionError(_))));

        let err = service
            .register(registration("s@x.com", "secret1", Role::Student))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StorageError(_)));
    }

    #[tokio::test]
    async fn test_failed_insert_issues_no_token() {
        let mut store = MockCredentialStore::new();
        store.expect_find_by_email().returning(|_| Ok(None));
        store
            .expect_create_principal()
            .times(1)
            .returning(|_| Err(StorageError::QueryError("profile insert failed".into())));

        let service = service_with(Arc::new(store));
        let result = service
            .register(registration("s@x.com", "secret1", Role::Counselor))
            .await;
        assert!(matches!(result, Err(AppError::StorageError(StorageError::QueryError(_)))));
    }
}
