//! Credential store for the auth core.
//!
//! The core talks to storage only through [`CredentialStore`]. A store is
//! constructed once at boot and injected into the services that need it.

pub mod memory;
pub mod models;
pub mod operations;
pub mod store;

pub use memory::InMemoryCredentialStore;
pub use models::{Principal, PrincipalListing, PrincipalSummary, ProfileView, Role, RoleProfile};
pub use operations::PgCredentialStore;
pub use store::CredentialStore;
