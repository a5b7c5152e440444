//! Authentication module.
//!
//! Password hashing, bearer-token issuance and verification, the
//! registration/login service and the actix middleware that gates
//! protected routes by role.

pub mod handlers;
pub mod middleware;
pub mod password;
mod rate_limit;
pub mod service;
pub mod token;

pub use middleware::{AuthenticatedPrincipal, RequireAuth};
pub use password::PasswordHasher;
pub use rate_limit::{RateLimiter, RateLimitConfig};
pub use service::{AuthOutcome, AuthService, NewRegistration};
pub use token::{Claims, TokenError, TokenService};
