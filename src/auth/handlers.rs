use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::middleware::AuthenticatedPrincipal;
use crate::auth::service::{AuthOutcome, NewRegistration};
use crate::db::models::{PrincipalSummary, Role};
use crate::error::{AppError, AuthError};
use crate::AppState;

const MIN_PASSWORD_LEN: usize = 6;

// No `Debug`: these carry plaintext passwords.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub token: String,
    pub user: PrincipalSummary,
}

impl AuthResponse {
    fn new(message: &'static str, outcome: AuthOutcome) -> Self {
        Self {
            message,
            token: outcome.token,
            user: outcome.user,
        }
    }
}

/// Trims and lowercases an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Structural email check: one `@`, non-empty local part, dotted domain,
/// no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

impl RegisterRequest {
    pub fn validate(self) -> Result<NewRegistration, AppError> {
        let email = normalize_email(&self.email);
        let first_name = self.first_name.trim().to_string();
        let last_name = self.last_name.trim().to_string();

        let mut problems = Vec::new();
        if !is_valid_email(&email) {
            problems.push("A valid email is required");
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            problems.push("Password must be at least 6 characters");
        }
        if first_name.is_empty() {
            problems.push("First name is required");
        }
        if last_name.is_empty() {
            problems.push("Last name is required");
        }
        if !problems.is_empty() {
            return Err(AppError::ValidationError(problems.join("; ")));
        }

        let phone = self
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        Ok(NewRegistration {
            email,
            password: self.password,
            role: self.role,
            first_name,
            last_name,
            phone,
        })
    }
}

pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let registration = req.into_inner().validate()?;
    let email = registration.email.clone();
    info!("Received registration request for email: {}", email);

    match state.auth_service.register(registration).await {
        Ok(outcome) => {
            info!("Registration successful for email: {}", email);
            Ok(HttpResponse::Created().json(AuthResponse::new("User created successfully", outcome)))
        }
        Err(e) => {
            warn!("Registration failed for email: {}: {}", email, e);
            Err(e)
        }
    }
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) || req.password.is_empty() {
        return Err(AppError::ValidationError("Email and password are required".into()));
    }
    info!("Received login request for email: {}", email);

    if !state.login_limiter.check_rate_limit(&email).await {
        warn!("Login throttled for email: {}", email);
        return Err(AuthError::RateLimited.into());
    }

    match state.auth_service.login(&email, &req.password).await {
        Ok(outcome) => {
            state.login_limiter.reset(&email).await;
            info!("Login successful for email: {}", email);
            Ok(HttpResponse::Ok().json(AuthResponse::new("Login successful", outcome)))
        }
        Err(e) => {
            warn!("Login failed for email: {}: {}", email, e);
            Err(e)
        }
    }
}

pub async fn profile(
    principal: AuthenticatedPrincipal,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = state.auth_service.get_profile(principal.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "user": user })))
}
