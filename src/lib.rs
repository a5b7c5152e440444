pub mod admin;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;

use std::sync::Arc;
use std::time::Duration as StdDuration;
use actix_web::{web, HttpResponse};
use tracing::{debug, info};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use crate::config::Settings;

pub use auth::{AuthService, PasswordHasher, RateLimiter, RateLimitConfig, RequireAuth, TokenService};
pub use db::{CredentialStore, InMemoryCredentialStore, PgCredentialStore, Role};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "message": "Career Compass API is running",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all workers. Every component is built
/// once at boot and handed out by reference.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub store: Arc<dyn CredentialStore>,
    pub tokens: Arc<TokenService>,
    pub auth_service: Arc<AuthService>,
    pub login_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Connects to Postgres, applies migrations and wires the auth core.
    pub async fn new(config: Settings) -> Result<Self> {
        config.validate()?;

        let store = PgCredentialStore::new_with_options(
            &config.database.url,
            config.database.max_connections,
            StdDuration::from_secs(config.database.acquire_timeout_secs),
        )
        .await?;
        store.run_migrations().await?;
        info!("Connected to credential store");

        Self::with_store(config, Arc::new(store))
    }

    /// Wires the auth core around an already constructed store.
    pub fn with_store(config: Settings, store: Arc<dyn CredentialStore>) -> Result<Self> {
        config.validate()?;

        let tokens = Arc::new(TokenService::new(
            &config.auth.jwt_secret,
            chrono::Duration::hours(config.auth.token_ttl_hours),
        ));
        let hasher = PasswordHasher::from_config(&config.auth)?;
        let auth_service = Arc::new(AuthService::new(store.clone(), hasher, tokens.clone()));
        let login_limiter = Arc::new(RateLimiter::new(RateLimitConfig::from(&config.rate_limit)));

        Ok(Self {
            config: Arc::new(config),
            store,
            tokens,
            auth_service,
            login_limiter,
        })
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.store.close().await;
        Ok(())
    }
}

/// Mounts every route under `/api`. Registration and login are the only
/// public write routes; everything else sits behind `RequireAuth`.
pub fn configure_routes(cfg: &mut web::ServiceConfig, state: &AppState) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        AppError::ValidationError(format!("Invalid request body: {}", err)).into()
    });

    // Malformed path ids address no principal.
    let path_config = web::PathConfig::default().error_handler(|err, req| {
        debug!("Rejected path {}: {}", req.path(), err);
        AppError::from(error::AuthError::NotFound).into()
    });

    let query_config = web::QueryConfig::default().error_handler(|err, _req| {
        AppError::ValidationError(format!("Invalid query: {}", err)).into()
    });

    let api = web::scope("/api")
        .route("/health", web::get().to(health_check))
        .service(
            web::scope("/auth")
                .route("/register", web::post().to(auth::handlers::register))
                .route("/login", web::post().to(auth::handlers::login))
                .service(
                    web::resource("/profile")
                        .wrap(RequireAuth::authenticated(state.tokens.clone()))
                        .route(web::get().to(auth::handlers::profile)),
                ),
        )
        .service(
            web::scope("/admin")
                .wrap(RequireAuth::authenticated(state.tokens.clone()).roles([Role::Admin]))
                .route("/users", web::get().to(admin::list_users))
                .route("/users/{id}/status", web::patch().to(admin::update_user_status)),
        );

    cfg.app_data(json_config)
        .app_data(path_config)
        .app_data(query_config)
        .service(api);
}
