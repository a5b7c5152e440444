use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use career_compass_auth::{configure_routes, AppState, Settings};
use dotenv::dotenv;
use std::net::TcpListener;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Request line, status, size and latency. Headers are deliberately absent so
// bearer tokens never reach the access log.
const ACCESS_LOG_FORMAT: &str = "%a \"%r\" %s %b %Dms";

fn build_cors(config: &Settings) -> Cors {
    if !config.cors.enabled {
        // CORS disabled - use most restrictive settings
        return Cors::default();
    }

    let cors = if config.cors.allow_any_origin {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
    } else {
        config
            .cors
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
            .allowed_headers(vec!["Authorization", "Content-Type", "Accept"])
            .supports_credentials()
    };

    cors.max_age(config.cors.max_age as usize)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Settings::new().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    info!("Configuration loaded successfully ({})", config.environment);

    let state = AppState::new(config)
        .await
        .context("failed to initialise application state")?;
    let config = state.config.clone();
    let data = web::Data::new(state.clone());

    // Drop idle login-throttle windows
    let limiter = state.login_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            limiter.cleanup().await;
        }
    });

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))
        .context("failed to bind listener")?;
    info!("Starting server at {}:{}", config.server.host, config.server.port);

    let server_state = state.clone();
    let server_config = config.clone();
    let result = HttpServer::new(move || {
        let routes_state = server_state.clone();
        App::new()
            .wrap(build_cors(&server_config))
            .wrap(Logger::new(ACCESS_LOG_FORMAT))
            .app_data(data.clone())
            .configure(move |cfg| configure_routes(cfg, &routes_state))
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await;

    if let Err(e) = &result {
        error!("Server terminated with error: {}", e);
    }

    state.shutdown().await?;
    info!("Credential store closed");

    result.context("server error")
}
