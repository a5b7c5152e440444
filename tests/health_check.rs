use actix_web::{test, web, App};
use career_compass_auth::{configure_routes, AppState, InMemoryCredentialStore, Settings};
use chrono::DateTime;
use std::sync::Arc;

#[actix_web::test]
async fn test_health_check() {
    let config = Settings::new_for_test().expect("Failed to load test config");
    let state = AppState::with_store(config, Arc::new(InMemoryCredentialStore::new()))
        .expect("Failed to build state");

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(|cfg| configure_routes(cfg, &state)),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body = test::read_body(resp).await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "ok");
    assert!(DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
}
