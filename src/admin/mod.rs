//! Admin-only principal management. Mounted behind
//! `RequireAuth::authenticated(..).roles([Role::Admin])`.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedPrincipal;
use crate::db::Role;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<Role>,
}

pub async fn list_users(
    query: web::Query<ListUsersQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let users = state.auth_service.list_principals(query.role).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "users": users })))
}

pub async fn update_user_status(
    admin: AuthenticatedPrincipal,
    path: web::Path<Uuid>,
    req: web::Json<UpdateStatusRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    info!(
        admin_id = %admin.id,
        user_id = %user_id,
        is_active = req.is_active,
        "Admin updating user status"
    );

    state.auth_service.set_active(user_id, req.is_active).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "User status updated successfully"
    })))
}
