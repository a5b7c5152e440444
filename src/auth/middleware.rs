//! Bearer-token authentication and role gating for actix routes.
//!
//! Wrap a scope or resource in [`RequireAuth`]; handlers behind it take an
//! [`AuthenticatedPrincipal`] argument. Role checks use the role embedded in
//! the token, so a role change takes effect only once the holder gets a new
//! token.

use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use futures::future::LocalBoxFuture;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::token::TokenService;
use crate::db::models::Role;
use crate::error::{AppError, AuthError};

/// Identity attached to a request once its token has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedPrincipal {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl FromRequest for AuthenticatedPrincipal {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        // Absent when the route was mounted without `RequireAuth`.
        let principal = req
            .extensions()
            .get::<AuthenticatedPrincipal>()
            .cloned()
            .ok_or_else(|| AppError::from(AuthError::MissingToken).into());
        ready(principal)
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware factory. `authenticated` admits any valid token; `roles`
/// further restricts it to the listed roles.
#[derive(Clone)]
pub struct RequireAuth {
    tokens: Arc<TokenService>,
    roles: Option<Rc<[Role]>>,
}

impl RequireAuth {
    pub fn authenticated(tokens: Arc<TokenService>) -> Self {
        Self { tokens, roles: None }
    }

    pub fn roles<I>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = Role>,
    {
        self.roles = Some(roles.into_iter().collect());
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequireAuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireAuthMiddleware {
            service: Rc::new(service),
            tokens: self.tokens.clone(),
            roles: self.roles.clone(),
        }))
    }
}

pub struct RequireAuthMiddleware<S> {
    service: Rc<S>,
    tokens: Arc<TokenService>,
    roles: Option<Rc<[Role]>>,
}

impl<S> RequireAuthMiddleware<S> {
    fn authorize(&self, req: &ServiceRequest) -> Result<AuthenticatedPrincipal, AuthError> {
        let token = bearer_token(req).ok_or(AuthError::MissingToken)?;

        let claims = self.tokens.verify(token).map_err(|e| {
            debug!("Token rejected on {}: {}", req.path(), e);
            AuthError::InvalidToken
        })?;

        if let Some(roles) = &self.roles {
            if !roles.contains(&claims.role) {
                warn!(
                    principal_id = %claims.sub,
                    role = %claims.role,
                    "Forbidden access to {}",
                    req.path()
                );
                return Err(AuthError::Forbidden);
            }
        }

        Ok(AuthenticatedPrincipal {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

impl<S, B> Service<ServiceRequest> for RequireAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match self.authorize(&req) {
            Ok(principal) => {
                req.extensions_mut().insert(principal);
                let service = self.service.clone();
                Box::pin(async move {
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                })
            }
            Err(e) => {
                // Rejections short-circuit here; the wrapped service never runs.
                let response = AppError::from(e).error_response();
                let rejected = req.into_response(response).map_into_right_body();
                Box::pin(async move { Ok(rejected) })
            }
        }
    }
}
