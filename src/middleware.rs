use actix_service::{forward_ready, Service};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ok, ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::error::ShopError;
use crate::models::Claims;

/// The verified caller, placed in request extensions by [`AuthMiddleware`].
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub claims: Claims,
}

impl FromRequest for Identity {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Identity>()
                .cloned()
                .ok_or_else(|| ShopError::unauthorized("Login required").into()),
        )
    }
}

// Middleware factory
pub struct AuthMiddleware {
    auth: Arc<AuthService>,
}

impl AuthMiddleware {
    pub fn new(auth: Arc<AuthService>) -> Self {
        AuthMiddleware { auth }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareMiddleware<S>;
    type InitError = ();

    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareMiddleware {
            service: Rc::new(service),
            auth: self.auth.clone(),
        })
    }
}

pub struct AuthMiddlewareMiddleware<S> {
    service: Rc<S>,
    auth: Arc<AuthService>,
}

fn bearer_token(req: &ServiceRequest) -> Result<String, ShopError> {
    let header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| ShopError::unauthorized("Authorization header missing"))?;
    let value = header
        .to_str()
        .map_err(|_| ShopError::unauthorized("Invalid authorization header"))?;
    value
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .ok_or_else(|| ShopError::unauthorized("Invalid authorization scheme"))
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let auth = self.auth.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let token = bearer_token(&req)?;
            let claims = match auth.verify(&token) {
                Ok(claims) => claims,
                Err(e) => {
                    log::debug!("rejected token for {}: {}", req.path(), e);
                    return Err(ShopError::unauthorized("Invalid token").into());
                }
            };
            req.extensions_mut().insert(Identity { user_id: claims.sub.clone(), claims });
            service.call(req).await
        })
    }
}
