/// JWT Authentication Middleware
///
/// Reads the access token from the `accessToken` cookie or the
/// `Authorization: Bearer` header, resolves it to a user and inserts the
/// resulting `AuthenticatedUser` into request extensions.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{select_token, SessionValidator};
use crate::cookies::ACCESS_TOKEN_COOKIE;

/// Guards every route of the scope it wraps
pub struct JwtMiddleware {
    validator: SessionValidator,
}

impl JwtMiddleware {
    pub fn new(validator: SessionValidator) -> Self {
        Self { validator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            validator: self.validator.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    validator: SessionValidator,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
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
        let cookie = req
            .cookie(ACCESS_TOKEN_COOKIE)
            .map(|c| c.value().to_string());
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        let token = select_token(cookie.as_deref(), header.as_deref());

        let validator = self.validator.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let user = validator.authenticate(token.as_deref()).await?;

            tracing::debug!(user_id = %user.id, "Access token validated");
            req.extensions_mut().insert(user);

            service.call(req).await
        })
    }
}
