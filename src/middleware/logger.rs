use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error,
};
use futures::future::LocalBoxFuture;
use log::{error, info, warn};
use std::rc::Rc;
use std::time::Instant;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Logs each request's start and completion with status and latency, and
/// tags the response with a request id.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
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
        let start_time = Instant::now();
        let request_id = uuid::Uuid::new_v4().to_string();
        let method = req.method().to_string();
        let path = req.path().to_string();

        info!("[{}] Request started: {} {}", request_id, method, path);

        let service = self.service.clone();

        Box::pin(async move {
            let result = service.call(req).await;
            let elapsed = start_time.elapsed().as_millis();

            let mut res = match result {
                Ok(res) => res,
                Err(e) => {
                    // Rejected before reaching a handler (e.g. by the auth guard)
                    warn!(
                        "[{}] Request rejected: {} {} - Status: {} ({}ms)",
                        request_id,
                        method,
                        path,
                        e.as_response_error().status_code().as_u16(),
                        elapsed
                    );
                    return Err(e);
                }
            };

            let status = res.status();
            if status.is_server_error() {
                error!(
                    "[{}] Request failed: {} {} - Status: {} ({}ms)",
                    request_id, method, path, status.as_u16(), elapsed
                );
            } else if status.is_client_error() {
                warn!(
                    "[{}] Request completed: {} {} - Status: {} ({}ms)",
                    request_id, method, path, status.as_u16(), elapsed
                );
            } else {
                info!(
                    "[{}] Request completed: {} {} - Status: {} ({}ms)",
                    request_id, method, path, status.as_u16(), elapsed
                );
            }

            if let Ok(value) = HeaderValue::from_str(&request_id) {
                res.headers_mut()
                    .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
            }

            Ok(res)
        })
    }
}
