use crate::errors::RelayError;
use crate::http::{HandlerBody, error_response};
use crate::router::Router;
use hyper::body::Body;
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::future::Future;
use std::pin::Pin;

/// Hyper service for the relay listener.
///
/// Handler errors never reach hyper: they become a `500` with a JSON error body.
pub struct RelayService {
    router: Router,
}

impl RelayService {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

impl<B> Service<Request<B>> for RelayService
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: std::fmt::Display,
{
    type Response = Response<HandlerBody>;
    type Error = RelayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let router = self.router.clone();

        Box::pin(async move {
            match router.route(req).await {
                Ok(response) => Ok(response),
                Err(e) => {
                    tracing::error!(error = %e, "Request handler failed");
                    Ok(error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        &e.to_string(),
                    ))
                }
            }
        })
    }
}
