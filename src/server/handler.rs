// src/server/handler.rs
use hyper::{Body, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::api::SiteApi;

#[derive(Clone)]
pub struct RequestHandler {
    api: Arc<SiteApi>,
}

impl RequestHandler {
    pub fn new(api: Arc<SiteApi>) -> Self {
        Self { api }
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let api = self.api.clone();
        let span = info_span!(
            "request",
            id = %Uuid::new_v4(),
            method = %req.method(),
            path = %req.uri().path(),
        );
        Box::pin(async move { Ok(api.handle(req).await) }.instrument(span))
    }
}
