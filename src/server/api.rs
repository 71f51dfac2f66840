// src/server/api.rs
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
};
use hyper::http::header::InvalidHeaderValue;
use hyper::body::HttpBody;
use hyper::{Body, Method, Request, Response, StatusCode};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::health::Checker;
use crate::metrics::{MetricsCollector, MetricsRegistry, Timer};
use crate::site::{NewSite, SiteId, SiteStore};

use super::response::{body_response, empty_response, json_response, ApiError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Index,
    AddSite,
    GetSites,
    GetSite(String),
    CheckSite(String),
    Metrics,
}

impl Route {
    fn resolve(method: &Method, path: &str, metrics_path: Option<&str>) -> Result<Self, ApiError> {
        let (route, allowed) = match path {
            "/" => (Route::Index, Method::GET),
            "/add_site" => (Route::AddSite, Method::POST),
            "/get_sites" => (Route::GetSites, Method::GET),
            p if Some(p) == metrics_path => (Route::Metrics, Method::GET),
            p => match (param(p, "/get_site/"), param(p, "/check_site/")) {
                (Some(id), _) => (Route::GetSite(id.to_string()), Method::GET),
                (_, Some(id)) => (Route::CheckSite(id.to_string()), Method::POST),
                _ => return Err(ApiError::RouteNotFound),
            },
        };

        if *method == allowed || (allowed == Method::GET && *method == Method::HEAD) {
            Ok(route)
        } else {
            Err(ApiError::MethodNotAllowed)
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Route::Index => "/",
            Route::AddSite => "/add_site",
            Route::GetSites => "/get_sites",
            Route::GetSite(_) => "/get_site/:id",
            Route::CheckSite(_) => "/check_site/:id",
            Route::Metrics => "metrics",
        }
    }
}

/// Largest `/add_site` body accepted.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Metric label for a request method. Extension methods share one label.
fn method_label(method: &Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "POST" => "POST",
        "HEAD" => "HEAD",
        "OPTIONS" => "OPTIONS",
        _ => "other",
    }
}

/// Collect `body`, refusing anything past `limit` bytes.
async fn read_body(mut body: Body, limit: usize) -> Result<Vec<u8>, ApiError> {
    if body.size_hint().lower() > limit as u64 {
        return Err(ApiError::PayloadTooLarge(limit));
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| ApiError::MalformedRequest(e.to_string()))?;
        if bytes.len() + chunk.len() > limit {
            return Err(ApiError::PayloadTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// Single non-empty path segment after `prefix`.
fn param<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    path.strip_prefix(prefix)
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
}

/// HTTP surface over the site store and checker.
pub struct SiteApi {
    store: Arc<dyn SiteStore>,
    checker: Arc<Checker>,
    index_file: PathBuf,
    allow_origin: HeaderValue,
    metrics_path: String,
    registry: Option<Arc<MetricsRegistry>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl SiteApi {
    pub fn new(checker: Arc<Checker>, config: &Config) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            store: checker.store().clone(),
            checker,
            index_file: config.index_file.clone(),
            allow_origin: HeaderValue::from_str(&config.cors.allow_origin)?,
            metrics_path: config.metrics.path.clone(),
            registry: None,
            metrics: None,
        })
    }

    /// Expose `registry` at the configured metrics path and count requests.
    pub fn with_metrics(mut self, registry: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(registry.collector());
        self.registry = Some(registry);
        self
    }

    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let timer = Timer::new();
        let method = req.method().clone();
        let metrics_path = self.registry.as_ref().map(|_| self.metrics_path.as_str());

        let (label, result) = if method == Method::OPTIONS {
            ("preflight", Ok(empty_response(StatusCode::NO_CONTENT)))
        } else {
            match Route::resolve(&method, req.uri().path(), metrics_path) {
                Ok(route) => (route.label(), self.dispatch(route, req).await),
                Err(e) => ("unmatched", Err(e)),
            }
        };

        let mut response = result.unwrap_or_else(|e| e.into());
        self.apply_cors(&mut response);

        let elapsed = timer.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.record_request(method_label(&method), label, response.status().as_u16(), elapsed);
        }
        debug!(status = response.status().as_u16(), ?elapsed, "request complete");

        response
    }

    async fn dispatch(&self, route: Route, req: Request<Body>) -> Result<Response<Body>, ApiError> {
        match route {
            Route::Index => self.index().await,
            Route::AddSite => self.add_site(req).await,
            Route::GetSites => self.get_sites().await,
            Route::GetSite(id) => self.get_site(&id).await,
            Route::CheckSite(id) => self.check_site(&id).await,
            Route::Metrics => self.render_metrics(),
        }
    }

    async fn add_site(&self, req: Request<Body>) -> Result<Response<Body>, ApiError> {
        let bytes = read_body(req.into_body(), MAX_BODY_BYTES).await?;
        let new_site: NewSite = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::MalformedRequest(e.to_string()))?;

        let url = new_site.url.trim();
        if url.is_empty() {
            return Err(ApiError::MalformedRequest("url must not be empty".into()));
        }

        let site = self.store.create(url).await?;
        debug!("Added site {} ({})", site.id, site.url);

        Ok(json_response(StatusCode::OK, &json!({ "message": "Site added!" })))
    }

    async fn get_sites(&self) -> Result<Response<Body>, ApiError> {
        let sites = self.store.find_all().await?;
        Ok(json_response(StatusCode::OK, &sites))
    }

    async fn get_site(&self, id: &str) -> Result<Response<Body>, ApiError> {
        let site = self.find_site(id).await?;
        Ok(json_response(StatusCode::OK, &site))
    }

    async fn check_site(&self, id: &str) -> Result<Response<Body>, ApiError> {
        let site = self.find_site(id).await?;
        let site = self.checker.check_and_persist(site).await?;
        Ok(json_response(
            StatusCode::OK,
            &json!({ "message": "Site status updated", "site": site }),
        ))
    }

    async fn find_site(&self, id: &str) -> Result<crate::site::Site, ApiError> {
        // Ids that are not numbers cannot exist.
        let id: SiteId = id.parse().map_err(|_| ApiError::NotFound)?;
        self.store.find(id).await?.ok_or(ApiError::NotFound)
    }

    async fn index(&self) -> Result<Response<Body>, ApiError> {
        match tokio::fs::read(&self.index_file).await {
            Ok(contents) => Ok(body_response(StatusCode::OK, "text/html; charset=utf-8", contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::RouteNotFound),
            Err(e) => Err(e.into()),
        }
    }

    fn render_metrics(&self) -> Result<Response<Body>, ApiError> {
        let registry = self.registry.as_ref().ok_or(ApiError::RouteNotFound)?;
        let text = registry
            .gather()
            .map_err(|e| ApiError::Metrics(e.to_string()))?;
        Ok(body_response(StatusCode::OK, "text/plain; version=0.0.4", text))
    }

    fn apply_cors(&self, response: &mut Response<Body>) {
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Origin, Content-Type"),
        );
        headers.insert(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static("Content-Length"),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_routes() {
        let metrics = Some("/metrics");
        assert_eq!(Route::resolve(&Method::GET, "/", metrics).unwrap(), Route::Index);
        assert_eq!(
            Route::resolve(&Method::POST, "/add_site", metrics).unwrap(),
            Route::AddSite
        );
        assert_eq!(
            Route::resolve(&Method::GET, "/get_site/12", metrics).unwrap(),
            Route::GetSite("12".into())
        );
        assert_eq!(
            Route::resolve(&Method::POST, "/check_site/abc", metrics).unwrap(),
            Route::CheckSite("abc".into())
        );
        assert_eq!(
            Route::resolve(&Method::GET, "/metrics", metrics).unwrap(),
            Route::Metrics
        );
    }

    #[test]
    fn test_method_label_is_bounded() {
        assert_eq!(method_label(&Method::GET), "GET");
        assert_eq!(method_label(&Method::OPTIONS), "OPTIONS");
        assert_eq!(method_label(&Method::DELETE), "other");
        assert_eq!(method_label(&Method::from_bytes(b"BREW").unwrap()), "other");
    }

    #[tokio::test]
    async fn test_read_body_enforces_limit() {
        assert_eq!(read_body(Body::from("hello"), 5).await.unwrap(), b"hello");
        assert!(matches!(
            read_body(Body::from("hello!"), 5).await,
            Err(ApiError::PayloadTooLarge(5))
        ));

        // Streamed bodies have no size hint and are cut off while reading.
        let (mut sender, body) = Body::channel();
        tokio::spawn(async move {
            for _ in 0..4 {
                if sender.send_data("abc".into()).await.is_err() {
                    break;
                }
            }
        });
        assert!(matches!(
            read_body(body, 10).await,
            Err(ApiError::PayloadTooLarge(10))
        ));
    }

    #[test]
    fn test_resolve_rejects_unknown_and_wrong_method() {
        assert!(matches!(
            Route::resolve(&Method::GET, "/metrics", None),
            Err(ApiError::RouteNotFound)
        ));
        assert!(matches!(
            Route::resolve(&Method::GET, "/get_site/", None),
            Err(ApiError::RouteNotFound)
        ));
        assert!(matches!(
            Route::resolve(&Method::GET, "/get_site/1/extra", None),
            Err(ApiError::RouteNotFound)
        ));
        assert!(matches!(
            Route::resolve(&Method::GET, "/add_site", None),
            Err(ApiError::MethodNotAllowed)
        ));
        assert!(matches!(
            Route::resolve(&Method::GET, "/check_site/1", None),
            Err(ApiError::MethodNotAllowed)
        ));
    }
}
