// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::server::listener::bind_tcp;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hyper::{server::conn::Http, Body, Request, Response};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tower::Service;

/// Pause after a failed `accept()` (e.g. out of file descriptors) before
/// trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Source of incoming connections.
#[async_trait]
pub trait Accept: Send {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl Accept for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Builder pattern so `main.rs` can inject the API handler.
pub struct ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    addr: SocketAddr,
    listener: Option<TcpListener>,
    handler: Option<H>,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            listener: None,
            handler: None,
        }
    }

    /// Serve on an already bound listener instead of binding `addr`.
    pub fn with_listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Accept connections until `signal` resolves. Connections already
    /// accepted keep running on their own tasks.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let handler = self
            .handler
            .ok_or_else(|| anyhow!("handler must be set via with_handler()"))?;

        let listener = match self.listener {
            Some(listener) => listener,
            None => bind_tcp(self.addr).await?,
        };

        accept_loop(listener, handler, signal).await
    }
}

/// Hand every accepted connection to `handler` until `signal` resolves.
/// Accept failures are logged and retried, never returned.
pub async fn accept_loop<A, H, F>(listener: A, handler: H, signal: F) -> Result<()>
where
    A: Accept,
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
    F: Future<Output = ()>,
{
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);

    tokio::pin!(signal);

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = &mut signal => {
                tracing::info!("HTTP server no longer accepting connections");
                return Ok(());
            }
        };

        let (stream, peer) = match accepted {
            Ok(conn) => conn,
            Err(err) => {
                tracing::error!(%err, "failed to accept connection");
                tokio::select! {
                    _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                    _ = &mut signal => {
                        tracing::info!("HTTP server no longer accepting connections");
                        return Ok(());
                    }
                }
                continue;
            }
        };
        let svc = handler.clone();

        // One Tokio task per connection.
        tokio::spawn(async move {
            let http = Http::new();
            if let Err(err) = http.serve_connection(stream, svc).await {
                tracing::warn!(%peer, %err, "connection error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fails the first `failures` accepts with EMFILE, then behaves.
    struct Flaky {
        inner: TcpListener,
        failures: AtomicUsize,
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Accept for Flaky {
        async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(io::Error::from_raw_os_error(24));
            }
            self.inner.accept().await
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            self.inner.local_addr()
        }
    }

    #[tokio::test]
    async fn test_accept_errors_do_not_stop_the_server() {
        let inner = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = inner.local_addr().unwrap();
        let attempts = Arc::new(AtomicUsize::new(0));
        let listener = Flaky {
            inner,
            failures: AtomicUsize::new(3),
            attempts: attempts.clone(),
        };

        let handler = tower::service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(Response::new(Body::from("ok")))
        });
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(accept_loop(listener, handler, async {
            let _ = stop_rx.await;
        }));

        let body = reqwest::get(format!("http://{}/", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");
        assert!(attempts.load(Ordering::SeqCst) >= 4);
        assert!(!server.is_finished());

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_during_backoff() {
        let inner = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let listener = Flaky {
            inner,
            failures: AtomicUsize::new(usize::MAX),
            attempts: Arc::new(AtomicUsize::new(0)),
        };
        let handler = tower::service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(Response::new(Body::empty()))
        });

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            accept_loop(listener, handler, tokio::time::sleep(Duration::from_millis(250))),
        )
        .await
        .expect("server did not stop");
        assert!(result.is_ok());
    }
}
