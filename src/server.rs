//! HTTP boundary: serves the scrape endpoint and a liveness check.
//!
//! The server owns a [`Registry`] and renders it in the OpenMetrics
//! text format on every `/metrics` request. An exporter that refreshes
//! on demand registers a [`ScrapeHook`] which runs before rendering;
//! the timer-driven exporter registers none and the handler only reads
//! already-collected state.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus_client::encoding::text;
use prometheus_client::registry::Registry;
use tokio::net::TcpListener;

/// Content type of the OpenMetrics text exposition format.
pub const OPENMETRICS_CONTENT_TYPE: &str =
    "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Work to run at the start of every `/metrics` request, before the
/// registry is rendered.
///
/// The on-demand exporter refreshes its measurement here, inside the
/// request's own budget. Concurrent scrapes each trigger their own
/// refresh; they are not coalesced.
#[async_trait]
pub trait ScrapeHook: Send + Sync {
    async fn before_scrape(&self);
}

/// The metric registry plus the optional per-scrape refresh hook.
pub struct MetricsApp {
    registry: Registry,
    hook: Option<Arc<dyn ScrapeHook>>,
}

impl MetricsApp {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            hook: None,
        }
    }

    /// Run `hook` before rendering each scrape.
    pub fn with_scrape_hook(mut self, hook: Arc<dyn ScrapeHook>) -> Self {
        self.hook = Some(hook);
        self
    }
}

/// Bind `addr` and serve until the task is cancelled.
///
/// Failure to bind is the only fatal error; per-connection errors are
/// logged and the accept loop keeps going.
pub async fn serve(addr: SocketAddr, app: MetricsApp) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");
    serve_on(listener, app).await
}

/// Serve on an already-bound listener. Split out so tests can bind an
/// ephemeral port first.
pub async fn serve_on(listener: TcpListener, app: MetricsApp) -> anyhow::Result<()> {
    let app = Arc::new(app);
    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .context("failed to accept connection")?;
        let io = TokioIo::new(stream);
        let app = app.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, app.clone()));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(%peer, %err, "connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    app: Arc<MetricsApp>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match req.uri().path() {
        "/metrics" => {
            if let Some(hook) = &app.hook {
                hook.before_scrape().await;
            }
            let mut body = String::new();
            // Writing to a String never fails.
            text::encode(&mut body, &app.registry).unwrap();
            Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", OPENMETRICS_CONTENT_TYPE)
                .body(Full::new(Bytes::from(body)))
                .unwrap()
        }
        "/health" | "/healthz" => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/plain")
            .body(Full::new(Bytes::from("OK")))
            .unwrap(),
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header("Content-Type", "text/plain")
            .body(Full::new(Bytes::from("Not Found")))
            .unwrap(),
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn request(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let req = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(req.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    async fn spawn_server(app: MetricsApp) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = serve_on(listener, app).await;
        });
        addr
    }

    #[tokio::test]
    async fn test_health_is_ok_without_data() {
        let addr = spawn_server(MetricsApp::new(Registry::default())).await;
        let response = request(addr, "/healthz").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("OK"));
    }

    #[tokio::test]
    async fn test_metrics_renders_registry() {
        let addr = spawn_server(MetricsApp::new(Registry::default())).await;
        let response = request(addr, "/metrics").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("# EOF"));
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let addr = spawn_server(MetricsApp::new(Registry::default())).await;
        let response = request(addr, "/nope").await;
        assert!(response.starts_with("HTTP/1.1 404"));
    }

    #[tokio::test]
    async fn test_scrape_hook_runs_before_render() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[derive(Default)]
        struct Counter(AtomicUsize);

        #[async_trait]
        impl ScrapeHook for Counter {
            async fn before_scrape(&self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let hook = Arc::new(Counter::default());
        let app = MetricsApp::new(Registry::default()).with_scrape_hook(hook.clone());
        let addr = spawn_server(app).await;

        let _ = request(addr, "/metrics").await;
        let _ = request(addr, "/metrics").await;
        assert_eq!(hook.0.load(Ordering::SeqCst), 2);

        // Health checks never trigger a refresh.
        let _ = request(addr, "/healthz").await;
        assert_eq!(hook.0.load(Ordering::SeqCst), 2);
    }
}
