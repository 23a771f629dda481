use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use docent_core::Docent;
use docent_llm::{ChatProvider, EmbeddingProvider};
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;

/// Room for multipart boundaries and headers on top of the largest accepted file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub(crate) struct AppState<E, C> {
    pub docent: Arc<Docent<E, C>>,
    pub started_at: Instant,
}

impl<E, C> Clone for AppState<E, C> {
    fn clone(&self) -> Self {
        Self {
            docent: Arc::clone(&self.docent),
            started_at: self.started_at,
        }
    }
}

pub struct GatewayServer<E, C> {
    addr: SocketAddr,
    max_body_size: usize,
    docent: Arc<Docent<E, C>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<E, C> GatewayServer<E, C>
where
    E: EmbeddingProvider + 'static,
    C: ChatProvider + 'static,
{
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        docent: Arc<Docent<E, C>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        if bind == "0.0.0.0" {
            tracing::warn!("server binding to 0.0.0.0, documents are reachable from the network");
        }

        let max_file_size =
            usize::try_from(docent.config().documents.max_file_size).unwrap_or(usize::MAX);
        Self {
            addr,
            max_body_size: max_file_size.saturating_add(MULTIPART_OVERHEAD),
            docent,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until the shutdown channel turns `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let state = AppState {
            docent: self.docent,
            started_at: Instant::now(),
        };
        let router = build_router(state, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!("docent listening on {}", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                while !*shutdown_rx.borrow_and_update() {
                    if shutdown_rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                tracing::info!("server shutting down");
            })
            .await
            .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}
