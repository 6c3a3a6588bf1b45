//! Web server for xCloud.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::config::{Config, WebConfig};
use crate::storage::StorageService;
use crate::{Result, XcloudError};

use super::handlers::AppState;
use super::middleware::{ApiKeyState, RateLimitState};
use super::router::create_router;

/// How often idle directory locks are dropped.
const LOCK_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

/// Web server for the API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// API keys.
    keys: Arc<ApiKeyState>,
    /// Per-client rate limiters.
    rate_limits: Arc<RateLimitState>,
    /// Web configuration.
    web_config: WebConfig,
}

impl WebServer {
    /// Create a new web server over an opened storage service.
    pub fn new(config: &Config, storage: Arc<StorageService>) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| XcloudError::Config(format!("invalid listen address: {e}")))?;

        Ok(Self {
            addr,
            app_state: Arc::new(AppState::new(storage)),
            keys: Arc::new(ApiKeyState::from_config(&config.auth)),
            rate_limits: Arc::new(RateLimitState::new(
                config.web.api_rate_limit,
                config.web.upload_rate_limit,
            )),
            web_config: config.web.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Periodically drop idle directory locks.
    fn start_lock_cleanup_task(storage: Arc<StorageService>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(LOCK_CLEANUP_INTERVAL);

            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;
                storage.cleanup_locks();
                tracing::debug!("Cleaned up idle directory locks");
            }
        });
    }

    /// Build the router and start the background tasks.
    fn into_app(self) -> (SocketAddr, Router) {
        Self::start_lock_cleanup_task(self.app_state.storage.clone());
        self.rate_limits.clone().start_cleanup_task();

        let router = create_router(
            self.app_state,
            self.keys,
            self.rate_limits,
            &self.web_config,
        )
        .layer(CompressionLayer::new());

        (self.addr, router)
    }

    /// Run the web server until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let (addr, router) = self.into_app();

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Web server stopped");
        Ok(())
    }

    /// Run the server in the background and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let (addr, router) = self.into_app();

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl-C, shutting down"),
        Err(e) => {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::SearchZone;
    use crate::storage::PublicLinkRegistry;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn create_test_config() -> Config {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config.auth.main_api_key = "main".to_string();
        config.auth.upload_api_key = "upload".to_string();
        config
    }

    fn create_test_storage(dir: &TempDir) -> Arc<StorageService> {
        Arc::new(
            StorageService::new(dir.path(), PublicLinkRegistry::in_memory(), SearchZone::Local)
                .unwrap(),
        )
    }

    #[test]
    fn test_web_server_new() {
        let dir = TempDir::new().unwrap();
        let server = WebServer::new(&create_test_config(), create_test_storage(&dir)).unwrap();
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");
    }

    #[test]
    fn test_web_server_rejects_bad_host() {
        let dir = TempDir::new().unwrap();
        let mut config = create_test_config();
        config.server.host = "not a host".to_string();
        assert!(WebServer::new(&config, create_test_storage(&dir)).is_err());
    }

    #[tokio::test]
    async fn test_web_server_run() {
        let dir = TempDir::new().unwrap();
        let server = WebServer::new(&create_test_config(), create_test_storage(&dir)).unwrap();
        let addr = server.run_with_addr().await.unwrap();

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /api/health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"status\":\"OK\""));
    }
}
