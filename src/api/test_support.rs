//! Local axum backend for exercising the client over real HTTP.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use super::gateway::ApiClient;
use crate::config::ClientConfig;
use crate::session::SessionStore;

/// A running mock backend; shut down on drop.
pub(crate) struct MockBackend {
    pub base_url: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Bind `router` to an ephemeral localhost port and serve it in the
/// background.
pub(crate) async fn spawn_backend(router: axum::Router) -> MockBackend {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .expect("bind mock backend");
    let addr = listener.local_addr().expect("mock backend address");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let _ = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    MockBackend {
        base_url: format!("http://{addr}"),
        shutdown_tx: Some(shutdown_tx),
    }
}

pub(crate) fn test_config(base_url: &str) -> ClientConfig {
    ClientConfig {
        api_base_url: base_url.to_string(),
        request_timeout: Duration::from_secs(5),
        ..ClientConfig::default()
    }
}

pub(crate) fn test_client(base_url: &str, session: Arc<SessionStore>) -> ApiClient {
    ApiClient::new(&test_config(base_url), session).expect("build test client")
}
