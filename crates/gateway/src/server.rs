//! Serve loop shared by the binary and the integration tests.

use std::future::Future;

use tokio::net::TcpListener;

use crate::api;
use crate::state::AppState;

/// Serve the API on `listener` until `signal` resolves.
///
/// On the signal every open stream receives `server_shutdown` and is closed
/// before axum's graceful shutdown waits out the remaining requests.
pub async fn serve<F>(listener: TcpListener, state: AppState, signal: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let registry = state.registry.clone();
    let app = api::app(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            registry.shutdown().await;
        })
        .await
}
