pub mod auth;
pub mod config;
mod routes;
mod upload;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use routes::{build_router, AppState, InnerAppState};

use anyhow::Result;
use tokio::net::TcpListener;

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let purged = state
        .service
        .db()
        .purge_expired_sessions(chrono::Utc::now())
        .await?;
    if purged > 0 {
        tracing::info!(purged, "removed expired sessions");
    }
    let app = routes::build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
