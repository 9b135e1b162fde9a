//! HTTP Gateway (C7) and Response Envelope (C8): the ordered security
//! pipeline, RBAC table, outbound proxy, and API routing that sit in front
//! of the orchestrator.

pub mod context;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod proxy;
pub mod rbac;
pub mod routes;
pub mod state;

use std::net::SocketAddr;

use tracing::info;

pub use state::GatewayState;

/// Binds `addr` and serves until ctrl-c.
pub async fn serve(addr: SocketAddr, state: GatewayState) -> anyhow::Result<()> {
    let service_name = state.config.service_name.clone();
    let router = routes::build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(service = %service_name, %addr, "gateway listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
