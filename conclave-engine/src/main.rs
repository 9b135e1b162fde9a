use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use conclave_core::config::ConfigStore;
use conclave_gateway::{serve, GatewayState};
use conclave_orchestrator::{Orchestrator, OrchestratorConfig};
use conclave_providers::{AnthropicCompleter, Completer, MockCompleter, OpenAiCompatibleCompleter};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_target(false)
        .init();

    let state_dir = resolve_state_dir();
    let config_store = ConfigStore::load(state_dir.join("config.json"), None)
        .await
        .context("loading layered configuration")?;
    let app_config = config_store.typed();

    let completer = build_completer();
    let orchestrator_config = OrchestratorConfig {
        root_dir: app_config.session.root_dir.clone(),
        session_poll_interval_ms: app_config.session.poll_interval_ms,
        ..OrchestratorConfig::default()
    };
    let orchestrator = Arc::new(Orchestrator::new(orchestrator_config, completer));
    let state = GatewayState::new(app_config.gateway.clone(), orchestrator);

    let addr: SocketAddr = format!("0.0.0.0:{}", app_config.gateway.port)
        .parse()
        .context("invalid gateway port")?;
    if app_config.gateway.is_dev_mode() {
        info!("no JWT_SECRET configured; starting in dev mode (auth, rbac, and output filtering disabled)");
    }
    serve(addr, state).await
}

fn resolve_state_dir() -> std::path::PathBuf {
    std::env::var("CONCLAVE_STATE_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from(".conclave"))
}

/// Picks a live provider when credentials are present in the environment,
/// falling back to the mock completer so the service still starts (and
/// `/health` stays truthful) without any provider configured.
fn build_completer() -> Arc<dyn Completer> {
    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| "claude-sonnet-4-5".to_string());
        return Arc::new(AnthropicCompleter::new(Some(key), model));
    }
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com".to_string());
        return Arc::new(OpenAiCompatibleCompleter::new("openai", "OpenAI", base_url, Some(key), model));
    }
    Arc::new(MockCompleter::new("mock"))
}
