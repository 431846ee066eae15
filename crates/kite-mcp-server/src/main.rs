use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use kite_mcp_core::catalog::{CatalogConfig, InstrumentCatalog};
use kite_mcp_core::dispatch::Dispatcher;
use kite_mcp_core::gateway::BrokerageGateway;
use kite_mcp_core::metrics::DEFAULT_SWEEPER_TICK;
use kite_mcp_core::session::{SessionRegistry, SessionRegistryConfig};
use kite_mcp_core::{MetricsSink, RedirectSigner};
use tokio::sync::watch;

use kite_mcp_server::brokerage_client::KiteConnectClient;
use kite_mcp_server::config::{AppMode, Config};
use kite_mcp_server::transport::{self, AppState};
use kite_mcp_server::tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().context("loading configuration")?;

    let registry = SessionRegistry::new(SessionRegistryConfig::default());
    let metrics = Arc::new(MetricsSink::new(env!("CARGO_PKG_NAME")));
    let signer = Arc::new(RedirectSigner::new());
    let catalog = InstrumentCatalog::new(CatalogConfig::new(config.instrument_source_url.clone()));

    let mut base_client = KiteConnectClient::new(config.kite_api_key.clone());
    if let Some(base_url) = &config.kite_api_base_url {
        base_client = base_client.with_base_url(base_url.clone());
    }
    let gateway = Arc::new(BrokerageGateway::new(
        base_client,
        config.kite_api_secret.clone(),
        registry.clone(),
        metrics.clone(),
        signer.clone(),
    ));

    let mut dispatcher = Dispatcher::new(gateway.clone(), metrics.clone(), config.excluded_tools.clone());
    dispatcher.register(Box::new(tools::GetProfileTool));
    dispatcher.register(Box::new(tools::GetHoldingsTool));
    dispatcher.register(Box::new(tools::GetPositionsTool));
    dispatcher.register(Box::new(tools::GetQuoteTool));
    dispatcher.register(Box::new(tools::GetInstrumentsTool::new(catalog.clone())));
    let dispatcher = Arc::new(dispatcher);

    if let Err(e) = catalog.update_if_needed().await {
        tracing::warn!(error = %e, "initial instrument catalog load failed, starting with an empty catalog");
    }

    let catalog_scheduler = catalog.start_scheduler();
    let session_sweeper = registry.start_sweeper(Duration::from_secs(30 * 60));
    let metrics_sweeper = metrics.start_sweeper(DEFAULT_SWEEPER_TICK);

    let state = Arc::new(AppState {
        dispatcher: dispatcher.clone(),
        gateway,
        signer,
        registry,
        metrics,
        catalog,
        admin_secret: config.admin_endpoint_secret_path.clone(),
    });

    let (stdio_cancel_tx, stdio_cancel_rx) = watch::channel(false);
    let stdio_task = if config.app_mode == AppMode::Stdio {
        Some(tokio::spawn(transport::stdio::run(state.clone(), stdio_cancel_rx)))
    } else {
        drop(stdio_cancel_rx);
        None
    };

    let router = transport::build_router(state, config.app_mode);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.context("binding listener")?;
    tracing::info!(%addr, mode = ?config.app_mode, "kite-mcp-server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    let _ = stdio_cancel_tx.send(true);
    if let Some(task) = stdio_task {
        let _ = tokio::time::timeout(Duration::from_secs(10), task).await;
    }
    tokio::time::timeout(Duration::from_secs(10), catalog_scheduler.shutdown()).await.ok();
    tokio::time::timeout(Duration::from_secs(10), session_sweeper.stop()).await.ok();
    tokio::time::timeout(Duration::from_secs(10), metrics_sweeper.stop()).await.ok();

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining in-flight requests");
}
