use std::path::Path;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing_subscriber::{EnvFilter, fmt};

use aleph_ws::{Config, Connection, EmitBody, Outcome};

const ETH: &str = "0x0000000000000000000000000000000000000000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,aleph_ws=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    tracing::info!("🦀 AlephTX socket client starting...");

    let config = match std::env::var("ALEPH_WS_CONFIG") {
        Ok(path) => Config::load(Path::new(&path))?,
        Err(_) => Config::load_default(),
    };
    config.validate()?;

    // Usage: aleph-ws [token] [user]
    let mut args = std::env::args().skip(1);
    let token = args.next().unwrap_or_else(|| ETH.to_string());
    let user = args.next();

    let (ready_tx, ready_rx) = oneshot::channel();
    let connection = Arc::new(Connection::connect(&config, ready_tx).await);

    match tokio::time::timeout(config.connect_timeout(), ready_rx).await {
        Ok(Ok(true)) => tracing::info!("📡 Connected to {}", config.endpoint),
        Ok(_) => anyhow::bail!("Websocket connection to {} failed", config.endpoint),
        Err(_) => {
            connection.close();
            anyhow::bail!("No connection acknowledgement within {:?}", config.connect_timeout());
        }
    }

    let (result_tx, mut result_rx) = oneshot::channel();
    let handle = connection.emit_listen_once_and_close(
        "market",
        EmitBody::market(token.clone(), user),
        result_tx,
        "getMarket",
    );

    let outcome = tokio::select! {
        outcome = &mut result_rx => outcome?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("🛑 Cancelling request...");
            handle.cancel();
            result_rx.await?
        }
    };

    match &*outcome {
        Outcome::Success(market) => {
            tracing::info!("📈 Market for {}:\n{}", token, serde_json::to_string_pretty(market)?);
        }
        Outcome::Failure(e) if e.is_send_failure() => {
            tracing::error!("Market request never left: {}", e);
        }
        Outcome::Failure(e) => {
            tracing::error!("Market request failed: {}", e);
        }
    }

    handle.join().await;
    tracing::info!("✅ Done");
    Ok(())
}
