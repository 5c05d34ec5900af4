//! Transport: accepts TCP connections and upgrades them to WebSocket
//! duplex byte streams, one session task per connection. Contains no
//! simulation logic — purely plumbing so [`crate::session::run_session`]
//! can stay transport-agnostic.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crate::controller::ControllerConfig;
use crate::logging::{EpisodeLog, LoggingConfig};
use crate::policy::PolicyAdapter;
use crate::session;

/// Accepts connections on `addr` until the process is signaled to stop.
/// Each connection gets its own session task and its own fresh rocket
/// state, seeded from a counter derived from the connection's arrival
/// order so runs are reproducible given the same client sequence.
pub async fn serve<F>(
    addr: SocketAddr,
    controller_cfg_factory: F,
    policy: Option<Arc<PolicyAdapter>>,
    logging_cfg: Option<LoggingConfig>,
) -> anyhow::Result<()>
where
    F: Fn() -> ControllerConfig + Clone + Send + Sync + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening for connections");

    let mut next_seed: u64 = 1;
    loop {
        let (stream, peer) = listener.accept().await?;
        let seed = next_seed;
        next_seed = next_seed.wrapping_add(1);

        let policy = policy.clone();
        let logging_cfg = logging_cfg.clone();
        let factory = controller_cfg_factory.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, peer, factory, policy, logging_cfg, seed).await {
                tracing::warn!(%peer, error = %err, "session ended with error");
            }
        });
    }
}

async fn handle_connection<F>(
    stream: TcpStream,
    peer: SocketAddr,
    controller_cfg_factory: F,
    policy: Option<Arc<PolicyAdapter>>,
    logging_cfg: Option<LoggingConfig>,
    seed: u64,
) -> anyhow::Result<()>
where
    F: Fn() -> ControllerConfig,
{
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    tracing::info!(%peer, "connection upgraded to websocket");

    let log = match logging_cfg {
        Some(cfg) => EpisodeLog::create(cfg).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to open episode log, discarding records");
            EpisodeLog::discard()
        }),
        None => EpisodeLog::discard(),
    };

    let cfg = controller_cfg_factory();
    session::run_session(ws_stream, cfg, policy, log, seed).await;
    tracing::info!(%peer, "session closed");
    Ok(())
}
