//! `sesmesh` entrypoint.
//!
//! Launches one process of the causal-ordering mesh: reads the process index
//! and config path from argv, binds the TCP transport for that process, and
//! runs the handshake/send/receive lifecycle to completion.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};

use sesmesh::config::Configuration;
use sesmesh::logger::{init_tracing, TracingLogSink};
use sesmesh::runtime::ProcessRuntime;
use sesmesh::transport::{PeerTransport, TcpPeerTransport};

const DEFAULT_CONFIG_PATH: &str = "config/config.json";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let mut args = env::args().skip(1);
    let self_id: usize = args
        .next()
        .context("usage: sesmesh <process-id> [config-path]")?
        .parse()
        .context("process-id must be a non-negative integer")?;
    let config_path = args.next().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = Arc::new(
        Configuration::load(&config_path)
            .with_context(|| format!("failed to load config from {config_path}"))?,
    );

    if self_id >= config.num_processes() {
        anyhow::bail!("process-id {self_id} is out of range for {} processes", config.num_processes());
    }

    let bind_addr = config.peer(self_id).socket_addr().context("invalid bind address")?;
    let peers = config.peers();
    let transport: Arc<dyn PeerTransport> = Arc::new(
        TcpPeerTransport::bind(bind_addr, peers, config.timeout())
            .await
            .with_context(|| format!("failed to bind to {bind_addr}"))?,
    );

    tracing::info!(self_id, %bind_addr, "starting process");

    let runtime = Arc::new(ProcessRuntime::new(self_id, config, transport, Arc::new(TracingLogSink)));
    runtime.run().await;

    Ok(())
}
