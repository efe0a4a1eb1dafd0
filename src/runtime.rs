//! Owns a process's lifecycle: the startup handshake, the receiver worker,
//! the `N-1` sender workers, and cooperative shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::Configuration;
use crate::core::CausalityCore;
use crate::logger::{LogEvent, LogSink};
use crate::receive::{ReceivePath, RejectReason};
use crate::send::SendPath;
use crate::transport::{PeerTransport, RecvOutcome};

/// Per-sender-worker state machine, as named in the component design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Idle,
    Handshaking,
    Sending,
    Done,
}

/// Drives one process end to end: handshake, steady-state send/receive, drain,
/// shutdown.
pub struct ProcessRuntime {
    self_id: usize,
    num_processes: usize,
    config: Arc<Configuration>,
    core: Arc<Mutex<CausalityCore>>,
    send_path: Arc<SendPath>,
    receive_path: Arc<ReceivePath>,
    transport: Arc<dyn PeerTransport>,
    logger: Arc<dyn LogSink>,
    running: Arc<AtomicBool>,
    sender_states: Vec<Arc<Mutex<SenderState>>>,
}

impl ProcessRuntime {
    pub fn new(
        self_id: usize,
        config: Arc<Configuration>,
        transport: Arc<dyn PeerTransport>,
        logger: Arc<dyn LogSink>,
    ) -> Self {
        let num_processes = config.num_processes();
        let core = Arc::new(Mutex::new(CausalityCore::new(self_id, num_processes)));
        let send_path = Arc::new(SendPath::new(
            self_id,
            num_processes,
            core.clone(),
            transport.clone(),
            logger.clone(),
        ));
        let receive_path = Arc::new(ReceivePath::new(self_id, num_processes, core.clone(), logger.clone()));
        let sender_states = (0..num_processes).map(|_| Arc::new(Mutex::new(SenderState::Idle))).collect();

        Self {
            self_id,
            num_processes,
            config,
            core,
            send_path,
            receive_path,
            transport,
            logger,
            running: Arc::new(AtomicBool::new(true)),
            sender_states,
        }
    }

    pub fn core(&self) -> Arc<Mutex<CausalityCore>> {
        self.core.clone()
    }

    pub async fn sender_state(&self, peer: usize) -> SenderState {
        *self.sender_states[peer].lock().await
    }

    /// Performs the startup handshake against every peer, retrying at
    /// `handshake_retry_interval` until each connection succeeds, then runs
    /// the receiver worker alongside `N-1` sender workers, and finally drains
    /// and shuts down. Returns once every sender has emitted its quota and the
    /// drain interval has elapsed.
    pub async fn run(self: Arc<Self>) {
        self.handshake_all().await;

        let receiver_handle = self.clone().spawn_receiver();

        let sender_handles: Vec<JoinHandle<()>> = (0..self.num_processes)
            .filter(|&k| k != self.self_id)
            .map(|peer| self.clone().spawn_sender(peer))
            .collect();

        for handle in sender_handles {
            let _ = handle.await;
        }

        tokio::time::sleep(self.config.drain_interval()).await;
        self.running.store(false, Ordering::SeqCst);
        let _ = receiver_handle.await;
    }

    async fn handshake_all(&self) {
        for peer in 0..self.num_processes {
            if peer == self.self_id {
                continue;
            }
            *self.sender_states[peer].lock().await = SenderState::Handshaking;
            loop {
                match self.transport.handshake(peer).await {
                    Ok(()) => break,
                    Err(_) => {
                        tracing::warn!(self.self_id, peer, "handshake retry");
                        tokio::time::sleep(self.config.handshake_retry_interval()).await;
                    }
                }
            }
        }
    }

    fn spawn_receiver(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while self.running.load(Ordering::SeqCst) {
                match self.transport.recv().await {
                    Ok(RecvOutcome::Frame(bytes)) => {
                        if let Err(reason) = self.receive_path.on_frame(&bytes).await {
                            self.receive_path.log_reject(reason);
                        }
                    }
                    Ok(RecvOutcome::Rejected(e)) => {
                        self.receive_path.log_reject(RejectReason::Decode(e));
                    }
                    Ok(RecvOutcome::Probe) | Ok(RecvOutcome::TimedOut) => continue,
                    Err(e) => {
                        self.logger.log(
                            self.self_id,
                            LogEvent::Dropped { reason: format!("transport error: {e}") },
                        );
                    }
                }
            }
        })
    }

    fn spawn_sender(self: Arc<Self>, peer: usize) -> JoinHandle<()> {
        tokio::spawn(async move {
            *self.sender_states[peer].lock().await = SenderState::Sending;
            let quota = self.config.messages_per_process();
            let (min_rate, max_rate) = self.config.rate_bounds();

            for i in 0..quota {
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                let content = format!("message {}", i + 1);
                if let Err(e) = self.send_path.send(peer, content).await {
                    tracing::warn!(self.self_id, peer, error = %e, "send failed, dropping message");
                }
                let rate = rand::thread_rng().gen_range(min_rate..=max_rate);
                let delay = Duration::from_secs_f64(60.0 / rate);
                tokio::time::sleep(delay).await;
            }
            *self.sender_states[peer].lock().await = SenderState::Done;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, MessageRate, NetworkSection};
    use crate::logger::VecLogSink;
    use crate::transport::FakeNetwork;

    fn test_config(num_processes: usize, messages_per_process: u64) -> Arc<Configuration> {
        Arc::new(Configuration::from_parts(
            num_processes,
            messages_per_process,
            MessageRate { min_per_minute: 6000.0, max_per_minute: 12000.0 },
            NetworkSection { base_port: 5000, timeout_secs: 5 },
            (0..num_processes)
                .map(|i| crate::transport::PeerAddr { host: "127.0.0.1".to_string(), port: 5000 + i as u16 })
                .collect(),
            Duration::from_millis(10),
            Duration::from_millis(50),
        ))
    }

    #[tokio::test]
    async fn s6_full_mesh_drains_with_expected_delivery_count() {
        let n = 3usize;
        let m = 2u64;
        let net = FakeNetwork::new(n).await;
        let config = test_config(n, m);

        let runtimes: Vec<Arc<ProcessRuntime>> = (0..n)
            .map(|i| {
                Arc::new(ProcessRuntime::new(
                    i,
                    config.clone(),
                    net.transport(i),
                    Arc::new(VecLogSink::new()),
                ))
            })
            .collect();

        let cores: Vec<_> = runtimes.iter().map(|r| r.core()).collect();

        let mut handles = Vec::new();
        for rt in &runtimes {
            handles.push(tokio::spawn(rt.clone().run()));
        }
        for h in handles {
            h.await.unwrap();
        }

        let mut total_delivered = 0usize;
        for core in cores {
            let core = core.lock().await;
            total_delivered += core.log.len();
            assert!(core.buffer.is_empty(), "no process should have a pending buffer after drain");
        }
        assert_eq!(total_delivered, n * (n - 1) * m as usize);
    }
}
