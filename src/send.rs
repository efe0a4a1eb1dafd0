//! Stamps outgoing messages with a `(VC, D)` snapshot and hands them to the transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::CausalityCore;
use crate::error::SendError;
use crate::logger::{LogEvent, LogSink};
use crate::message::Message;
use crate::transport::PeerTransport;

/// The send-side half of a process: owns no state of its own beyond the
/// per-target sequence counters used for `seq_no` (logging only, per the data
/// model — `seq_no` carries no protocol meaning).
pub struct SendPath {
    self_id: usize,
    core: Arc<Mutex<CausalityCore>>,
    transport: Arc<dyn PeerTransport>,
    logger: Arc<dyn LogSink>,
    seq_counters: Vec<AtomicU64>,
}

impl SendPath {
    pub fn new(
        self_id: usize,
        num_processes: usize,
        core: Arc<Mutex<CausalityCore>>,
        transport: Arc<dyn PeerTransport>,
        logger: Arc<dyn LogSink>,
    ) -> Self {
        let seq_counters = (0..num_processes).map(|_| AtomicU64::new(0)).collect();
        Self {
            self_id,
            core,
            transport,
            logger,
            seq_counters,
        }
    }

    /// Stamps and transmits `content` to `target`.
    ///
    /// The increment-then-snapshot-then-handoff sequence happens while holding
    /// the causality mutex so that no concurrent send or delivery can observe
    /// or mutate the state in between (see the ordering contract in the
    /// component design).
    pub async fn send(&self, target: usize, content: String) -> Result<(), SendError> {
        assert_ne!(target, self.self_id, "a process never sends to itself");

        let seq_no = self.seq_counters[target].fetch_add(1, Ordering::Relaxed) + 1;

        let (vc, dep) = {
            let mut core = self.core.lock().await;
            core.causality.on_send(target)
        };

        let msg = Message {
            sender_id: self.self_id,
            receiver_id: target,
            content,
            vc: vc.clone(),
            dep,
            seq_no,
        };

        let bytes = msg.encode();
        self.transport
            .send(target, bytes)
            .await
            .map_err(SendError::Transport)?;

        self.logger.log(
            self.self_id,
            LogEvent::Sent {
                target,
                seq_no,
                vc,
            },
        );
        Ok(())
    }
}
