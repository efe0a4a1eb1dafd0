//! The delivery predicate, buffering, and buffer re-examination — the hardest
//! part of the protocol.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::causality::dominates;
use crate::core::CausalityCore;
use crate::error::{DecodeError, ProtocolViolation};
use crate::logger::{LogEvent, LogSink};
use crate::message::Message;

/// The receive-side half of a process.
pub struct ReceivePath {
    self_id: usize,
    num_processes: usize,
    core: Arc<Mutex<CausalityCore>>,
    logger: Arc<dyn LogSink>,
}

/// A frame was rejected before it could even be considered for delivery or
/// buffering — logged and dropped, never fatal (see the failure semantics).
#[derive(Debug)]
pub enum RejectReason {
    Decode(DecodeError),
    Protocol(ProtocolViolation),
    WrongReceiver { addressed: usize },
}

impl ReceivePath {
    pub fn new(
        self_id: usize,
        num_processes: usize,
        core: Arc<Mutex<CausalityCore>>,
        logger: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            self_id,
            num_processes,
            core,
            logger,
        }
    }

    /// Decodes and validates a raw frame, then routes it into `on_receive`.
    /// Malformed frames and frames addressed to a different receiver are
    /// logged and dropped before ever touching the causality mutex.
    pub async fn on_frame(&self, bytes: &[u8]) -> Result<(), RejectReason> {
        let msg = Message::decode(bytes).map_err(RejectReason::Decode)?;
        if msg.receiver_id != self.self_id {
            return Err(RejectReason::WrongReceiver { addressed: msg.receiver_id });
        }
        msg.validate(self.num_processes).map_err(RejectReason::Protocol)?;
        self.on_receive(msg).await;
        Ok(())
    }

    pub fn log_reject(&self, reason: RejectReason) {
        let text = match reason {
            RejectReason::Decode(e) => format!("decode error: {e}"),
            RejectReason::Protocol(e) => format!("protocol violation: {e}"),
            RejectReason::WrongReceiver { addressed } => {
                format!("frame addressed to {addressed}, this process is {}", self.self_id)
            }
        };
        self.logger.log(self.self_id, LogEvent::Dropped { reason: text });
    }

    /// Delivery predicate: deliverable iff the sender's dependency entry for
    /// us is absent, or our `vc` already dominates it.
    fn can_deliver(core: &CausalityCore, msg: &Message) -> bool {
        let self_id = core.causality.self_id();
        match msg.dep.get(self_id) {
            Some(Some(required)) => dominates(required, &core.causality.snapshot_vc()),
            _ => true,
        }
    }

    /// Locks the causality mutex, evaluates the predicate, and either
    /// delivers (plus drains the buffer) or buffers the message.
    pub async fn on_receive(&self, msg: Message) {
        let mut core = self.core.lock().await;

        self.logger.log(
            self.self_id,
            LogEvent::Received {
                sender: msg.sender_id,
                seq_no: msg.seq_no,
                vc: msg.vc.clone(),
            },
        );

        if Self::can_deliver(&core, &msg) {
            self.deliver(&mut core, msg);
            self.drain_buffer(&mut core);
        } else {
            self.logger.log(
                self.self_id,
                LogEvent::Buffered {
                    sender: msg.sender_id,
                    seq_no: msg.seq_no,
                },
            );
            core.buffer.push(msg);
        }
    }

    fn deliver(&self, core: &mut CausalityCore, msg: Message) {
        core.causality.on_deliver(&msg);
        self.logger.log(
            self.self_id,
            LogEvent::Delivered {
                sender: msg.sender_id,
                seq_no: msg.seq_no,
                vc: core.causality.snapshot_vc(),
            },
        );
        core.log.push(msg);
    }

    /// Repeatedly scans the buffer, delivering every message whose predicate
    /// now holds, until a full pass makes no progress. Within a pass, entries
    /// are tried in `(sender_id, vc[sender_id])` order so the earliest message
    /// from a given sender is attempted first.
    fn drain_buffer(&self, core: &mut CausalityCore) {
        loop {
            let mut candidates: Vec<usize> = (0..core.buffer.len()).collect();
            candidates.sort_by_key(|&i| {
                let m = &core.buffer[i];
                (m.sender_id, m.vc[m.sender_id])
            });

            let ready_index = candidates
                .into_iter()
                .find(|&i| Self::can_deliver(core, &core.buffer[i]));

            let Some(index) = ready_index else {
                break;
            };

            let msg = core.buffer.remove(index);
            self.logger.log(
                self.self_id,
                LogEvent::Unbuffered {
                    sender: msg.sender_id,
                    seq_no: msg.seq_no,
                },
            );
            self.deliver(core, msg);
        }
    }
}
