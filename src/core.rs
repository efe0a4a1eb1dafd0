//! The one piece of shared mutable state in a process: the causality
//! bookkeeping, the buffer of not-yet-deliverable messages, and the delivery
//! log. [`SendPath`](crate::send::SendPath) and
//! [`ReceivePath`](crate::receive::ReceivePath) both hold an
//! `Arc<tokio::sync::Mutex<CausalityCore>>` onto the same instance — that mutex
//! is "the causality mutex" the concurrency model refers to.

use crate::causality::CausalityState;
use crate::message::{BufferedMessage, DeliveryLog};

pub struct CausalityCore {
    pub causality: CausalityState,
    pub buffer: Vec<BufferedMessage>,
    pub log: DeliveryLog,
}

impl CausalityCore {
    pub fn new(self_id: usize, num_processes: usize) -> Self {
        Self {
            causality: CausalityState::new(self_id, num_processes),
            buffer: Vec::new(),
            log: DeliveryLog::new(),
        }
    }
}
