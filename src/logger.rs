//! The ambient observability sink.
//!
//! The core never decides *how* an event is recorded; it only constructs a
//! [`LogEvent`] and hands it to whatever [`LogSink`] the runtime was built with.
//! `TracingLogSink` is the production backend; `VecLogSink` lets tests assert on
//! the event stream directly without installing a subscriber.

use crate::causality::VectorTimestamp;

/// One entry in the per-process observability stream.
///
/// Each variant carries the message identity (peer id + `seq_no`) and the
/// `VC`/`D` snapshot relevant at the moment of the event, as described in the
/// wire-format/observability section.
#[derive(Debug, Clone)]
pub enum LogEvent {
    Sent {
        target: usize,
        seq_no: u64,
        vc: VectorTimestamp,
    },
    Received {
        sender: usize,
        seq_no: u64,
        vc: VectorTimestamp,
    },
    Delivered {
        sender: usize,
        seq_no: u64,
        vc: VectorTimestamp,
    },
    Buffered {
        sender: usize,
        seq_no: u64,
    },
    Unbuffered {
        sender: usize,
        seq_no: u64,
    },
    /// A frame was dropped before reaching the buffer: malformed JSON, a
    /// protocol violation, or a frame addressed to a different receiver.
    Dropped {
        reason: String,
    },
}

/// Decouples the core from any particular logging backend.
pub trait LogSink: Send + Sync {
    fn log(&self, process_id: usize, event: LogEvent);
}

/// Emits one structured `tracing` event per [`LogEvent`], at `info` for the
/// steady-state events and `warn` for buffering and drops.
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, process_id: usize, event: LogEvent) {
        match event {
            LogEvent::Sent { target, seq_no, vc } => {
                tracing::info!(process_id, target, seq_no, ?vc, "SENT");
            }
            LogEvent::Received { sender, seq_no, vc } => {
                tracing::info!(process_id, sender, seq_no, ?vc, "RECEIVED");
            }
            LogEvent::Delivered { sender, seq_no, vc } => {
                tracing::info!(process_id, sender, seq_no, ?vc, "DELIVERED");
            }
            LogEvent::Buffered { sender, seq_no } => {
                tracing::warn!(process_id, sender, seq_no, "BUFFERED");
            }
            LogEvent::Unbuffered { sender, seq_no } => {
                tracing::info!(process_id, sender, seq_no, "UNBUFFERED");
            }
            LogEvent::Dropped { reason } => {
                tracing::warn!(process_id, reason = %reason, "DROPPED");
            }
        }
    }
}

/// Installs the process-wide `tracing-subscriber` backend, honoring `RUST_LOG`
/// (default `info`). Intended to be called once from `main`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Test-only sink that records events in memory for direct assertions.
#[derive(Default)]
pub struct VecLogSink {
    events: std::sync::Mutex<Vec<(usize, String)>>,
}

impl VecLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(usize, String)> {
        self.events.lock().expect("log mutex poisoned").clone()
    }
}

impl LogSink for VecLogSink {
    fn log(&self, process_id: usize, event: LogEvent) {
        let label = match &event {
            LogEvent::Sent { .. } => "SENT",
            LogEvent::Received { .. } => "RECEIVED",
            LogEvent::Delivered { .. } => "DELIVERED",
            LogEvent::Buffered { .. } => "BUFFERED",
            LogEvent::Unbuffered { .. } => "UNBUFFERED",
            LogEvent::Dropped { .. } => "DROPPED",
        };
        self.events
            .lock()
            .expect("log mutex poisoned")
            .push((process_id, label.to_string()));
    }
}
