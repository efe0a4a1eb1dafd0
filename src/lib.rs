//! A full-mesh implementation of the Schiper-Eggli-Sandoz causal-ordering
//! protocol: every process maintains a vector clock and a dependency map,
//! stamps outgoing messages with both, and only delivers an inbound message
//! once the receiver's own clock has caught up with what the sender expected.

pub mod causality;
pub mod config;
pub mod core;
pub mod error;
pub mod logger;
pub mod message;
pub mod receive;
pub mod runtime;
pub mod send;
pub mod transport;

pub use causality::{dominates, CausalityState, VectorTimestamp};
pub use config::Configuration;
pub use core::CausalityCore;
pub use error::{ConfigError, DecodeError, ProtocolViolation, SendError, TransportError};
pub use logger::{LogEvent, LogSink, TracingLogSink, VecLogSink};
pub use message::{DeliveryLog, Message};
pub use receive::ReceivePath;
pub use runtime::ProcessRuntime;
pub use send::SendPath;
pub use transport::{PeerAddr, PeerTransport, TcpPeerTransport};
