//! Error kinds for the transport, wire decoding, configuration and send paths.
//!
//! Transport and decode failures are contained to the worker that observed
//! them; `ConfigError` is the only variant that is fatal to the whole process.

use thiserror::Error;

/// Failures talking to a peer over the network.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to peer {peer} failed: {source}")]
    Connect {
        peer: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("read from peer {peer} failed: {source}")]
    Read {
        peer: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("write to peer {peer} failed: {source}")]
    Write {
        peer: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("operation to peer {peer} timed out")]
    Timeout { peer: usize },
    #[error("peer {peer} did not reply ACK")]
    NoAck { peer: usize },
}

/// A frame could not be decoded as a valid `Message`.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid frame length prefix {0} (zero, or exceeds the maximum frame size)")]
    FrameTooLarge(u32),
}

/// A frame decoded cleanly but violates a protocol-level invariant.
#[derive(Debug, Error)]
pub enum ProtocolViolation {
    #[error("vector timestamp has length {actual}, expected {expected}")]
    VectorLengthMismatch { actual: usize, expected: usize },
    #[error("sender id {sender} out of range for {num_processes} processes")]
    SenderOutOfRange { sender: usize, num_processes: usize },
}

/// Fatal configuration-loading failures; these abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Surfaced to a sender worker when `SendPath::send` cannot hand a message to the transport.
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}
