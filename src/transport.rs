//! `PeerTransport`: the boundary between the protocol core and the network.
//!
//! The core never touches a socket directly. `TcpPeerTransport` is the
//! production implementation (length-delimited JSON frames over one-shot TCP
//! connections, per the wire format); `FakeTransport` is an in-memory stand-in
//! used by unit and scenario tests that don't need a real loopback socket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use crate::error::{DecodeError, TransportError};

/// Maximum accepted frame size; guards against a hostile/corrupt length prefix
/// causing an unbounded allocation.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// What a single inbound accept yielded.
#[derive(Debug)]
pub enum RecvOutcome {
    /// A decoded frame body, ready for `Message::decode`.
    Frame(Vec<u8>),
    /// A connection that closed without ever sending a length prefix — a
    /// handshake liveness probe, per the open question in the design notes.
    Probe,
    /// Nothing arrived within the poll interval; the caller should check its
    /// shutdown flag and try again.
    TimedOut,
    /// A connection sent a length prefix that is zero or exceeds the
    /// maximum frame size. Dropped the same way `ReceivePath` drops any
    /// other malformed frame, without ever touching the causality mutex.
    Rejected(DecodeError),
}

/// Abstracts "send bytes to peer k" and "accept the next inbound frame" so the
/// protocol core is transport-agnostic.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn send(&self, target: usize, bytes: Vec<u8>) -> Result<(), TransportError>;
    async fn recv(&self) -> Result<RecvOutcome, TransportError>;
    /// Opens and immediately drops a connection to `peer`, as a liveness probe.
    async fn handshake(&self, peer: usize) -> Result<(), TransportError>;
}

#[derive(Debug, Clone)]
pub struct PeerAddr {
    pub host: String,
    pub port: u16,
}

impl PeerAddr {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::io::Error> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
    }
}

/// TCP implementation of [`PeerTransport`]: one fresh connection per message,
/// a `u32` big-endian length prefix, then the JSON body, then a half-close;
/// the receiver answers with the 3-byte `ACK` token.
pub struct TcpPeerTransport {
    peers: Vec<PeerAddr>,
    listener: TcpListener,
    timeout: Duration,
}

impl TcpPeerTransport {
    pub async fn bind(bind_addr: SocketAddr, peers: Vec<PeerAddr>, timeout: Duration) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { peers, listener, timeout })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }
}

#[async_trait]
impl PeerTransport for TcpPeerTransport {
    async fn send(&self, target: usize, bytes: Vec<u8>) -> Result<(), TransportError> {
        let addr = self.peers[target]
            .socket_addr()
            .map_err(|source| TransportError::Connect { peer: target, source })?;

        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Timeout { peer: target })?
            .map_err(|source| TransportError::Connect { peer: target, source })?;

        let len = bytes.len() as u32;
        stream
            .write_u32(len)
            .await
            .map_err(|source| TransportError::Write { peer: target, source })?;
        stream
            .write_all(&bytes)
            .await
            .map_err(|source| TransportError::Write { peer: target, source })?;
        stream
            .shutdown()
            .await
            .map_err(|source| TransportError::Write { peer: target, source })?;

        let mut ack = [0u8; 3];
        tokio::time::timeout(self.timeout, stream.read_exact(&mut ack))
            .await
            .map_err(|_| TransportError::Timeout { peer: target })?
            .map_err(|source| TransportError::Read { peer: target, source })?;
        if &ack != b"ACK" {
            return Err(TransportError::NoAck { peer: target });
        }
        Ok(())
    }

    async fn recv(&self) -> Result<RecvOutcome, TransportError> {
        let accept = tokio::time::timeout(self.timeout, self.listener.accept()).await;
        let (mut stream, _addr) = match accept {
            Ok(Ok(pair)) => pair,
            Ok(Err(_)) => return Ok(RecvOutcome::TimedOut),
            Err(_) => return Ok(RecvOutcome::TimedOut),
        };

        let len = match stream.read_u32().await {
            Ok(len) => len,
            Err(_) => return Ok(RecvOutcome::Probe),
        };
        if len == 0 || len > MAX_FRAME_SIZE {
            return Ok(RecvOutcome::Rejected(DecodeError::FrameTooLarge(len)));
        }

        let mut buf = vec![0u8; len as usize];
        stream
            .read_exact(&mut buf)
            .await
            .map_err(|source| TransportError::Read { peer: usize::MAX, source })?;

        let _ = stream.write_all(b"ACK").await;
        let _ = stream.shutdown().await;

        Ok(RecvOutcome::Frame(buf))
    }

    async fn handshake(&self, peer: usize) -> Result<(), TransportError> {
        let addr = self.peers[peer]
            .socket_addr()
            .map_err(|source| TransportError::Connect { peer, source })?;
        TcpStream::connect(addr)
            .await
            .map(|_| ())
            .map_err(|source| TransportError::Connect { peer, source })
    }
}

/// In-memory [`PeerTransport`] used by tests: every instance is wired to every
/// other instance's inbound channel by [`FakeNetwork`], so scenario tests can
/// exercise `SendPath`/`ReceivePath` without binding real sockets.
pub struct FakeTransport {
    self_id: usize,
    sent: Mutex<Vec<Vec<(usize, Vec<u8>)>>>,
    inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    peers: Mutex<Vec<Option<mpsc::UnboundedSender<Vec<u8>>>>>,
    handshake_attempts: AtomicU64,
}

impl FakeTransport {
    pub fn new(self_id: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            self_id,
            sent: Mutex::new(Vec::new()),
            inbound_tx: tx,
            inbound_rx: Mutex::new(rx),
            peers: Mutex::new(Vec::new()),
            handshake_attempts: AtomicU64::new(0),
        }
    }

    /// Records of every `send` this transport issued, for test assertions.
    pub fn sent_to(&self, target: usize) -> Vec<Vec<u8>> {
        // Synchronous snapshot helper; tests run under `#[tokio::test]` so the
        // `Mutex` is uncontended by the time this is called.
        let guard = self.sent.try_lock().expect("sent log uncontended in tests");
        guard
            .iter()
            .flatten()
            .filter(|(t, _)| *t == target)
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    pub fn handshake_attempts(&self) -> u64 {
        self.handshake_attempts.load(Ordering::SeqCst)
    }

    fn inbound_handle(&self) -> mpsc::UnboundedSender<Vec<u8>> {
        self.inbound_tx.clone()
    }
}

/// Wires a fixed set of [`FakeTransport`]s to each other so that `send(j, ..)`
/// on transport `i` is observed by transport `j`'s `recv()`.
pub struct FakeNetwork {
    transports: Vec<Arc<FakeTransport>>,
}

impl FakeNetwork {
    pub async fn new(n: usize) -> Self {
        let transports: Vec<_> = (0..n).map(|i| Arc::new(FakeTransport::new(i))).collect();
        for i in 0..n {
            let mut peers = vec![None; n];
            for j in 0..n {
                if i != j {
                    peers[j] = Some(transports[j].inbound_handle());
                }
            }
            *transports[i].peers.lock().await = peers;
        }
        Self { transports }
    }

    pub fn transport(&self, i: usize) -> Arc<FakeTransport> {
        self.transports[i].clone()
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn send(&self, target: usize, bytes: Vec<u8>) -> Result<(), TransportError> {
        {
            let mut sent = self.sent.lock().await;
            while sent.len() <= target {
                sent.push(Vec::new());
            }
            sent[target].push((target, bytes.clone()));
        }
        let peers = self.peers.lock().await;
        if let Some(Some(tx)) = peers.get(target) {
            let _ = tx.send(bytes);
            Ok(())
        } else {
            Err(TransportError::Connect {
                peer: target,
                source: std::io::Error::new(std::io::ErrorKind::NotConnected, "peer not wired"),
            })
        }
    }

    async fn recv(&self) -> Result<RecvOutcome, TransportError> {
        let mut rx = self.inbound_rx.lock().await;
        match tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
            Ok(Some(bytes)) => Ok(RecvOutcome::Frame(bytes)),
            Ok(None) => Ok(RecvOutcome::TimedOut),
            Err(_) => Ok(RecvOutcome::TimedOut),
        }
    }

    async fn handshake(&self, _peer: usize) -> Result<(), TransportError> {
        self.handshake_attempts.fetch_add(1, Ordering::SeqCst);
        let _ = self.self_id;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_network_delivers_sent_bytes_to_peer_recv() {
        let net = FakeNetwork::new(2).await;
        let a = net.transport(0);
        let b = net.transport(1);

        a.send(1, b"hello".to_vec()).await.unwrap();

        match b.recv().await.unwrap() {
            RecvOutcome::Frame(bytes) => assert_eq!(bytes, b"hello"),
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn recv_times_out_when_nothing_arrives() {
        let net = FakeNetwork::new(2).await;
        let a = net.transport(0);
        matches!(a.recv().await.unwrap(), RecvOutcome::TimedOut);
    }

    #[tokio::test]
    async fn recv_rejects_a_zero_length_prefix() {
        let server = TcpPeerTransport::bind("127.0.0.1:0".parse().unwrap(), Vec::new(), Duration::from_secs(1))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_u32(0).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        match server.recv().await.unwrap() {
            RecvOutcome::Rejected(DecodeError::FrameTooLarge(0)) => {}
            other => panic!("expected a rejected zero-length frame, got {other:?}"),
        }
        client.await.unwrap();
    }

    #[tokio::test]
    async fn recv_rejects_a_prefix_over_the_max_frame_size() {
        let server = TcpPeerTransport::bind("127.0.0.1:0".parse().unwrap(), Vec::new(), Duration::from_secs(1))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let oversized = MAX_FRAME_SIZE + 1;

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_u32(oversized).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        match server.recv().await.unwrap() {
            RecvOutcome::Rejected(DecodeError::FrameTooLarge(len)) => assert_eq!(len, oversized),
            other => panic!("expected a rejected oversized frame, got {other:?}"),
        }
        client.await.unwrap();
    }
}
