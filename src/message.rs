//! The wire message, its JSON encoding, and the in-process delivery log.

use serde::{Deserialize, Serialize};

use crate::causality::VectorTimestamp;
use crate::error::{DecodeError, ProtocolViolation};

/// One application message in flight between two processes.
///
/// `vc` is the sender's vector clock *after* incrementing for this send; `dep`
/// is a snapshot of the sender's dependency map taken *before* the post-send
/// update (see [`crate::causality::CausalityState::on_send`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub sender_id: usize,
    pub receiver_id: usize,
    pub content: String,
    pub vc: VectorTimestamp,
    pub dep: Vec<Option<VectorTimestamp>>,
    pub seq_no: u64,
}

/// Any [`Message`] that failed the delivery predicate on arrival. The buffer is
/// an unordered multiset of these; see [`crate::receive::ReceivePath`].
pub type BufferedMessage = Message;

impl Message {
    /// Checks the structural invariants a decoded frame must satisfy before it
    /// is safe to hand to [`crate::causality::CausalityState`].
    pub fn validate(&self, num_processes: usize) -> Result<(), ProtocolViolation> {
        if self.vc.len() != num_processes {
            return Err(ProtocolViolation::VectorLengthMismatch {
                actual: self.vc.len(),
                expected: num_processes,
            });
        }
        if self.dep.len() != num_processes {
            return Err(ProtocolViolation::VectorLengthMismatch {
                actual: self.dep.len(),
                expected: num_processes,
            });
        }
        if self.sender_id >= num_processes {
            return Err(ProtocolViolation::SenderOutOfRange {
                sender: self.sender_id,
                num_processes,
            });
        }
        Ok(())
    }

    /// Encodes this message as the UTF-8 JSON frame body described in the wire format.
    pub fn encode(&self) -> Vec<u8> {
        let wire = WireMessage::from(self);
        serde_json::to_vec(&wire).expect("Message always serializes")
    }

    /// Decodes a frame body into a `Message`, without validating protocol invariants.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let wire: WireMessage = serde_json::from_slice(bytes)?;
        Ok(Message::from(wire))
    }
}

/// Sentinel-aware encoding of a single dependency-map slot: an absent entry is
/// the scalar `0`, a present one is the vector itself.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum WireDepEntry {
    Empty(u8),
    Present(VectorTimestamp),
}

impl From<&Option<VectorTimestamp>> for WireDepEntry {
    fn from(dep: &Option<VectorTimestamp>) -> Self {
        match dep {
            Some(vt) => WireDepEntry::Present(vt.clone()),
            None => WireDepEntry::Empty(0),
        }
    }
}

impl From<WireDepEntry> for Option<VectorTimestamp> {
    fn from(entry: WireDepEntry) -> Self {
        match entry {
            WireDepEntry::Present(vt) => Some(vt),
            WireDepEntry::Empty(_) => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    sender_id: usize,
    receiver_id: usize,
    content: String,
    timestamp: VectorTimestamp,
    msg_queue: Vec<WireDepEntry>,
    msg_number: u64,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        WireMessage {
            sender_id: msg.sender_id,
            receiver_id: msg.receiver_id,
            content: msg.content.clone(),
            timestamp: msg.vc.clone(),
            msg_queue: msg.dep.iter().map(WireDepEntry::from).collect(),
            msg_number: msg.seq_no,
        }
    }
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        Message {
            sender_id: wire.sender_id,
            receiver_id: wire.receiver_id,
            content: wire.content,
            vc: wire.timestamp,
            dep: wire.msg_queue.into_iter().map(Option::from).collect(),
            seq_no: wire.msg_number,
        }
    }
}

/// Append-only record of delivered messages, in delivery order, used for test
/// observation and by [`crate::receive::ReceivePath`] to track what has already
/// been handed to the application.
#[derive(Debug, Default)]
pub struct DeliveryLog {
    entries: Vec<Message>,
}

impl DeliveryLog {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn push(&mut self, msg: Message) {
        self.entries.push(msg);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }
}
