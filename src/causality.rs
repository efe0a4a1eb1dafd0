//! Vector clock plus the SES dependency map.
//!
//! This is the leaf component of the protocol: it has no knowledge of the network,
//! of threads, or of the wire format. Every other component serializes its access
//! to a single [`CausalityState`] behind a mutex (see `receive` and `runtime`).

use crate::message::Message;

/// A length-N vector of non-negative integers, one counter per process.
pub type VectorTimestamp = Vec<u64>;

/// Componentwise maximum, treating an absent `a` or `b` as the identity element.
fn merge(a: &VectorTimestamp, b: &VectorTimestamp) -> VectorTimestamp {
    a.iter().zip(b.iter()).map(|(x, y)| *x.max(y)).collect()
}

/// `a <= b` componentwise.
pub fn dominates(a: &VectorTimestamp, b: &VectorTimestamp) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x <= y)
}

/// The per-process causality bookkeeping: a vector clock `vc` and the SES
/// auxiliary dependency map `dep`.
///
/// `dep[k]` is `None` (empty) or a vector timestamp that this process believes
/// peer `k` must already dominate before accepting any further message from us.
/// `dep[self_id]` is never populated and is always `None`.
#[derive(Debug, Clone)]
pub struct CausalityState {
    self_id: usize,
    vc: VectorTimestamp,
    dep: Vec<Option<VectorTimestamp>>,
}

impl CausalityState {
    /// Creates a fresh state for process `self_id` among `num_processes` peers,
    /// with `vc` all-zero and `dep` all-empty.
    pub fn new(self_id: usize, num_processes: usize) -> Self {
        assert!(self_id < num_processes, "self_id must be < num_processes");
        Self {
            self_id,
            vc: vec![0; num_processes],
            dep: vec![None; num_processes],
        }
    }

    pub fn self_id(&self) -> usize {
        self.self_id
    }

    pub fn num_processes(&self) -> usize {
        self.vc.len()
    }

    /// Value-copy of the current vector clock.
    pub fn snapshot_vc(&self) -> VectorTimestamp {
        self.vc.clone()
    }

    /// Deep value-copy of the dependency map, indexed by peer id.
    pub fn snapshot_dep(&self) -> Vec<Option<VectorTimestamp>> {
        self.dep.clone()
    }

    /// Step 1-4 of `on_send`: increments `vc[self_id]`, takes the before/after
    /// snapshots, then updates `dep[k]` for every `k` other than `self_id` and
    /// `target` with the post-increment `vc`.
    ///
    /// Returns `(vc_after, dep_before)`, which the caller stamps onto the
    /// outgoing message.
    pub fn on_send(&mut self, target: usize) -> (VectorTimestamp, Vec<Option<VectorTimestamp>>) {
        self.vc[self.self_id] += 1;

        let dep_before = self.snapshot_dep();
        let vc_after = self.snapshot_vc();

        for k in 0..self.vc.len() {
            if k == self.self_id || k == target {
                continue;
            }
            self.dep[k] = Some(match &self.dep[k] {
                Some(existing) => merge(existing, &vc_after),
                None => vc_after.clone(),
            });
        }

        (vc_after, dep_before)
    }

    /// Applies the causal effects of delivering `msg`: merges the sender's `vc`
    /// into ours, merges in any dependency hints the sender forwarded, and clears
    /// what we owed the sender since we've now delivered from them directly.
    pub fn on_deliver(&mut self, msg: &Message) {
        for i in 0..self.vc.len() {
            if i == self.self_id {
                continue;
            }
            self.vc[i] = self.vc[i].max(msg.vc[i]);
        }

        for k in 0..self.dep.len() {
            if k == self.self_id {
                continue;
            }
            if let Some(Some(incoming)) = msg.dep.get(k) {
                self.dep[k] = Some(match &self.dep[k] {
                    Some(existing) => merge(existing, incoming),
                    None => incoming.clone(),
                });
            }
        }

        let sender = msg.sender_id;
        match msg.dep.get(sender) {
            Some(Some(_)) => { /* already folded into dep[sender] by the loop above */ }
            _ => self.dep[sender] = None,
        }
    }
}
