//! Property tests for the vector-clock/dependency-map invariants that the
//! unit tests in `causality.rs` only spot-check with fixed examples.

use proptest::prelude::*;
use sesmesh::causality::{dominates, CausalityState};
use sesmesh::message::Message;

fn arb_target(num_processes: usize, self_id: usize) -> impl Strategy<Value = usize> {
    (0..num_processes).prop_filter("target must differ from self", move |t| *t != self_id)
}

proptest! {
    /// Invariant 1: a process's own vector clock never decreases, whether
    /// the change comes from sending or from delivering.
    #[test]
    fn vc_never_decreases_across_sends(targets in prop::collection::vec(1usize..4, 1..20)) {
        let mut state = CausalityState::new(0, 4);
        let mut previous = state.snapshot_vc();
        for target in targets {
            let (vc, _) = state.on_send(target);
            prop_assert!(dominates(&previous, &vc));
            previous = vc;
        }
    }

    /// `dominates` is reflexive: every vector dominates itself.
    #[test]
    fn dominates_is_reflexive(vc in prop::collection::vec(0u64..100, 1..6)) {
        prop_assert!(dominates(&vc, &vc));
    }

    /// `dominates` is transitive over componentwise-nondecreasing chains.
    #[test]
    fn dominates_is_transitive(
        base in prop::collection::vec(0u64..50, 3..4),
        deltas_ab in prop::collection::vec(0u64..20, 3..4),
        deltas_bc in prop::collection::vec(0u64..20, 3..4),
    ) {
        let a = base.clone();
        let b: Vec<u64> = a.iter().zip(deltas_ab.iter()).map(|(x, d)| x + d).collect();
        let c: Vec<u64> = b.iter().zip(deltas_bc.iter()).map(|(x, d)| x + d).collect();
        prop_assert!(dominates(&a, &b));
        prop_assert!(dominates(&b, &c));
        prop_assert!(dominates(&a, &c));
    }

    /// Invariant 5: delivering the same message twice is a no-op the second
    /// time, for any vector clock the message's sender could plausibly have
    /// reached by sending to us first.
    #[test]
    fn on_deliver_is_idempotent_for_any_dominating_sender_clock(
        bump in 1u64..10,
    ) {
        let mut receiver = CausalityState::new(1, 3);
        let msg = Message {
            sender_id: 0,
            receiver_id: 1,
            content: "x".to_string(),
            vc: vec![bump, 0, 0],
            dep: vec![None, None, None],
            seq_no: 1,
        };
        receiver.on_deliver(&msg);
        let once = receiver.clone();
        receiver.on_deliver(&msg);
        prop_assert_eq!(receiver.snapshot_vc(), once.snapshot_vc());
        prop_assert_eq!(receiver.snapshot_dep(), once.snapshot_dep());
    }

    /// Sending never touches the target's own dependency slot, and never
    /// touches our own vc component for anyone else.
    #[test]
    fn on_send_never_warns_the_target_itself(target in arb_target(4, 0)) {
        let mut state = CausalityState::new(0, 4);
        state.on_send(target);
        prop_assert_eq!(state.snapshot_dep()[target].clone(), None);
    }
}
