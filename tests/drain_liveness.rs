//! Invariant 4 (buffer drain liveness): no matter what order a batch of
//! causally related messages from the same sender arrives in, every one of
//! them is eventually delivered and the buffer ends up empty.

use std::sync::Arc;

use proptest::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::sync::Mutex;

use sesmesh::core::CausalityCore;
use sesmesh::logger::VecLogSink;
use sesmesh::message::Message;
use sesmesh::receive::ReceivePath;

fn sender_sequence(count: u64) -> Vec<Message> {
    // P0's messages to P1, each depending on the previous one having already
    // been delivered (dep[1] carries the predecessor's vc), so a receiver
    // that sees them out of order is forced to buffer.
    let mut previous_vc = vec![0u64, 0];
    (1..=count)
        .map(|i| {
            let vc = vec![i, 0];
            let dep = vec![None, Some(previous_vc.clone())];
            previous_vc = vc.clone();
            Message {
                sender_id: 0,
                receiver_id: 1,
                content: format!("message {i}"),
                vc,
                dep,
                seq_no: i,
            }
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn every_permutation_of_a_causal_chain_fully_drains(seed in 0u64..10_000) {
        let messages = sender_sequence(8);
        let mut shuffled = messages.clone();
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        shuffled.shuffle(&mut rng);

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let core = Arc::new(Mutex::new(CausalityCore::new(1, 2)));
            let logger = Arc::new(VecLogSink::new());
            let path = ReceivePath::new(1, 2, core.clone(), logger);

            for msg in shuffled {
                path.on_receive(msg).await;
            }

            let core = core.lock().await;
            prop_assert!(core.buffer.is_empty(), "every message should drain eventually");
            prop_assert_eq!(core.log.len(), messages.len());

            let delivered_seq_nos: Vec<u64> = core.log.iter().map(|m| m.seq_no).collect();
            let mut sorted = delivered_seq_nos.clone();
            sorted.sort();
            prop_assert_eq!(delivered_seq_nos, sorted, "causal chain must deliver in sender order");
            Ok(())
        })?;
    }
}
