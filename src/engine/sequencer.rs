//! Per-(wallet, chain) submission lanes
//!
//! Holding a lane covers nonce fetch, signing, broadcast and the wait for the
//! receipt, so two submissions from the same wallet on the same chain never race
//! for a nonce.

use alloy::primitives::Address;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct NonceSequencer {
    lanes: Mutex<HashMap<(Address, u64), Arc<Mutex<()>>>>,
}

/// Exclusive hold on one lane; released on drop
pub type LaneGuard = OwnedMutexGuard<()>;

impl NonceSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other submission is in flight for `(wallet, chain_id)`.
    pub async fn acquire(&self, wallet: Address, chain_id: u64) -> LaneGuard {
        let lane = {
            let mut lanes = self.lanes.lock().await;
            lanes.entry((wallet, chain_id)).or_default().clone()
        };
        lane.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_lane_is_exclusive() {
        let sequencer = Arc::new(NonceSequencer::new());
        let wallet = Address::repeat_byte(1);

        let first = sequencer.acquire(wallet, 8453).await;

        let waiter = {
            let sequencer = sequencer.clone();
            tokio::spawn(async move {
                let _guard = sequencer.acquire(wallet, 8453).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn other_chains_do_not_wait() {
        let sequencer = NonceSequencer::new();
        let wallet = Address::repeat_byte(1);

        let _base = sequencer.acquire(wallet, 8453).await;
        let polygon = tokio::time::timeout(
            Duration::from_millis(100),
            sequencer.acquire(wallet, 137),
        )
        .await;
        assert!(polygon.is_ok());
    }
}
