//! Per-sender nonce assignment.
//!
//! Every sender has its own async lock. Holding it, a task refreshes the pending nonce
//! from the node and takes the larger of that value and the local high-water mark, so
//! two tasks racing on the same sender never leave with the same nonce even before
//! either transaction reaches the pool. Nonces whose transaction the node rejected
//! are handed back and reused first, which keeps the sender's nonce sequence gap-free.
//! When the node's pending nonce falls below the high-water mark and no task still
//! holds a nonce in between, the node dropped those transactions and assignment
//! restarts from the node's value.

use std::{collections::BTreeSet, sync::Arc};

use alloy_primitives::{Address, map::HashMap};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{NodeClient, NodeResult};

#[derive(Debug, Default)]
struct SenderNonceState {
    /// Next nonce that has never been handed out.
    next: u64,
    /// Nonces handed out and released again because the node never accepted them.
    released: BTreeSet<u64>,
    /// Nonces handed out whose submission has not settled yet.
    outstanding: BTreeSet<u64>,
}

/// Serializes nonce assignment per sending account.
#[derive(Debug)]
pub struct NonceCoordinator<N> {
    node: Arc<N>,
    senders: Mutex<HashMap<Address, Arc<tokio::sync::Mutex<SenderNonceState>>>>,
}

impl<N: NodeClient> NonceCoordinator<N> {
    /// Creates a coordinator that refreshes nonces from `node`.
    pub fn new(node: Arc<N>) -> Self {
        Self { node, senders: Mutex::new(HashMap::default()) }
    }

    fn sender_state(&self, sender: Address) -> Arc<tokio::sync::Mutex<SenderNonceState>> {
        self.senders.lock().entry(sender).or_default().clone()
    }

    /// Refreshes the pending nonce of `sender` from the node and assigns the next free
    /// nonce to the caller.
    pub async fn assign(&self, sender: Address) -> NodeResult<u64> {
        let state = self.sender_state(sender);
        let mut state = state.lock().await;

        let pending = self.node.pending_nonce(sender).await?;

        // Released nonces below the node's view were filled by someone else.
        state.released.retain(|nonce| *nonce >= pending);

        if pending < state.next && state.outstanding.range(pending..).next().is_none() {
            debug!(%sender, pending, next = state.next, "node dropped nonces, rewinding");
            state.next = pending;
            state.released.clear();
        }

        let nonce = match state.released.pop_first() {
            Some(nonce) => nonce,
            None => {
                let nonce = pending.max(state.next);
                state.next = nonce + 1;
                nonce
            }
        };
        state.outstanding.insert(nonce);

        trace!(%sender, pending, nonce, "assigned nonce");
        Ok(nonce)
    }

    /// Hands `nonce` back after the node rejected the transaction that carried it.
    ///
    /// Only release nonces whose transaction is known not to be pooled; a nonce that hit
    /// a conflict on the node is occupied and must not be reused.
    pub async fn release(&self, sender: Address, nonce: u64) {
        let state = self.sender_state(sender);
        let mut state = state.lock().await;
        state.outstanding.remove(&nonce);
        if nonce < state.next {
            state.released.insert(nonce);
            trace!(%sender, nonce, "released nonce");
        }
    }

    /// Marks the submission carrying `nonce` as settled once the node accepted it or
    /// answered with a nonce conflict.
    pub async fn settle(&self, sender: Address, nonce: u64) {
        let state = self.sender_state(sender);
        state.lock().await.outstanding.remove(&nonce);
    }
}
