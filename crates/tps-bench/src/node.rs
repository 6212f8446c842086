//! The node seam shared by the driver, the nonce coordinator and the sampler.

use std::fmt::Debug;

use alloy_primitives::{Address, Bytes, TxHash};
use alloy_rpc_types_txpool::TxpoolStatus;
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{NodeResult, SubmitError};

/// Stream of block numbers announced by a `newHeads` subscription.
pub type HeaderStream = BoxStream<'static, NodeResult<u64>>;

/// Status carried by a transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// The transaction was included and executed successfully.
    Success,
    /// The transaction was included but reverted.
    Reverted,
}

/// The subset of the Ethereum JSON-RPC surface the benchmark consumes.
///
/// Calls are independent; implementations must tolerate concurrent use from every
/// submission task and the sampler at once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeClient: Debug + Send + Sync + 'static {
    /// Returns the chain id reported by the node.
    async fn chain_id(&self) -> NodeResult<u64>;

    /// Returns the suggested legacy gas price in wei.
    async fn gas_price(&self) -> NodeResult<u128>;

    /// Returns the next nonce for `address`, counting pooled transactions.
    async fn pending_nonce(&self, address: Address) -> NodeResult<u64>;

    /// Broadcasts a signed, EIP-2718 encoded transaction.
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, SubmitError>;

    /// Returns the receipt status for `hash`, or `None` while it is not mined.
    async fn receipt_status(&self, hash: TxHash) -> NodeResult<Option<ReceiptStatus>>;

    /// Returns the number of transactions in block `number`.
    async fn block_transaction_count(&self, number: u64) -> NodeResult<usize>;

    /// Returns the pending and queued depth of the node's transaction pool.
    async fn txpool_status(&self) -> NodeResult<TxpoolStatus>;

    /// Subscribes to new block headers.
    async fn subscribe_new_heads(&self) -> NodeResult<HeaderStream>;
}
