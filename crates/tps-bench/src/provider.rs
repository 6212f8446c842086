//! [`NodeClient`] backed by an alloy provider.

use alloy_eips::BlockNumberOrTag;
use alloy_network::{Ethereum, ReceiptResponse};
use alloy_primitives::{Address, Bytes, TxHash};
use alloy_provider::{Provider, RootProvider, ext::TxPoolApi};
use alloy_rpc_client::{RpcClient, WsConnect};
use alloy_rpc_types_txpool::TxpoolStatus;
use alloy_transport::TransportError;
use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;
use url::Url;

use crate::{HeaderStream, NodeClient, NodeError, NodeResult, ReceiptStatus, SubmitError};

/// JSON-RPC node connection.
///
/// `ws://` and `wss://` endpoints support header subscriptions; plain HTTP endpoints can
/// only be used for submission.
#[derive(Debug, Clone)]
pub struct RpcNode {
    provider: RootProvider<Ethereum>,
}

impl RpcNode {
    /// Connects to `endpoint`, choosing the transport from the URL scheme.
    pub async fn connect(endpoint: &str) -> NodeResult<Self> {
        let url: Url = endpoint.parse().map_err(|e| NodeError::Rpc(format!("{endpoint}: {e}")))?;

        let client = match url.scheme() {
            "ws" | "wss" => {
                RpcClient::builder().ws(WsConnect::new(url.as_str())).await.map_err(rpc_error)?
            }
            _ => RpcClient::builder().http(url),
        };

        debug!(endpoint, "connected to node");
        Ok(Self { provider: RootProvider::<Ethereum>::new(client) })
    }
}

fn rpc_error(err: TransportError) -> NodeError {
    NodeError::Rpc(err.to_string())
}

#[async_trait]
impl NodeClient for RpcNode {
    async fn chain_id(&self) -> NodeResult<u64> {
        self.provider.get_chain_id().await.map_err(rpc_error)
    }

    async fn gas_price(&self) -> NodeResult<u128> {
        self.provider.get_gas_price().await.map_err(rpc_error)
    }

    async fn pending_nonce(&self, address: Address) -> NodeResult<u64> {
        self.provider.get_transaction_count(address).pending().await.map_err(rpc_error)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, SubmitError> {
        match self.provider.send_raw_transaction(&raw).await {
            Ok(pending) => Ok(*pending.tx_hash()),
            Err(err) => Err(match err.as_error_resp() {
                Some(payload) => SubmitError::classify(&payload.message),
                None => SubmitError::Permanent(err.to_string()),
            }),
        }
    }

    async fn receipt_status(&self, hash: TxHash) -> NodeResult<Option<ReceiptStatus>> {
        let receipt = self.provider.get_transaction_receipt(hash).await.map_err(rpc_error)?;
        Ok(receipt.map(|receipt| {
            if receipt.status() { ReceiptStatus::Success } else { ReceiptStatus::Reverted }
        }))
    }

    async fn block_transaction_count(&self, number: u64) -> NodeResult<usize> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await
            .map_err(rpc_error)?
            .ok_or(NodeError::BlockNotFound(number))?;
        Ok(block.transactions.len())
    }

    async fn txpool_status(&self) -> NodeResult<TxpoolStatus> {
        self.provider.txpool_status().await.map_err(rpc_error)
    }

    async fn subscribe_new_heads(&self) -> NodeResult<HeaderStream> {
        let subscription = self.provider.subscribe_blocks().await.map_err(rpc_error)?;
        Ok(subscription.into_stream().map(|header| Ok(header.number)).boxed())
    }
}
