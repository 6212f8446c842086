//! Signed transaction factories.

use std::{fmt::Debug, sync::Arc};

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Bytes, TxHash, TxKind};
use alloy_signer::SignerSync;

use crate::{Account, AccountPool, FactoryError, Workload};

/// A signed, EIP-2718 encoded transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    /// Transaction hash.
    pub hash: TxHash,
    /// Encoded transaction bytes.
    pub raw: Bytes,
}

/// Produces the signed transaction of submission task `id`.
///
/// Called again with a fresh nonce every time a submission is retried.
pub trait TxFactory: Debug + Send + Sync + 'static {
    /// Builds and signs the transaction of task `id` from `sender` with `nonce`.
    fn build(&self, id: u64, sender: &Account, nonce: u64) -> Result<SignedTx, FactoryError>;
}

/// Builds EIP-155 legacy transactions for a [`Workload`].
#[derive(Debug, Clone)]
pub struct LegacyTxFactory {
    chain_id: u64,
    gas_price: u128,
    gas_limit: u64,
    workload: Workload,
    recipients: Arc<AccountPool>,
}

impl LegacyTxFactory {
    /// Creates a factory. The gas price is fixed for the whole run.
    pub const fn new(
        chain_id: u64,
        gas_price: u128,
        gas_limit: u64,
        workload: Workload,
        recipients: Arc<AccountPool>,
    ) -> Self {
        Self { chain_id, gas_price, gas_limit, workload, recipients }
    }
}

impl TxFactory for LegacyTxFactory {
    fn build(&self, id: u64, sender: &Account, nonce: u64) -> Result<SignedTx, FactoryError> {
        let recipient = self.recipients.recipient(id).address();
        let call = self.workload.call(id, sender.address(), recipient);

        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            to: TxKind::Call(call.to),
            value: call.value,
            input: call.input,
        };

        let signature = sender.signer().sign_hash_sync(&tx.signature_hash())?;
        let signed = tx.into_signed(signature);
        let hash = *signed.hash();
        let raw: Bytes = TxEnvelope::from(signed).encoded_2718().into();

        Ok(SignedTx { hash, raw })
    }
}
