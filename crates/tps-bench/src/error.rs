//! Error types for the benchmark harness.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;
use tokio::task::JoinError;

/// Nonce collisions reported by the node that resolve themselves once the sender picks
/// a fresh nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceConflict {
    /// Another transaction with the same nonce and a higher or equal fee is pooled.
    ReplacementUnderpriced,
    /// The exact transaction is already pooled.
    AlreadyKnown,
    /// Another transaction holds this nonce in the pool.
    NonceInPool,
}

impl NonceConflict {
    const ALL: [Self; 3] = [Self::ReplacementUnderpriced, Self::AlreadyKnown, Self::NonceInPool];

    /// Returns the node error message this conflict is reported with.
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ReplacementUnderpriced => "replacement transaction underpriced",
            Self::AlreadyKnown => "already known",
            Self::NonceInPool => "there is another tx which has the same nonce in the tx pool",
        }
    }

    /// Matches a node error message against the known conflict messages.
    ///
    /// Matching is exact apart from surrounding whitespace. Messages that merely contain
    /// one of the phrases are not treated as conflicts.
    pub fn from_message(message: &str) -> Option<Self> {
        let message = message.trim();
        Self::ALL.into_iter().find(|conflict| conflict.message() == message)
    }
}

/// Outcome of a rejected `eth_sendRawTransaction`, classified once at the node boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The nonce is taken on the node; refresh it and retry.
    #[error("transient nonce conflict: {}", .0.message())]
    TransientNonceConflict(NonceConflict),
    /// Any other rejection. The transaction is counted as failed.
    #[error("submission rejected: {0}")]
    Permanent(String),
}

impl SubmitError {
    /// Classifies a node error message.
    pub fn classify(message: impl AsRef<str>) -> Self {
        let message = message.as_ref();
        NonceConflict::from_message(message)
            .map_or_else(|| Self::Permanent(message.to_string()), Self::TransientNonceConflict)
    }

    /// Returns `true` if the submission should be retried with a fresh nonce.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNonceConflict(_))
    }
}

/// Errors returned by node queries other than transaction submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// The RPC call failed at the transport or JSON-RPC level.
    #[error("rpc request failed: {0}")]
    Rpc(String),
    /// The node announced a block it could not return.
    #[error("block {0} not found")]
    BlockNotFound(u64),
    /// The header subscription stream ended.
    #[error("header subscription closed")]
    SubscriptionClosed,
}

/// Convenience alias for node query results.
pub type NodeResult<T> = Result<T, NodeError>;

/// Errors raised while passing a value between the driver and the sampler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// The partner did not fire the handoff in time.
    #[error("{phase} handoff timed out after {timeout:?}")]
    Timeout {
        /// Name of the handoff.
        phase: &'static str,
        /// How long the receiver waited.
        timeout: Duration,
    },
    /// The partner was dropped without firing.
    #[error("{0} handoff dropped before firing")]
    Dropped(&'static str),
}

/// Errors raised while loading the sender pool.
#[derive(Debug, Error)]
pub enum AccountError {
    /// The key file could not be read.
    #[error("failed to read key file {path}: {source}")]
    Io {
        /// Path of the key file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// A line did not hold a valid secp256k1 private key.
    #[error("invalid private key on line {line}: {reason}")]
    InvalidKey {
        /// One-based line number in the key file.
        line: usize,
        /// Parser or signer error.
        reason: String,
    },
    /// No keys were loaded.
    #[error("account pool is empty")]
    Empty,
}

/// Errors raised while building a signed transaction.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// Signing the transaction hash failed.
    #[error("failed to sign transaction: {0}")]
    Signing(#[from] alloy_signer::Error),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("failed to access config file {path}: {source}")]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML for [`crate::BenchConfig`].
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// The default configuration could not be serialized.
    #[error("failed to render config file: {0}")]
    Render(#[from] toml::ser::Error),
    /// A value is out of range or missing.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Run-level errors. Anything that reaches this type aborts the run.
#[derive(Debug, Error)]
pub enum BenchError {
    /// A node query needed to set the run up failed.
    #[error(transparent)]
    Node(#[from] NodeError),
    /// The header subscription failed. Not retried.
    #[error("block subscription failed: {0}")]
    Subscription(NodeError),
    /// A handoff between the driver and the sampler failed.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    /// The sampler task panicked or was cancelled.
    #[error("sampler task failed: {0}")]
    Sampler(#[from] JoinError),
    /// The sampler exited before the driver finished.
    #[error("sampler stopped before the driver reported its failures")]
    SamplerStoppedEarly,
    /// The in-flight limiter was closed while launching tasks.
    #[error("in-flight limiter closed: {0}")]
    LimiterClosed(#[from] tokio::sync::AcquireError),
    /// The run parameters are unusable.
    #[error("invalid run parameters: {0}")]
    InvalidParameters(String),
}
