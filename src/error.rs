use std::{path::PathBuf, time::Duration};

use alloy::primitives::{B256, TxHash};
use thiserror::Error;

use crate::{robust_provider::Error as RobustProviderError, transaction::TxRequest};

/// Boxed error returned by the collaborators the watcher consumes (node list, validator
/// history).
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while turning a raw log into a [`DecodedEvent`](crate::DecodedEvent).
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The first topic matches no event of the signature table (or the log has no topic).
    #[error("unknown log signature: {0:?}")]
    UnknownEvent(Option<B256>),

    /// A human-readable event definition could not be parsed.
    #[error("invalid event definition `{definition}`: {reason}")]
    InvalidDefinition { definition: String, reason: String },

    /// The topics or the data payload do not match the declared types.
    #[error(transparent)]
    Abi(#[from] alloy::dyn_abi::Error),
}

/// Failures of the transaction lifecycle (build, sign, broadcast, confirm).
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Nonce or gas price could not be acquired.
    #[error("could not prepare the transaction: {0}")]
    Provider(#[from] RobustProviderError),

    /// The transaction envelope could not be built or signed.
    #[error("could not sign the transaction: {0}")]
    Signing(String),

    /// The node rejected the signed transaction.
    #[error("error sending the tx to {}: {source}", request.to)]
    Broadcast {
        request: Box<TxRequest>,
        #[source]
        source: RobustProviderError,
    },

    /// Querying the receipt failed while waiting for confirmation.
    #[error("error fetching the receipt for {hash}: {source}")]
    ReceiptFetch {
        hash: TxHash,
        #[source]
        source: RobustProviderError,
    },

    /// No receipt showed up before the confirmation timeout.
    #[error("transaction {hash} was not confirmed within {timeout:?}")]
    ConfirmationTimeout { hash: TxHash, timeout: Duration },

    /// The receipt reports `status = 0`.
    #[error("transaction {hash} failed because it returned status=0")]
    TransactionReverted { hash: TxHash },

    /// The receipt consumed exactly the requested gas limit.
    #[error("transaction {hash} failed and all gas was used up ({gas_limit} not enough)")]
    OutOfGas { hash: TxHash, gas_limit: u64 },

    /// A function signature could not be parsed.
    #[error("invalid function signature `{signature}`: {reason}")]
    InvalidSignature { signature: String, reason: String },

    /// Arguments or return data do not match the function signature.
    #[error("could not encode or decode the contract call: {0}")]
    Abi(#[from] alloy::dyn_abi::Error),

    /// No registry contract address is configured or advertised by the node list.
    #[error("no registry contract address is known")]
    MissingRegistry,
}

impl TransactionError {
    /// Category reported to the error-reporting sink.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            TransactionError::Provider(_) | TransactionError::Broadcast { .. } => "tx_error",
            TransactionError::Signing(_) => "tx_signing_error",
            TransactionError::ReceiptFetch { .. } => "error_fetching_tx",
            TransactionError::ConfirmationTimeout { .. } => "tx_timeout",
            TransactionError::TransactionReverted { .. } => "tx_failed",
            TransactionError::OutOfGas { .. } => "gas_error",
            TransactionError::InvalidSignature { .. }
            | TransactionError::Abi(_)
            | TransactionError::MissingRegistry => "contract_call_error",
        }
    }
}

/// Checkpoint load/save failures.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("could not access checkpoint file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A caller-provided store failed.
    #[error("checkpoint store failed: {0}")]
    Store(#[source] CollaboratorError),
}

/// Errors that abort a reconciliation cycle or a reaction.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// The node reported block number zero.
    #[error("the current block was empty")]
    EmptyChainHead,

    /// Chain head, block or logs could not be fetched.
    #[error(transparent)]
    Provider(#[from] RobustProviderError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The node list or validator history collaborator failed.
    #[error("registry collaborator failed: {0}")]
    Registry(#[source] CollaboratorError),

    /// This node is not part of the current node list.
    #[error("could not find the server {0} in the node list")]
    NodeNotFound(String),

    /// A decoded event lacks a field a reaction relies on.
    #[error("event {event} has no usable field `{field}`")]
    MissingField { event: String, field: &'static str },

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// The notification channel needs room for at least one message.
    #[error("notification capacity must be greater than 0")]
    InvalidNotificationCapacity,
}

impl WatcherError {
    /// Category reported to the error-reporting sink.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            WatcherError::EmptyChainHead | WatcherError::Provider(_) => "watcher_fetch_error",
            WatcherError::Decode(_) => "watcher_decode_error",
            WatcherError::Persistence(_) => "watcher_checkpoint_error",
            WatcherError::Registry(_) | WatcherError::NodeNotFound(_) => "registry_error",
            WatcherError::MissingField { .. } => "watcher_reaction_error",
            WatcherError::Transaction(err) => err.category(),
            WatcherError::InvalidNotificationCapacity => "config_error",
        }
    }

    /// Whether the next cycle may succeed without any intervention.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, WatcherError::EmptyChainHead | WatcherError::Provider(_))
    }
}

/// Admission-control rejections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("{client} used up too many requests per minute ({costs} > {max_points})")]
    BudgetExceeded { client: String, costs: u64, max_points: u64 },
}
