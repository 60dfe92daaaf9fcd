//! Transaction lifecycle: build, sign, broadcast and confirm.
//!
//! [`TransactionManager::submit`] acquires a nonce and gas price when the [`TxRequest`] leaves
//! them open, signs a legacy transaction with the node key and broadcasts it. Confirming requests
//! then poll for a receipt with exponential backoff until the receipt timeout elapses.
//!
//! [`ContractCall`] encodes calls from compact signatures and runs read-only calls.

mod call;
mod manager;
mod request;

pub use call::ContractCall;
pub use manager::{DEFAULT_RECEIPT_TIMEOUT, INITIAL_POLL_DELAY, TransactionManager, TxOutcome};
pub use request::TxRequest;
