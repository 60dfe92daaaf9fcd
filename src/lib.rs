//! Registry-Watcher is the operational core of a relay node that takes part in an on-chain node
//! registry.
//!
//! It consists of four pieces:
//!
//! - [`EventDecoder`] turns registry logs into [`DecodedEvent`]s.
//! - [`TransactionManager`] builds, signs, broadcasts and confirms transactions of the node key.
//! - [`Watcher`], built via [`WatcherBuilder`], keeps a [`Checkpoint`] in sync with the chain,
//!   runs [`Reactions`] for registry events and reveals pending convictions.
//! - [`BudgetTracker`] limits how many cost points each client may spend per minute.
//!
//! # Reconciliation
//!
//! One cycle of the watcher fetches the chain head together with the node list, then the block at
//! the head and the registry logs since the checkpoint. Logs are decoded and dispatched in order;
//! only then is the checkpoint moved to the head. A failing cycle is logged and retried with the
//! same range on the next interval, so reactions must tolerate seeing an event more than once.
//!
//! # Notifications
//!
//! [`Watcher::subscribe`] yields a [`Notification::NewBlock`] per processed head and a
//! [`Notification::Event`] per decoded log. The channel is buffered; a subscriber that falls
//! behind skips messages and observes a lag error.
//!
//! # Robust providers
//!
//! The [`robust_provider`] module provides [`robust_provider::RobustProvider`], a wrapper that can
//! retry and fail over across multiple RPC endpoints. Every chain access of this crate goes
//! through it.

#[macro_use]
mod logging;

pub mod abi;
pub mod admission;
pub mod robust_provider;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transaction;
pub mod watcher;

mod error;
mod types;

pub use abi::{DecodedEvent, EventDecoder, FieldValue};
pub use admission::{BudgetTracker, RpcRequest, calculate_cost};
pub use error::{
    AdmissionError, CollaboratorError, DecodeError, PersistenceError, TransactionError,
    WatcherError,
};
pub use transaction::{ContractCall, TransactionManager, TxOutcome, TxRequest};
pub use types::Notification;
pub use watcher::{
    Checkpoint, CheckpointStore, ConvictionQueue, CycleOutcome, PendingConviction, Reactions,
    Watcher, WatcherBuilder, WatcherHandle, WatcherState,
};
