//! The registry watcher.
//!
//! Every cycle the [`Watcher`] compares the chain head with its [`Checkpoint`], fetches the
//! registry logs of the new range, decodes them and runs the [`Reactions`] registered for each
//! event name. After the checkpoint is persisted, mature convictions from the
//! [`ConvictionQueue`] are revealed on a detached task.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use alloy::signers::local::PrivateKeySigner;
//! use registry_watcher::{
//!     TransactionManager, WatcherBuilder,
//!     robust_provider::RobustProviderBuilder,
//!     watcher::{NodeList, NodeListProvider},
//! };
//! # use futures::future::{BoxFuture, FutureExt};
//! # struct Registry;
//! # impl NodeListProvider for Registry {
//! #     fn node_list(&self, _: bool) -> BoxFuture<'_, Result<NodeList, registry_watcher::CollaboratorError>> {
//! #         futures::future::ready(Ok(NodeList::default())).boxed()
//! #     }
//! #     fn update_node_list(&self, _: u64) -> BoxFuture<'_, Result<(), registry_watcher::CollaboratorError>> {
//! #         futures::future::ready(Ok(())).boxed()
//! #     }
//! # }
//!
//! # async fn run() -> anyhow::Result<()> {
//! tracing_subscriber::fmt()
//!     .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
//!     .init();
//!
//! let provider = RobustProviderBuilder::new("http://localhost:8545").build().await?;
//! let signer: PrivateKeySigner = std::env::var("NODE_KEY")?.parse()?;
//! let transactions = TransactionManager::new(provider.clone(), signer);
//!
//! let handle = WatcherBuilder::new()
//!     .interval(Duration::from_secs(5))
//!     .persist_file("checkpoint.json")
//!     .connect(provider, transactions, Registry)
//!     .await?
//!     .start();
//!
//! handle.stop();
//! # Ok(())
//! # }
//! ```

mod builder;
mod checkpoint;
mod conviction;
mod cycle;
mod handle;
mod reactions;
mod registry;

pub use builder::{DEFAULT_INTERVAL, DEFAULT_NOTIFICATION_CAPACITY, WatcherBuilder};
pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use conviction::{ConvictionQueue, PendingConviction, REVEAL_DELAY_BLOCKS, RevealReport};
pub use cycle::{CycleOutcome, Watcher};
pub use handle::{WatcherHandle, WatcherState};
pub use reactions::{Reaction, ReactionContext, Reactions, cancel_unregister};
pub use registry::{NodeInfo, NodeList, NodeListProvider, ValidatorHistory};
