//! Retrying, failing-over wrapper around Alloy's [`RootProvider`](alloy::providers::RootProvider).
//!
//! Every chain query the watcher and the transaction manager issue goes through
//! [`RobustProvider`], which adds:
//! * a bounded total timeout per call
//! * exponential backoff retries
//! * ordered failover to fallback providers
//!
//! Raw broadcasts and receipt queries skip the last two and hit the primary provider once.
//!
//! Use [`RobustProviderBuilder`] to construct one, or hand any [`IntoRobustProvider`] to the
//! builders of this crate.
//!
//! ```rust,no_run
//! use registry_watcher::robust_provider::{RobustProvider, RobustProviderBuilder};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let robust: RobustProvider = RobustProviderBuilder::new("http://localhost:8545")
//!     .fallback("http://localhost:8546")
//!     .call_timeout(Duration::from_secs(30))
//!     .build()
//!     .await?;
//!
//! let head = robust.get_block_number().await?;
//! println!("Current block: {head}");
//! # Ok(()) }
//! ```

pub mod builder;
pub mod provider;
pub mod provider_conversion;

pub use builder::*;
pub use provider::{Error, RobustProvider};
pub use provider_conversion::{IntoRobustProvider, IntoRootProvider};
