use alloy::primitives::{Address, U256};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// A relay node as listed by the registry contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub url: String,
    /// Position in the registry, used as the argument of per-node contract calls.
    pub index: u64,
    pub address: Address,
    #[serde(default)]
    pub deposit: U256,
    #[serde(default)]
    pub props: u64,
}

/// Snapshot of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeList {
    /// Address of the registry contract. Without it no logs are fetched.
    pub contract: Option<Address>,
    pub nodes: Vec<NodeInfo>,
    #[serde(default)]
    pub last_block_number: u64,
}

impl NodeList {
    #[must_use]
    pub fn find_by_url(&self, url: &str) -> Option<&NodeInfo> {
        self.nodes.iter().find(|node| node.url == url)
    }
}

/// Source of the current registry node list.
pub trait NodeListProvider: Send + Sync {
    /// Returns the node list, re-reading it from chain when `refresh` is set.
    fn node_list(&self, refresh: bool) -> BoxFuture<'_, Result<NodeList, CollaboratorError>>;

    /// Re-reads the node list as of `at_block`.
    fn update_node_list(&self, at_block: u64) -> BoxFuture<'_, Result<(), CollaboratorError>>;
}

/// Keeps the validator set of the watched chain up to date.
pub trait ValidatorHistory: Send + Sync {
    fn update_validator_history(&self) -> BoxFuture<'_, Result<(), CollaboratorError>>;
}

/// For chains without validator tracking.
impl ValidatorHistory for () {
    fn update_validator_history(&self) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        futures::future::ready(Ok(())).boxed()
    }
}
