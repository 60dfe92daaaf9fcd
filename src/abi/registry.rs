//! Events and functions of the node registry contract.

/// Human-readable definitions of the registry events the watcher decodes.
pub const NODE_REGISTRY_EVENTS: &[&str] = &[
    "event LogNodeRegistered(string url, uint256 props, address signer, uint256 deposit)",
    "event LogNodeUnregisterRequested(string url, address owner, address caller)",
    "event LogNodeUnregisterCanceled(string url, address owner)",
    "event LogNodeConvicted(address signer)",
    "event LogNodeRemoved(string url, address signer)",
    "event LogDepositReturned(address nodeOwner, uint256 amount)",
];

pub const LOG_NODE_REGISTERED: &str = "LogNodeRegistered";
pub const LOG_NODE_UNREGISTER_REQUESTED: &str = "LogNodeUnregisterRequested";
pub const LOG_NODE_UNREGISTER_CANCELED: &str = "LogNodeUnregisterCanceled";
pub const LOG_NODE_CONVICTED: &str = "LogNodeConvicted";
pub const LOG_NODE_REMOVED: &str = "LogNodeRemoved";

/// `revealConvict(signer, wrongBlockHash, wrongBlockNumber, v, r, s)`
pub const REVEAL_CONVICT: &str = "revealConvict(address,bytes32,uint256,uint8,bytes32,bytes32)";
/// `cancelUnregisteringServer(index)`
pub const CANCEL_UNREGISTERING_SERVER: &str = "cancelUnregisteringServer(uint256)";

pub const REVEAL_CONVICT_GAS: u64 = 600_000;
pub const CANCEL_UNREGISTERING_SERVER_GAS: u64 = 400_000;
