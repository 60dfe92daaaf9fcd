use std::{collections::HashMap, fmt, future::Future, sync::Arc};

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, U256},
};
use futures::future::{BoxFuture, FutureExt};

use crate::{
    abi::{
        DecodedEvent,
        registry::{
            CANCEL_UNREGISTERING_SERVER, CANCEL_UNREGISTERING_SERVER_GAS,
            LOG_NODE_UNREGISTER_REQUESTED,
        },
    },
    error::{TransactionError, WatcherError},
    transaction::{ContractCall, TransactionManager},
    watcher::registry::NodeListProvider,
};

/// Everything a reaction may use besides the event itself.
#[derive(Clone)]
pub struct ReactionContext {
    pub node_list: Arc<dyn NodeListProvider>,
    pub transactions: TransactionManager,
    /// Configured registry address, else the one advertised by the node list.
    pub registry: Option<Address>,
    /// Chain head of the cycle that produced the event.
    pub block_number: u64,
}

impl fmt::Debug for ReactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionContext")
            .field("signer", &self.transactions.address())
            .field("registry", &self.registry)
            .field("block_number", &self.block_number)
            .finish_non_exhaustive()
    }
}

pub type Reaction = Arc<
    dyn Fn(DecodedEvent, ReactionContext) -> BoxFuture<'static, Result<(), WatcherError>>
        + Send
        + Sync,
>;

/// Dispatch table from event name to the reactions registered for it.
#[derive(Clone, Default)]
pub struct Reactions {
    table: HashMap<String, Vec<Reaction>>,
}

impl fmt::Debug for Reactions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<_> = self.table.iter().map(|(name, list)| (name, list.len())).collect();
        counts.sort();
        f.debug_struct("Reactions").field("table", &counts).finish()
    }
}

impl Reactions {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding the built-in [`cancel_unregister`] reaction.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut reactions = Self::new();
        reactions.on(LOG_NODE_UNREGISTER_REQUESTED, cancel_unregister);
        reactions
    }

    /// Registers `reaction` for events named `event_name`. Reactions run in registration order.
    pub fn on<F, Fut>(&mut self, event_name: impl Into<String>, reaction: F) -> &mut Self
    where
        F: Fn(DecodedEvent, ReactionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), WatcherError>> + Send + 'static,
    {
        let reaction: Reaction = Arc::new(move |event, ctx| reaction(event, ctx).boxed());
        self.table.entry(event_name.into()).or_default().push(reaction);
        self
    }

    /// Drops every reaction registered for `event_name`.
    pub fn clear(&mut self, event_name: &str) {
        self.table.remove(event_name);
    }

    #[must_use]
    pub fn count(&self, event_name: &str) -> usize {
        self.table.get(event_name).map_or(0, Vec::len)
    }

    /// Runs the reactions for `event` one by one. A failing reaction is logged and does not stop
    /// the others.
    pub(crate) async fn dispatch(&self, event: &DecodedEvent, ctx: &ReactionContext) {
        let Some(reactions) = self.table.get(&event.event_name) else {
            trace!(event = %event.event_name, "No reaction registered");
            return;
        };

        for reaction in reactions {
            if let Err(err) = reaction(event.clone(), ctx.clone()).await {
                report!(err, event = %event.event_name, "Reaction failed");
            }
        }
    }
}

fn address_field(event: &DecodedEvent, field: &'static str) -> Result<Address, WatcherError> {
    event
        .field(field)
        .and_then(|value| value.as_address())
        .ok_or_else(|| WatcherError::MissingField { event: event.event_name.clone(), field })
}

/// Cancels an unregister request that someone else filed for this node.
///
/// Does nothing unless `owner` is this node and `caller` is not. Otherwise looks the node up by
/// `url` and sends a confirming `cancelUnregisteringServer(index)`.
///
/// # Errors
///
/// * [`WatcherError::MissingField`] - the event lacks `owner`, `caller` or `url`.
/// * [`WatcherError::NodeNotFound`] - the url is not in the node list.
/// * [`WatcherError::Transaction`] - the cancel transaction failed.
pub async fn cancel_unregister(
    event: DecodedEvent,
    ctx: ReactionContext,
) -> Result<(), WatcherError> {
    let me = ctx.transactions.address();
    let owner = address_field(&event, "owner")?;
    let caller = address_field(&event, "caller")?;
    if owner != me || caller == me {
        trace!(owner = %owner, caller = %caller, "Unregister request does not need a reaction");
        return Ok(());
    }

    let url = event.field("url").and_then(|value| value.as_str()).ok_or_else(|| {
        WatcherError::MissingField { event: event.event_name.clone(), field: "url" }
    })?;
    info!(url = url, caller = %caller, "Unregister request by a foreign caller, cancelling it");

    let node_list = ctx.node_list.node_list(false).await.map_err(WatcherError::Registry)?;
    let node = node_list.find_by_url(url).ok_or_else(|| WatcherError::NodeNotFound(url.to_owned()))?;
    let registry = ctx.registry.or(node_list.contract).ok_or(TransactionError::MissingRegistry)?;

    let request = ContractCall::parse(CANCEL_UNREGISTERING_SERVER)?
        .with_args(vec![DynSolValue::Uint(U256::from(node.index), 256)])
        .into_request(registry, CANCEL_UNREGISTERING_SERVER_GAS)?
        .confirm(true);
    let outcome = ctx.transactions.submit(request).await?;

    info!(tx_hash = %outcome.tx_hash(), index = node.index, "Called cancelUnregisteringServer");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::BTreeMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use alloy::{providers::mock::Asserter, rpc::types::Log, signers::local::PrivateKeySigner};

    use crate::{
        abi::FieldValue,
        test_utils::{StaticNodeList, TEST_PRIVATE_KEY, mocked_robust_provider},
        watcher::{NodeInfo, NodeList},
    };

    fn context(asserter: &Asserter, node_list: NodeList) -> anyhow::Result<ReactionContext> {
        let signer: PrivateKeySigner = TEST_PRIVATE_KEY.parse()?;
        Ok(ReactionContext {
            node_list: Arc::new(StaticNodeList::new(node_list)),
            transactions: TransactionManager::new(mocked_robust_provider(asserter), signer),
            registry: Some(Address::with_last_byte(0xaa)),
            block_number: 10,
        })
    }

    fn unregister_requested(url: &str, owner: Address, caller: Address) -> DecodedEvent {
        let mut fields = BTreeMap::new();
        fields.insert("url".to_owned(), FieldValue::String(url.to_owned()));
        fields.insert("owner".to_owned(), FieldValue::Address(owner));
        fields.insert("caller".to_owned(), FieldValue::Address(caller));
        DecodedEvent {
            event_name: LOG_NODE_UNREGISTER_REQUESTED.to_owned(),
            fields,
            log: Log::default(),
        }
    }

    #[tokio::test]
    async fn failing_reaction_does_not_stop_the_next_one() -> anyhow::Result<()> {
        let ctx = context(&Asserter::new(), NodeList::default())?;
        let ran = Arc::new(AtomicUsize::new(0));

        let mut reactions = Reactions::new();
        reactions.on("Ping", |_, _| async { Err(WatcherError::EmptyChainHead) });
        let counter = Arc::clone(&ran);
        reactions.on("Ping", move |_, _| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let event =
            DecodedEvent { event_name: "Ping".into(), fields: BTreeMap::new(), log: Log::default() };
        reactions.dispatch(&event, &ctx).await;
        reactions.dispatch(&DecodedEvent { event_name: "Other".into(), ..event }, &ctx).await;

        assert_eq!(reactions.count("Ping"), 2);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn own_unregister_request_is_left_alone() -> anyhow::Result<()> {
        // an empty asserter fails any RPC call, so a submitted transaction would error
        let ctx = context(&Asserter::new(), NodeList::default())?;
        let me = ctx.transactions.address();

        cancel_unregister(unregister_requested("https://me", me, me), ctx.clone()).await?;
        cancel_unregister(
            unregister_requested("https://other", Address::with_last_byte(1), me),
            ctx,
        )
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn unknown_node_is_not_found() -> anyhow::Result<()> {
        let node_list = NodeList {
            contract: Some(Address::with_last_byte(0xaa)),
            nodes: vec![NodeInfo { url: "https://someone-else".into(), ..NodeInfo::default() }],
            last_block_number: 0,
        };
        let ctx = context(&Asserter::new(), node_list)?;
        let me = ctx.transactions.address();

        let err = cancel_unregister(
            unregister_requested("https://me", me, Address::with_last_byte(1)),
            ctx,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WatcherError::NodeNotFound(url) if url == "https://me"));
        Ok(())
    }

    #[tokio::test]
    async fn event_without_owner_is_rejected() -> anyhow::Result<()> {
        let ctx = context(&Asserter::new(), NodeList::default())?;
        let event = DecodedEvent {
            event_name: LOG_NODE_UNREGISTER_REQUESTED.into(),
            fields: BTreeMap::new(),
            log: Log::default(),
        };

        let err = cancel_unregister(event, ctx).await.unwrap_err();

        assert!(matches!(err, WatcherError::MissingField { field: "owner", .. }));
        Ok(())
    }
}
