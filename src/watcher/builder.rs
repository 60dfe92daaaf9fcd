use std::{path::PathBuf, sync::Arc, time::Duration};

use alloy::primitives::Address;
use tokio::sync::{broadcast, mpsc, watch};

use crate::{
    abi::EventDecoder,
    error::WatcherError,
    robust_provider::IntoRobustProvider,
    transaction::TransactionManager,
    watcher::{
        ConvictionQueue, Reactions, Watcher, WatcherState,
        checkpoint::{CheckpointStore, CheckpointTracker, FileCheckpointStore, MemoryCheckpointStore},
        registry::{NodeListProvider, ValidatorHistory},
    },
};

/// Default delay between the end of one cycle and the start of the next.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
/// Default number of notifications buffered per subscriber.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 128;

/// Builder/configuration for a [`Watcher`].
pub struct WatcherBuilder {
    interval: Duration,
    start_block: Option<u64>,
    store: Option<Box<dyn CheckpointStore>>,
    registry: Option<Address>,
    decoder: Option<EventDecoder>,
    reactions: Reactions,
    validators: Arc<dyn ValidatorHistory>,
    convictions: ConvictionQueue,
    notification_capacity: usize,
}

impl Default for WatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WatcherBuilder {
    /// Default configuration: 5 s interval, in-memory checkpoint, registry decoder and the
    /// built-in reactions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            start_block: None,
            store: None,
            registry: None,
            decoder: None,
            reactions: Reactions::with_builtin(),
            validators: Arc::new(()),
            convictions: ConvictionQueue::new(),
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }

    /// Sets the delay between cycles. Zero runs a single cycle and stops.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Starts from `block_number` regardless of what the checkpoint store holds.
    #[must_use]
    pub fn start_block(mut self, block_number: u64) -> Self {
        self.start_block = Some(block_number);
        self
    }

    /// Persists the checkpoint as JSON in `path`.
    #[must_use]
    pub fn persist_file(self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_store(FileCheckpointStore::new(path))
    }

    #[must_use]
    pub fn checkpoint_store(mut self, store: impl CheckpointStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Registry contract used for reactions and reveals, instead of the node list's.
    #[must_use]
    pub fn registry(mut self, registry: Address) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replaces the registry event decoder.
    #[must_use]
    pub fn decoder(mut self, decoder: EventDecoder) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Replaces the dispatch table, dropping the built-in reactions unless it contains them.
    #[must_use]
    pub fn reactions(mut self, reactions: Reactions) -> Self {
        self.reactions = reactions;
        self
    }

    #[must_use]
    pub fn validator_history(mut self, validators: impl ValidatorHistory + 'static) -> Self {
        self.validators = Arc::new(validators);
        self
    }

    /// Shares an existing conviction queue with the watcher.
    #[must_use]
    pub fn conviction_queue(mut self, convictions: ConvictionQueue) -> Self {
        self.convictions = convictions;
        self
    }

    /// Number of notifications buffered per subscriber. Must be greater than 0.
    #[must_use]
    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity;
        self
    }

    /// Connects to the chain and assembles the watcher.
    ///
    /// `transactions` signs as this node; its address decides which events concern us.
    ///
    /// # Errors
    ///
    /// * [`WatcherError::InvalidNotificationCapacity`] - capacity is zero.
    /// * [`WatcherError::Decode`] - the default decoder could not be built.
    /// * [`WatcherError::Provider`] - the provider failed to connect.
    pub async fn connect(
        self,
        provider: impl IntoRobustProvider,
        transactions: TransactionManager,
        node_list: impl NodeListProvider + 'static,
    ) -> Result<Watcher, WatcherError> {
        if self.notification_capacity == 0 {
            return Err(WatcherError::InvalidNotificationCapacity);
        }
        let decoder = match self.decoder {
            Some(decoder) => decoder,
            None => EventDecoder::node_registry()?,
        };
        let provider = provider.into_robust_provider().await?;

        let store = self.store.unwrap_or_else(|| Box::new(MemoryCheckpointStore::new()));
        let (notifications, _) = broadcast::channel(self.notification_capacity);
        let (reveal_reports, reveal_receiver) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(WatcherState::Idle);

        debug!(
            interval_ms = self.interval.as_millis(),
            signer = %transactions.address(),
            known_events = decoder.len(),
            "Watcher configured"
        );

        Ok(Watcher {
            provider,
            decoder,
            checkpoints: CheckpointTracker::new(store, self.start_block),
            node_list: Arc::new(node_list),
            validators: self.validators,
            transactions,
            registry: self.registry,
            reactions: self.reactions,
            convictions: self.convictions,
            notifications,
            reveal_reports,
            reveal_receiver: Some(reveal_receiver),
            state: Arc::new(state),
            interval: self.interval,
        })
    }
}
