use std::{fmt, sync::Arc, time::Duration};

use alloy::{
    eips::BlockNumberOrTag,
    primitives::Address,
    rpc::types::Filter,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use crate::{
    abi::{DecodedEvent, EventDecoder},
    error::{DecodeError, WatcherError},
    robust_provider::RobustProvider,
    transaction::TransactionManager,
    types::Notification,
    watcher::{
        ConvictionQueue, Reactions, WatcherHandle, WatcherState,
        checkpoint::{Checkpoint, CheckpointTracker},
        conviction::{RevealReport, spawn_reveals},
        reactions::ReactionContext,
        registry::{NodeListProvider, ValidatorHistory},
    },
};

/// What a single reconciliation cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The chain head has not moved past the checkpoint.
    NoNewBlocks { block_number: u64 },
    /// Events up to `checkpoint` were processed and persisted.
    Advanced {
        checkpoint: Checkpoint,
        /// Number of decoded registry events.
        events: usize,
        /// Number of reveal transactions handed to the reveal task.
        reveals: usize,
    },
}

/// Keeps a checkpoint in sync with the registry contract and reacts to its events.
///
/// Built with [`WatcherBuilder`](crate::WatcherBuilder). Drive it manually with
/// [`update`](Self::update), or hand it to [`start`](Self::start) for a background loop.
pub struct Watcher {
    pub(crate) provider: RobustProvider,
    pub(crate) decoder: EventDecoder,
    pub(crate) checkpoints: CheckpointTracker,
    pub(crate) node_list: Arc<dyn NodeListProvider>,
    pub(crate) validators: Arc<dyn ValidatorHistory>,
    pub(crate) transactions: TransactionManager,
    pub(crate) registry: Option<Address>,
    pub(crate) reactions: Reactions,
    pub(crate) convictions: ConvictionQueue,
    pub(crate) notifications: broadcast::Sender<Notification>,
    pub(crate) reveal_reports: mpsc::UnboundedSender<RevealReport>,
    pub(crate) reveal_receiver: Option<mpsc::UnboundedReceiver<RevealReport>>,
    pub(crate) state: Arc<watch::Sender<WatcherState>>,
    pub(crate) interval: Duration,
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("signer", &self.transactions.address())
            .field("registry", &self.registry)
            .field("interval", &self.interval)
            .field("state", &*self.state.borrow())
            .field("reactions", &self.reactions)
            .field("pending_convictions", &self.convictions.len())
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Stream of `NewBlock` and decoded-event notifications.
    ///
    /// A subscriber that falls behind by more than the notification capacity sees a lag error
    /// and skips the dropped messages.
    #[must_use]
    pub fn subscribe(&self) -> BroadcastStream<Notification> {
        BroadcastStream::new(self.notifications.subscribe())
    }

    /// The dispatch table, for registering further reactions.
    pub fn reactions_mut(&mut self) -> &mut Reactions {
        &mut self.reactions
    }

    /// Handle to the pending-conviction queue.
    #[must_use]
    pub fn convictions(&self) -> ConvictionQueue {
        self.convictions.clone()
    }

    /// Receiver of reveal outcomes. Only the first call returns `Some`.
    pub fn take_reveal_reports(&mut self) -> Option<mpsc::UnboundedReceiver<RevealReport>> {
        self.reveal_receiver.take()
    }

    #[must_use]
    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    /// The current checkpoint, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::Persistence`] if the store cannot be read.
    pub async fn checkpoint(&mut self) -> Result<Checkpoint, WatcherError> {
        Ok(self.checkpoints.current().await?)
    }

    /// Runs one reconciliation cycle.
    ///
    /// Fetches the chain head, processes registry logs of the unprocessed range, persists the
    /// new checkpoint and sweeps the conviction queue. A failed cycle leaves the checkpoint
    /// untouched, so the next one retries the same range.
    ///
    /// # Errors
    ///
    /// * [`WatcherError::EmptyChainHead`] - the node reported block zero.
    /// * [`WatcherError::Provider`] - head, block or logs could not be fetched.
    /// * [`WatcherError::Registry`] - the node list or validator history failed.
    /// * [`WatcherError::Decode`] - a log could not be decoded; the whole batch is dropped.
    /// * [`WatcherError::Persistence`] - the checkpoint could not be loaded or saved.
    pub async fn update(&mut self) -> Result<CycleOutcome, WatcherError> {
        let checkpoint = self.checkpoints.current().await?;

        let (head, node_list) =
            tokio::join!(self.provider.get_block_number(), self.node_list.node_list(false));
        let head = head?;
        let node_list = node_list.map_err(WatcherError::Registry)?;

        if head == checkpoint.block_number {
            trace!(block_number = head, "No new block");
            return Ok(CycleOutcome::NoNewBlocks { block_number: head });
        }
        if head == 0 {
            return Err(WatcherError::EmptyChainHead);
        }
        if head < checkpoint.block_number {
            warn!(
                block_number = head,
                checkpoint = checkpoint.block_number,
                "Chain head is behind the checkpoint, waiting for the node to catch up"
            );
            return Ok(CycleOutcome::NoNewBlocks { block_number: head });
        }

        self.notify(Notification::NewBlock(head));

        let block = self.provider.get_block_by_number(BlockNumberOrTag::Number(head)).await?;
        let logs = match node_list.contract {
            Some(contract) => {
                let filter = Filter::new()
                    .address(contract)
                    .from_block(checkpoint.block_number + 1)
                    .to_block(head);
                self.provider.get_logs(&filter).await?
            }
            None => Vec::new(),
        };

        let mut events = Vec::with_capacity(logs.len());
        if !logs.is_empty() {
            let at_block = logs
                .iter()
                .filter_map(|log| log.block_number)
                .max()
                .filter(|number| *number > 0)
                .unwrap_or(head);
            self.node_list.update_node_list(at_block).await.map_err(WatcherError::Registry)?;

            events = logs
                .iter()
                .map(|log| self.decoder.decode(log))
                .collect::<Result<Vec<_>, DecodeError>>()?;
            debug!(
                from_block = checkpoint.block_number + 1,
                to_block = head,
                event_count = events.len(),
                "Decoded registry events"
            );

            let ctx = ReactionContext {
                node_list: Arc::clone(&self.node_list),
                transactions: self.transactions.clone(),
                registry: self.registry.or(node_list.contract),
                block_number: head,
            };
            for event in &events {
                self.dispatch(event, &ctx).await;
            }
        }

        let next = Checkpoint { block_number: head, block_hash: block.header.hash };
        self.checkpoints.advance(next).await?;

        self.validators.update_validator_history().await.map_err(WatcherError::Registry)?;

        let reveals = self.sweep_convictions(head, node_list.contract);

        Ok(CycleOutcome::Advanced { checkpoint: next, events: events.len(), reveals })
    }

    async fn dispatch(&self, event: &DecodedEvent, ctx: &ReactionContext) {
        trace!(event = %event.event_name, "Dispatching event");
        self.notify(Notification::Event(event.clone()));
        self.reactions.dispatch(event, ctx).await;
    }

    fn notify(&self, notification: Notification) {
        // no subscribers is fine
        let _ = self.notifications.send(notification);
    }

    /// Hands every mature conviction to a detached reveal task. Returns how many were handed
    /// over.
    fn sweep_convictions(&self, head: u64, contract: Option<Address>) -> usize {
        if self.convictions.is_empty() {
            return 0;
        }
        let Some(registry) = self.registry.or(contract) else {
            warn!(pending = self.convictions.len(), "No registry known, cannot reveal convictions");
            return 0;
        };

        let mature = self.convictions.take_mature(head);
        if mature.is_empty() {
            return 0;
        }

        let count = mature.len();
        info!(count = count, block_number = head, "Revealing convictions");
        spawn_reveals(self.transactions.clone(), registry, mature, self.reveal_reports.clone());
        count
    }

    /// Runs cycles on a background task until stopped.
    ///
    /// The next cycle is scheduled `interval` after the previous one finished. Errors are
    /// logged and never end the loop. With a zero interval a single cycle runs.
    pub fn start(self) -> WatcherHandle {
        let token = CancellationToken::new();
        let state = Arc::clone(&self.state);
        state.send_replace(WatcherState::Running);
        info!(interval_ms = self.interval.as_millis(), "Starting watcher");

        let task = tokio::spawn(run(self, token.clone()));
        WatcherHandle { token, state, task }
    }
}

async fn run(mut watcher: Watcher, token: CancellationToken) -> Watcher {
    loop {
        match watcher.update().await {
            Ok(CycleOutcome::Advanced { checkpoint, events, reveals }) => {
                debug!(
                    block_number = checkpoint.block_number,
                    events = events,
                    reveals = reveals,
                    "Cycle finished"
                );
            }
            Ok(CycleOutcome::NoNewBlocks { .. }) => {}
            Err(err) => {
                report!(
                    err,
                    transient = err.is_transient(),
                    "Error trying to update within the watcher"
                );
            }
        }

        if watcher.interval.is_zero() || token.is_cancelled() {
            break;
        }
        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(watcher.interval) => {}
        }
    }

    watcher.state.send_replace(WatcherState::Stopped);
    info!("Watcher stopped");
    watcher
}
