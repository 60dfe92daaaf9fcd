use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use tokio::time::Instant;

use crate::{
    admission::cost::{RpcRequest, calculate_cost},
    error::AdmissionError,
};

/// Length of the window costs are accumulated in.
pub const DEFAULT_BUDGET_WINDOW: Duration = Duration::from_secs(60);
/// Minimum time between two sweeps of expired clients.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(120);

#[derive(Debug)]
struct ClientBudget {
    costs: u64,
    window_expiry: Instant,
}

#[derive(Debug, Default)]
struct Clients {
    budgets: HashMap<String, ClientBudget>,
    next_cleanup: Option<Instant>,
}

/// Per-client cost budget over a fixed window.
///
/// All counters sit behind one mutex, so concurrent checks for the same client cannot both pass
/// a limit only one of them fits under.
#[derive(Debug)]
pub struct BudgetTracker {
    clients: Mutex<Clients>,
    window: Duration,
    cleanup_interval: Duration,
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl BudgetTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: Mutex::default(),
            window: DEFAULT_BUDGET_WINDOW,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }

    #[must_use]
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    #[must_use]
    pub fn cleanup_interval(mut self, cleanup_interval: Duration) -> Self {
        self.cleanup_interval = cleanup_interval;
        self
    }

    /// Charges `requests` to `client` and fails once the window's total exceeds `max_points`.
    ///
    /// The cost is recorded even when the check fails. A `max_points` of `0` disables the limit.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::BudgetExceeded`] when the accumulated cost is above
    /// `max_points`.
    pub fn check_budget(
        &self,
        client: &str,
        requests: &[RpcRequest],
        max_points: u64,
    ) -> Result<(), AdmissionError> {
        let now = Instant::now();
        let cost = requests.iter().map(calculate_cost).fold(0u64, u64::saturating_add);

        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let budget = clients
            .budgets
            .entry(client.to_owned())
            .or_insert_with(|| ClientBudget { costs: 0, window_expiry: now + self.window });
        if budget.window_expiry < now {
            budget.costs = 0;
            budget.window_expiry = now + self.window;
        }
        budget.costs = budget.costs.saturating_add(cost);
        let costs = budget.costs;

        if clients.next_cleanup.is_none_or(|next| next < now) {
            clients.next_cleanup = Some(now + self.cleanup_interval);
            let before = clients.budgets.len();
            clients.budgets.retain(|_, budget| budget.window_expiry >= now);
            trace!(removed = before - clients.budgets.len(), "Swept expired client budgets");
        }
        drop(clients);

        if max_points > 0 && costs > max_points {
            warn!(client = client, costs = costs, max_points = max_points, "Client exceeded its budget");
            return Err(AdmissionError::BudgetExceeded {
                client: client.to_owned(),
                costs,
                max_points,
            });
        }
        Ok(())
    }

    /// Costs accumulated by `client` in its current window.
    #[must_use]
    pub fn costs(&self, client: &str) -> Option<u64> {
        let clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.budgets.get(client).map(|budget| budget.costs)
    }

    /// Number of clients currently tracked.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).budgets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{slice, sync::Arc};

    fn block_number() -> RpcRequest {
        RpcRequest::new("eth_blockNumber", vec![])
    }

    #[tokio::test(start_paused = true)]
    async fn first_request_over_the_limit_fails() {
        let tracker = BudgetTracker::new();
        let request = block_number();

        // 5 points each, limit 12: third request brings the total to 15
        assert!(tracker.check_budget("a", slice::from_ref(&request), 12).is_ok());
        assert!(tracker.check_budget("a", slice::from_ref(&request), 12).is_ok());
        let err = tracker.check_budget("a", slice::from_ref(&request), 12).unwrap_err();

        assert_eq!(
            err,
            AdmissionError::BudgetExceeded { client: "a".into(), costs: 15, max_points: 12 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn batch_costs_the_sum_of_its_requests() {
        let tracker = BudgetTracker::new();
        let batch = vec![block_number(), RpcRequest::new("eth_call", vec![])];

        tracker.check_budget("a", &batch, 0).unwrap();

        assert_eq!(tracker.costs("a"), Some(55));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_window_resets_costs() {
        let tracker = BudgetTracker::new();
        let request = block_number();
        for _ in 0..10 {
            let _ = tracker.check_budget("a", slice::from_ref(&request), 20);
        }
        assert_eq!(tracker.costs("a"), Some(50));

        tokio::time::advance(DEFAULT_BUDGET_WINDOW + Duration::from_millis(1)).await;

        assert!(tracker.check_budget("a", slice::from_ref(&request), 20).is_ok());
        assert_eq!(tracker.costs("a"), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_max_points_never_rejects() {
        let tracker = BudgetTracker::new();
        let request = RpcRequest::new("eth_getLogs", vec![]);
        for _ in 0..100 {
            assert!(tracker.check_budget("a", slice::from_ref(&request), 0).is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn clients_are_tracked_independently() {
        let tracker = BudgetTracker::new();
        let request = block_number();

        assert!(tracker.check_budget("a", slice::from_ref(&request), 5).is_ok());
        assert!(tracker.check_budget("a", slice::from_ref(&request), 5).is_err());
        assert!(tracker.check_budget("b", slice::from_ref(&request), 5).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_clients_are_swept_at_most_every_cleanup_interval() {
        let tracker = BudgetTracker::new();
        let request = block_number();
        tracker.check_budget("a", slice::from_ref(&request), 0).unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        tracker.check_budget("b", slice::from_ref(&request), 0).unwrap();
        // first sweep ran at t=0, the next one is not due before t=120
        assert_eq!(tracker.tracked_clients(), 2);

        tokio::time::advance(Duration::from_secs(60)).await;
        tracker.check_budget("c", slice::from_ref(&request), 0).unwrap();
        // "a" expired at t=60 and "b" is still inside its window
        assert_eq!(tracker.tracked_clients(), 2);
        assert_eq!(tracker.costs("a"), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checks_admit_exactly_the_budget() {
        let tracker = Arc::new(BudgetTracker::new());
        let mut tasks = Vec::new();
        for _ in 0..40 {
            let tracker = Arc::clone(&tracker);
            tasks.push(tokio::spawn(async move {
                tracker.check_budget("shared", &[RpcRequest::new("eth_blockNumber", vec![])], 100)
            }));
        }

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 20);
    }
}
