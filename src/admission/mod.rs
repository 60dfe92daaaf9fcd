//! Per-client admission control.
//!
//! Every inbound request is priced by [`calculate_cost`]; a [`BudgetTracker`] adds the price to
//! the client's running total for the current window and rejects the request once the total
//! exceeds the caller's limit.

mod budget;
mod cost;

pub use budget::{BudgetTracker, DEFAULT_BUDGET_WINDOW, DEFAULT_CLEANUP_INTERVAL};
pub use cost::{MAX_BLOCKS, RequestConfig, RpcRequest, SIGNATURE_COST, calculate_cost};
