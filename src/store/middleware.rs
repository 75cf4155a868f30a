use super::state::{Action, MarketState};

/// Hooks wrapped around every dispatch. Both run while the store is locked,
/// so implementations must not call back into the store.
pub trait Middleware: Send + Sync {
    fn before_dispatch(&self, _action: &Action, _state: &MarketState) {}
    fn after_dispatch(&self, _action: &Action, _state: &MarketState) {}
}

/// Logs every action with the counters users actually see.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn after_dispatch(&self, action: &Action, state: &MarketState) {
        tracing::debug!(
            action = action.name(),
            favorites = state.favorites.len(),
            comparison = state.comparison.len(),
            unread = state.unread_count,
            "Store action applied"
        );
    }
}
