//! Sessions: per-user conversation state and usage metrics

pub mod metrics;
pub mod store;
pub mod tracker;

pub use metrics::SessionMetrics;
pub use store::SessionStore;
pub use tracker::TurnTracker;
