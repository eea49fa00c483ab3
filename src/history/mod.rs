// Tab history core
// State machine, liveness validation and reconciliation

pub mod reconciler;
pub mod store;
pub mod validator;

pub use reconciler::HistoryReconciler;
pub use store::{Direction, HistoryState, NavigationOutcome, TabHistoryStore};
pub use validator::TabValidator;
