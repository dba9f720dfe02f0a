pub mod decision;
pub mod manager;

pub use decision::{Decision, Refusal};
pub use manager::QuotaTracker;
