pub mod reporter;
pub mod snapshot;

pub use reporter::StatusReporter;
pub use snapshot::{QuotaStatus, ResourceStatus, WindowStatus};
