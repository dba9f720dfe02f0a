pub mod reset;

pub use reset::{ResetClock, TimeUntilReset};
