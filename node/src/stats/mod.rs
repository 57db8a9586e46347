mod counters;
mod identity;
mod snapshot;
mod store;

pub use counters::ClassFamily;
pub use snapshot::Snapshot;
pub use store::{ClassUsage, SystemSummary, TrafficReport, TrafficStore, UserUsage};
