//! Analysis modules: vote aggregation, the wide-table merge, and
//! agreement statistics.

pub mod aggregator;
pub mod agreement;
pub mod merge;

pub use aggregator::aggregate_votes;
pub use agreement::analyze;
pub use merge::merge;
