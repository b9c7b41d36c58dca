//! Live multi-source feed aggregation.
//!
//! Subscribes to the offer and request collections for one scope at a time,
//! merges their latest snapshots into a single filtered, ordered feed, and
//! publishes the result as a [`FeedState`](ridefeed_core::feed::FeedState).
//!
//! - [`combine`]: the pure merge/filter/sort step.
//! - [`slot`]: the single-value, generation-guarded publication slot.
//! - [`session`]: one subscription pair + one combination pipeline.
//! - [`aggregator`]: the presentation-facing handle that swaps sessions.

pub mod aggregator;
pub mod combine;
pub mod session;
pub mod slot;

pub use aggregator::FeedAggregator;
pub use session::{ScopeSession, SessionDeps};
pub use slot::FeedSlot;
