//! In-memory caching of render outcomes.
//!
//! The volatile cache holds completed outcomes for a short TTL. It is kept
//! strictly apart from the in-flight coalescer table (see
//! [`crate::coalesce`]): that table only ever holds pending computations,
//! this cache only ever holds finished ones.

mod volatile;

pub use volatile::{VolatileCache, VolatileCacheStats, DEFAULT_TTL};
