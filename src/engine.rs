pub mod aggregate;
pub mod memory;
pub mod shard;
pub mod store;

pub use self::aggregate::AggregationEngine;
pub use self::memory::MemoryStateStore;
pub use self::shard::{Emission, ShardSet};
pub use self::store::StateStore;
