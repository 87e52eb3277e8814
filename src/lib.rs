pub mod core;
pub mod engine;
pub mod pipeline;
pub mod sink;
pub mod source;

pub use crate::core::*;
pub use crate::engine::{AggregationEngine, MemoryStateStore, ShardSet, StateStore};
pub use crate::pipeline::{Pipeline, PipelineConfig};
