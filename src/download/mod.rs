//! Chunked download system

pub mod plan;
pub mod range;
pub mod scheduler;

pub use plan::{ChunkPlan, ChunkSpan};
pub use range::fetch_range;
pub use scheduler::{ChunkScheduler, DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY};
