//! Parallel page rendering infrastructure

use std::time::Duration;

mod chunker;
mod converter;
mod error;
mod pool;
mod render;
mod request;
mod stats;
mod worker;

pub use chunker::{Chunk, ChunkId, chunk_pages, chunk_size};
pub use converter::{ImageConverter, resolve_pages};
pub use error::ConvertError;
pub use pool::{WorkerPool, default_pool_size};
pub use render::{PNG_MIME, PageRenderer, RasterRenderer, RenderFault, RenderOptions, RenderedImage};
pub use request::{CancelToken, RenderJob, WorkerRequest, WorkerResponse};
pub use stats::{PoolStats, StatsSnapshot};

/// How often a waiting caller rechecks its cancel token
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);
