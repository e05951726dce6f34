//! Worker request and response types

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use flume::Sender;

use super::chunker::{Chunk, ChunkId};
use super::render::{RenderFault, RenderedImage};
use crate::document::{Document, PageIndex};

/// Caller-side switch for abandoning a conversion.
///
/// Clones share the same flag, so a token can be handed to another thread
/// and cancelled from there.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One chunk of pages for a worker unit to render
pub struct RenderJob {
    pub chunk: Chunk,
    pub document: Arc<Document>,
    pub cancel: CancelToken,
    /// Reply channel private to the `process_pages` call that sent the job
    pub reply: Sender<WorkerResponse>,
}

impl std::fmt::Debug for RenderJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderJob")
            .field("chunk", &self.chunk.id)
            .field("pages", &self.chunk.pages)
            .finish_non_exhaustive()
    }
}

/// Request sent to a worker unit
#[derive(Debug)]
pub enum WorkerRequest {
    /// Render every page of a chunk, in order
    Render(RenderJob),

    /// Stop the worker
    Shutdown,
}

/// Response from a worker unit, one per job
#[derive(Debug)]
pub enum WorkerResponse {
    /// Whole chunk rendered, images in chunk order
    Rendered {
        chunk: ChunkId,
        images: Vec<RenderedImage>,
    },

    /// The renderer rejected a page; the rest of the chunk was skipped
    Failed {
        chunk: ChunkId,
        page: PageIndex,
        fault: RenderFault,
    },

    /// The worker itself broke while rendering (renderer panic)
    Crashed {
        chunk: ChunkId,
        unit: usize,
        detail: String,
    },

    /// Stopped early because the call was cancelled or the pool is shutting down
    Cancelled(ChunkId),
}

impl WorkerResponse {
    #[must_use]
    pub fn chunk(&self) -> ChunkId {
        match self {
            Self::Rendered { chunk, .. }
            | Self::Failed { chunk, .. }
            | Self::Crashed { chunk, .. }
            | Self::Cancelled(chunk) => *chunk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());

        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn response_reports_its_chunk() {
        let resp = WorkerResponse::Failed {
            chunk: ChunkId::new(3),
            page: 7,
            fault: RenderFault::generic("bad"),
        };
        assert_eq!(resp.chunk(), ChunkId::new(3));
        assert_eq!(WorkerResponse::Cancelled(ChunkId::new(1)).chunk(), ChunkId::new(1));
    }
}
