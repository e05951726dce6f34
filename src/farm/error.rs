use crate::document::PageIndex;

use super::chunker::ChunkId;
use super::render::RenderFault;

fn unit_label(unit: &Option<usize>) -> String {
    unit.map_or_else(|| "unknown".to_string(), |id| id.to_string())
}

/// Failure of a whole conversion call
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("page {page} is out of range (document has {page_count} pages)")]
    InvalidPageIndex { page: PageIndex, page_count: usize },

    #[error("page {page} requested more than once")]
    DuplicatePageIndex { page: PageIndex },

    #[error("chunk {chunk} failed at page {page}: {source}")]
    WorkerExecution {
        chunk: ChunkId,
        page: PageIndex,
        #[source]
        source: RenderFault,
    },

    #[error("worker unit {} unreachable: {}", unit_label(.unit), .detail)]
    WorkerCommunication { unit: Option<usize>, detail: String },

    #[error("worker pool terminated")]
    PoolTerminated,

    #[error("conversion cancelled")]
    Cancelled,
}

impl ConvertError {
    pub(crate) fn communication(unit: Option<usize>, detail: impl Into<String>) -> Self {
        Self::WorkerCommunication {
            unit,
            detail: detail.into(),
        }
    }

    /// Page that caused the failure, where one is known
    #[must_use]
    pub fn page(&self) -> Option<PageIndex> {
        match self {
            Self::InvalidPageIndex { page, .. }
            | Self::DuplicatePageIndex { page }
            | Self::WorkerExecution { page, .. } => Some(*page),
            _ => None,
        }
    }
}
