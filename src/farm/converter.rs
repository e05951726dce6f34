//! Batch conversion entry point
//!
//! [`ImageConverter`] turns a page request into an ordered image sequence.
//! Every call gets a fresh [`WorkerPool`] which is torn down before the call
//! returns, whatever the outcome.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};

use super::DEFAULT_POLL_INTERVAL;
use super::error::ConvertError;
use super::pool::{WorkerPool, default_pool_size};
use super::render::{PageRenderer, RasterRenderer, RenderedImage};
use super::request::CancelToken;
use super::stats::{PoolStats, StatsSnapshot};
use crate::document::{Document, PageIndex};
use crate::settings::FarmSettings;

/// Resolve the requested pages, defaulting to the whole document.
///
/// Rejects 0, indices past the last page, and duplicates.
pub fn resolve_pages(
    document: &Document,
    pages: Option<&[PageIndex]>,
) -> Result<Vec<PageIndex>, ConvertError> {
    let Some(pages) = pages else {
        return Ok(document.all_page_indices());
    };

    let page_count = document.page_count();
    let mut seen = HashSet::with_capacity(pages.len());
    for &page in pages {
        if page == 0 || page > page_count {
            return Err(ConvertError::InvalidPageIndex { page, page_count });
        }
        if !seen.insert(page) {
            return Err(ConvertError::DuplicatePageIndex { page });
        }
    }

    Ok(pages.to_vec())
}

/// Converts document pages to images on a per-call worker pool
pub struct ImageConverter {
    renderer: Arc<dyn PageRenderer>,
    pool_size: usize,
    poll_interval: Duration,
    stats: Arc<PoolStats>,
}

impl ImageConverter {
    /// Converter using `renderer` and one unit per hardware thread
    #[must_use]
    pub fn new(renderer: Arc<dyn PageRenderer>) -> Self {
        Self {
            renderer,
            pool_size: default_pool_size(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            stats: Arc::new(PoolStats::default()),
        }
    }

    /// Converter with the built-in raster renderer configured from settings
    #[must_use]
    pub fn from_settings(settings: &FarmSettings) -> Self {
        let renderer = Arc::new(RasterRenderer::new(settings.render.clone()));
        Self::new(renderer)
            .with_pool_size(settings.resolved_workers())
            .with_poll_interval(settings.poll_interval())
    }

    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Pool lifecycle counters across every call made so far
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Render `pages` (all pages when `None`) in request order.
    ///
    /// All-or-nothing: either one image per requested page, or the first
    /// failure observed.
    pub fn convert_to_images(
        &self,
        document: &Arc<Document>,
        pages: Option<&[PageIndex]>,
    ) -> Result<Vec<RenderedImage>, ConvertError> {
        self.convert_to_images_with_cancel(document, pages, &CancelToken::new())
    }

    /// Like [`ImageConverter::convert_to_images`], abandoning the work once
    /// `cancel` is set
    pub fn convert_to_images_with_cancel(
        &self,
        document: &Arc<Document>,
        pages: Option<&[PageIndex]>,
        cancel: &CancelToken,
    ) -> Result<Vec<RenderedImage>, ConvertError> {
        let pages = resolve_pages(document, pages)?;
        if pages.is_empty() {
            debug!("Nothing to convert, skipping worker pool");
            return Ok(Vec::new());
        }

        info!(
            "Converting {} pages on {} worker units",
            pages.len(),
            self.pool_size
        );

        let mut pool = WorkerPool::with_config(
            self.pool_size,
            Arc::clone(&self.renderer),
            self.poll_interval,
            Arc::clone(&self.stats),
        )?;
        let result = pool.process_pages(document, &pages, cancel);
        pool.terminate();

        match &result {
            Ok(images) => debug!("Converted {} pages", images.len()),
            Err(ConvertError::Cancelled) => info!("Conversion cancelled"),
            Err(e @ ConvertError::WorkerCommunication { .. }) => {
                error!("Conversion aborted, worker unreachable: {e}");
            }
            Err(e) => warn!("Conversion failed: {e}"),
        }

        result
    }
}
