//! Fixed-size pool of worker units with round-robin chunk dispatch

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{RecvTimeoutError, Sender};
use log::{debug, error, warn};

use super::DEFAULT_POLL_INTERVAL;
use super::chunker::chunk_pages;
use super::error::ConvertError;
use super::render::{PageRenderer, RenderedImage};
use super::request::{CancelToken, RenderJob, WorkerRequest, WorkerResponse};
use super::stats::PoolStats;
use super::worker::{WorkerContext, run_worker_unit};
use crate::document::{Document, PageIndex};

/// Hardware parallelism reported by the host, at least 1
#[must_use]
pub fn default_pool_size() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(1)
}

struct WorkerUnit {
    id: usize,
    requests: Sender<WorkerRequest>,
    handle: JoinHandle<()>,
}

/// Owns a fixed set of worker threads for its whole lifetime.
///
/// Each unit has its own request queue, so chunk `k` always lands on unit
/// `k % size` and a unit handles its chunks in the order they were assigned.
/// Once terminated the pool holds no units and rejects work.
pub struct WorkerPool {
    units: Vec<WorkerUnit>,
    size: usize,
    abort: Arc<AtomicBool>,
    poll_interval: Duration,
    stats: Arc<PoolStats>,
    terminated: bool,
}

impl WorkerPool {
    /// Create a pool with `size` units (0 is treated as 1)
    pub fn new(size: usize, renderer: Arc<dyn PageRenderer>) -> Result<Self, ConvertError> {
        Self::with_config(
            size,
            renderer,
            DEFAULT_POLL_INTERVAL,
            Arc::new(PoolStats::default()),
        )
    }

    /// Create a pool with custom cancel polling and shared stats
    pub fn with_config(
        size: usize,
        renderer: Arc<dyn PageRenderer>,
        poll_interval: Duration,
        stats: Arc<PoolStats>,
    ) -> Result<Self, ConvertError> {
        let size = size.max(1);
        stats.record_pool_created();

        let mut pool = Self {
            units: Vec::with_capacity(size),
            size,
            abort: Arc::new(AtomicBool::new(false)),
            poll_interval,
            stats,
            terminated: false,
        };

        for id in 0..size {
            // Per-unit queue so chunk k can target unit k % size
            let (request_tx, request_rx) = flume::unbounded();
            let ctx = WorkerContext {
                unit: id,
                renderer: Arc::clone(&renderer),
                abort: Arc::clone(&pool.abort),
                stats: Arc::clone(&pool.stats),
            };

            pool.stats.record_unit_spawned();
            let spawned = thread::Builder::new()
                .name(format!("pagefarm-worker-{id}"))
                .spawn(move || run_worker_unit(ctx, request_rx));

            match spawned {
                Ok(handle) => pool.units.push(WorkerUnit {
                    id,
                    requests: request_tx,
                    handle,
                }),
                Err(e) => {
                    pool.stats.record_unit_exited();
                    error!("Failed to spawn worker unit {id}: {e}");
                    // Dropping the pool tears down the units spawned so far
                    return Err(ConvertError::communication(
                        Some(id),
                        format!("spawn failed: {e}"),
                    ));
                }
            }
        }

        debug!("Worker pool started with {size} units");
        Ok(pool)
    }

    /// Number of unit slots, fixed at construction
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Units still owned by the pool (0 once terminated)
    #[must_use]
    pub fn live_units(&self) -> usize {
        self.units.len()
    }

    /// Render `pages` across the pool and return images in request order.
    ///
    /// Blocks until every chunk has replied, the first failure arrives, or
    /// `cancel` is set. On failure the remaining chunks are not awaited; they
    /// are reclaimed by [`WorkerPool::terminate`].
    pub fn process_pages(
        &self,
        document: &Arc<Document>,
        pages: &[PageIndex],
        cancel: &CancelToken,
    ) -> Result<Vec<RenderedImage>, ConvertError> {
        if self.terminated {
            return Err(ConvertError::PoolTerminated);
        }
        if pages.is_empty() {
            return Ok(Vec::new());
        }

        let chunks = chunk_pages(pages, self.size);
        let chunk_count = chunks.len();
        let (reply_tx, reply_rx) = flume::unbounded();

        for chunk in chunks {
            let unit = &self.units[chunk.id.index() % self.units.len()];
            debug!(
                "Dispatching chunk {} ({} pages) to worker unit {}",
                chunk.id,
                chunk.pages.len(),
                unit.id
            );

            let job = RenderJob {
                chunk,
                document: Arc::clone(document),
                cancel: cancel.clone(),
                reply: reply_tx.clone(),
            };
            if unit.requests.send(WorkerRequest::Render(job)).is_err() {
                error!("Worker unit {} is gone, cannot dispatch", unit.id);
                return Err(ConvertError::communication(
                    Some(unit.id),
                    "request channel closed",
                ));
            }
        }
        // Only in-flight jobs hold reply senders now; if they all vanish
        // without answering, recv reports disconnection instead of hanging.
        drop(reply_tx);

        let mut slots: Vec<Option<Vec<RenderedImage>>> = (0..chunk_count).map(|_| None).collect();
        let mut remaining = chunk_count;

        while remaining > 0 {
            if cancel.is_cancelled() {
                debug!("Conversion cancelled with {remaining} chunks outstanding");
                return Err(ConvertError::Cancelled);
            }

            match reply_rx.recv_timeout(self.poll_interval) {
                Ok(WorkerResponse::Rendered { chunk, images }) => {
                    if slots[chunk.index()].replace(images).is_none() {
                        remaining -= 1;
                    }
                }
                Ok(WorkerResponse::Failed { chunk, page, fault }) => {
                    warn!("Chunk {chunk} failed at page {page}: {fault}");
                    return Err(ConvertError::WorkerExecution {
                        chunk,
                        page,
                        source: fault,
                    });
                }
                Ok(WorkerResponse::Crashed {
                    chunk,
                    unit,
                    detail,
                }) => {
                    error!("Worker unit {unit} crashed on chunk {chunk}: {detail}");
                    return Err(ConvertError::communication(Some(unit), detail));
                }
                Ok(WorkerResponse::Cancelled(chunk)) => {
                    debug!("Chunk {chunk} was cancelled by its worker");
                    return Err(ConvertError::Cancelled);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    error!("All worker replies lost with {remaining} chunks outstanding");
                    return Err(ConvertError::communication(None, "reply channel closed"));
                }
            }
        }

        let images: Vec<RenderedImage> = slots.into_iter().flatten().flatten().collect();
        debug_assert_eq!(images.len(), pages.len());
        Ok(images)
    }

    /// Stop and join every worker unit. Idempotent.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.abort.store(true, Ordering::SeqCst);

        for unit in &self.units {
            let _ = unit.requests.send(WorkerRequest::Shutdown);
        }

        let count = self.units.len();
        for unit in self.units.drain(..) {
            if unit.handle.join().is_err() {
                warn!("Worker unit {} exited by panic", unit.id);
            }
        }

        self.stats.record_pool_terminated();
        debug!("Worker pool terminated, {count} units joined");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread::ThreadId;

    use super::*;
    use crate::document::Page;
    use crate::farm::render::RenderFault;

    /// Records which thread rendered each page
    #[derive(Default)]
    struct ThreadProbe {
        seen: Mutex<Vec<(PageIndex, ThreadId)>>,
    }

    impl PageRenderer for ThreadProbe {
        fn render(&self, _doc: &Document, page: PageIndex) -> Result<RenderedImage, RenderFault> {
            self.seen
                .lock()
                .expect("probe lock")
                .push((page, thread::current().id()));
            Ok(RenderedImage {
                page,
                mime: "image/x-test".to_string(),
                width: 1,
                height: 1,
                bytes: Vec::new(),
            })
        }
    }

    fn doc(pages: usize) -> Arc<Document> {
        Arc::new(Document::new(
            1,
            1,
            (1..=pages).map(|n| Page::new(n, vec![0])).collect(),
        ))
    }

    #[test]
    fn zero_size_pool_gets_one_unit() {
        let pool = WorkerPool::new(0, Arc::new(ThreadProbe::default())).expect("pool");
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.live_units(), 1);
    }

    #[test]
    fn results_follow_request_order() {
        let pool = WorkerPool::new(3, Arc::new(ThreadProbe::default())).expect("pool");
        let pages = [6, 2, 5, 1, 4, 3];

        let images = pool
            .process_pages(&doc(6), &pages, &CancelToken::new())
            .expect("render");

        let got: Vec<_> = images.iter().map(|i| i.page).collect();
        assert_eq!(got, pages);
    }

    #[test]
    fn each_chunk_runs_on_a_single_unit() {
        let probe = Arc::new(ThreadProbe::default());
        let pool = WorkerPool::new(2, probe.clone()).expect("pool");

        pool.process_pages(&doc(4), &[1, 2, 3, 4], &CancelToken::new())
            .expect("render");

        let seen = probe.seen.lock().expect("probe lock").clone();
        let thread_of = |page| {
            seen.iter()
                .find(|(p, _)| *p == page)
                .map(|(_, t)| *t)
                .expect("page rendered")
        };
        assert_eq!(thread_of(1), thread_of(2));
        assert_eq!(thread_of(3), thread_of(4));
        assert_ne!(thread_of(1), thread_of(3));
    }

    #[test]
    fn terminate_is_idempotent_and_rejects_work() {
        let stats = Arc::new(PoolStats::default());
        let mut pool = WorkerPool::with_config(
            2,
            Arc::new(ThreadProbe::default()),
            DEFAULT_POLL_INTERVAL,
            Arc::clone(&stats),
        )
        .expect("pool");

        pool.terminate();
        pool.terminate();

        assert!(pool.is_terminated());
        assert_eq!(pool.live_units(), 0);
        assert!(matches!(
            pool.process_pages(&doc(1), &[1], &CancelToken::new()),
            Err(ConvertError::PoolTerminated)
        ));

        let snap = stats.snapshot();
        assert_eq!(snap.pools_terminated, 1);
        assert_eq!(snap.live_units(), 0);
    }

    #[test]
    fn drop_joins_units() {
        let stats = Arc::new(PoolStats::default());
        {
            let _pool = WorkerPool::with_config(
                3,
                Arc::new(ThreadProbe::default()),
                DEFAULT_POLL_INTERVAL,
                Arc::clone(&stats),
            )
            .expect("pool");
            assert_eq!(stats.snapshot().units_spawned, 3);
        }
        let snap = stats.snapshot();
        assert_eq!(snap.live_units(), 0);
        assert_eq!(snap.pools_terminated, 1);
    }

    #[test]
    fn empty_request_is_empty_result() {
        let pool = WorkerPool::new(2, Arc::new(ThreadProbe::default())).expect("pool");
        let images = pool
            .process_pages(&doc(0), &[], &CancelToken::new())
            .expect("render");
        assert!(images.is_empty());
    }

    #[test]
    fn stopped_unit_fails_dispatch() {
        let pool = WorkerPool::new(2, Arc::new(ThreadProbe::default())).expect("pool");
        for unit in &pool.units {
            unit.requests.send(WorkerRequest::Shutdown).expect("unit alive");
        }
        while !pool.units.iter().all(|u| u.requests.is_disconnected()) {
            thread::sleep(Duration::from_millis(1));
        }

        let err = pool
            .process_pages(&doc(2), &[1, 2], &CancelToken::new())
            .expect_err("no unit left to take the chunk");

        assert!(matches!(
            err,
            ConvertError::WorkerCommunication { unit: Some(0), .. }
        ));
    }

    #[test]
    fn dropped_replies_fail_instead_of_hanging() {
        // A unit that swallows jobs, dropping their reply senders unanswered
        let (request_tx, request_rx) = flume::unbounded();
        let handle = thread::spawn(move || {
            for request in request_rx {
                if let WorkerRequest::Shutdown = request {
                    break;
                }
            }
        });
        let pool = WorkerPool {
            units: vec![WorkerUnit {
                id: 0,
                requests: request_tx,
                handle,
            }],
            size: 1,
            abort: Arc::new(AtomicBool::new(false)),
            poll_interval: DEFAULT_POLL_INTERVAL,
            stats: Arc::new(PoolStats::default()),
            terminated: false,
        };

        let err = pool
            .process_pages(&doc(3), &[1, 2, 3], &CancelToken::new())
            .expect_err("replies were lost");

        assert!(matches!(
            err,
            ConvertError::WorkerCommunication { unit: None, .. }
        ));
    }
}
