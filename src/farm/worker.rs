//! Worker unit - runs in its own thread, one per pool slot

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use flume::Receiver;
use log::{debug, error, warn};

use super::chunker::Chunk;
use super::render::PageRenderer;
use super::request::{CancelToken, RenderJob, WorkerRequest, WorkerResponse};
use super::stats::PoolStats;
use crate::document::Document;

/// Everything a worker unit owns for its lifetime
pub(crate) struct WorkerContext {
    pub unit: usize,
    pub renderer: Arc<dyn PageRenderer>,
    /// Set by the pool on terminate; checked between pages
    pub abort: Arc<AtomicBool>,
    pub stats: Arc<PoolStats>,
}

struct ExitGuard<'a>(&'a PoolStats);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.record_unit_exited();
    }
}

/// Main worker function - processes jobs in arrival order until shutdown
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub(crate) fn run_worker_unit(ctx: WorkerContext, requests: Receiver<WorkerRequest>) {
    let _exit = ExitGuard(&ctx.stats);
    debug!("Worker unit {} started", ctx.unit);

    for request in requests {
        match request {
            WorkerRequest::Render(job) => handle_job(&ctx, job),
            WorkerRequest::Shutdown => break,
        }
    }

    debug!("Worker unit {} stopped", ctx.unit);
}

fn handle_job(ctx: &WorkerContext, job: RenderJob) {
    let RenderJob {
        chunk,
        document,
        cancel,
        reply,
    } = job;

    let response = render_chunk(ctx, &chunk, &document, &cancel, || reply.is_disconnected());

    if reply.send(response).is_err() {
        debug!(
            "Worker unit {}: nobody waiting for chunk {}",
            ctx.unit, chunk.id
        );
    }
}

/// Render one chunk page by page. The first failing page ends the chunk.
fn render_chunk(
    ctx: &WorkerContext,
    chunk: &Chunk,
    document: &Document,
    cancel: &CancelToken,
    caller_gone: impl Fn() -> bool,
) -> WorkerResponse {
    let mut images = Vec::with_capacity(chunk.pages.len());

    for &page in &chunk.pages {
        if ctx.abort.load(Ordering::SeqCst) || cancel.is_cancelled() || caller_gone() {
            debug!(
                "Worker unit {}: chunk {} stopped before page {page}",
                ctx.unit, chunk.id
            );
            return WorkerResponse::Cancelled(chunk.id);
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| ctx.renderer.render(document, page)));

        match outcome {
            Ok(Ok(image)) => images.push(image),
            Ok(Err(fault)) => {
                warn!(
                    "Worker unit {}: render failed for page {page} of chunk {}: {fault}",
                    ctx.unit, chunk.id
                );
                return WorkerResponse::Failed {
                    chunk: chunk.id,
                    page,
                    fault,
                };
            }
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                error!(
                    "Worker unit {} crashed rendering page {page} of chunk {}: {detail}",
                    ctx.unit, chunk.id
                );
                return WorkerResponse::Crashed {
                    chunk: chunk.id,
                    unit: ctx.unit,
                    detail: format!("panic on page {page}: {detail}"),
                };
            }
        }
    }

    WorkerResponse::Rendered {
        chunk: chunk.id,
        images,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
