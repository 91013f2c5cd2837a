//! Worker pool that decodes thumbnails off the coordinating thread.
//!
//! - Bounded request channel feeding a few worker threads
//! - Cache lookups, disk tier included, run on the workers
//! - Cancelled tickets are skipped by workers and filtered out of `poll`
//! - Uses flume for communication between workers and the caller

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use flume::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use super::cache::{CacheKey, ThumbnailCache, DEFAULT_MAX_MEMORY_MB};
use super::decode::decode_thumbnail;
use super::{ThumbnailEngine, ThumbnailReady, ThumbnailRequest, Ticket};

const DEFAULT_WORKERS: usize = 2;
const MAX_WORKERS: usize = 4;

/// Maximum number of requests waiting for a worker.
const MAX_QUEUE_SIZE: usize = 256;

type CancelSet = Arc<Mutex<HashSet<Ticket>>>;

pub struct ThumbnailLoader {
    request_tx: Sender<ThumbnailRequest>,
    result_rx: Receiver<ThumbnailReady>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    /// Tickets cancelled while queued or in flight.
    cancelled: CancelSet,
    /// Failures produced on the caller's thread (queue overflow, stopped workers).
    ready: Vec<ThumbnailReady>,
    cache: ThumbnailCache,
}

impl ThumbnailLoader {
    pub fn new(workers: usize, cache: ThumbnailCache) -> Result<Self> {
        let num_workers = workers.clamp(1, MAX_WORKERS);

        let (request_tx, request_rx) = flume::bounded(MAX_QUEUE_SIZE);
        let (result_tx, result_rx) = flume::unbounded();

        let shutdown = Arc::new(AtomicBool::new(false));
        let cancelled: CancelSet = Arc::new(Mutex::new(HashSet::new()));

        let mut worker_handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let rx = request_rx.clone();
            let tx = result_tx.clone();
            let shutdown = Arc::clone(&shutdown);
            let cancelled = Arc::clone(&cancelled);
            let cache = cache.clone();

            let handle = thread::Builder::new()
                .name(format!("thumb-worker-{}", worker_id))
                .spawn(move || {
                    worker_loop(worker_id, rx, tx, shutdown, cancelled, cache);
                })
                .context("Failed to spawn thumbnail worker")?;
            worker_handles.push(handle);
        }

        debug!(num_workers, "Started thumbnail workers");

        Ok(Self {
            request_tx,
            result_rx,
            workers: worker_handles,
            shutdown,
            cancelled,
            ready: Vec::new(),
            cache,
        })
    }

    pub fn builder() -> ThumbnailLoaderBuilder {
        ThumbnailLoaderBuilder::new()
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.cache
    }

    pub fn shutdown(&mut self) {
        debug!("Shutting down thumbnail loader");
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("Thumbnail loader shutdown complete");
    }

    fn fail(&mut self, request: ThumbnailRequest, reason: &str) {
        self.ready.push(ThumbnailReady {
            ticket: request.ticket,
            slot: request.slot,
            uri: request.uri,
            result: Err(reason.to_string()),
        });
    }
}

impl ThumbnailEngine for ThumbnailLoader {
    /// Never touches the filesystem; the cache is consulted by the worker.
    fn request(&mut self, request: ThumbnailRequest) {
        match self.request_tx.try_send(request) {
            Ok(()) => {}
            Err(flume::TrySendError::Full(request)) => {
                warn!(ticket = request.ticket.0, "Thumbnail queue full, dropping request");
                self.fail(request, "Thumbnail queue full");
            }
            Err(flume::TrySendError::Disconnected(request)) => {
                error!("Thumbnail workers disconnected");
                self.fail(request, "Thumbnail workers stopped");
            }
        }
    }

    fn cancel(&mut self, ticket: Ticket) {
        if let Some(pos) = self.ready.iter().position(|r| r.ticket == ticket) {
            self.ready.remove(pos);
            return;
        }
        self.cancelled.lock().insert(ticket);
        trace!(ticket = ticket.0, "Cancelled thumbnail request");
    }

    fn poll(&mut self) -> Vec<ThumbnailReady> {
        let mut results = std::mem::take(&mut self.ready);
        let mut cancelled = self.cancelled.lock();
        while let Ok(ready) = self.result_rx.try_recv() {
            if cancelled.remove(&ready.ticket) {
                continue;
            }
            results.push(ready);
        }
        results
    }
}

impl Drop for ThumbnailLoader {
    fn drop(&mut self) {
        if !self.shutdown.load(Ordering::Relaxed) {
            self.shutdown();
        }
    }
}

fn worker_loop(
    worker_id: usize,
    rx: Receiver<ThumbnailRequest>,
    tx: Sender<ThumbnailReady>,
    shutdown: Arc<AtomicBool>,
    cancelled: CancelSet,
    cache: ThumbnailCache,
) {
    debug!(worker_id, "Thumbnail worker started");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(req) => {
                if cancelled.lock().remove(&req.ticket) {
                    trace!(worker_id, ticket = req.ticket.0, "Skipping cancelled request");
                    continue;
                }

                let ready = process_request(req, &cache);
                if let Err(e) = tx.send(ready) {
                    warn!(worker_id, error = ?e, "Failed to send thumbnail result");
                }
            }
            Err(flume::RecvTimeoutError::Timeout) => continue,
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(worker_id, "Thumbnail worker stopped");
}

fn process_request(req: ThumbnailRequest, cache: &ThumbnailCache) -> ThumbnailReady {
    trace!(uri = %req.uri, edge = req.edge, "Processing thumbnail request");

    let key = CacheKey::for_file(&req.uri, req.edge);
    let cached = key.and_then(|k| cache.get(&k));
    let result = match cached {
        Some(thumb) => Ok(thumb),
        None => match decode_thumbnail(&req.uri, req.edge) {
            Ok(thumb) => {
                if let Some(key) = key {
                    cache.put(key, thumb.clone());
                }
                Ok(thumb)
            }
            Err(e) => {
                warn!(uri = %req.uri, error = ?e, "Failed to generate thumbnail");
                Err(format!("{:#}", e))
            }
        },
    };

    ThumbnailReady {
        ticket: req.ticket,
        slot: req.slot,
        uri: req.uri,
        result,
    }
}

/// Builder for `ThumbnailLoader` with configuration options.
pub struct ThumbnailLoaderBuilder {
    workers: usize,
    max_memory_mb: usize,
    cache_dir: Option<PathBuf>,
    disk_cache: bool,
}

impl ThumbnailLoaderBuilder {
    pub fn new() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
            cache_dir: None,
            disk_cache: true,
        }
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count;
        self
    }

    pub fn max_memory_mb(mut self, mb: usize) -> Self {
        self.max_memory_mb = mb;
        self
    }

    pub fn cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    pub fn disk_cache(mut self, enabled: bool) -> Self {
        self.disk_cache = enabled;
        self
    }

    pub fn build(self) -> Result<ThumbnailLoader> {
        let cache = if !self.disk_cache {
            ThumbnailCache::in_memory(self.max_memory_mb)
        } else if let Some(dir) = self.cache_dir {
            ThumbnailCache::with_disk(dir, self.max_memory_mb)
        } else {
            ThumbnailCache::with_disk(ThumbnailCache::default_cache_dir()?, self.max_memory_mb)
        };
        ThumbnailLoader::new(self.workers, cache)
    }
}

impl Default for ThumbnailLoaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
