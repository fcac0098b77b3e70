//! TileOrchestrator: fan one `TileJob` out over every tile of a directory on a
//! fixed set of tile threads backed by a rayon pool for per-pixel work,
//! isolating failures per tile.
use chrono::{DateTime, Utc};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use super::worker::{TileJob, TileSource};
use crate::core::params::PipelineConfig;
use crate::error::{Error, FailureKind, Result};
use crate::io::naming::{list_raster_files, parse_tile_id};
use crate::types::TileId;

/// Shared flag that stops tiles which have not started yet.
/// Tiles already running finish and keep their outputs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileFailure {
    pub tile: TileId,
    pub path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of one orchestrated batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileReport {
    pub job: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: Vec<TileId>,
    pub failed: Vec<TileFailure>,
    pub cancelled: Vec<TileId>,
    /// Files in the input directory whose names carry no grid coordinates
    pub skipped: Vec<PathBuf>,
    /// Every file written by successful tiles
    pub outputs: Vec<PathBuf>,
}

impl TileReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.cancelled.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

enum TileOutcome {
    Done(TileId, Vec<PathBuf>),
    Failed(TileFailure),
    Cancelled(TileId),
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct TileOrchestrator {
    pool: ThreadPool,
    workers: usize,
    continue_on_error: bool,
    cancel: CancelToken,
}

impl TileOrchestrator {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let workers = config.resolved_workers();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("pixel-worker-{}", i))
            .build()
            .map_err(Error::external)?;
        Ok(Self {
            pool,
            workers,
            continue_on_error: config.continue_on_error,
            cancel: CancelToken::new(),
        })
    }

    /// Use a caller-owned token so the batch can be stopped from outside
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Tiles of `input_dir` in `TileId` order, plus raster files that do not
    /// follow the `<prefix>_<row>_<col>` naming
    pub fn discover(input_dir: &Path) -> Result<(Vec<TileSource>, Vec<PathBuf>)> {
        let mut tiles = Vec::new();
        let mut skipped = Vec::new();
        for path in list_raster_files(input_dir)? {
            match parse_tile_id(&path) {
                Some(id) => tiles.push(TileSource { id, path }),
                None => skipped.push(path),
            }
        }
        tiles.sort();
        Ok((tiles, skipped))
    }

    /// Run `job` over every tile in `input_dir`
    pub fn run(&self, job: &dyn TileJob, input_dir: &Path) -> Result<TileReport> {
        let (tiles, skipped) = Self::discover(input_dir)?;
        for path in &skipped {
            warn!("Skipping {:?}: name carries no tile coordinates", path);
        }
        let mut report = self.run_tiles(job, tiles)?;
        report.skipped = skipped;
        Ok(report)
    }

    fn run_one(
        &self,
        job: &dyn TileJob,
        tile: &TileSource,
        total: usize,
        finished: &AtomicUsize,
        failures: &AtomicUsize,
    ) -> TileOutcome {
        if self.cancel.is_cancelled() {
            debug!("Tile {} cancelled before start", tile.id);
            return TileOutcome::Cancelled(tile.id);
        }
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.pool.install(|| {
                job.process(tile).map_err(|e| (e.failure_kind(), e.to_string()))
            })
        }));
        let outcome = match result {
            Ok(Ok(paths)) => TileOutcome::Done(tile.id, paths),
            Ok(Err((kind, message))) => TileOutcome::Failed(TileFailure {
                tile: tile.id,
                path: tile.path.clone(),
                kind,
                message,
            }),
            Err(payload) => TileOutcome::Failed(TileFailure {
                tile: tile.id,
                path: tile.path.clone(),
                kind: FailureKind::Panic,
                message: panic_message(payload.as_ref()),
            }),
        };

        let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
        match &outcome {
            TileOutcome::Failed(f) => {
                failures.fetch_add(1, Ordering::SeqCst);
                warn!(
                    "[{}/{}] tile {} failed ({:?}): {}",
                    done, total, f.tile, f.kind, f.message
                );
                if !self.continue_on_error {
                    self.cancel.cancel();
                }
            }
            _ => info!("[{}/{}] tile {} done", done, total, tile.id),
        }
        outcome
    }

    /// Run `job` over an explicit tile list on `workers` dedicated tile threads.
    /// Each tile's per-pixel work runs on the rayon pool while its thread waits,
    /// so no more than `workers` tiles are loaded at once. Tile failures end up
    /// in the report; only a failure to start the tile threads is an error.
    pub fn run_tiles(&self, job: &dyn TileJob, tiles: Vec<TileSource>) -> Result<TileReport> {
        let started_at = Utc::now();
        let total = tiles.len();
        info!(
            "Dispatching {} tiles to '{}' on {} workers",
            total,
            job.name(),
            self.workers
        );

        let next = AtomicUsize::new(0);
        let finished = AtomicUsize::new(0);
        let failures = AtomicUsize::new(0);
        let threads = self.workers.min(total).max(1);
        let mut indexed: Vec<(usize, TileOutcome)> = Vec::with_capacity(total);
        std::thread::scope(|scope| -> Result<()> {
            let mut handles = Vec::with_capacity(threads);
            for i in 0..threads {
                let handle = std::thread::Builder::new()
                    .name(format!("tile-worker-{}", i))
                    .spawn_scoped(scope, || {
                        let mut local = Vec::new();
                        loop {
                            let idx = next.fetch_add(1, Ordering::SeqCst);
                            let Some(tile) = tiles.get(idx) else {
                                break;
                            };
                            let outcome = self.run_one(job, tile, total, &finished, &failures);
                            local.push((idx, outcome));
                        }
                        local
                    })?;
                handles.push(handle);
            }
            for handle in handles {
                let local = handle.join().map_err(|payload| {
                    Error::Processing(format!(
                        "tile thread panicked: {}",
                        panic_message(payload.as_ref())
                    ))
                })?;
                indexed.extend(local);
            }
            Ok(())
        })?;
        indexed.sort_by_key(|(idx, _)| *idx);
        let outcomes = indexed.into_iter().map(|(_, outcome)| outcome);

        let mut report = TileReport {
            job: job.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            succeeded: Vec::new(),
            failed: Vec::new(),
            cancelled: Vec::new(),
            skipped: Vec::new(),
            outputs: Vec::new(),
        };
        for outcome in outcomes {
            match outcome {
                TileOutcome::Done(id, paths) => {
                    report.succeeded.push(id);
                    report.outputs.extend(paths);
                }
                TileOutcome::Failed(f) => report.failed.push(f),
                TileOutcome::Cancelled(id) => report.cancelled.push(id),
            }
        }

        info!(
            "'{}' finished: {} succeeded, {} failed, {} cancelled",
            report.job,
            report.succeeded.len(),
            failures.load(Ordering::SeqCst),
            report.cancelled.len()
        );
        Ok(report)
    }
}
