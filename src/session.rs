use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use image::RgbaImage;
use log::debug;
use parking_lot::Mutex;

use crate::{
    AnalysisConfig, SuspicionReport,
    analysis::ela::{JpegRecompressor, Recompressor},
    error::Result,
    pipeline,
};

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(Arc<SuspicionReport>),
    /// A newer image was submitted while this run was in flight.
    Stale { generation: u64 },
}

impl RunOutcome {
    pub fn report(&self) -> Option<&Arc<SuspicionReport>> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            RunOutcome::Stale { .. } => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, RunOutcome::Stale { .. })
    }
}

/// Long-lived analysis host for a source image that can be replaced at any
/// time.
///
/// Every submission takes a new generation token. A run only publishes its
/// report if its token is still the newest one when it finishes; otherwise
/// its result and scratch buffers are dropped without touching the session.
pub struct AnalysisSession<R: Recompressor = JpegRecompressor> {
    config: AnalysisConfig,
    recompressor: R,
    generation: AtomicU64,
    latest: Mutex<Option<Arc<SuspicionReport>>>,
}

impl AnalysisSession<JpegRecompressor> {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        let recompressor = JpegRecompressor::new(config.ela_quality)?;
        Self::with_recompressor(config, recompressor)
    }
}

impl<R: Recompressor> AnalysisSession<R> {
    pub fn with_recompressor(config: AnalysisConfig, recompressor: R) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            recompressor,
            generation: AtomicU64::new(0),
            latest: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Most recent report whose run was never superseded.
    pub fn latest(&self) -> Option<Arc<SuspicionReport>> {
        self.latest.lock().clone()
    }

    /// Marks every in-flight run stale and clears the published report.
    pub fn invalidate(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.latest.lock() = None;
        generation
    }

    /// Replaces the source image and analyzes it.
    pub async fn submit(&self, frame: RgbaImage) -> Result<RunOutcome> {
        let generation = self.invalidate();
        let is_current = || self.generation.load(Ordering::SeqCst) == generation;

        let outcome = pipeline::run(
            Arc::new(frame),
            &self.config,
            &self.recompressor,
            generation,
            is_current,
        )
        .await;

        let report = match outcome {
            Ok(Some(report)) => Arc::new(report),
            Ok(None) => return Ok(RunOutcome::Stale { generation }),
            Err(err) if !is_current() => {
                debug!("Run {generation} failed after being superseded: {err}");
                return Ok(RunOutcome::Stale { generation });
            }
            Err(err) => return Err(err),
        };

        let mut latest = self.latest.lock();
        if !is_current() {
            debug!("Run {generation} superseded before publishing, discarding");
            return Ok(RunOutcome::Stale { generation });
        }
        *latest = Some(Arc::clone(&report));

        Ok(RunOutcome::Completed(report))
    }
}
