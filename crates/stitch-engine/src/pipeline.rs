//! Stitch job definition and the run state machine.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use framestitch_common::config::{StitchDefaults, MAX_QUALITY};
use framestitch_common::error::{StitchError, StitchResult};
use framestitch_sequence_model::batch::{partition, Batch};
use framestitch_sequence_model::frame::FrameSequence;

use crate::backend::{CancelFlag, EncoderBackend};
use crate::concat::concatenate_segments;
use crate::mux::mux_audio;
use crate::segment::{encode_batches, SegmentSettings};
use crate::staging::StagingArea;

/// A stitch job ready to be run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchJob {
    /// Directory holding the frame images.
    pub image_dir: PathBuf,

    /// File providing the (optional) audio stream.
    pub audio_source: PathBuf,

    /// Final output file; overwritten if present.
    pub output_path: PathBuf,

    /// Frames per batch.
    pub batch_size: usize,

    pub frame_rate: u32,

    /// Extension used for staged frames.
    pub image_suffix: String,

    /// Constant rate factor (0-51).
    pub quality: u8,

    /// Batches encoded concurrently.
    pub workers: usize,

    /// Where the staging root is created (system temp dir if `None`).
    pub staging_parent: Option<PathBuf>,
}

impl StitchJob {
    /// Job with the built-in defaults for everything but the paths and batch size.
    pub fn new(
        image_dir: impl Into<PathBuf>,
        audio_source: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        batch_size: usize,
    ) -> Self {
        Self::with_defaults(
            image_dir,
            audio_source,
            output_path,
            batch_size,
            &StitchDefaults::default(),
        )
    }

    /// Job seeded from configured defaults.
    pub fn with_defaults(
        image_dir: impl Into<PathBuf>,
        audio_source: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        batch_size: usize,
        defaults: &StitchDefaults,
    ) -> Self {
        Self {
            image_dir: image_dir.into(),
            audio_source: audio_source.into(),
            output_path: output_path.into(),
            batch_size,
            frame_rate: defaults.frame_rate,
            image_suffix: defaults.image_suffix.clone(),
            quality: defaults.quality,
            workers: defaults.workers,
            staging_parent: defaults.staging_parent.clone(),
        }
    }

    /// Check parameters and input paths before anything touches the disk.
    pub fn validate(&self) -> StitchResult<()> {
        if self.batch_size == 0 {
            return Err(StitchError::invalid_config("batch size must be positive"));
        }
        if self.frame_rate == 0 {
            return Err(StitchError::invalid_config("frame rate must be positive"));
        }
        if self.quality > MAX_QUALITY {
            return Err(StitchError::invalid_config(format!(
                "quality must be within 0-{MAX_QUALITY}, got {}",
                self.quality
            )));
        }
        if self.workers == 0 {
            return Err(StitchError::invalid_config("workers must be at least 1"));
        }
        let suffix_ok = !self.image_suffix.is_empty()
            && !self
                .image_suffix
                .contains(|c: char| c == '/' || c == '\\' || c == '%');
        if !suffix_ok {
            return Err(StitchError::invalid_config(format!(
                "invalid image suffix {:?}",
                self.image_suffix
            )));
        }
        if !self.image_dir.is_dir() {
            return Err(StitchError::InputNotFound {
                path: self.image_dir.clone(),
            });
        }
        if !self.audio_source.is_file() {
            return Err(StitchError::AudioSourceNotFound {
                path: self.audio_source.clone(),
            });
        }
        Ok(())
    }

    fn segment_settings(&self) -> SegmentSettings {
        SegmentSettings {
            frame_rate: self.frame_rate,
            quality: self.quality,
            image_suffix: self.image_suffix.clone(),
            workers: self.workers,
        }
    }
}

/// States of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Initialized,
    FramesEnumerated { frames: usize },
    Batched { batches: usize },
    Encoding { batches_done: usize, total: usize },
    Concatenated,
    Muxed,
    Completed,
    Failed { stage: &'static str, reason: String },
    CleanedUp,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. } | Self::CleanedUp)
    }
}

/// Progress report delivered on every state transition.
#[derive(Debug, Clone)]
pub struct StitchProgress {
    pub state: RunState,
    pub batches_done: usize,
    pub total_batches: usize,
    pub elapsed_secs: f64,
}

impl StitchProgress {
    /// Encoding progress in `[0.0, 1.0]`.
    pub fn fraction(&self) -> f64 {
        if self.total_batches == 0 {
            0.0
        } else {
            self.batches_done as f64 / self.total_batches as f64
        }
    }
}

/// Progress callback for a stitch run.
pub type ProgressCallback = Box<dyn Fn(StitchProgress) + Send>;

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct StitchSummary {
    pub started_at: DateTime<Utc>,
    pub output: PathBuf,
    pub frames: usize,
    pub batches: usize,
    pub segments: usize,
    pub workers: usize,
    pub encode_secs: f64,
    pub concat_secs: f64,
    pub mux_secs: f64,
    pub elapsed_secs: f64,
}

impl StitchSummary {
    /// Write the summary as pretty JSON.
    pub fn write_report(&self, path: &std::path::Path) -> StitchResult<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(report = %path.display(), "Wrote run report");
        Ok(())
    }
}

struct Reporter {
    callback: Option<ProgressCallback>,
    state: RunState,
    batches_done: usize,
    total_batches: usize,
    started: Instant,
}

impl Reporter {
    fn transition(&mut self, state: RunState) {
        tracing::debug!(?state, "Run state");
        self.state = state;
        if let Some(cb) = &self.callback {
            cb(StitchProgress {
                state: self.state.clone(),
                batches_done: self.batches_done,
                total_batches: self.total_batches,
                elapsed_secs: self.started.elapsed().as_secs_f64(),
            });
        }
    }

    fn batch_done(&mut self, _batch: &Batch) {
        self.batches_done += 1;
        self.transition(RunState::Encoding {
            batches_done: self.batches_done,
            total: self.total_batches,
        });
    }
}

/// One run of the batched assembly pipeline.
pub struct StitchPipeline {
    job: StitchJob,
    backend: Box<dyn EncoderBackend>,
    cancel: CancelFlag,
    reporter: Reporter,
}

impl StitchPipeline {
    pub fn new(job: StitchJob, backend: Box<dyn EncoderBackend>) -> Self {
        Self {
            job,
            backend,
            cancel: Arc::new(AtomicBool::new(false)),
            reporter: Reporter {
                callback: None,
                state: RunState::Initialized,
                batches_done: 0,
                total_batches: 0,
                started: Instant::now(),
            },
        }
    }

    /// Stop between batches and stages once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = flag;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.reporter.callback = Some(callback);
        self
    }

    /// Current state.
    pub fn state(&self) -> RunState {
        self.reporter.state.clone()
    }

    pub fn job(&self) -> &StitchJob {
        &self.job
    }

    /// Run every stage, then remove the staging root whatever the outcome.
    pub fn run(&mut self) -> StitchResult<StitchSummary> {
        let started_at = Utc::now();
        self.reporter.started = Instant::now();
        tracing::info!(
            input = %self.job.image_dir.display(),
            output = %self.job.output_path.display(),
            batch_size = self.job.batch_size,
            workers = self.job.workers,
            backend = self.backend.name(),
            "Starting stitch"
        );

        let (result, staging) = match self.job.validate().and_then(|()| self.create_staging()) {
            Ok(staging) => (self.run_stages(&staging, started_at), Some(staging)),
            Err(err) => (Err(err), None),
        };

        match &result {
            Ok(summary) => {
                self.reporter.transition(RunState::Completed);
                tracing::info!(
                    output = %summary.output.display(),
                    frames = summary.frames,
                    segments = summary.segments,
                    elapsed_secs = summary.elapsed_secs,
                    "Stitch finished"
                );
            }
            Err(err) => {
                self.reporter.transition(RunState::Failed {
                    stage: err.stage(),
                    reason: err.to_string(),
                });
                tracing::error!(
                    stage = err.stage(),
                    batch = ?err.batch(),
                    error = %err,
                    "Stitch failed"
                );
            }
        }

        if let Some(staging) = staging {
            let root = staging.root().to_path_buf();
            if let Err(e) = staging.cleanup() {
                tracing::warn!(root = %root.display(), error = %e, "Failed to remove staging root");
            }
        }
        self.reporter.transition(RunState::CleanedUp);
        result
    }

    fn create_staging(&self) -> StitchResult<StagingArea> {
        match &self.job.staging_parent {
            Some(parent) => StagingArea::create(parent),
            None => StagingArea::create_in_temp(),
        }
    }

    fn check_cancelled(&self, stage: &'static str) -> StitchResult<()> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(StitchError::Cancelled { stage });
        }
        Ok(())
    }

    /// A process killed by cancellation reports as cancelled, not as a stage failure.
    fn cancelled_or(&self, err: StitchError, stage: &'static str) -> StitchError {
        if self.cancel.load(Ordering::SeqCst) {
            StitchError::Cancelled { stage }
        } else {
            err
        }
    }

    fn run_stages(
        &mut self,
        staging: &StagingArea,
        started_at: DateTime<Utc>,
    ) -> StitchResult<StitchSummary> {
        let frames = FrameSequence::from_dir(&self.job.image_dir)?;
        self.reporter.transition(RunState::FramesEnumerated {
            frames: frames.len(),
        });

        let batches = partition(frames.len(), self.job.batch_size)?;
        self.reporter.total_batches = batches.len();
        self.reporter.transition(RunState::Batched {
            batches: batches.len(),
        });
        tracing::info!(frames = frames.len(), batches = batches.len(), "Planned batches");

        if batches.is_empty() {
            return Err(StitchError::NoSegments {
                expected: 0,
                found: 0,
            });
        }

        let encode_started = Instant::now();
        self.reporter.transition(RunState::Encoding {
            batches_done: 0,
            total: batches.len(),
        });
        let settings = self.job.segment_settings();
        let reporter = &mut self.reporter;
        let segments = encode_batches(
            self.backend.as_ref(),
            staging,
            &frames,
            &batches,
            &settings,
            &self.cancel,
            &mut |batch| reporter.batch_done(batch),
        )?;
        let encode_secs = encode_started.elapsed().as_secs_f64();

        self.check_cancelled("concat")?;
        let concat_started = Instant::now();
        let stitched = concatenate_segments(self.backend.as_ref(), staging, batches.len())
            .map_err(|e| self.cancelled_or(e, "concat"))?;
        let concat_secs = concat_started.elapsed().as_secs_f64();
        self.reporter.transition(RunState::Concatenated);

        self.check_cancelled("mux")?;
        let mux_started = Instant::now();
        let output = mux_audio(
            self.backend.as_ref(),
            staging,
            &self.job.audio_source,
            &stitched,
            &self.job.output_path,
            self.job.frame_rate,
            self.job.quality,
        )
        .map_err(|e| self.cancelled_or(e, "mux"))?;
        let mux_secs = mux_started.elapsed().as_secs_f64();
        self.reporter.transition(RunState::Muxed);

        Ok(StitchSummary {
            started_at,
            output,
            frames: frames.len(),
            batches: batches.len(),
            segments: segments.len(),
            workers: self.job.workers,
            encode_secs,
            concat_secs,
            mux_secs,
            elapsed_secs: self.reporter.started.elapsed().as_secs_f64(),
        })
    }
}

/// Run a stitch job off the async runtime.
///
/// This is the main entry point for callers living on tokio.
pub async fn stitch_video(
    job: StitchJob,
    backend: Box<dyn EncoderBackend>,
    cancel: CancelFlag,
    progress: Option<ProgressCallback>,
) -> StitchResult<StitchSummary> {
    let mut pipeline = StitchPipeline::new(job, backend).with_cancel_flag(cancel);
    if let Some(cb) = progress {
        pipeline = pipeline.with_progress(cb);
    }

    tokio::task::spawn_blocking(move || pipeline.run())
        .await
        .map_err(|e| StitchError::Other(anyhow::anyhow!("stitch worker failed: {e}")))?
}
