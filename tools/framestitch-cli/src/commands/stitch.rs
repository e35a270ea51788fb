//! Stitch frames and audio into a video.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use framestitch_common::AppConfig;
use framestitch_engine::{
    probe_media, stitch_video, EncoderBackend, FfmpegBackend, RunState, StitchJob, StitchProgress,
};

/// Flags of the `stitch` command; unset values fall back to the config file.
pub struct StitchOptions {
    pub image_input: PathBuf,
    pub audio_input: PathBuf,
    pub output: PathBuf,
    pub batch_size: usize,
    pub framerate: Option<u32>,
    pub image_suffix: Option<String>,
    pub crf: Option<u8>,
    pub workers: Option<usize>,
    pub staging_dir: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

impl StitchOptions {
    fn into_job(self, config: &AppConfig) -> (StitchJob, Option<PathBuf>) {
        let mut job = StitchJob::with_defaults(
            self.image_input,
            self.audio_input,
            self.output,
            self.batch_size,
            &config.stitch,
        );
        if let Some(rate) = self.framerate {
            job.frame_rate = rate;
        }
        if let Some(suffix) = self.image_suffix {
            job.image_suffix = suffix;
        }
        if let Some(crf) = self.crf {
            job.quality = crf;
        }
        if let Some(workers) = self.workers {
            job.workers = workers;
        }
        if let Some(dir) = self.staging_dir {
            job.staging_parent = Some(dir);
        }
        (job, self.report)
    }
}

pub async fn run(options: StitchOptions, config: &AppConfig) -> anyhow::Result<()> {
    let (job, report) = options.into_job(config);

    let cancel = Arc::new(AtomicBool::new(false));
    let backend = FfmpegBackend::new().with_cancel_flag(cancel.clone());
    if !backend.is_available() {
        anyhow::bail!("ffmpeg not found in PATH");
    }

    let signal_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after in-flight work is killed");
            signal_flag.store(true, Ordering::SeqCst);
        }
    });

    println!("Stitching frames from: {}", job.image_dir.display());
    println!("  Audio: {}", job.audio_source.display());
    println!("  Output: {}", job.output_path.display());
    println!(
        "  Batch size: {}  Frame rate: {}  CRF: {}  Workers: {}",
        job.batch_size, job.frame_rate, job.quality, job.workers
    );

    let output = job.output_path.clone();
    let progress_cb: Box<dyn Fn(StitchProgress) + Send> = Box::new(print_progress);

    let summary = match stitch_video(job, Box::new(backend), cancel, Some(progress_cb)).await {
        Ok(summary) => summary,
        Err(e) => {
            println!();
            let batch = e
                .batch()
                .map(|b| format!(" (batch {b})"))
                .unwrap_or_default();
            return Err(anyhow::anyhow!("{} stage failed{batch}: {e}", e.stage()));
        }
    };

    println!("\nStitch complete: {}", output.display());
    println!(
        "  Frames: {}  Batches: {}  Segments: {}",
        summary.frames, summary.batches, summary.segments
    );
    println!(
        "  Encode: {:.1}s  Concat: {:.1}s  Mux: {:.1}s  Total: {:.1}s",
        summary.encode_secs, summary.concat_secs, summary.mux_secs, summary.elapsed_secs
    );
    if let Some(probe) = probe_media(&output) {
        println!(
            "  Output streams: {} video frames, {} audio stream(s), {:.2}s",
            probe.video_frames, probe.audio_streams, probe.duration_secs
        );
    }

    if let Some(path) = report {
        summary.write_report(&path)?;
        println!("  Report: {}", path.display());
    }

    Ok(())
}

fn print_progress(p: StitchProgress) {
    match &p.state {
        RunState::Encoding { batches_done, total } => {
            print!(
                "\r  Encoding: {:.1}% ({batches_done}/{total} batches, {:.0}s)  ",
                p.fraction() * 100.0,
                p.elapsed_secs
            );
        }
        RunState::Concatenated => print!("\n  Segments concatenated"),
        RunState::Muxed => print!("\n  Audio muxed"),
        _ => {}
    }
    std::io::stdout().flush().ok();
}
