//! Encoder backends.
//!
//! The pipeline never links against a codec library. Every encode, concat
//! and mux is a separate external process behind [`EncoderBackend`], so the
//! stages can be exercised with a fake backend in tests.

use std::ffi::OsString;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use framestitch_common::error::ProcessFailure;

/// Shared flag that asks running and future encoder work to stop.
pub type CancelFlag = Arc<AtomicBool>;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Encode a sequentially numbered image pattern into one video file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeRequest {
    /// Frames per second for both input interpretation and output.
    pub frame_rate: u32,

    /// Sequential input pattern, e.g. `<dir>/frame_%d.jpg`.
    pub input_pattern: PathBuf,

    /// Segment file to write.
    pub output: PathBuf,

    /// Constant rate factor.
    pub quality: u8,
}

/// Combine the optional audio of one file with the video of another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxRequest {
    /// File whose first audio stream is copied, if it has one.
    pub audio_source: PathBuf,

    /// Silent video whose first video stream is used.
    pub video_source: PathBuf,

    pub frame_rate: u32,

    pub quality: u8,

    /// Muxed file to write.
    pub output: PathBuf,
}

/// Trait for encoder backends (ffmpeg today, fakes in tests).
pub trait EncoderBackend: Send + Sync {
    /// Encode one batch of staged frames into a segment.
    fn encode(&self, request: &EncodeRequest) -> Result<(), ProcessFailure>;

    /// Stream-copy the files listed in `manifest` into `output`.
    fn concat(&self, manifest: &Path, output: &Path) -> Result<(), ProcessFailure>;

    /// Mux audio and video into the final file.
    fn mux(&self, request: &MuxRequest) -> Result<(), ProcessFailure>;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Backend that shells out to the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    binary: PathBuf,
    cancel: Option<CancelFlag>,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            cancel: None,
        }
    }

    /// Use a specific ffmpeg executable instead of the one on PATH.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Kill in-flight ffmpeg processes once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn run_ffmpeg(&self, args: &[OsString]) -> Result<(), ProcessFailure> {
        tracing::debug!(binary = %self.binary.display(), args = ?args, "Running ffmpeg");
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ProcessFailure::spawn(format!("failed to start {}: {e}", self.binary.display()))
            })?;
        let pid = child.id();

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProcessFailure::spawn("failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently to avoid ffmpeg blocking on a full stderr pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if self.is_cancelled() => {
                    tracing::warn!(pid, "Cancellation requested, killing ffmpeg");
                    child.kill().ok();
                    child.wait().ok();
                    stderr_task.join().ok();
                    return Err(ProcessFailure::spawn("killed after cancellation"));
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    child.kill().ok();
                    child.wait().ok();
                    stderr_task.join().ok();
                    return Err(ProcessFailure::spawn(format!(
                        "failed to wait on ffmpeg: {e}"
                    )));
                }
            }
        };

        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(ProcessFailure::exited(status.code(), stderr_output));
        }
        Ok(())
    }
}

impl EncoderBackend for FfmpegBackend {
    fn encode(&self, request: &EncodeRequest) -> Result<(), ProcessFailure> {
        self.run_ffmpeg(&encode_args(request))
    }

    fn concat(&self, manifest: &Path, output: &Path) -> Result<(), ProcessFailure> {
        self.run_ffmpeg(&concat_args(manifest, output))
    }

    fn mux(&self, request: &MuxRequest) -> Result<(), ProcessFailure> {
        self.run_ffmpeg(&mux_args(request))
    }

    fn is_available(&self) -> bool {
        command_exists(&self.binary.to_string_lossy())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

fn common_args() -> Vec<OsString> {
    ["-y", "-hide_banner", "-nostdin", "-loglevel", "error"]
        .into_iter()
        .map(OsString::from)
        .collect()
}

fn push_all(args: &mut Vec<OsString>, values: &[&str]) {
    args.extend(values.iter().map(OsString::from));
}

/// Arguments for encoding one batch: image2 input, libx264, yuv420p.
pub fn encode_args(request: &EncodeRequest) -> Vec<OsString> {
    let rate = request.frame_rate.to_string();
    let crf = request.quality.to_string();
    let mut args = common_args();
    push_all(&mut args, &["-framerate", &rate, "-i"]);
    args.push(request.input_pattern.clone().into_os_string());
    push_all(
        &mut args,
        &[
            "-map", "0:v:0", "-c:v", "libx264", "-crf", &crf, "-r", &rate, "-pix_fmt", "yuv420p",
        ],
    );
    args.push(request.output.clone().into_os_string());
    args
}

/// Arguments for a stream-copy concat through the concat demuxer.
pub fn concat_args(manifest: &Path, output: &Path) -> Vec<OsString> {
    let mut args = common_args();
    push_all(&mut args, &["-f", "concat", "-safe", "0", "-i"]);
    args.push(manifest.as_os_str().to_owned());
    push_all(&mut args, &["-c", "copy"]);
    args.push(output.as_os_str().to_owned());
    args
}

/// Arguments for muxing. The `?` on the audio map makes a source without
/// audio streams a no-op instead of an error.
pub fn mux_args(request: &MuxRequest) -> Vec<OsString> {
    let rate = request.frame_rate.to_string();
    let crf = request.quality.to_string();
    let mut args = common_args();
    push_all(&mut args, &["-r", &rate, "-i"]);
    args.push(request.audio_source.clone().into_os_string());
    args.push(OsString::from("-i"));
    args.push(request.video_source.clone().into_os_string());
    push_all(
        &mut args,
        &[
            "-map", "0:a:0?", "-map", "1:v:0", "-c:a", "copy", "-c:v", "libx264", "-crf", &crf,
            "-pix_fmt", "yuv420p", "-r", &rate,
        ],
    );
    args.push(request.output.clone().into_os_string());
    args
}

/// Whether `binary` resolves on PATH.
pub fn command_exists(binary: &str) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lossy(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_encode_args_use_pattern_rate_and_crf() {
        let args = lossy(&encode_args(&EncodeRequest {
            frame_rate: 30,
            input_pattern: PathBuf::from("/stage/00/frame_%d.png"),
            output: PathBuf::from("/stage/mov_parts/00.mp4"),
            quality: 18,
        }));
        let joined = args.join(" ");
        assert!(joined.contains("-framerate 30 -i /stage/00/frame_%d.png"));
        assert!(joined.contains("-c:v libx264 -crf 18 -r 30 -pix_fmt yuv420p"));
        assert_eq!(args.last().unwrap(), "/stage/mov_parts/00.mp4");
        assert_eq!(args[0], "-y");
    }

    #[test]
    fn test_concat_args_stream_copy() {
        let args = lossy(&concat_args(
            Path::new("/stage/inputs.txt"),
            Path::new("/stage/stitched_no_audio.mp4"),
        ));
        let joined = args.join(" ");
        assert!(joined.contains("-f concat -safe 0 -i /stage/inputs.txt -c copy"));
        assert!(!joined.contains("libx264"));
    }

    #[test]
    fn test_mux_args_map_optional_audio() {
        let args = lossy(&mux_args(&MuxRequest {
            audio_source: PathBuf::from("/in/movie.mkv"),
            video_source: PathBuf::from("/stage/stitched_no_audio.mp4"),
            frame_rate: 24,
            quality: 23,
            output: PathBuf::from("/stage/output.mp4"),
        }));
        let joined = args.join(" ");
        assert!(joined.contains("-r 24 -i /in/movie.mkv -i /stage/stitched_no_audio.mp4"));
        assert!(joined.contains("-map 0:a:0? -map 1:v:0 -c:a copy"));
        assert!(joined.contains("-crf 23"));
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let backend = FfmpegBackend::new().with_binary("framestitch-no-such-ffmpeg");
        assert!(!backend.is_available());
        let err = backend
            .concat(Path::new("/nope/inputs.txt"), Path::new("/nope/out.mp4"))
            .unwrap_err();
        assert_eq!(err.status, None);
        assert!(err.detail.contains("failed to start"));
    }

    /// Write an executable stand-in for ffmpeg that runs `body`.
    #[cfg(unix)]
    fn fake_ffmpeg(name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!(
            "framestitch_test_backend_{name}_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let script = dir.join("ffmpeg");
        std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    /// Spawning a freshly written script can race with forks in other test
    /// threads (ETXTBSY); retry those spawn failures.
    #[cfg(unix)]
    fn run_script(backend: &FfmpegBackend) -> Result<(), ProcessFailure> {
        let manifest = Path::new("/stage/inputs.txt");
        let output = Path::new("/stage/out.mp4");
        for _ in 0..20 {
            match backend.concat(manifest, output) {
                Err(e) if e.detail.contains("busy") => {
                    std::thread::sleep(Duration::from_millis(20))
                }
                other => return other,
            }
        }
        backend.concat(manifest, output)
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_process_reports_status_and_stderr() {
        let script = fake_ffmpeg("exit", "echo 'Invalid data found' >&2\nexit 3");
        let backend = FfmpegBackend::new().with_binary(&script);

        let err = run_script(&backend).unwrap_err();
        assert_eq!(err.status, Some(3));
        assert_eq!(err.detail, "Invalid data found");

        std::fs::remove_dir_all(script.parent().unwrap()).ok();
    }

    #[cfg(unix)]
    #[test]
    fn test_cancellation_kills_running_process() {
        let script = fake_ffmpeg("cancel", "exec sleep 30");
        let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
        let backend = FfmpegBackend::new()
            .with_binary(&script)
            .with_cancel_flag(cancel.clone());

        let trigger = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            cancel.store(true, Ordering::SeqCst);
        });

        let started = std::time::Instant::now();
        let err = run_script(&backend).unwrap_err();
        trigger.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(err.status, None);
        assert!(err.detail.contains("killed after cancellation"));

        std::fs::remove_dir_all(script.parent().unwrap()).ok();
    }
}
