//! End-to-end run against the real ffmpeg binary.
//!
//! Returns early (passes) on machines without ffmpeg/ffprobe or libx264.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use framestitch_engine::backend::{command_exists, FfmpegBackend};
use framestitch_engine::pipeline::{StitchJob, StitchPipeline};
use framestitch_engine::probe::probe_media;

fn has_libx264() -> bool {
    Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).contains("libx264"))
        .unwrap_or(false)
}

fn ffmpeg(args: &[&str], output: &Path) {
    let status = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error"])
        .args(args)
        .arg(output)
        .stdout(Stdio::null())
        .status()
        .unwrap();
    assert!(status.success(), "fixture generation failed");
}

#[test]
fn ten_frames_in_batches_of_four_with_silent_audio_source() {
    if !command_exists("ffmpeg") || !command_exists("ffprobe") || !has_libx264() {
        eprintln!("skipping: ffmpeg with libx264 and ffprobe required");
        return;
    }

    let root: PathBuf = std::env::temp_dir().join(format!(
        "framestitch_test_ffmpeg_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&root);
    let frames = root.join("frames");
    std::fs::create_dir_all(&frames).unwrap();

    ffmpeg(
        &["-f", "lavfi", "-i", "testsrc=size=64x64:rate=10", "-frames:v", "10"],
        &frames.join("img_%03d.jpg"),
    );
    let audio = root.join("silent.mp4");
    ffmpeg(
        &[
            "-f",
            "lavfi",
            "-i",
            "color=c=black:s=64x64:d=5",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
        ],
        &audio,
    );

    let output = root.join("stitched.mp4");
    let mut job = StitchJob::new(&frames, &audio, &output, 4);
    job.staging_parent = Some(root.join("staging"));

    let summary = StitchPipeline::new(job, Box::new(FfmpegBackend::new()))
        .run()
        .unwrap();
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.segments, 3);

    let probe = probe_media(&output).expect("output should be probeable");
    assert_eq!(probe.video_frames, 10);
    assert_eq!(probe.audio_streams, 0);

    let leftovers = std::fs::read_dir(root.join("staging")).unwrap().count();
    assert_eq!(leftovers, 0);

    std::fs::remove_dir_all(&root).ok();
}
