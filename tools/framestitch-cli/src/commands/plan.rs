//! Dry run: show the batch layout for an input directory.

use std::path::PathBuf;

use framestitch_sequence_model::batch::{padding_width, partition, segment_file_name};
use framestitch_sequence_model::frame::FrameSequence;

pub fn run(image_input: PathBuf, batch_size: usize, json: bool) -> anyhow::Result<()> {
    let frames = FrameSequence::from_dir(&image_input)?;
    let batches = partition(frames.len(), batch_size)?;
    let width = padding_width(batches.len());

    if json {
        let plan = serde_json::json!({
            "input": image_input,
            "frames": frames.len(),
            "batch_size": batch_size,
            "batches": batches
                .iter()
                .map(|b| serde_json::json!({
                    "index": b.index,
                    "start": b.start,
                    "end": b.end,
                    "segment": segment_file_name(b.index, width),
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("Input: {}", image_input.display());
    println!("  Frames: {}", frames.len());
    println!("  Batches: {} (size {batch_size})", batches.len());
    if batches.is_empty() {
        println!("[WARN] No frames found; a stitch run would fail with no segments.");
        return Ok(());
    }

    println!();
    for batch in &batches {
        let range = frames.slice(batch.range());
        let first = range.first().and_then(|p| p.file_name());
        let last = range.last().and_then(|p| p.file_name());
        println!(
            "  {}  frames {}..{} ({})  {} .. {}",
            segment_file_name(batch.index, width),
            batch.start,
            batch.end,
            batch.len(),
            first.map(|n| n.to_string_lossy()).unwrap_or_default(),
            last.map(|n| n.to_string_lossy()).unwrap_or_default(),
        );
    }

    Ok(())
}
