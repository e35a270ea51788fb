//! framestitch engine
//!
//! Batched pipeline that turns a directory of still frames plus an audio
//! source into one video, driving ffmpeg as an external process.
//!
//! # Pipeline Architecture
//!
//! ```text
//! frames/ ──► FrameSequence ──► partition(batch_size)
//!                                      │
//!                    ┌─────────────────┼─────────────────┐
//!                    ▼                 ▼                 ▼
//!               batch 000         batch 001   ...   batch K-1     (staged + encoded)
//!                    │                 │                 │
//!                    ▼                 ▼                 ▼
//!              mov_parts/000.mp4  001.mp4   ...     K-1.mp4
//!                    └─────────────────┼─────────────────┘
//!                                      ▼
//!                         concat (stream copy) ──► stitched_no_audio.mp4
//!                                      │
//! audio source ────────────────────────┤
//!                                      ▼
//!                                 mux (x264) ──► output
//! ```
//!
//! Every intermediate file lives under one staging root that is removed
//! when the run ends, successfully or not.

pub mod backend;
pub mod concat;
pub mod mux;
pub mod pipeline;
pub mod probe;
pub mod segment;
pub mod staging;

pub use backend::{CancelFlag, EncodeRequest, EncoderBackend, FfmpegBackend, MuxRequest};
pub use pipeline::*;
pub use probe::{probe_media, MediaProbe};
pub use staging::StagingArea;
