//! framestitch sequence model
//!
//! Defines the data contracts of a stitch run:
//! - **Frames:** the deterministically ordered input image list
//! - **Batches:** fixed-size, index-stable slices of that list and the
//!   zero-padded names that keep their segments in playback order
//! - **Manifest:** the ordered segment list handed to the concatenator
//!
//! Nothing here spawns processes; batching is pure and the only I/O is
//! directory listing.

pub mod batch;
pub mod frame;
pub mod manifest;

pub use batch::*;
pub use frame::*;
pub use manifest::*;
