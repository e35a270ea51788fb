pub mod check;
pub mod plan;
pub mod probe;
pub mod stitch;
