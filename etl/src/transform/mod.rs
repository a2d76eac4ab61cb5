//! Transformation module.
//!
//! - Stages: the pure row transformations, applied in a fixed order
//! - Pipeline: load → stages → save, plus the run report

pub mod pipeline;
pub mod stages;

pub use pipeline::*;
pub use stages::*;
