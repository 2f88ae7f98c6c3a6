//! Source orchestration: bounded fan-out and the aggregate pipeline.
//!
//! This module runs enabled source adapters concurrently behind a fixed
//! worker pool, isolates each source's failure into an error entry, and
//! feeds the collected batches through normalisation and ranking.

pub mod fanout;
pub mod pipeline;

pub use fanout::{fan_out, FanOut, SourceTask};
