//! The asynchronous restyle pipeline.

pub mod restyler;

pub use restyler::{PipelineConfig, RestylePipeline};
