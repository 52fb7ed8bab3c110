pub mod pipeline;

pub use pipeline::{Pipeline, PipelineOutput, RunSummary};
