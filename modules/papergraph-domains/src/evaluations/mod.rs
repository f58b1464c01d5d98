pub mod catalog;
pub mod service;

pub use catalog::{dimension, DimensionSpec, MetricSpec, DIMENSIONS};
pub use service::{DimensionDraft, EvaluationDraft, Evaluations, MetricDraft, MAX_SCORE};
