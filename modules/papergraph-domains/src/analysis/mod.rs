pub mod document;
pub mod tasks;

pub use document::{AnalysisDocument, BasicInfo, ContentQuality, QualityDimension, Summary};
pub use tasks::{AnalysisTasks, MAX_ACTIVE_TASKS};
