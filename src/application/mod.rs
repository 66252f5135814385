//! Application layer: orchestration and reporting
//!
//! This layer drives the domain logic through the I/O boundary traits.

pub mod analyzer;
pub mod error;
pub mod error_ext;
pub mod report;

pub use analyzer::{create_analyzer, Analyzer, AnalyzerMode};
pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::IoResultExt;
pub use report::{format_scientific, ReportWriter};
