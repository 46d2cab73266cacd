//! `payreport-retry`: Payment retry resolution engine.
//!
//! Pure engine crate: receives pre-loaded attempt records, returns grouped
//! results and summary metrics. No CLI or IO dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod group;
pub mod model;
pub mod normalize;
pub mod policy;
pub mod summary;

pub use config::ReportConfig;
pub use engine::{aggregate, run, AggregateOptions};
pub use error::RetryError;
pub use model::{AttemptRecord, DetailRow, EntityKey, RetryReport, RetrySummary};
pub use policy::ResolutionPolicy;
pub use summary::ErrorRateBasis;
