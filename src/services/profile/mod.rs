pub mod analyzer;
pub mod report;
pub mod types;
pub mod utils;

pub use analyzer::{compute_profile, Tabular};
pub use report::render_report;
pub use types::{ColumnProfile, DatasetProfile, SAMPLE_SIZE};
pub use crate::error::ProfileError;
