// Labeling, domain classification and sink writing
pub mod core;

// Line-level external sort used to finalize text sinks
pub mod external_sort;

pub mod config;
pub mod constants;
pub mod errors;
pub mod sifter;
pub mod utils;

// Re-export main types for convenience
pub use config::{Config, OutputFormat};
pub use crate::core::labeler::{KeylessFirstLine, LabelMode};
pub use crate::core::patterns::FieldKind;
pub use errors::{Result, SiftError};
pub use sifter::{DomainSifter, RunSummary, SiftOutcome};
