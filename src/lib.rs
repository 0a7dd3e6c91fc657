// Seasonal revenue analysis over uploaded tabular records.
//
// The pipeline loads a CSV export, normalizes it into a dated series,
// applies categorical filters, aggregates seasonal means and assembles the
// prompt pair handed to an external commentary service.

pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod prompt;
pub mod reports;
pub mod services;
pub mod types;
pub mod util;

pub use error::{PipelineError, Result};
