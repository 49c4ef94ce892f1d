//! # issnharvest
//!
//! ISSN Metadata Extractor - Crossref harvesting service
//!
//! ## Modules
//!
//! - [`loader`] - ISSN list loading from an uploaded CSV
//! - [`crossref`] - Crossref API client
//! - [`writer`] - Row-capped CSV part files
//! - [`harvest`] - The fetch-and-write loop
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use issnharvest::{crossref::CrossrefClient, harvest, harvest::HarvestConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CrossrefClient::new(50)?;
//!     let issns = vec!["0028-0836".to_string()];
//!     let report =
//!         harvest::run_harvest(&client, &issns, 2025, &HarvestConfig::default(), |_| {}).await?;
//!     println!("Wrote {} files", report.files.len());
//!     Ok(())
//! }
//! ```

pub mod crossref;
pub mod error;
pub mod harvest;
pub mod loader;
pub mod writer;

pub use error::{HarvestError, Result};
