//! Find dataset field names that are semantically similar to a given header, using a
//! pretrained fastText model of header names.
//!
//! ```no_run
//! use header_tools::HeaderAnalyzer;
//!
//! # fn main() -> header_tools::Result<()> {
//! let analyzer = HeaderAnalyzer::new(None)?;
//! for header in analyzer.similar_by_word("email", 10, "freq")? {
//!     println!("{} {:.3} {}", header.name, header.score, header.freq);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod embeddings;
pub mod error;
pub mod headers;
pub mod install_paths;
pub mod logging;

pub use embeddings::download::{ensure_model_present, HttpFetcher, ModelFetcher};
pub use embeddings::vectors::KeyedVectors;
pub use error::{HeaderError, Result};
pub use headers::{Header, HeaderAnalyzer, SortField};
