//! # xml-to-csv Library
//!
//! Extracts repeated records from a set of XML documents, renames their fields
//! through an editable field catalog and writes one delimited table with a
//! deterministic header.
//!
//! The pipeline has three stages: concurrent per-file extraction, a locked
//! fan-in of the records, and header unification followed by serialization.

pub mod aggregator;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod file_discovery;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod table;

pub use aggregator::{
    AggregateStats, Aggregation, AggregatorConfig, DEFAULT_DEADLINE, ParallelAggregator,
    RecordSet, RecordSource,
};
pub use catalog::{BOUNDARY_KEY, FieldCatalog};
pub use cli::Cli;
pub use config::{EnvProvider, RunConfig, SystemEnvProvider};
pub use error::{CatalogError, ConvertError, ExtractError};
pub use extractor::{Record, RecordExtractor, extract_or_empty};
pub use file_discovery::FileDiscovery;
pub use output::Output;
pub use pipeline::{RunOutcome, RunReport};
pub use platform::{LegacyConsole, Passthrough, PlatformPolicy, TranscodingWriter};
pub use table::{DEFAULT_DELIMITER, TableSummary, TableWriter, column_set};
