//! One complete run: catalog, discovery, parallel extraction, table output.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::info;

use crate::aggregator::{ParallelAggregator, RecordSource};
use crate::catalog::FieldCatalog;
use crate::config::RunConfig;
use crate::error::{ConvertError, Result};
use crate::extractor::RecordExtractor;
use crate::file_discovery::FileDiscovery;
use crate::platform::PlatformPolicy;
use crate::table::{TableWriter, output_file_name};

/// What a run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub files: usize,
    pub failed: usize,
    pub records: usize,
    pub columns: usize,
    pub timed_out: bool,
    pub output: Option<PathBuf>,
    pub duration: Duration,
}

/// How a run ended, short of a terminal error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A result file was written
    Written(RunReport),
    /// No document produced a record; nothing was written
    NoData(RunReport),
}

impl RunOutcome {
    pub fn report(&self) -> &RunReport {
        match self {
            RunOutcome::Written(report) | RunOutcome::NoData(report) => report,
        }
    }
}

/// Run the whole conversion
pub async fn run(config: &RunConfig, policy: &dyn PlatformPolicy) -> Result<RunOutcome> {
    let catalog = Arc::new(FieldCatalog::load(config.config_file())?);
    info!(
        boundary = catalog.boundary(),
        columns = catalog.columns().len(),
        "field catalog ready"
    );

    let extractor = Arc::new(RecordExtractor::new(Arc::clone(&catalog)));
    run_with_source(config, policy, catalog, extractor).await
}

/// Run the conversion with a given catalog and per-document record source
pub async fn run_with_source(
    config: &RunConfig,
    policy: &dyn PlatformPolicy,
    catalog: Arc<FieldCatalog>,
    source: Arc<dyn RecordSource>,
) -> Result<RunOutcome> {
    let start = Instant::now();

    let files = FileDiscovery::new().discover_files(&config.data_dir).await?;

    let aggregator = ParallelAggregator::new(source, config.aggregator_config());
    let aggregation = aggregator.run(files).await?;

    let mut report = RunReport {
        files: aggregation.stats.files,
        failed: aggregation.stats.failed,
        records: aggregation.records.len(),
        columns: 0,
        timed_out: aggregation.timed_out,
        output: None,
        duration: start.elapsed(),
    };

    if aggregation.records.is_empty() {
        info!("no records extracted, skipping output");
        return Ok(RunOutcome::NoData(report));
    }

    let path = config.output_dir.join(output_file_name(&Local::now()));
    let writer = TableWriter::new(config.delimiter, config.output_encoding(policy));
    let records = aggregation.records;
    let output_path = path.clone();

    let summary = tokio::task::spawn_blocking(move || {
        writer.write_file(&records, &catalog, &output_path)
    })
    .await
    .map_err(|e| ConvertError::Concurrency {
        details: format!("Join error: {}", e),
    })??;

    report.columns = summary.columns;
    report.output = Some(path);
    report.duration = start.elapsed();
    Ok(RunOutcome::Written(report))
}
