extern crate serde;

use std::path::Path;
use std::sync::Arc;

use log::{debug, info};

pub mod analysis;
pub mod cli;
pub mod error;
pub mod partition;
pub mod pipeline;
pub mod provider;
pub mod records;
pub mod report;
pub mod stats;

pub use analysis::{Analysis, AnalysisConfig, AnalysisReport, Finding, Outcome};
pub use error::{AnalysisError, Result};
pub use provider::{DataProvider, LocalRepository};
pub use records::{PatientRecord, PatientTable};
pub use report::{Report, ReportFormat};

const PREVIEW_ROWS: usize = 5;

/// Fetch dataset `dataset_id`, label it and run every hypothesis test on it.
///
/// When `export` is set, the labeled table is also written there before the
/// tests run.
pub async fn analyze<D: DataProvider + ?Sized>(
    provider: &D,
    dataset_id: u32,
    config: &AnalysisConfig,
    export: Option<&Path>,
) -> Result<Report> {
    let raw = pipeline::process_raw(provider, dataset_id).await?;
    let silver = pipeline::process_silver(raw).await?;
    let mut gold = pipeline::process_gold(silver).await?;

    if let Some(path) = export {
        pipeline::export(path, &mut gold).await?;
    }
    let preview = pipeline::presence_preview(&gold, PREVIEW_ROWS)?;
    debug!("{}", preview);
    let presence_preview = PatientTable::from_frame(&preview)?.records().to_vec();

    let group_means = pipeline::group_means(&gold)?;
    let table = Arc::new(PatientTable::from_frame(&gold)?);
    info!("{} patients loaded from dataset {}", table.len(), dataset_id);

    let analyses = analysis::run_all(Arc::clone(&table), config).await?;
    Ok(Report {
        dataset_id,
        patients: table.len(),
        alpha: config.alpha,
        group_means,
        presence_preview,
        analyses,
    })
}
