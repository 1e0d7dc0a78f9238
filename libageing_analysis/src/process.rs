use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use super::ageing;
use super::config::{AnalysisParameters, Config};
use super::dataset::{sort_by_date, Dataset};
use super::error::{ProcessorError, StageError};
use super::extractor::TraceExtractor;
use super::fitter;
use super::normalizer;
use super::reference;
use super::worker_status::{Stage, WorkerStatus};

/// Number of reported stages per dataset (extract, fit, aggregate, ageing)
const DATASET_STAGES: f32 = 4.0;

fn check_cancelled(cancel: &AtomicBool) -> Result<(), ProcessorError> {
    if cancel.load(Ordering::Relaxed) {
        log::warn!("Processing was cancelled.");
        return Err(ProcessorError::Cancelled);
    }
    Ok(())
}

fn wrap(date: &str) -> impl Fn(StageError) -> ProcessorError + '_ {
    move |source| ProcessorError::Dataset {
        date: date.to_string(),
        source,
    }
}

/// Run the four per-dataset stages on one dataset, in order.
///
/// `progress` is called with the stage about to run and the fraction of this dataset's
/// stages already completed.
pub fn process_dataset(
    dataset: Dataset,
    extractor: &TraceExtractor,
    progress: &mut dyn FnMut(Stage, f32),
) -> Result<Dataset, ProcessorError> {
    let date = dataset.date.clone();
    let fail = wrap(&date);

    progress(Stage::Extracting, 0.0);
    let dataset = extractor
        .process_dataset(dataset)
        .map_err(|e| fail(e.into()))?;

    progress(Stage::Fitting, 1.0 / DATASET_STAGES);
    let dataset = fitter::process_dataset(dataset);

    progress(Stage::Aggregating, 2.0 / DATASET_STAGES);
    let dataset = reference::process_dataset(dataset).map_err(|e| fail(e.into()))?;

    progress(Stage::Ageing, 3.0 / DATASET_STAGES);
    let dataset = ageing::process_dataset(dataset).map_err(|e| fail(e.into()))?;
    Ok(dataset)
}

/// The single entry point of the full analysis.
///
/// Datasets are processed in date order, then normalized against the first one. The
/// cancel flag is checked between datasets and before normalization; a dataset already in
/// flight runs to completion.
pub fn run_pipeline(
    mut datasets: Vec<Dataset>,
    parameters: &AnalysisParameters,
    progress: &mut dyn FnMut(WorkerStatus),
    cancel: &AtomicBool,
) -> Result<Vec<Dataset>, ProcessorError> {
    if datasets.is_empty() {
        return Err(ProcessorError::NoDatasets);
    }
    sort_by_date(&mut datasets);
    let extractor = TraceExtractor::new(parameters);
    let total = datasets.len() as f32;
    log::info!(
        "Running analysis on {} datasets (prominence {}%, merge threshold {})",
        datasets.len(),
        parameters.prominence_percent,
        parameters.peak_merge_threshold
    );

    let mut processed = Vec::with_capacity(datasets.len());
    for (idx, dataset) in datasets.into_iter().enumerate() {
        check_cancelled(cancel)?;
        let date = dataset.date.clone();
        log::info!("Processing dataset {date}...");
        let dataset = process_dataset(dataset, &extractor, &mut |stage, fraction| {
            progress(WorkerStatus::new(
                (idx as f32 + fraction) / total,
                &date,
                stage,
            ))
        })?;
        log::info!("Finished processing dataset {date}.");
        processed.push(dataset);
    }

    check_cancelled(cancel)?;
    progress(WorkerStatus::new(1.0, "", Stage::Normalizing));
    let datasets = normalizer::normalize(processed);
    progress(WorkerStatus::new(1.0, "", Stage::Done));
    log::info!("Analysis complete.");
    Ok(datasets)
}

/// Only extract the traces of every dataset
pub fn parse_only(
    datasets: Vec<Dataset>,
    parameters: &AnalysisParameters,
) -> Result<Vec<Dataset>, ProcessorError> {
    let extractor = TraceExtractor::new(parameters);
    datasets
        .into_iter()
        .map(|dataset| {
            let date = dataset.date.clone();
            extractor
                .process_dataset(dataset)
                .map_err(|e| wrap(&date)(e.into()))
        })
        .collect()
}

/// Extract the traces and fit the distributions of every dataset, without ageing factors
pub fn fit_only(
    datasets: Vec<Dataset>,
    parameters: &AnalysisParameters,
) -> Result<Vec<Dataset>, ProcessorError> {
    Ok(parse_only(datasets, parameters)?
        .into_iter()
        .map(fitter::process_dataset)
        .collect())
}

/// The function to be called by a separate thread (typically a UI or the CLI).
///
/// Builds the datasets described by the config (paths relative to the working directory)
/// and runs the full pipeline, reporting progress over `tx`.
pub fn process(
    config: Config,
    tx: Sender<WorkerStatus>,
    cancel: Arc<AtomicBool>,
) -> Result<Vec<Dataset>, ProcessorError> {
    let root = std::env::current_dir().map_err(|e| ProcessorError::ConfigError(e.into()))?;
    let datasets = config.build_datasets(&root)?;

    let mut send_error = None;
    let result = run_pipeline(
        datasets,
        &config.analysis,
        &mut |status| {
            if send_error.is_none() {
                if let Err(e) = tx.send(status) {
                    send_error = Some(e);
                }
            }
        },
        &cancel,
    );
    match (result, send_error) {
        (Ok(_), Some(e)) => Err(e.into()),
        (result, _) => result,
    }
}
