use ndarray::{s, Array1};

use super::channel::{channel_columns, Channel};
use super::config::AnalysisParameters;
use super::constants::{EXPECTED_REFERENCE_PEAKS, REFERENCE_SKIP_SAMPLES};
use super::dataset::Dataset;
use super::error::{ExtractorError, ModuleError, PeakError};
use super::module::Module;
use super::peaks::{find_peaks, merge_peaks};
use super::trace::TraceTable;

/// TraceExtractor splits PM module files into per-channel signal and noise series.
///
/// Every channel gets the summed noise region of its column pair as noise. Regular
/// channels use the summed signal region as signal; reference channels are cropped to the
/// region of interest around the first reference peak found in the full trace.
#[derive(Debug, Clone)]
pub struct TraceExtractor {
    prominence_percent: f64,
    peak_merge_threshold: usize,
}

impl TraceExtractor {
    pub fn new(parameters: &AnalysisParameters) -> Self {
        Self {
            prominence_percent: parameters.prominence_percent,
            peak_merge_threshold: parameters.peak_merge_threshold,
        }
    }

    /// Crop a reference channel's full summed trace to the first reference peak.
    ///
    /// The first samples contain the primary high-intensity peak and are skipped. After
    /// merging split detections, exactly two peaks must remain; the returned slice spans
    /// the prominence bases of the earlier one.
    pub fn extract_reference_signal(
        &self,
        trace: &Array1<f64>,
        first_column: usize,
        second_column: usize,
    ) -> Result<Array1<f64>, PeakError> {
        if trace.len() <= REFERENCE_SKIP_SAMPLES + 2 {
            return Err(PeakError::TraceTooShort(first_column, second_column));
        }
        let scanned = trace.slice(s![REFERENCE_SKIP_SAMPLES..]).to_vec();

        let (max_index, max_value) = scanned.iter().enumerate().fold(
            (0, f64::NEG_INFINITY),
            |(best_idx, best), (idx, value)| {
                if *value > best {
                    (idx, *value)
                } else {
                    (best_idx, best)
                }
            },
        );
        if max_index == 0 || max_index == scanned.len() - 1 {
            return Err(PeakError::PeakAtEdge(first_column, second_column));
        }

        let threshold = max_value * self.prominence_percent / 100.0;
        let detected = find_peaks(&scanned, threshold);
        let peaks = merge_peaks(&detected, self.peak_merge_threshold);
        log::debug!(
            "Columns {first_column}, {second_column}: {} peaks above prominence {threshold:.3}, {} after merging",
            detected.len(),
            peaks.len()
        );

        if peaks.len() < EXPECTED_REFERENCE_PEAKS {
            return Err(PeakError::TooFewPeaks(
                first_column,
                second_column,
                peaks.len(),
            ));
        } else if peaks.len() > EXPECTED_REFERENCE_PEAKS {
            return Err(PeakError::TooManyPeaks(
                first_column,
                second_column,
                peaks.len(),
            ));
        }

        let left = peaks[0].left_base + REFERENCE_SKIP_SAMPLES;
        let right = peaks[0].right_base + REFERENCE_SKIP_SAMPLES;
        log::debug!(
            "Columns {first_column}, {second_column}: reference peak at {} spanning [{left}, {right})",
            peaks[0].position + REFERENCE_SKIP_SAMPLES
        );
        Ok(trace.slice(s![left..right]).to_owned())
    }

    /// Build the channels of a module from its parsed trace table
    pub fn extract_channels(
        &self,
        module: &Module,
        table: &TraceTable,
    ) -> Result<Vec<Channel>, PeakError> {
        let mut channels = Vec::with_capacity(table.n_channels());
        for number in 1..=table.n_channels() {
            let (first, second) = channel_columns(number);
            let noise = table.noise_sum(first, second);
            let channel = if module.is_reference_channel(number) {
                let signal =
                    self.extract_reference_signal(&table.pair_sum(first, second), first, second)?;
                Channel::new(number, signal, noise, true)
                    .with_label(format!("ref_chan_{first}_{second}"))
            } else {
                Channel::new(number, table.signal_sum(first, second), noise, false)
            };
            channels.push(channel);
        }
        Ok(channels)
    }

    fn extract_module(&self, module: Module) -> Result<Module, ModuleError> {
        let table = TraceTable::read(&module.path)?;
        let channels = self.extract_channels(&module, &table)?;
        Ok(module.with_channels(channels))
    }

    /// Extract every module of a dataset. Any module failure aborts the whole dataset.
    pub fn process_dataset(&self, dataset: Dataset) -> Result<Dataset, ExtractorError> {
        log::debug!("Processing data for dataset {}...", dataset.date);
        let dataset = dataset.try_map_modules(|module| {
            log::debug!(
                "Processing file for {}: {}",
                module.identifier,
                module.path.display()
            );
            let identifier = module.identifier.clone();
            let module = self
                .extract_module(module)
                .map_err(|source| ExtractorError::Module {
                    identifier: identifier.clone(),
                    source,
                })?;
            log::debug!("Processed data for {identifier} successfully.");
            Ok(module)
        })?;
        log::info!("All files of dataset {} processed successfully.", dataset.date);
        Ok(dataset)
    }
}
