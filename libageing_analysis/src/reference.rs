use super::channel::Means;
use super::dataset::Dataset;
use super::error::ReferenceError;

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Average the statistics of the reference channels of a dataset's reference module.
///
/// NaN statistics are skipped independently for the Gaussian and weighted means.
pub fn reference_means(dataset: &Dataset) -> Result<Means, ReferenceError> {
    let module = dataset.reference_module();
    let mut gaussian = Vec::new();
    let mut weighted = Vec::new();
    for channel in module.reference_channels() {
        if !channel.means.gaussian_mean.is_nan() {
            gaussian.push(channel.means.gaussian_mean);
        }
        if !channel.means.weighted_mean.is_nan() {
            weighted.push(channel.means.weighted_mean);
        }
    }

    if gaussian.is_empty() || weighted.is_empty() {
        return Err(ReferenceError::NoData(dataset.date.clone()));
    }
    if gaussian.len() != weighted.len() {
        return Err(ReferenceError::InsufficientData {
            date: dataset.date.clone(),
            gaussian: gaussian.len(),
            weighted: weighted.len(),
        });
    }
    Ok(Means::new(mean(&gaussian), mean(&weighted)))
}

/// Compute and store the reference means of a dataset
pub fn process_dataset(dataset: Dataset) -> Result<Dataset, ReferenceError> {
    let means = reference_means(&dataset)?;
    log::info!(
        "Reference means for dataset {}: gaussian {:.3}, weighted {:.3} ({})",
        dataset.date,
        means.gaussian_mean,
        means.weighted_mean,
        dataset.reference_module().identifier
    );
    Ok(dataset.with_reference_means(means))
}
