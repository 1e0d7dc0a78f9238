use super::channel::{Channel, Factor};
use super::dataset::Dataset;
use super::error::AgeingError;

/// Divide every channel's statistics by the dataset's reference means.
///
/// Applies to reference and non-reference channels alike. A zero reference mean is an
/// error; a NaN channel mean gives an unavailable factor.
pub fn process_dataset(dataset: Dataset) -> Result<Dataset, AgeingError> {
    let reference = dataset.reference_means;
    if reference.gaussian_mean == 0.0 {
        return Err(AgeingError::ZeroReferenceMean {
            date: dataset.date.clone(),
            statistic: String::from("gaussian"),
        });
    }
    if reference.weighted_mean == 0.0 {
        return Err(AgeingError::ZeroReferenceMean {
            date: dataset.date.clone(),
            statistic: String::from("weighted"),
        });
    }

    let dataset = dataset.map_modules(|module| {
        module.map_channels(|channel: Channel| {
            let gaussian = Factor::from_value(channel.means.gaussian_mean / reference.gaussian_mean);
            let weighted = Factor::from_value(channel.means.weighted_mean / reference.weighted_mean);
            log::debug!("{}: ageing factors {gaussian}, {weighted}", channel.name);
            channel.with_ageing_factors(gaussian, weighted)
        })
    });
    log::info!("Ageing factors calculated for dataset {}", dataset.date);
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Means;
    use crate::module::Module;
    use ndarray::array;
    use std::path::Path;

    fn dataset(channel_means: &[Means], reference: Means) -> Dataset {
        let channels = channel_means
            .iter()
            .enumerate()
            .map(|(i, m)| Channel::new(i + 1, array![1.0], array![1.0], false).with_means(*m))
            .collect();
        let module = Module::new("PMA0", Path::new("pma0.txt"), true, &[])
            .unwrap()
            .with_channels(channels);
        Dataset::new("2022-02-01", vec![module], "PMA0")
            .unwrap()
            .with_reference_means(reference)
    }

    #[test]
    fn test_identical_means_give_unity() {
        let means = Means::new(123.4, 98.7);
        let ds = process_dataset(dataset(&[means], means)).unwrap();
        let factors = ds.modules[0].channels[0].factors;
        assert_eq!(factors.gaussian_ageing_factor, Factor::Value(1.0));
        assert_eq!(factors.weighted_ageing_factor, Factor::Value(1.0));
    }

    #[test]
    fn test_ratios_and_nan() {
        let ds = process_dataset(dataset(
            &[Means::new(110.0, 50.0), Means::new(f64::NAN, 25.0)],
            Means::new(100.0, 100.0),
        ))
        .unwrap();
        let channels = &ds.modules[0].channels;
        assert_eq!(channels[0].factors.gaussian_ageing_factor, Factor::Value(1.1));
        assert_eq!(channels[0].factors.weighted_ageing_factor, Factor::Value(0.5));
        assert_eq!(channels[1].factors.gaussian_ageing_factor, Factor::NotAvailable);
        assert_eq!(channels[1].factors.weighted_ageing_factor, Factor::Value(0.25));
    }

    #[test]
    fn test_zero_reference_mean() {
        let err = process_dataset(dataset(&[Means::new(1.0, 1.0)], Means::new(100.0, 0.0)))
            .unwrap_err();
        assert_eq!(
            err,
            AgeingError::ZeroReferenceMean {
                date: String::from("2022-02-01"),
                statistic: String::from("weighted"),
            }
        );
        assert!(err.to_string().contains("2022-02-01"));
    }
}
