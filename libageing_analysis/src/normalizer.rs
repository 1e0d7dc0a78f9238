use fxhash::FxHashMap;

use super::channel::{AgeingFactors, Factor};
use super::dataset::{sort_by_date, Dataset};

/// Raw ageing factors of the baseline dataset keyed by (module identifier, channel name)
#[derive(Debug, Clone, Default)]
pub struct Divisors {
    baseline: String,
    factors: FxHashMap<(String, String), AgeingFactors>,
}

impl Divisors {
    pub fn from_baseline(baseline: &Dataset) -> Self {
        let mut factors = FxHashMap::default();
        for module in baseline.modules.iter() {
            for channel in module.channels.iter() {
                factors.insert(
                    (module.identifier.clone(), channel.name.clone()),
                    channel.factors,
                );
            }
        }
        Self {
            baseline: baseline.date.clone(),
            factors,
        }
    }

    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    /// The (gaussian, weighted) divisors for a channel. Unknown channels are unavailable.
    pub fn get(&self, module: &str, channel: &str) -> (Factor, Factor) {
        match self.factors.get(&(module.to_string(), channel.to_string())) {
            Some(f) => (f.gaussian_ageing_factor, f.weighted_ageing_factor),
            None => (Factor::NotAvailable, Factor::NotAvailable),
        }
    }
}

/// Apply the baseline divisors to a single dataset
pub fn normalize_dataset(dataset: Dataset, divisors: &Divisors) -> Dataset {
    let dataset = dataset.map_modules(|module| {
        let identifier = module.identifier.clone();
        module.map_channels(|channel| {
            let (gauss_div, weighted_div) = divisors.get(&identifier, &channel.name);
            let gauss = channel.factors.gaussian_ageing_factor.divide(&gauss_div);
            let weighted = channel.factors.weighted_ageing_factor.divide(&weighted_div);
            if !gauss.is_available() || !weighted.is_available() {
                log::debug!(
                    "{identifier} {}: normalized factors unavailable ({gauss}, {weighted})",
                    channel.name
                );
            }
            channel.with_normalized_factors(gauss, weighted)
        })
    });
    log::info!(
        "Normalized dataset {} against baseline {}",
        dataset.date,
        divisors.baseline()
    );
    dataset
}

/// Normalize every dataset against the chronologically first one (itself included).
///
/// The returned datasets are sorted by date.
pub fn normalize(mut datasets: Vec<Dataset>) -> Vec<Dataset> {
    sort_by_date(&mut datasets);
    let Some(baseline) = datasets.first() else {
        return datasets;
    };
    let divisors = Divisors::from_baseline(baseline);
    datasets
        .into_iter()
        .map(|dataset| normalize_dataset(dataset, &divisors))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::module::Module;
    use ndarray::array;
    use std::path::Path;

    fn dataset(date: &str, factors: &[(usize, Factor, Factor)]) -> Dataset {
        let channels = factors
            .iter()
            .map(|(n, g, w)| {
                Channel::new(*n, array![1.0], array![1.0], *n == 5).with_ageing_factors(*g, *w)
            })
            .collect();
        let module = Module::new("PMA0", Path::new("pma0.txt"), true, &[5])
            .unwrap()
            .with_channels(channels);
        Dataset::new(date, vec![module], "PMA0").unwrap()
    }

    fn normalized(ds: &Dataset, name: &str) -> (Factor, Factor) {
        let ch = ds.modules[0].get_channel(name).unwrap();
        (
            ch.factors.normalized_gauss_ageing_factor,
            ch.factors.normalized_weighted_ageing_factor,
        )
    }

    #[test]
    fn test_baseline_normalizes_to_one() {
        let ds = dataset(
            "2022-01-01",
            &[
                (1, Factor::Value(0.8), Factor::NotAvailable),
                (2, Factor::Value(1.3), Factor::Value(0.0)),
            ],
        );
        let out = normalize(vec![ds]);
        assert_eq!(
            normalized(&out[0], "CH01"),
            (Factor::Value(1.0), Factor::NotAvailable)
        );
        assert_eq!(
            normalized(&out[0], "CH02"),
            (Factor::Value(1.0), Factor::NotAvailable)
        );
    }

    #[test]
    fn test_two_dataset_scenario() {
        let later = dataset("2022-02-01", &[(5, Factor::Value(1.1), Factor::Value(1.1))]);
        let baseline = dataset("2022-01-01", &[(5, Factor::Value(1.0), Factor::Value(1.0))]);
        // Input order does not matter; the earliest date is the baseline
        let out = normalize(vec![later, baseline]);
        assert_eq!(out[0].date, "2022-01-01");
        assert_eq!(normalized(&out[0], "CH05").0, Factor::Value(1.0));
        assert_eq!(normalized(&out[1], "CH05").0, Factor::Value(1.1));
    }

    #[test]
    fn test_missing_baseline_channel() {
        let baseline = dataset("2022-01-01", &[(1, Factor::Value(1.0), Factor::Value(1.0))]);
        let later = dataset("2022-02-01", &[(2, Factor::Value(0.9), Factor::Value(0.9))]);
        let out = normalize(vec![baseline, later]);
        assert_eq!(
            normalized(&out[1], "CH02"),
            (Factor::NotAvailable, Factor::NotAvailable)
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(normalize(Vec::new()).is_empty());
    }
}
