use std::fmt::Display;

use super::channel::Means;
use super::error::DatasetError;
use super::module::Module;

/// One calibration run: the modules measured on a given date plus the dataset-level
/// reference means.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub date: String,
    pub modules: Vec<Module>,
    reference_module: usize,
    pub reference_means: Means,
    /// Channels that needed the noise fallback or still have a zero mean after fitting
    pub fit_warnings: usize,
}

impl Dataset {
    /// Create a Dataset, resolving the reference module.
    ///
    /// Fails if no module matches the reference PM identifier.
    pub fn new(date: &str, modules: Vec<Module>, reference_pm: &str) -> Result<Self, DatasetError> {
        let reference_module = modules
            .iter()
            .position(|m| m.identifier == reference_pm)
            .ok_or_else(|| DatasetError::MissingReferenceModule {
                pm: reference_pm.to_string(),
                date: date.to_string(),
            })?;
        log::debug!(
            "Dataset {} loaded successfully with {} modules",
            date,
            modules.len()
        );
        Ok(Self {
            date: date.to_string(),
            modules,
            reference_module,
            reference_means: Means::default(),
            fit_warnings: 0,
        })
    }

    pub fn reference_module(&self) -> &Module {
        &self.modules[self.reference_module]
    }

    pub fn get_module(&self, identifier: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.identifier == identifier)
    }

    pub fn with_reference_means(mut self, means: Means) -> Self {
        self.reference_means = means;
        self
    }

    pub fn with_fit_warnings(mut self, warnings: usize) -> Self {
        self.fit_warnings = warnings;
        self
    }

    /// Produce a new Dataset by transforming every module. Module order (and thus the
    /// reference module position) is preserved.
    pub fn map_modules<F>(mut self, f: F) -> Self
    where
        F: FnMut(Module) -> Module,
    {
        self.modules = self.modules.into_iter().map(f).collect();
        self
    }

    /// Fallible version of [`Dataset::map_modules`]; the first error aborts the dataset.
    pub fn try_map_modules<F, E>(mut self, f: F) -> Result<Self, E>
    where
        F: FnMut(Module) -> Result<Module, E>,
    {
        self.modules = self
            .modules
            .into_iter()
            .map(f)
            .collect::<Result<Vec<Module>, E>>()?;
        Ok(self)
    }

    pub fn channel_count(&self) -> usize {
        self.modules.iter().map(|m| m.channels.len()).sum()
    }
}

impl Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Dataset(date={}, modules={}, reference={})",
            self.date,
            self.modules.len(),
            self.reference_module().identifier
        )
    }
}

/// Sort datasets chronologically. The first dataset afterwards is the normalization baseline.
pub fn sort_by_date(datasets: &mut [Dataset]) {
    datasets.sort_by(|a, b| a.date.cmp(&b.date));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn module(id: &str, is_ref: bool) -> Module {
        Module::new(id, Path::new("unused.txt"), is_ref, &[1]).unwrap()
    }

    #[test]
    fn test_reference_module_resolution() {
        let ds = Dataset::new(
            "2022-01-01",
            vec![module("PMA0", false), module("PMC1", true)],
            "PMC1",
        )
        .unwrap();
        assert_eq!(ds.reference_module().identifier, "PMC1");
        assert_eq!(ds.reference_means, Means::new(0.0, 0.0));
        assert_eq!(ds.fit_warnings, 0);
    }

    #[test]
    fn test_missing_reference_module() {
        let err = Dataset::new("2022-01-01", vec![module("PMA0", false)], "PMA9").unwrap_err();
        assert!(matches!(err, DatasetError::MissingReferenceModule { .. }));
        assert!(err.to_string().contains("2022-01-01"));
    }

    #[test]
    fn test_sort_by_date() {
        let mut datasets: Vec<Dataset> = ["2022-03-01", "2021-12-31", "2022-01-15"]
            .iter()
            .map(|d| Dataset::new(d, vec![module("PMA0", true)], "PMA0").unwrap())
            .collect();
        sort_by_date(&mut datasets);
        let dates: Vec<&str> = datasets.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(dates, vec!["2021-12-31", "2022-01-15", "2022-03-01"]);
    }
}
