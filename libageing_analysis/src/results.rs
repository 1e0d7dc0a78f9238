use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

use super::channel::{AgeingFactors, Channel, Factor, Means};
use super::constants::{
    DEFAULT_RESULTS_DIRECTORY, NOT_AVAILABLE, RESULTS_ANALYSIS_TYPE, RESULTS_FORMAT_VERSION,
};
use super::dataset::Dataset;
use super::error::ResultsError;

/// A result block which is either present or written as "N/A"
#[derive(Debug, Clone, PartialEq)]
pub enum Reported<T> {
    Value(T),
    NotAvailable,
}

impl<T: Serialize> Serialize for Reported<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => v.serialize(serializer),
            Self::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Reported<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw<T> {
            Value(T),
            Text(String),
        }
        match Raw::<T>::deserialize(deserializer)? {
            Raw::Value(v) => Ok(Self::Value(v)),
            Raw::Text(_) => Ok(Self::NotAvailable),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelResult {
    pub name: String,
    pub means: Reported<Means>,
    pub ageing_factors: Reported<AgeingFactors>,
}

impl From<&Channel> for ChannelResult {
    fn from(channel: &Channel) -> Self {
        if channel.means.has_nan() {
            Self {
                name: channel.name.clone(),
                means: Reported::NotAvailable,
                ageing_factors: Reported::NotAvailable,
            }
        } else {
            Self {
                name: channel.name.clone(),
                means: Reported::Value(channel.means),
                ageing_factors: Reported::Value(channel.factors),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    pub identifier: String,
    pub channels: Vec<ChannelResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetResult {
    pub date: String,
    pub reference_means: Means,
    pub modules: Vec<ModuleResult>,
}

impl From<&Dataset> for DatasetResult {
    fn from(dataset: &Dataset) -> Self {
        Self {
            date: dataset.date.clone(),
            reference_means: dataset.reference_means,
            modules: dataset
                .modules
                .iter()
                .map(|module| ModuleResult {
                    identifier: module.identifier.clone(),
                    channels: module.channels.iter().map(ChannelResult::from).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub generated_at: String,
    pub version: String,
    pub analysis_type: String,
}

/// The complete results document written after a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub datasets: Vec<DatasetResult>,
    pub metadata: Metadata,
}

impl AnalysisResults {
    pub fn from_datasets(datasets: &[Dataset]) -> Result<Self, ResultsError> {
        Ok(Self {
            datasets: datasets.iter().map(DatasetResult::from).collect(),
            metadata: Metadata {
                generated_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
                version: String::from(RESULTS_FORMAT_VERSION),
                analysis_type: String::from(RESULTS_ANALYSIS_TYPE),
            },
        })
    }
}

/// One flattened CSV row per (date, module, channel)
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    date: &'a str,
    module: &'a str,
    channel: &'a str,
    gaussian_mean: Factor,
    weighted_mean: Factor,
    gaussian_ageing_factor: Factor,
    weighted_ageing_factor: Factor,
    normalized_gauss_ageing_factor: Factor,
    normalized_weighted_ageing_factor: Factor,
}

/// The default results path, `ageing_analysis_results/ageing_analysis_results_<timestamp>.json`
/// below `root`
pub fn default_output_path(root: &Path) -> Result<PathBuf, ResultsError> {
    let stamp = OffsetDateTime::now_utc()
        .format(format_description!("[year][month][day]_[hour][minute][second]"))?;
    Ok(root
        .join(DEFAULT_RESULTS_DIRECTORY)
        .join(format!("{RESULTS_ANALYSIS_TYPE}_results_{stamp}.json")))
}

fn create_parent(path: &Path) -> Result<(), ResultsError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write the results of a run as JSON. Returns the path written to.
pub fn save_results(datasets: &[Dataset], path: Option<&Path>) -> Result<PathBuf, ResultsError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_output_path(&std::env::current_dir()?)?,
    };
    create_parent(&path)?;
    let results = AnalysisResults::from_datasets(datasets)?;
    let file = std::fs::File::create(&path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &results)?;
    log::info!("Results saved to {}", path.display());
    Ok(path)
}

/// Load a previously written results document
pub fn load_results(path: &Path) -> Result<AnalysisResults, ResultsError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Write one CSV row per channel of every dataset
pub fn export_csv(results: &AnalysisResults, path: &Path) -> Result<(), ResultsError> {
    create_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    let mut rows = 0;
    for dataset in results.datasets.iter() {
        for module in dataset.modules.iter() {
            for channel in module.channels.iter() {
                let (gaussian_mean, weighted_mean) = match &channel.means {
                    Reported::Value(m) => (
                        Factor::from_value(m.gaussian_mean),
                        Factor::from_value(m.weighted_mean),
                    ),
                    Reported::NotAvailable => (Factor::NotAvailable, Factor::NotAvailable),
                };
                let factors = match &channel.ageing_factors {
                    Reported::Value(f) => *f,
                    Reported::NotAvailable => AgeingFactors {
                        gaussian_ageing_factor: Factor::NotAvailable,
                        weighted_ageing_factor: Factor::NotAvailable,
                        normalized_gauss_ageing_factor: Factor::NotAvailable,
                        normalized_weighted_ageing_factor: Factor::NotAvailable,
                    },
                };
                writer.serialize(CsvRow {
                    date: &dataset.date,
                    module: &module.identifier,
                    channel: &channel.name,
                    gaussian_mean,
                    weighted_mean,
                    gaussian_ageing_factor: factors.gaussian_ageing_factor,
                    weighted_ageing_factor: factors.weighted_ageing_factor,
                    normalized_gauss_ageing_factor: factors.normalized_gauss_ageing_factor,
                    normalized_weighted_ageing_factor: factors.normalized_weighted_ageing_factor,
                })?;
                rows += 1;
            }
        }
    }
    writer.flush()?;
    log::info!("Exported {rows} channel rows to {}", path.display());
    Ok(())
}

/// Per-dataset overview of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub date: String,
    pub reference_means: Means,
    pub channels: usize,
    pub normalized_channels: usize,
    pub fit_warnings: usize,
}

impl Display for DatasetSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: reference gaussian {:.3}, reference weighted {:.3}, {}/{} channels normalized, {} fit warnings",
            self.date,
            self.reference_means.gaussian_mean,
            self.reference_means.weighted_mean,
            self.normalized_channels,
            self.channels,
            self.fit_warnings
        )
    }
}

pub fn summarize(datasets: &[Dataset]) -> Vec<DatasetSummary> {
    datasets
        .iter()
        .map(|dataset| {
            let channels = dataset.modules.iter().flat_map(|m| m.channels.iter());
            DatasetSummary {
                date: dataset.date.clone(),
                reference_means: dataset.reference_means,
                channels: dataset.channel_count(),
                normalized_channels: channels
                    .filter(|ch| {
                        ch.factors.normalized_gauss_ageing_factor.is_available()
                            && ch.factors.normalized_weighted_ageing_factor.is_available()
                    })
                    .count(),
                fit_warnings: dataset.fit_warnings,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;
    use ndarray::array;

    fn finished_dataset() -> Dataset {
        let good = Channel::new(1, array![1.0], array![1.0], false)
            .with_means(Means::new(110.0, 105.0))
            .with_ageing_factors(Factor::Value(1.1), Factor::Value(1.05))
            .with_normalized_factors(Factor::Value(1.0), Factor::NotAvailable);
        let failed = Channel::new(2, array![1.0], array![1.0], false)
            .with_means(Means::new(f64::NAN, 3.0));
        let module = Module::new("PMA0", Path::new("pma0.txt"), true, &[])
            .unwrap()
            .with_channels(vec![good, failed]);
        Dataset::new("2022-01-01", vec![module], "PMA0")
            .unwrap()
            .with_reference_means(Means::new(100.0, 100.0))
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("ageing_results_test_{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_channel_result_json() {
        let ds = finished_dataset();
        let result = DatasetResult::from(&ds);
        let json = serde_json::to_value(&result).unwrap();
        let channels = &json["modules"][0]["channels"];
        assert_eq!(channels[0]["name"], "CH01");
        assert_eq!(channels[0]["means"]["gaussian_mean"], 110.0);
        assert_eq!(channels[0]["ageing_factors"]["gaussian_ageing_factor"], 1.1);
        assert_eq!(
            channels[0]["ageing_factors"]["normalized_weighted_ageing_factor"],
            "N/A"
        );
        assert_eq!(channels[1]["means"], "N/A");
        assert_eq!(channels[1]["ageing_factors"], "N/A");
        assert_eq!(json["reference_means"]["weighted_mean"], 100.0);
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("results.json");
        let written = save_results(&[finished_dataset()], Some(&path)).unwrap();
        assert_eq!(written, path);
        let loaded = load_results(&path).unwrap();
        assert_eq!(loaded.metadata.version, RESULTS_FORMAT_VERSION);
        assert_eq!(loaded.metadata.analysis_type, RESULTS_ANALYSIS_TYPE);
        assert_eq!(loaded.datasets, vec![DatasetResult::from(&finished_dataset())]);
    }

    #[test]
    fn test_export_csv() {
        let path = temp_path("results.csv");
        let results = AnalysisResults::from_datasets(&[finished_dataset()]).unwrap();
        export_csv(&results, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("date,module,channel,gaussian_mean"));
        assert_eq!(lines[1], "2022-01-01,PMA0,CH01,110.0,105.0,1.1,1.05,1.0,N/A");
        assert_eq!(lines[2], "2022-01-01,PMA0,CH02,N/A,N/A,N/A,N/A,N/A,N/A");
    }

    #[test]
    fn test_default_output_path() {
        let path = default_output_path(Path::new("/work")).unwrap();
        assert!(path.starts_with("/work/ageing_analysis_results"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("ageing_analysis_results_"));
        assert!(name.ends_with(".json"));
        // YYYYmmdd_HHMMSS
        assert_eq!(name.len(), "ageing_analysis_results_".len() + 15 + ".json".len());
    }

    #[test]
    fn test_summary() {
        let summary = summarize(&[finished_dataset().with_fit_warnings(1)]);
        assert_eq!(summary[0].channels, 2);
        assert_eq!(summary[0].normalized_channels, 0);
        assert_eq!(summary[0].fit_warnings, 1);
        let line = summary[0].to_string();
        assert!(line.starts_with("2022-01-01"));
        assert!(line.ends_with("0/2 channels normalized, 1 fit warnings"));
    }
}
