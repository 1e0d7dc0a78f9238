use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::constants::{DEFAULT_PEAK_MERGE_THRESHOLD, DEFAULT_PROMINENCE_PERCENT};
use super::dataset::{sort_by_date, Dataset};
use super::error::{ConfigError, DatasetError};
use super::module::{is_valid_identifier, Module};

fn default_prominence_percent() -> f64 {
    DEFAULT_PROMINENCE_PERCENT
}

fn default_peak_merge_threshold() -> usize {
    DEFAULT_PEAK_MERGE_THRESHOLD
}

/// User tunable parameters of the reference peak search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParameters {
    #[serde(default = "default_prominence_percent")]
    pub prominence_percent: f64,
    #[serde(default = "default_peak_merge_threshold")]
    pub peak_merge_threshold: usize,
}

impl Default for AnalysisParameters {
    fn default() -> Self {
        Self {
            prominence_percent: DEFAULT_PROMINENCE_PERCENT,
            peak_merge_threshold: DEFAULT_PEAK_MERGE_THRESHOLD,
        }
    }
}

/// The reference PM and its reference channel numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceChannels {
    #[serde(rename = "PM")]
    pub pm: String,
    #[serde(rename = "CH")]
    pub channels: Vec<usize>,
}

/// One input dataset (calibration run) of the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetConfig {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub base_path: Option<PathBuf>,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    #[serde(rename = "refCH")]
    pub ref_ch: ReferenceChannels,
    #[serde(default)]
    pub validate_header: bool,
}

/// Structure representing the application configuration. Contains pathing and dataset information.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml; since YAML
/// is a superset of JSON, JSON configuration files load as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, rename = "basePath")]
    pub base_path: Option<PathBuf>,
    pub inputs: Vec<DatasetConfig>,
    #[serde(default)]
    pub analysis: AnalysisParameters,
}

impl Default for Config {
    /// Generate a template Config with a single example dataset
    fn default() -> Self {
        let mut files = BTreeMap::new();
        files.insert(String::from("PMA0"), String::from("PMA0.txt"));
        files.insert(String::from("PMC0"), String::from("PMC0.txt"));
        Self {
            base_path: None,
            inputs: vec![DatasetConfig {
                date: Some(String::from("2022-01-01")),
                base_path: Some(PathBuf::from("data/2022-01-01")),
                files,
                ref_ch: ReferenceChannels {
                    pm: String::from("PMA0"),
                    channels: vec![5],
                },
                validate_header: false,
            }],
            analysis: AnalysisParameters::default(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML (or JSON) file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Resolve the base path of a dataset.
    ///
    /// Relative paths are taken relative to the global basePath, which is itself relative
    /// to `root`. Absolute dataset paths are used as-is.
    pub fn resolve_base_path(&self, dataset: &DatasetConfig, root: &Path) -> PathBuf {
        let global = self.base_path.as_ref().map(|p| root.join(p));
        match (global, dataset.base_path.as_ref()) {
            (_, Some(path)) if path.is_absolute() => path.clone(),
            (Some(global), Some(path)) => global.join(path),
            (Some(global), None) => global,
            (None, Some(path)) => root.join(path),
            (None, None) => root.to_path_buf(),
        }
    }

    /// Build the datasets described by this config, sorted by date.
    ///
    /// Datasets whose base path does not exist are skipped with a warning. Any other
    /// problem (bad identifier, missing file, unknown reference PM) is an error.
    pub fn build_datasets(&self, root: &Path) -> Result<Vec<Dataset>, ConfigError> {
        let mut datasets = Vec::with_capacity(self.inputs.len());
        for (idx, input) in self.inputs.iter().enumerate() {
            let date = input.date.as_deref().ok_or(ConfigError::MissingDate(idx))?;
            let base_path = self.resolve_base_path(input, root);
            if !base_path.exists() {
                log::warn!(
                    "basePath {} does not exist. Skipping dataset {}.",
                    base_path.display(),
                    date
                );
                continue;
            }
            if !is_valid_identifier(&input.ref_ch.pm) {
                return Err(DatasetError::InvalidIdentifier(input.ref_ch.pm.clone()).into());
            }
            if input.validate_header {
                log::debug!("Header validation requested for dataset {date}");
            }

            let mut modules = Vec::with_capacity(input.files.len());
            for (identifier, file_name) in input.files.iter() {
                let is_reference = *identifier == input.ref_ch.pm;
                let module = Module::new(
                    identifier,
                    &base_path.join(file_name.trim()),
                    is_reference,
                    &input.ref_ch.channels,
                )?;
                module.validate_file()?;
                log::debug!("Module {identifier} loaded from {}", module.path.display());
                modules.push(module);
            }
            datasets.push(Dataset::new(date, modules, &input.ref_ch.pm)?);
        }
        sort_by_date(&mut datasets);
        if datasets.is_empty() {
            log::warn!("No valid datasets found in the configuration.");
        } else {
            log::info!("Config loaded successfully: {} datasets found.", datasets.len());
        }
        Ok(datasets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_CONFIG: &str = r#"{
        "basePath": "campaign",
        "inputs": [
            {
                "date": "2022-02-01",
                "basePath": "feb",
                "files": {"PMA0": "a0.txt", "PMC3": " c3.txt "},
                "refCH": {"PM": "PMA0", "CH": [5, 6]},
                "validateHeader": true
            },
            {
                "date": "2022-01-01",
                "basePath": "/abs/jan",
                "files": {"PMA0": "a0.txt"},
                "refCH": {"PM": "PMA0", "CH": [5]}
            }
        ]
    }"#;

    #[test]
    fn test_parse_json_config() {
        let config: Config = serde_yaml::from_str(JSON_CONFIG).unwrap();
        assert_eq!(config.inputs.len(), 2);
        assert_eq!(config.base_path, Some(PathBuf::from("campaign")));
        assert_eq!(config.inputs[0].ref_ch.channels, vec![5, 6]);
        assert!(config.inputs[0].validate_header);
        assert!(!config.inputs[1].validate_header);
        assert_eq!(config.analysis, AnalysisParameters::default());
        assert_eq!(config.analysis.prominence_percent, 15.0);
        assert_eq!(config.analysis.peak_merge_threshold, 5);
    }

    #[test]
    fn test_resolve_base_path() {
        let config: Config = serde_yaml::from_str(JSON_CONFIG).unwrap();
        let root = Path::new("/work");
        assert_eq!(
            config.resolve_base_path(&config.inputs[0], root),
            PathBuf::from("/work/campaign/feb")
        );
        assert_eq!(
            config.resolve_base_path(&config.inputs[1], root),
            PathBuf::from("/abs/jan")
        );
    }

    #[test]
    fn test_template_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("refCH"));
        assert!(yaml.contains("basePath"));
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_missing_base_path_skips_dataset() {
        let config: Config = serde_yaml::from_str(JSON_CONFIG).unwrap();
        let datasets = config
            .build_datasets(Path::new("/definitely/not/a/real/root"))
            .unwrap();
        assert!(datasets.is_empty());
    }

    #[test]
    fn test_missing_date() {
        let mut config: Config = serde_yaml::from_str(JSON_CONFIG).unwrap();
        config.inputs[0].date = None;
        assert!(matches!(
            config.build_datasets(Path::new("/")),
            Err(ConfigError::MissingDate(0))
        ));
    }

    #[test]
    fn test_missing_config_file() {
        assert!(matches!(
            Config::read_config_file(Path::new("/no/such/config.yaml")),
            Err(ConfigError::BadFilePath(_))
        ));
    }
}
