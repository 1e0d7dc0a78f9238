// Trace layout of the PM amplitude files
pub const NOISE_REGION_ROWS: usize = 257; // Bins 0..257 hold the pedestal/noise region
pub const FILE_DELIMITER: char = ':';

// Reference channel peak search
pub const REFERENCE_SKIP_SAMPLES: usize = 50; // The primary high-intensity peak sits in here
pub const DEFAULT_PROMINENCE_PERCENT: f64 = 15.0;
pub const DEFAULT_PEAK_MERGE_THRESHOLD: usize = 5;
pub const EXPECTED_REFERENCE_PEAKS: usize = 2;

// Gaussian fitting, matching the MINPACK defaults
pub const FIT_TOLERANCE: f64 = 1.49012e-8;
pub const FIT_PARAMETERS: usize = 3;
pub const FIT_MAX_EVALUATIONS: usize = 200 * (FIT_PARAMETERS + 1);

/// String used in results wherever a statistic could not be computed
pub const NOT_AVAILABLE: &str = "N/A";

/// Version tag written into result files
pub const RESULTS_FORMAT_VERSION: &str = "1.0.0";
pub const RESULTS_ANALYSIS_TYPE: &str = "ageing_analysis";
pub const DEFAULT_RESULTS_DIRECTORY: &str = "ageing_analysis_results";
