//! # ageing_analysis
//!
//! ageing_analysis computes per-channel ageing factors for the photomultiplier (PM)
//! modules of the FIT detector from a series of laser calibration runs. Each run (a
//! dataset) is a set of amplitude trace files, one per PM module. A reference peak is
//! extracted from the designated reference channels, every channel's amplitude
//! distribution is fitted, and the resulting ageing factors are normalized against the
//! earliest run.
//!
//! ## Installation
//!
//! The only method of install is from source. If you have not used Rust before, see the
//! [Rust docs](https://www.rust-lang.org/tools/install) to install the tool chain.
//!
//! To build and install the CLI use `cargo install --path ./ageing_analysis_cli` from the
//! top level repository. The binary is installed to your cargo install location (typically
//! `~/.cargo/bin/`).
//!
//! ## Pipeline
//!
//! Each dataset runs through four stages, strictly in order:
//!
//! - Trace extraction ([`extractor`]): the module file is split into a noise region (the
//! first 257 bins) and a signal region. Reference channels are cropped to the first of the
//! two reference peaks found past the first 50 bins.
//! - Distribution fitting ([`fitter`]): a Gaussian mean and an intensity weighted mean for
//! every channel, retried on the noise region when the signal gives zero.
//! - Reference aggregation ([`reference`]): the average of the reference channels of the
//! reference module.
//! - Ageing factors ([`ageing`]): every channel divided by the reference means.
//!
//! Once every dataset is done, [`normalizer`] divides each ageing factor by the same
//! channel's factor in the earliest dataset. Factors which cannot be computed are reported
//! as `N/A`.
//!
//! ## Configuration
//!
//! Configurations are YAML (JSON files are accepted as well). A template can be made with
//! `ageing_analysis_cli new -p config.yaml`. The format is as follows:
//!
//! ```yml
//! basePath: null
//! inputs:
//! - date: 2022-01-01
//!   basePath: data/2022-01-01
//!   files:
//!     PMA0: PMA0.txt
//!     PMC0: PMC0.txt
//!   refCH:
//!     PM: PMA0
//!     CH:
//!     - 5
//!   validateHeader: false
//! analysis:
//!   prominence_percent: 15.0
//!   peak_merge_threshold: 5
//! ```
//!
//! Relative dataset paths are taken relative to the global `basePath`, which in turn is
//! relative to the working directory. Datasets whose directory does not exist are skipped.
//!
//! ### Trace File Format
//!
//! Trace files are colon-delimited with an optional header line. The first column is the
//! bin index followed by two amplitude columns per channel:
//!
//! ```text
//! bin:ch1a:ch1b:ch2a:ch2b
//! 0:12:11:9:10
//! ```
//!
//! ## Output
//!
//! Results are written as JSON (and optionally CSV). If no path is given, results go to
//! `ageing_analysis_results/ageing_analysis_results_<YYYYmmdd_HHMMSS>.json`:
//!
//! ```text
//! datasets
//! |---- date, reference_means
//! |---- modules
//! |    |---- identifier
//! |    |---- channels - name, means, ageing_factors
//! metadata - generated_at, version, analysis_type
//! ```
pub mod ageing;
pub mod channel;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod extractor;
pub mod fitter;
pub mod module;
pub mod normalizer;
pub mod peaks;
pub mod process;
pub mod reference;
pub mod results;
pub mod trace;
pub mod worker_status;
