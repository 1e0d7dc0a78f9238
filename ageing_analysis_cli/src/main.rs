use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use libageing_analysis::config::Config;
use libageing_analysis::process::process;
use libageing_analysis::results::{export_csv, save_results, summarize, AnalysisResults};

const LOG_FILE: &str = "ageing_analysis.log";

fn make_template_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

fn init_logging(
    pb_manager: &MultiProgress,
    verbose: bool,
    log_file: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> = vec![simplelog::TermLogger::new(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )];
    if log_file {
        loggers.push(simplelog::WriteLogger::new(
            simplelog::LevelFilter::Debug,
            simplelog::Config::default(),
            File::create(LOG_FILE)?,
        ));
    }
    let logger = simplelog::CombinedLogger::new(loggers);
    LogWrapper::new(pb_manager.clone(), *logger).try_init()?;
    log::set_max_level(simplelog::LevelFilter::Debug);
    Ok(())
}

fn build_cli() -> Command {
    Command::new("ageing_analysis_cli")
        .about("Compute FIT PM channel ageing factors from laser calibration runs")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Path of the JSON results file"),
        )
        .arg(
            Arg::new("csv")
                .long("csv")
                .help("Also export the results as CSV to this path"),
        )
        .arg(
            Arg::new("prominence-percent")
                .long("prominence-percent")
                .value_parser(value_parser!(f64))
                .help("Reference peak prominence as a percentage of the maximum"),
        )
        .arg(
            Arg::new("peak-merge-threshold")
                .long("peak-merge-threshold")
                .value_parser(value_parser!(usize))
                .help("Maximum base distance (in samples) for merging split peaks"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Print debug messages to the terminal"),
        )
}

/// The config path, given either before or after the `new` subcommand
fn config_path(matches: &ArgMatches) -> Option<PathBuf> {
    matches
        .subcommand_matches("new")
        .and_then(|m| m.get_one::<String>("path"))
        .or_else(|| matches.get_one::<String>("path"))
        .map(PathBuf::from)
}

/// Only an analysis run writes the detailed log file
fn writes_log_file(matches: &ArgMatches) -> bool {
    matches.subcommand_matches("new").is_none()
}

fn main() {
    // Create a cli
    let matches = build_cli().get_matches();

    // Initialize feedback
    let pb_manager = MultiProgress::new();
    if let Err(e) = init_logging(
        &pb_manager,
        matches.get_flag("verbose"),
        writes_log_file(&matches),
    ) {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }

    // Parse the cli
    let config_path = match config_path(&matches) {
        Some(p) => p,
        None => {
            log::error!("A configuration path is required (-p/--path)");
            return;
        }
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => log::info!("Done."),
            Err(e) => log::error!("Could not write template config: {e}"),
        }
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let mut config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    if let Some(percent) = matches.get_one::<f64>("prominence-percent") {
        config.analysis.prominence_percent = *percent;
    }
    if let Some(threshold) = matches.get_one::<usize>("peak-merge-threshold") {
        config.analysis.peak_merge_threshold = *threshold;
    }
    log::info!("Config successfully loaded.");
    log::info!("Datasets: {}", config.inputs.len());
    log::info!(
        "Prominence: {}% Merge threshold: {}",
        config.analysis.prominence_percent,
        config.analysis.peak_merge_threshold
    );

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(100));
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}") {
        pb.set_style(style);
    }
    let (tx, rx) = channel();
    let cancel = Arc::new(AtomicBool::new(false));
    // Spawn the task!
    let handle = std::thread::spawn(move || process(config, tx, cancel));

    loop {
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(status) => {
                pb.set_position((status.progress * 100.0) as u64);
                pb.set_message(format!("{} {}", status.dataset, status.stage));
            }
            Err(RecvTimeoutError::Timeout) => (),
            // The worker drops its sender when it returns
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    pb.finish();

    let datasets = match handle.join() {
        Ok(Ok(datasets)) => datasets,
        Ok(Err(e)) => {
            log::error!("Analysis failed with error: {e}");
            log::error!("See {LOG_FILE} for details.");
            return;
        }
        Err(_) => {
            log::error!("Failed to join analysis task!");
            return;
        }
    };

    for summary in summarize(&datasets) {
        log::info!("{summary}");
    }

    let output = matches.get_one::<String>("output").map(PathBuf::from);
    if let Err(e) = save_results(&datasets, output.as_deref()) {
        log::error!("Could not save results: {e}");
        return;
    }

    if let Some(csv_path) = matches.get_one::<String>("csv") {
        let written = AnalysisResults::from_datasets(&datasets)
            .and_then(|results| export_csv(&results, Path::new(csv_path)));
        if let Err(e) = written {
            log::error!("Could not export CSV: {e}");
        }
    }

    log::info!("Done.");
}
