//! xwas - Exposure-wide association screening CLI
//!
//! Command-line interface for survey-weighted XWAS screening.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use survey_xwas::data::{CorrectedSet, DataDictionary, Dataset};
use survey_xwas::error::Result;
use survey_xwas::screen::{run_xwas, ScreenConfig};

/// Survey-weighted exposure-wide association screening
#[derive(Parser)]
#[command(name = "xwas")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a screen from a YAML configuration file
    Run {
        /// Path to screen configuration YAML
        #[arg(short = 'C', long)]
        config: PathBuf,

        /// Path to participant dataset TSV
        #[arg(short, long)]
        data: PathBuf,

        /// Path to data dictionary TSV
        #[arg(short = 'D', long)]
        dictionary: PathBuf,

        /// Output path for corrected results TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run a screen directly from flags
    Screen {
        /// Path to participant dataset TSV
        #[arg(short, long)]
        data: PathBuf,

        /// Path to data dictionary TSV
        #[arg(short = 'D', long)]
        dictionary: PathBuf,

        /// Outcome column name
        #[arg(short = 'y', long)]
        outcome: String,

        /// Adjustment covariate columns (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        adjust: Vec<String>,

        /// Dictionary categories to screen (comma-separated; all if omitted)
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,

        /// Exposure names to exclude (comma-separated)
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Stratum column name
        #[arg(long, default_value = "stratum")]
        stratum: String,

        /// Cluster (PSU) column name
        #[arg(long, default_value = "psu")]
        cluster: String,

        /// Sampling weight column name
        #[arg(long, default_value = "weight")]
        weight: String,

        /// FDR level for the corrected results
        #[arg(long, default_value = "0.05")]
        fdr: f64,

        /// Log-transform exposure columns before screening
        #[arg(long)]
        log_transform: bool,

        /// Output path for corrected results TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate an example screen configuration
    Example {
        /// Output path for the example YAML
        #[arg(short, long, default_value = "screen.yaml")]
        output: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            data,
            dictionary,
            output,
        } => cmd_run(&config, &data, &dictionary, &output),

        Commands::Screen {
            data,
            dictionary,
            outcome,
            adjust,
            categories,
            exclude,
            stratum,
            cluster,
            weight,
            fdr,
            log_transform,
            output,
        } => {
            let config = ScreenConfig {
                name: "screen".to_string(),
                outcome,
                adjustments: adjust,
                categories,
                exclude,
                stratum_column: stratum,
                cluster_column: cluster,
                weight_column: weight,
                fdr_level: fdr,
                log_transform,
                epsilon: survey_xwas::data::LOG_EPSILON,
            };
            cmd_screen(&config, &data, &dictionary, &output)
        }

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Run a screen from a configuration file
fn cmd_run(
    config_path: &PathBuf,
    data_path: &PathBuf,
    dictionary_path: &PathBuf,
    output_path: &PathBuf,
) -> Result<()> {
    eprintln!("Loading screen configuration from {:?}...", config_path);
    let config_str = std::fs::read_to_string(config_path)?;
    let config = ScreenConfig::from_yaml(&config_str)?;
    cmd_screen(&config, data_path, dictionary_path, output_path)
}

/// Run a configured screen end to end
fn cmd_screen(
    config: &ScreenConfig,
    data_path: &PathBuf,
    dictionary_path: &PathBuf,
    output_path: &PathBuf,
) -> Result<()> {
    eprintln!("Loading data...");
    let data = Dataset::from_tsv(data_path)?;
    let dictionary = DataDictionary::from_tsv(dictionary_path)?;

    eprintln!(
        "Loaded {} participants x {} variables, {} catalogued exposures",
        data.n_rows(),
        data.n_columns(),
        dictionary.len()
    );

    eprintln!("Running screen '{}'...", config.name);
    eprintln!("  Outcome: {}", config.outcome);
    eprintln!("  Adjustments: {}", config.adjustments.join(", "));
    eprintln!("  FDR level: {}", config.fdr_level);

    let results = run_xwas(&data, &dictionary, config)?;

    eprintln!("Writing results to {:?}...", output_path);
    results.to_tsv(output_path)?;

    report(&results);
    Ok(())
}

/// Print the post-run summary
fn report(results: &CorrectedSet) {
    eprintln!("Done!\n{}", results.summary());

    for failure in &results.failures {
        eprintln!("  no result for '{}': {}", failure.exposure, failure.reason);
    }

    match results.significance_threshold(results.fdr_level) {
        Some(threshold) => eprintln!(
            "Raw p-value threshold at FDR {}: {:.3e}",
            results.fdr_level, threshold
        ),
        None => eprintln!(
            "No exposure significant at FDR {}",
            results.fdr_level
        ),
    }

    let sorted = results.sorted_by_qvalue();
    if !sorted.is_empty() {
        eprintln!("\nTop 5 exposures:");
        for r in sorted.iter().take(5) {
            eprintln!(
                "  {}: estimate={:.3}, q={:.4} {}",
                r.exposure, r.estimate, r.q_value, r.description
            );
        }
    }
}

/// Write an example configuration file
fn cmd_example(output_path: &PathBuf) -> Result<()> {
    let config = ScreenConfig {
        name: "telomere-xwas".to_string(),
        outcome: "telomere".to_string(),
        adjustments: vec!["age".to_string(), "sex".to_string()],
        categories: vec!["heavy_metals".to_string(), "phenols".to_string()],
        exclude: vec![],
        stratum_column: "stratum".to_string(),
        cluster_column: "psu".to_string(),
        weight_column: "weight".to_string(),
        fdr_level: 0.05,
        log_transform: true,
        epsilon: survey_xwas::data::LOG_EPSILON,
    };

    std::fs::write(output_path, config.to_yaml()?)?;
    eprintln!("Wrote example configuration to {:?}", output_path);
    Ok(())
}
