//! orders-etl CLI - Clean and enrich CSV order exports
//!
//! ```bash
//! orders-etl run                        # eu_orders.csv -> eu_orders_clean.csv
//! orders-etl run data.csv -o out.csv    # explicit paths
//! orders-etl preview data.csv           # first rows as JSON
//! orders-etl config                     # effective configuration
//! orders-etl sample                     # write a sample eu_orders.csv
//! ```
//!
//! Exit codes: `0` success, `2` input file not found, `1` any other error.

use clap::{Parser, Subcommand};
use orders_etl::config::split_codes;
use orders_etl::logs::{log_error, log_warning, LogFormat, LOG_SINK};
use orders_etl::transform::pipeline::DEFAULT_INPUT;
use orders_etl::{
    parse_file, run, sample, ConfigOverrides, EtlConfig, InvalidAmountPolicy, PipelineError,
    RunOptions,
};
use std::error::Error;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "orders-etl", version)]
#[command(about = "Deduplicate, filter and enrich CSV order exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Progress output format (text, json)
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline: load, transform, save
    Run {
        /// Input CSV file
        #[arg(default_value = DEFAULT_INPUT)]
        input: PathBuf,

        /// Output CSV file (default: <input stem>_clean.csv next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,

        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Rows to preview before and after transforming
        #[arg(long, default_value = "5")]
        preview: usize,
    },

    /// Parse a CSV file and print its first rows as JSON
    Preview {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Number of rows
        #[arg(short = 'n', long, default_value = "5")]
        rows: usize,
    },

    /// Print the effective configuration as JSON
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Write a sample input file
    Sample {
        /// Destination file
        #[arg(default_value = DEFAULT_INPUT)]
        path: PathBuf,
    },
}

#[derive(clap::Args)]
struct ConfigArgs {
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Allowed country codes, comma-separated (e.g. DE,FR)
    #[arg(long)]
    allow_list: Option<String>,

    /// VAT rate as a fraction (0.19 = 19%)
    #[arg(long)]
    vat_rate: Option<f64>,

    /// Amount above which an order is high value
    #[arg(long)]
    high_value_threshold: Option<f64>,

    /// Email used when an order has none
    #[arg(long)]
    default_email: Option<String>,

    /// Rows with an unparseable amount: drop or keep
    #[arg(long)]
    invalid_amount: Option<InvalidAmountPolicy>,

    /// CSV delimiter (auto-detect if not specified)
    #[arg(short, long)]
    delimiter: Option<char>,
}

impl ConfigArgs {
    /// Defaults, then the config file, then the environment, then flags.
    fn resolve(&self) -> Result<EtlConfig, PipelineError> {
        let overrides = ConfigOverrides {
            allow_list: self.allow_list.as_deref().map(split_codes),
            vat_rate: self.vat_rate,
            high_value_threshold: self.high_value_threshold,
            default_email: self.default_email.clone(),
            invalid_amount: self.invalid_amount,
            delimiter: self.delimiter,
        };
        let lookup = |key: &str| std::env::var(key).ok();
        Ok(EtlConfig::resolve(self.config.as_deref(), lookup, overrides)?)
    }
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    LOG_SINK.set_quiet(cli.quiet);
    LOG_SINK.set_format(cli.log_format);

    let result = match cli.command {
        Commands::Run {
            input,
            output,
            config,
            report,
            preview,
        } => cmd_run(input, output, &config, report.as_deref(), preview),

        Commands::Preview {
            input,
            delimiter,
            rows,
        } => cmd_preview(&input, delimiter, rows),

        Commands::Config { config } => cmd_config(&config),

        Commands::Sample { path } => cmd_sample(&path),
    };

    if let Err(e) = result {
        let code = match e.downcast_ref::<PipelineError>() {
            Some(PipelineError::SourceNotFound(path)) => {
                log_warning(format!(
                    "No {} found. Create it first (e.g. `orders-etl sample`).",
                    path.display()
                ));
                2
            }
            Some(err) => {
                log_error(format!("Error: {}", err));
                err.exit_code()
            }
            None => {
                log_error(format!("Error: {}", e));
                1
            }
        };
        std::process::exit(code);
    }
}

fn cmd_run(
    input: PathBuf,
    output: Option<PathBuf>,
    config: &ConfigArgs,
    report_path: Option<&Path>,
    preview_rows: usize,
) -> Result<(), Box<dyn Error>> {
    let config = config.resolve()?;
    let options = RunOptions {
        input,
        output,
        preview_rows,
    };

    let report = run(&options, &config)?;

    eprintln!("\n📊 Summary ({})", report.run_id);
    eprintln!("   Read:     {}", report.rows_read);
    eprintln!("   Written:  {}", report.rows_written);
    eprintln!("   Excluded: {}", report.excluded_count());
    for (reason, count) in &report.excluded_by_reason {
        eprintln!("     - {}: {}", reason, count);
    }

    if let Some(path) = report_path {
        report.write_json(path)?;
        eprintln!("💾 Report written to: {}", path.display());
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_preview(input: &Path, delimiter: Option<char>, rows: usize) -> Result<(), Box<dyn Error>> {
    if !input.exists() {
        return Err(PipelineError::SourceNotFound(input.to_path_buf()).into());
    }
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_file(input, delimiter)?;
    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        match result.delimiter {
            '\t' => "\\t".to_string(),
            c => c.to_string(),
        },
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.rows.len());

    let json = serde_json::to_string_pretty(&result.records_as_json(rows))?;
    println!("{}", json);
    Ok(())
}

fn cmd_config(config: &ConfigArgs) -> Result<(), Box<dyn Error>> {
    let config = config.resolve()?;
    println!("{}", config.to_json()?);
    Ok(())
}

fn cmd_sample(path: &Path) -> Result<(), Box<dyn Error>> {
    sample::write_sample(path)?;
    eprintln!("💾 Sample written to: {}", path.display());
    Ok(())
}
