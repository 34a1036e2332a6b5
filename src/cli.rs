//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvAdapter, FILE_SUFFIX};
use crate::adapters::csv_report_adapter::{self, CsvReportAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::analysis::{AnalysisConfig, AnalysisReport, VolatilityBasis, run_analysis};
use crate::domain::config_validation::{
    parse_date, validate_analysis_config, validate_data_config, validate_model_config,
};
use crate::domain::error::RiskcastError;
use crate::domain::optimizer::SolverSettings;
use crate::domain::price::PriceSeries;
use crate::domain::returns::build_return_table;
use crate::domain::summary::{DEFAULT_MA_WINDOW, PriceSummary, moving_average};
use crate::domain::universe::{load_universe, parse_tickers};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_CSV_DIR: &str = "data";

#[derive(Parser, Debug)]
#[command(
    name = "riskcast",
    about = "Minimum-variance portfolio optimizer with volatility forecasting"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Optimize a portfolio and forecast its next-period volatility
    Analyze {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Comma-separated tickers, overriding [analysis] tickers
        #[arg(long)]
        tickers: Option<String>,
        /// Analyze a single price file instead of the configured source
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Report directory, overriding [report] output_dir
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Summary statistics and moving average of one price file
    Describe {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MA_WINDOW)]
        window: usize,
        /// Write date, close and moving average to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Copy CSV price files into the SQLite price store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        tickers: Option<String>,
    },
    /// Show the date range held for each ticker
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Analyze {
            config,
            tickers,
            csv,
            output,
        } => run_analyze(
            config.as_deref(),
            tickers.as_deref(),
            csv.as_deref(),
            output.as_deref(),
        ),
        Command::Describe {
            csv,
            window,
            output,
        } => run_describe(&csv, window, output.as_deref()),
        Command::Import { config, tickers } => run_import(&config, tickers.as_deref()),
        Command::Info { config, ticker } => run_info(&config, ticker.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, RiskcastError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

/// Model settings from `[optimizer]` and `[forecast]`, defaults for absent keys.
pub fn build_analysis_config(config: &dyn ConfigPort) -> Result<AnalysisConfig, RiskcastError> {
    validate_model_config(config)?;
    let defaults = AnalysisConfig::default();

    let basis = match config.get_string("forecast", "basis") {
        Some(raw) => raw.parse::<VolatilityBasis>()?,
        None => defaults.basis,
    };

    Ok(AnalysisConfig {
        volatility_window: config.get_int(
            "forecast",
            "volatility_window",
            defaults.volatility_window as i64,
        ) as usize,
        feature_window: config.get_int("forecast", "feature_window", defaults.feature_window as i64)
            as usize,
        basis,
        solver: SolverSettings {
            tolerance: config.get_double("optimizer", "tolerance", defaults.solver.tolerance),
            max_iterations: config.get_int(
                "optimizer",
                "max_iterations",
                defaults.solver.max_iterations as i64,
            ) as usize,
        },
    })
}

/// Tickers from the command line, else from `[analysis] tickers`.
pub fn resolve_tickers(
    ticker_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, RiskcastError> {
    if let Some(list) = ticker_override {
        return Ok(parse_tickers(list)?);
    }
    match config.get_string("analysis", "tickers") {
        Some(list) => Ok(parse_tickers(&list)?),
        None => Err(RiskcastError::ConfigMissing {
            section: "analysis".into(),
            key: "tickers".into(),
        }),
    }
}

fn csv_dir(config: &dyn ConfigPort) -> PathBuf {
    PathBuf::from(
        config
            .get_string("data", "csv_dir")
            .unwrap_or_else(|| DEFAULT_CSV_DIR.to_string()),
    )
}

/// The price source selected by `[data] source`.
pub fn build_data_port(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, RiskcastError> {
    validate_data_config(config)?;
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string())
        .to_lowercase();

    if source == "sqlite" {
        #[cfg(feature = "sqlite")]
        {
            let adapter = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?;
            adapter.initialize_schema()?;
            return Ok(Box::new(adapter));
        }
        #[cfg(not(feature = "sqlite"))]
        {
            return Err(RiskcastError::DataSource {
                reason: "sqlite feature is required for source = sqlite".into(),
            });
        }
    }

    Ok(Box::new(CsvAdapter::new(csv_dir(config))))
}

/// Loads prices for `tickers`, builds returns and runs the analysis.
pub fn run_analysis_pipeline(
    data_port: &dyn DataPort,
    tickers: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
    analysis_config: &AnalysisConfig,
) -> Result<AnalysisReport, RiskcastError> {
    eprintln!(
        "Loading {} tickers, {} to {}...",
        tickers.len(),
        start_date,
        end_date
    );
    let universe = load_universe(data_port, tickers, start_date, end_date)?;
    for series in &universe.series {
        eprintln!("  {}: {} bars [OK]", series.ticker, series.len());
    }
    for skipped in &universe.skipped {
        eprintln!("  {}: skipped ({:?})", skipped.ticker, skipped.reason);
    }

    let table = build_return_table(&universe.series)?;
    eprintln!(
        "Optimizing {} assets over {} aligned returns",
        table.n_assets(),
        table.n_observations()
    );
    run_analysis(&table, analysis_config)
}

/// Single-asset analysis of one price file, named after the file.
pub fn analyze_csv_file(
    path: &Path,
    analysis_config: &AnalysisConfig,
) -> Result<AnalysisReport, RiskcastError> {
    let ticker = ticker_from_path(path);
    eprintln!("Reading {} as {}", path.display(), ticker);
    let bars = CsvAdapter::read_file(path, &ticker)?;
    if bars.is_empty() {
        return Err(RiskcastError::NoData { ticker });
    }
    let series = PriceSeries::new(ticker, bars);
    let table = build_return_table(std::slice::from_ref(&series))?;
    run_analysis(&table, analysis_config)
}

/// File stem without the `_stock_data` suffix, uppercased.
pub fn ticker_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = FILE_SUFFIX.trim_end_matches(".csv");
    stem.strip_suffix(suffix).unwrap_or(&stem).to_uppercase()
}

fn run_analyze(
    config_path: Option<&Path>,
    ticker_override: Option<&str>,
    csv_path: Option<&Path>,
    output_override: Option<&Path>,
) -> Result<(), RiskcastError> {
    let config = match config_path {
        Some(path) => load_config(path)?,
        None => FileConfigAdapter::empty(),
    };
    let analysis_config = build_analysis_config(&config)?;

    let report = match csv_path {
        Some(path) => analyze_csv_file(path, &analysis_config)?,
        None => {
            if config_path.is_none() {
                return Err(RiskcastError::invalid("analyze needs --config or --csv"));
            }
            validate_analysis_config(&config)?;
            let tickers = resolve_tickers(ticker_override, &config)?;
            let start_date = parse_date(&config, "start_date")?;
            let end_date = parse_date(&config, "end_date")?;
            let data_port = build_data_port(&config)?;
            run_analysis_pipeline(
                data_port.as_ref(),
                &tickers,
                start_date,
                end_date,
                &analysis_config,
            )?
        }
    };

    print_report(&report, &analysis_config);

    let output_dir = output_override
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("report", "output_dir").map(PathBuf::from));
    if let Some(dir) = output_dir {
        let written = CsvReportAdapter.write(&report, &dir)?;
        for path in written {
            eprintln!("Report written to: {}", path.display());
        }
    }
    Ok(())
}

fn print_report(report: &AnalysisReport, config: &AnalysisConfig) {
    let opt = &report.optimization;

    println!("=== Optimal Portfolio Weights ===");
    for (ticker, weight) in report.weights() {
        println!("  {:<10} {:.4}", ticker, weight);
    }
    println!();
    println!(
        "Expected Return:  {:.4} (~{:.2}% per day)",
        opt.expected_return,
        opt.expected_return * 100.0
    );
    println!(
        "Risk (Variance):  {:.6} (~{:.2}% daily std dev)",
        opt.risk,
        opt.daily_std() * 100.0
    );

    println!();
    println!(
        "=== Rolling Volatility ({} basis, window {}) ===",
        report.basis, config.volatility_window
    );
    println!("Points:           {}", report.volatility.len());
    if let Some(last) = report.volatility.last() {
        println!("Latest ({}): {:.4}", last.date, last.value);
    }

    println!();
    println!("=== Forecast ===");
    println!("Next-Period Volatility: {:.4}", report.forecast);
}

fn run_describe(path: &Path, window: usize, output: Option<&Path>) -> Result<(), RiskcastError> {
    let ticker = ticker_from_path(path);
    let bars = CsvAdapter::read_file(path, &ticker)?;
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let summary = PriceSummary::describe(&closes)?;
    let average = moving_average(&closes, window);

    println!("Summary statistics for {} (Close):", ticker);
    println!("  count  {}", summary.count);
    for (label, value) in [
        ("mean", summary.mean),
        ("std", summary.std),
        ("min", summary.min),
        ("25%", summary.q25),
        ("50%", summary.median),
        ("75%", summary.q75),
        ("max", summary.max),
    ] {
        println!("  {:<6} {:.4}", label, value);
    }
    match average.last() {
        Some(latest) => println!("  MA{:<4} {:.4} (latest)", window, latest),
        None => eprintln!("Not enough rows for a {window}-day moving average"),
    }

    if let Some(out) = output {
        csv_report_adapter::write_price_table(out, &bars, &average)?;
        eprintln!("Analyzed data saved to {}", out.display());
    }
    Ok(())
}

fn run_import(config_path: &Path, ticker_override: Option<&str>) -> Result<(), RiskcastError> {
    let config = load_config(config_path)?;
    let source = CsvAdapter::new(csv_dir(&config));
    let tickers = match ticker_override.or(config.get_string("analysis", "tickers").as_deref()) {
        Some(list) => parse_tickers(list)?,
        None => source.list_tickers()?,
    };

    #[cfg(feature = "sqlite")]
    {
        let store = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(&config)?;
        store.initialize_schema()?;
        let imported = import_prices(&source, &store, &tickers)?;
        eprintln!("Imported {imported} bars for {} tickers", tickers.len());
        Ok(())
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (source, tickers);
        Err(RiskcastError::DataSource {
            reason: "sqlite feature is required for import".into(),
        })
    }
}

/// Copies every bar of `tickers` from the CSV directory into the store.
#[cfg(feature = "sqlite")]
pub fn import_prices(
    source: &CsvAdapter,
    store: &crate::adapters::sqlite_adapter::SqliteAdapter,
    tickers: &[String],
) -> Result<usize, RiskcastError> {
    let mut total = 0;
    for ticker in tickers {
        let bars = CsvAdapter::read_file(&source.csv_path(ticker), ticker)?;
        let written = store.insert_bars(&bars)?;
        eprintln!("  {}: {} bars imported", ticker, written);
        total += written;
    }
    Ok(total)
}

fn run_info(config_path: &Path, ticker: Option<&str>) -> Result<(), RiskcastError> {
    let config = load_config(config_path)?;
    let data_port = build_data_port(&config)?;

    let tickers = match ticker {
        Some(t) => vec![t.trim().to_uppercase()],
        None => data_port.list_tickers()?,
    };
    if tickers.is_empty() {
        eprintln!("No tickers found");
    }

    for t in &tickers {
        match data_port.get_data_range(t)? {
            Some((first, last, count)) => {
                println!("{}: {} bars, {} to {}", t, count, first, last);
            }
            None => eprintln!("{}: no data found", t),
        }
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), RiskcastError> {
    let config = load_config(config_path)?;
    validate_data_config(&config)?;
    validate_analysis_config(&config)?;
    let analysis_config = build_analysis_config(&config)?;

    eprintln!(
        "\nSource:     {}",
        config
            .get_string("data", "source")
            .unwrap_or_else(|| "csv".to_string())
    );
    if let Some(list) = config.get_string("analysis", "tickers") {
        eprintln!("Tickers:    {}", parse_tickers(&list)?.join(", "));
    }
    eprintln!(
        "Range:      {} to {}",
        parse_date(&config, "start_date")?,
        parse_date(&config, "end_date")?
    );
    eprintln!(
        "Solver:     tolerance {:e}, max {} iterations",
        analysis_config.solver.tolerance, analysis_config.solver.max_iterations
    );
    eprintln!(
        "Forecast:   volatility window {}, feature window {}, {} basis",
        analysis_config.volatility_window, analysis_config.feature_window, analysis_config.basis
    );

    eprintln!("\nConfiguration is valid.");
    Ok(())
}
