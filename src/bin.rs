// std imports
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// 3rd party imports
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use metrics_exporter_prometheus::PrometheusBuilder;
use signal_hook::{consts::SIGINT, iterator::Signals};
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// internal imports
use transient_screen::orchestration::configuration::ScreeningConfiguration;
use transient_screen::orchestration::database_search::{ContextFileSearch, TransientDatabase};
use transient_screen::orchestration::orchestrator::{
    build_results_manager, finalize, Orchestrator,
};
use transient_screen::orchestration::progress::ProgressCounter;
use transient_screen::statistics::statistical_result::StatisticalResults;
use transient_screen::ui::progress_monitor::ProgressMonitor;

/// Target for tracing
///
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum TracingTarget {
    File,
    Terminal,
    All,
}

/// Target for metrics
///
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum MetricTarget {
    Terminal,
    Prometheus,
    All,
}

/// Log rotation values for CLI
///
#[derive(clap::ValueEnum, Clone, Debug)]
enum TracingLogRotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl From<TracingLogRotation> for Rotation {
    fn from(rotation: TracingLogRotation) -> Self {
        match rotation {
            TracingLogRotation::Minutely => Rotation::MINUTELY,
            TracingLogRotation::Hourly => Rotation::HOURLY,
            TracingLogRotation::Daily => Rotation::DAILY,
            TracingLogRotation::Never => Rotation::NEVER,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Screens all transient databases with an analysis context in the context directory.
    /// Cached databases are skipped unless overwrite is requested.
    ///
    Screen {
        /// Recompute cached databases
        #[arg(short, long, default_value = "false")]
        overwrite: bool,
        /// Number of databases processed concurrently, overrides the configuration
        #[arg(short, long)]
        workers: Option<usize>,
        /// Total number of threads shared by the workers, overrides the configuration
        #[arg(short, long)]
        threads: Option<usize>,
        /// Path to the configuration file, defaults are used if omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory with one `<database name>.json` analysis context per transient database
        context_dir: PathBuf,
        /// Directory for the cache and the result files
        result_dir: PathBuf,
    },
    /// Runs only the statistical analysis on the cached records
    ///
    Finalize {
        /// Path to the configuration file, defaults are used if omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory for the cache and the result files
        result_dir: PathBuf,
    },
    /// Prints which databases are cached and which still need processing
    ///
    CacheSummary {
        /// Path to the configuration file, defaults are used if omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory with one `<database name>.json` analysis context per transient database
        context_dir: PathBuf,
        /// Directory for the cache and the result files
        result_dir: PathBuf,
    },
    /// Prints the default configuration to stdout
    Config {},
}

#[derive(Debug, Parser)]
#[command(name = "transient-screen")]
struct Cli {
    /// Verbosity level
    /// 0 - Error
    /// 1 - Warn
    /// 2 - Info
    /// 3 - Debug
    /// > 3 - Trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Tracing target
    #[arg(short, long, value_enum, action = clap::ArgAction::Append)]
    tracing_target: Vec<TracingTarget>,
    /// Log file path
    #[arg(short, long, default_value = "./logs/transient-screen.log")]
    file: PathBuf,
    /// Log rotation
    #[arg(short, long, value_enum, default_value = "never")]
    rotation: TracingLogRotation,
    /// Metrics target
    #[arg(short, long, value_enum, action = clap::ArgAction::Append)]
    metric_target: Vec<MetricTarget>,
    /// Address for the Prometheus scrape endpoint
    #[arg(short, long, default_value = "127.0.0.1:9494")]
    prometheus: String,
    #[command(subcommand)]
    command: Commands,
}

/// Reads the configuration file or falls back to the defaults
///
fn read_configuration(config: Option<PathBuf>) -> Result<ScreeningConfiguration> {
    match config {
        Some(config) => ScreeningConfiguration::from_file(&config).context("Reading config file"),
        None => Ok(ScreeningConfiguration::default()),
    }
}

/// Names of the databases to screen
///
fn database_names(databases: &[TransientDatabase]) -> Vec<String> {
    databases
        .iter()
        .map(|database| database.name.clone())
        .collect()
}

/// Registers a SIGINT handler setting the returned flag
///
fn register_stop_flag() -> Result<Arc<AtomicBool>> {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let mut signals = Signals::new([SIGINT])?;

    let signal_stop_flag = stop_flag.clone();
    std::thread::spawn(move || {
        for sig in signals.forever() {
            if sig == SIGINT {
                info!("Gracefully stopping.");
                signal_stop_flag.store(true, Ordering::Relaxed);
            }
        }
    });
    Ok(stop_flag)
}

/// Logs the significant databases of the analysis
///
fn report(results: Option<StatisticalResults>) {
    let results = match results {
        Some(results) => results,
        None => {
            warn!("Screening was cancelled, no results written");
            return;
        }
    };
    let significant: Vec<_> = results.significant().collect();
    info!(
        "{} tests, {} significant results at alpha {}",
        results.test_count(),
        significant.len(),
        results.alpha()
    );
    for result in significant {
        info!(
            "[{}] {} ({}): p = {:e}, q = {:e}",
            result.database_name,
            result.test_name,
            result.metric_name,
            result.p_value,
            result.q_value
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let verbosity = match args.verbose {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(verbosity.into());

    // Tracing layers
    let mut tracing_indicatif_layer = None;
    let mut tracing_terminal_layer = None;
    let mut tracing_file_layer = None;

    // Tracing guards
    let mut _tracing_log_writer_guard = None;

    if args.tracing_target.contains(&TracingTarget::Terminal)
        || args.metric_target.contains(&MetricTarget::Terminal)
        || args.tracing_target.contains(&TracingTarget::All)
        || args.metric_target.contains(&MetricTarget::All)
    {
        let layer = IndicatifLayer::new()
            .with_span_child_prefix_symbol("\t")
            .with_span_child_prefix_indent("")
            .with_max_progress_bars(20, None);
        tracing_indicatif_layer = Some(layer);
    }

    if args.tracing_target.contains(&TracingTarget::Terminal)
        || args.tracing_target.contains(&TracingTarget::All)
    {
        if let Some(parent_layer) = tracing_indicatif_layer.as_ref() {
            tracing_terminal_layer = Some(
                tracing_subscriber::fmt::layer().with_writer(parent_layer.get_stderr_writer()),
            );
        }
    }

    if args.tracing_target.contains(&TracingTarget::File)
        || args.tracing_target.contains(&TracingTarget::All)
    {
        let (log_dir, log_file_name) = match (args.file.parent(), args.file.file_name()) {
            (Some(log_dir), Some(log_file_name)) => (log_dir, log_file_name),
            _ => bail!("Invalid log file path: {}", args.file.display()),
        };
        let file_appender = RollingFileAppender::new(args.rotation.into(), log_dir, log_file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_file_layer = Some(tracing_subscriber::fmt::layer().with_writer(non_blocking));
        _tracing_log_writer_guard = Some(guard);
    }

    let show_progress = tracing_indicatif_layer.is_some();

    tracing_subscriber::registry()
        .with(tracing_terminal_layer)
        .with(tracing_indicatif_layer)
        .with(tracing_file_layer)
        .with(filter)
        .init();

    if args.metric_target.contains(&MetricTarget::Prometheus)
        || args.metric_target.contains(&MetricTarget::All)
    {
        let prometheus_metrics_builder = PrometheusBuilder::new();

        // Create TCP listener for Prometheus metrics to check if port is available.
        // When Port 0 is given, the OS will choose a free port.
        let prometheus_scrape_socket_tmp = TcpListener::bind(&args.prometheus)
            .await
            .context("Creating TCP listener for Prometheus scrape endpoint")?;
        let prometheus_scrape_socket = prometheus_scrape_socket_tmp.local_addr()?;
        // Drop listener to make port available for the exporter
        drop(prometheus_scrape_socket_tmp);

        prometheus_metrics_builder
            .with_http_listener(prometheus_scrape_socket)
            .install()?;
        info!("Prometheus scrape endpoint: http://{}/metrics", prometheus_scrape_socket);
    }

    match args.command {
        Commands::Screen {
            overwrite,
            workers,
            threads,
            config,
            context_dir,
            result_dir,
        } => {
            let mut configuration = read_configuration(config)?;
            configuration.orchestration.overwrite |= overwrite;
            if let Some(workers) = workers {
                configuration.orchestration.workers = workers;
            }
            if let Some(threads) = threads {
                configuration.orchestration.total_threads = threads;
            }
            configuration.validate()?;

            let databases = ContextFileSearch::discover(&context_dir)?;
            if databases.is_empty() {
                bail!("No analysis contexts found in {}", context_dir.display());
            }
            info!("Screening {} transient databases", databases.len());

            let stop_flag = register_stop_flag()?;
            let progress = Arc::new(ProgressCounter::new());
            let mut progress_monitor = if show_progress {
                Some(ProgressMonitor::new("Screening", progress.clone(), None))
            } else {
                None
            };

            let orchestrator = Orchestrator::new(
                ContextFileSearch::new(context_dir),
                configuration,
                result_dir,
                progress,
            );
            let results = orchestrator.run(databases, stop_flag).await;

            if let Some(progress_monitor) = progress_monitor.as_mut() {
                progress_monitor.stop().await?;
            }
            report(results?);
        }
        Commands::Finalize { config, result_dir } => {
            let configuration = read_configuration(config)?;
            let stop_flag = register_stop_flag()?;
            report(finalize(&configuration, &result_dir, &stop_flag)?);
        }
        Commands::CacheSummary {
            config,
            context_dir,
            result_dir,
        } => {
            let configuration = read_configuration(config)?;
            let databases = ContextFileSearch::discover(&context_dir)?;
            let results_manager = build_results_manager(&configuration, &result_dir)?;
            let summary = results_manager.get_cache_summary(&database_names(&databases))?;
            println!(
                "{} databases, {} cached, {} need processing",
                summary.total(),
                summary.cached_count(),
                summary.needs_processing_count()
            );
            for name in summary.needs_processing.iter() {
                println!("{}", name);
            }
        }
        Commands::Config {} => {
            let new_config = ScreeningConfiguration::default();
            println!("{}", new_config.to_toml()?);
        }
    }

    Ok(())
}
