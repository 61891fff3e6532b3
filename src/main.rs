//! Device Identity CLI
//!
//! Provisions and inspects the network identity stored in an EEPROM
//! image file, using simulated analog pins and a host-thread watchdog
//! in place of device hardware.
//!
//! # Usage
//!
//! ```bash
//! # Load the stored identity, generating and saving one if needed
//! device-identity --image eeprom.bin provision
//!
//! # Require a vendor prefix
//! device-identity --image eeprom.bin provision --oui 02-AB-CD
//!
//! # Survey the jitter source until Ctrl+C
//! device-identity survey --source jitter --bytes 100000
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use device_identity::{
    analysis::{StatisticalTests, ThresholdViolation},
    config::{ConfigError, FileConfig},
    entropy::{
        AnalogSampler, CaptureState, DrawStats, EntropyError, EntropySource,
        PairedChannelDebiasedSource, TimerJitterDigestSource,
    },
    identity::{AddressGenerator, IdentityMiss, OuiPrefix},
    metrics::{MetricsError, MetricsRegistry, MetricsSnapshot},
    sim::{HostWatchdog, SimulatedAnalogInput, DEFAULT_WATCHDOG_PERIOD},
    storage::{ImageError, MemoryEeprom, RecordStore, StoreStats},
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "device-identity")]
#[command(about = "Persistent MAC and link-local identity for EEPROM-class devices")]
#[command(version)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// EEPROM image file.
    #[arg(short, long, global = true, default_value = "eeprom.bin")]
    image: PathBuf,

    /// Print Prometheus metrics for the run.
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the stored identity, generating and saving one if none is valid.
    Provision {
        /// Required MAC prefix, e.g. 02-AB-CD. Overrides the config file.
        #[arg(long)]
        oui: Option<OuiPrefix>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print the stored identity without generating one.
    Show {
        /// Report a stored MAC without this prefix as missing.
        #[arg(long)]
        oui: Option<OuiPrefix>,
    },

    /// Generate addresses without saving them.
    Generate {
        /// MAC prefix to use verbatim.
        #[arg(long)]
        oui: Option<OuiPrefix>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Reset every cell of the image to the erased state.
    Erase,

    /// Draw bytes from a source and report their statistical quality.
    Survey {
        /// Bytes to draw (Ctrl+C stops early).
        #[arg(short, long, default_value = "10240")]
        bytes: usize,

        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(clap::Args)]
struct SourceArgs {
    /// Entropy source driving the draws.
    #[arg(long, value_enum, default_value = "analog")]
    source: SourceKind,

    /// Seed for the simulated analog pins (random if omitted).
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    /// Debiased low bits of floating analog pins.
    Analog,
    /// Timer jitter captured at watchdog interrupts.
    Jitter,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Entropy(#[from] EntropyError),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    #[error("no valid identity stored: {0}")]
    NoIdentity(#[from] IdentityMiss),
    #[error("survey failed quality check: {0}")]
    Quality(#[from] ThresholdViolation),
    #[error("failed to start watchdog thread: {0}")]
    Watchdog(#[source] std::io::Error),
    #[error("failed to install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// Counters gathered by a command for the metrics report.
#[derive(Default)]
struct RunReport {
    draws: DrawStats,
    store: StoreStats,
    survey: Option<StatisticalTests>,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Device Identity v{}", device_identity::VERSION);

    let mut report = RunReport::default();
    let result = load_config(cli.config.as_deref()).and_then(|config| {
        run(&cli, &config, &mut report)?;
        if cli.metrics {
            print_metrics(&report)?;
        }
        Ok(())
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            warn!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<FileConfig, CliError> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            Ok(FileConfig::from_file(path)?)
        }
        None => Ok(FileConfig::default()),
    }
}

fn run(cli: &Cli, config: &FileConfig, report: &mut RunReport) -> Result<(), CliError> {
    match &cli.command {
        Commands::Provision { oui, source } => {
            cmd_provision(&cli.image, config, oui.or(config.identity.oui), source, report)
        }
        Commands::Show { oui } => cmd_show(&cli.image, config, oui.or(config.identity.oui), report),
        Commands::Generate { oui, source } => {
            cmd_generate(config, oui.or(config.identity.oui), source, report)
        }
        Commands::Erase => cmd_erase(&cli.image, config),
        Commands::Survey { bytes, source } => cmd_survey(config, *bytes, source, report),
    }
}

fn build_source(config: &FileConfig, args: &SourceArgs) -> Result<Box<dyn EntropySource>, CliError> {
    match args.source {
        SourceKind::Analog => {
            let input = match args.seed {
                Some(seed) => SimulatedAnalogInput::seeded(seed),
                None => SimulatedAnalogInput::from_entropy(),
            };
            let sampler = AnalogSampler::new(input, config.entropy.channels.clone())?;
            info!(channels = ?sampler.channels(), "Using simulated analog pins");
            Ok(Box::new(PairedChannelDebiasedSource::with_budget(
                sampler,
                config.entropy.per_bit_budget,
            )))
        }
        SourceKind::Jitter => {
            let state = Arc::new(CaptureState::new());
            let watchdog = HostWatchdog::spawn(Arc::clone(&state), DEFAULT_WATCHDOG_PERIOD)
                .map_err(CliError::Watchdog)?;
            info!(samples = config.jitter.samples, "Using host watchdog jitter");
            Ok(Box::new(
                TimerJitterDigestSource::new(watchdog, state)
                    .with_samples(config.jitter.samples)
                    .with_digest(config.jitter.digest)
                    .with_timeout(config.jitter.timeout()),
            ))
        }
    }
}

fn open_store(image: &Path, config: &FileConfig) -> Result<RecordStore<MemoryEeprom>, CliError> {
    let eeprom = MemoryEeprom::open(image, config.storage.capacity)?;
    Ok(RecordStore::new(eeprom))
}

fn cmd_provision(
    image: &Path,
    config: &FileConfig,
    oui: Option<OuiPrefix>,
    args: &SourceArgs,
    report: &mut RunReport,
) -> Result<(), CliError> {
    let mut store = open_store(image, config)?;
    let mut generator = AddressGenerator::new(build_source(config, args)?)
        .with_record(config.identity.record_address, config.identity.record_name.clone());

    let result = generator.load_or_generate_and_save(&mut store, oui.as_ref());
    report.draws = generator.source().stats();
    report.store = store.stats();
    let addrs = result?;

    if store.stats().saves > 0 {
        store.memory().persist(image)?;
        info!(image = %image.display(), "Image updated");
    }

    println!("{}", addrs);
    Ok(())
}

fn cmd_show(
    image: &Path,
    config: &FileConfig,
    oui: Option<OuiPrefix>,
    report: &mut RunReport,
) -> Result<(), CliError> {
    let store = open_store(image, config)?;
    let generator = AddressGenerator::new(())
        .with_record(config.identity.record_address, config.identity.record_name.clone());

    let result = generator.load(&store, oui.as_ref());
    report.store = store.stats();
    println!("{}", result?);
    Ok(())
}

fn cmd_generate(
    config: &FileConfig,
    oui: Option<OuiPrefix>,
    args: &SourceArgs,
    report: &mut RunReport,
) -> Result<(), CliError> {
    let mut generator = AddressGenerator::new(build_source(config, args)?);
    let result = generator.generate(oui.as_ref());
    report.draws = generator.source().stats();
    println!("{}", result?);
    Ok(())
}

fn cmd_erase(image: &Path, config: &FileConfig) -> Result<(), CliError> {
    let mut eeprom = MemoryEeprom::open(image, config.storage.capacity)?;
    eeprom.erase();
    eeprom.persist(image)?;
    info!(image = %image.display(), bytes = config.storage.capacity, "Image erased");
    Ok(())
}

fn cmd_survey(
    config: &FileConfig,
    bytes: usize,
    args: &SourceArgs,
    report: &mut RunReport,
) -> Result<(), CliError> {
    let mut source = build_source(config, args)?;

    // Set up signal handler for Ctrl+C
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || r.store(false, Ordering::Relaxed))?;

    info!(bytes, "Surveying entropy source (Ctrl+C to stop)");
    let mut data = Vec::with_capacity(bytes);
    let mut failure = None;
    while data.len() < bytes && running.load(Ordering::Relaxed) {
        match source.random_byte() {
            Ok(b) => data.push(b),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let stats = StatisticalTests::analyze(&data);
    report.draws = source.stats();
    report.survey = Some(stats.clone());

    print_survey(&stats, &report.draws);
    if let Some(e) = failure {
        return Err(e.into());
    }
    config.survey.check(&stats)?;
    println!("Quality check passed");
    Ok(())
}

fn print_survey(stats: &StatisticalTests, draws: &DrawStats) {
    println!("Samples:          {} bytes", stats.sample_size);
    println!("Bit bias:         {:+.5}", stats.bit_bias);
    println!("Byte chi-square:  {:.2} (255 dof)", stats.byte_chi_square);
    println!("Variance:         {:.1}", stats.variance);
    println!("Autocorrelation:  {:+.5}", stats.autocorrelation);
    println!(
        "Raw reads:        {} ({} pairs discarded, {} captures)",
        draws.raw_reads, draws.pairs_discarded, draws.captures
    );
}

fn print_metrics(report: &RunReport) -> Result<(), CliError> {
    let registry = MetricsRegistry::new()?;
    registry.update(&MetricsSnapshot {
        draws: report.draws,
        store: report.store,
        survey: report.survey.clone(),
    });
    print!("{}", registry.encode()?);
    Ok(())
}
