//! `digitizer` command-line front end.
//!
//! Runs the acquisition engine against the simulated digitizer:
//!
//! ```bash
//! digitizer run --blocks 20 --tags
//! digitizer --config config/digitizer.toml info
//! DIGITIZER_ACQUISITION__SAMP_RATE=1000000 digitizer show-config
//! ```
//!
//! Ctrl-C posts a stop into the engine, so a blocked `produce` returns
//! end-of-stream and the run finishes cleanly with its error report.

#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod logging;
mod run;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use digitizer_core::{DigitizerConfig, DigitizerSource, LogFormat};
use digitizer_driver_mock::{MockDigitizer, MockDigitizerConfig, MockMode};
use std::path::{Path, PathBuf};
use tokio::signal;
use tracing::{info, warn};

/// Section of the configuration document holding the simulated device.
const MOCK_SECTION: &str = "mock";

#[derive(Parser)]
#[command(name = "digitizer")]
#[command(about = "Digitizer acquisition engine driving a simulated device", long_about = None)]
struct Cli {
    /// Configuration file (TOML); missing file means defaults
    #[arg(long, default_value = "config/digitizer.toml")]
    config: PathBuf,

    /// Override the configured log format
    #[arg(long, value_enum)]
    log_format: Option<FormatArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire and print produced blocks
    Run {
        /// Stop after this many blocks (0 = until Ctrl-C or end of stream)
        #[arg(long, default_value_t = 10)]
        blocks: usize,

        /// Items per produce call (default: one chunk or one waveform)
        #[arg(long, default_value_t = 0)]
        items: usize,

        /// Print every tag as a JSON line
        #[arg(long)]
        tags: bool,

        /// Override the simulated device mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Print driver and channel information
    Info,

    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Pretty,
    Compact,
    Json,
}

impl From<FormatArg> for LogFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Pretty => LogFormat::Pretty,
            FormatArg::Compact => LogFormat::Compact,
            FormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Instant,
    Realistic,
    Chaos,
}

impl From<ModeArg> for MockMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Instant => MockMode::Instant,
            ModeArg::Realistic => MockMode::Realistic,
            ModeArg::Chaos => MockMode::Chaos,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, mock) = load_config(&cli.config)?;
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }
    logging::init(&config.logging)?;
    info!(config = %cli.config.display(), "Configuration loaded");

    match cli.command {
        Commands::Run {
            blocks,
            items,
            tags,
            mode,
        } => {
            let mut mock = mock;
            if let Some(mode) = mode {
                mock.mode = mode.into();
            }
            let options = run::RunOptions {
                blocks,
                items,
                print_tags: tags,
            };
            run_acquisition(config, mock, options).await
        }
        Commands::Info => print_info(config, mock),
        Commands::ShowConfig => {
            println!("{}", config.to_toml_string()?);
            println!("[{MOCK_SECTION}]");
            print!("{}", toml::to_string_pretty(&mock)?);
            Ok(())
        }
    }
}

/// Engine configuration plus the `[mock]` section of the same document.
fn load_config(path: &Path) -> Result<(DigitizerConfig, MockDigitizerConfig)> {
    let config = DigitizerConfig::load_from(path)
        .with_context(|| format!("Invalid configuration {}", path.display()))?;
    let figment = DigitizerConfig::figment(path);
    let mock = if figment.contains(MOCK_SECTION) {
        figment
            .extract_inner(MOCK_SECTION)
            .with_context(|| format!("Invalid [{MOCK_SECTION}] section"))?
    } else {
        MockDigitizerConfig::default()
    };
    Ok((config, mock))
}

fn build_source(config: DigitizerConfig, mock: MockDigitizerConfig) -> DigitizerSource {
    DigitizerSource::with_settings(Box::new(MockDigitizer::new(mock)), config.acquisition)
}

async fn run_acquisition(
    config: DigitizerConfig,
    mock: MockDigitizerConfig,
    options: run::RunOptions,
) -> Result<()> {
    let mut source = build_source(config, mock);
    let stop = source.stop_handle();

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping acquisition");
                stop.stop();
            }
            Err(e) => warn!(error = %e, "Ctrl-C handler unavailable"),
        }
    });

    let (source, result) = tokio::task::spawn_blocking(move || {
        let mut stdout = std::io::stdout().lock();
        let result = run::acquire(&mut source, options, &mut stdout);
        (source, result)
    })
    .await
    .context("Acquisition task panicked")?;

    let mut stdout = std::io::stdout().lock();
    let nr_errors = run::report_errors(&source, &mut stdout)?;
    let summary = result?;
    println!(
        "{} blocks, {} items, {} chunks lost, {} triggers, {} empty calls, {} errors",
        summary.blocks, summary.items, summary.lost, summary.triggers, summary.empty_calls, nr_errors
    );
    Ok(())
}

fn print_info(config: DigitizerConfig, mock: MockDigitizerConfig) -> Result<()> {
    let source = build_source(config, mock);
    let settings = source.settings();
    println!("driver:    {} ({})", source.driver_type(), source.driver_version());
    println!("hardware:  {}", source.hardware_version());
    println!("channels:  {}", source.aichan_ids().join(" "));
    println!(
        "ports:     {}",
        (0..settings.ports.len())
            .map(|p| format!("port{p}"))
            .collect::<Vec<_>>()
            .join(" ")
    );
    let ranges = source
        .aichan_ranges()
        .ranges()
        .iter()
        .map(|r| format!("{}", r.start))
        .collect::<Vec<_>>();
    println!("ranges:    {} V", ranges.join(" "));
    println!(
        "timebase:  {} s ({} samples/waveform delivered)",
        settings.timebase(),
        settings.block_size_with_downsampling()
    );
    Ok(())
}
