use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use ecowitt_core::protocol::DEFAULT_DEVICE_PORT;
use ecowitt_core::transfer::{FirmwareImage, FirmwareImages};
use ecowitt_core::{ControlSession, SessionConfig, transport};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Ecowitt gateway firmware updater", long_about = None)]
struct Args {
    /// Gateway host name or IPv4 address
    #[arg(short = 'H', long)]
    host: String,

    /// Gateway control port
    #[arg(short, long, default_value_t = DEFAULT_DEVICE_PORT)]
    port: u16,

    /// Push firmware to the gateway after reading its identity
    #[arg(short, long, requires = "images")]
    update: bool,

    /// Firmware images: user1.bin, then optionally user2.bin
    #[arg(num_args = 0..=2)]
    images: Vec<PathBuf>,

    /// Load session settings from a TOML file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective session settings to a TOML file
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Treat reply checksum mismatches as errors
    #[arg(long)]
    strict_checksum: bool,

    /// Per-read reply timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log every packet on the wire
    #[arg(short, long)]
    debug: bool,
}

/// Failure to reach the gateway at all.
#[derive(Debug)]
struct ConnectFailure;

impl std::fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("could not connect to gateway")
    }
}

impl std::error::Error for ConnectFailure {}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.debug {
        tracing::Level::TRACE
    } else if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Cannot install log subscriber: {e}");
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error: {:#}", e);
            if e.is::<ConnectFailure>() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn load_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if args.strict_checksum {
        config.strict_checksum = true;
    }
    if let Some(ms) = args.timeout_ms {
        config.reply_timeout_ms = ms;
    }
    if let Some(path) = &args.save_config {
        config
            .save_to_file(path)
            .with_context(|| format!("saving config {}", path.display()))?;
        info!(path = %path.display(), "Saved session config");
    }
    Ok(config)
}

fn open_images(paths: &[PathBuf]) -> Result<FirmwareImages> {
    let mut opened = Vec::with_capacity(paths.len());
    for path in paths {
        let image = FirmwareImage::open(path)?;
        info!(path = %path.display(), size = image.size(), "Opened firmware image");
        opened.push(image);
    }
    let mut opened = opened.into_iter();
    let Some(first) = opened.next() else {
        bail!("no firmware image given");
    };
    Ok(FirmwareImages::new(first, opened.next()))
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;

    // Images are opened before any traffic so a bad path costs nothing.
    let mut images = if args.update {
        Some(open_images(&args.images)?)
    } else {
        if !args.images.is_empty() {
            warn!("Firmware images given without --update; ignoring them");
        }
        None
    };

    info!(host = %args.host, port = args.port, "Connecting to gateway");
    let stream = match transport::connect(&args.host, args.port, config.connect_timeout()) {
        Ok(stream) => stream,
        Err(e) => return Err(anyhow::Error::new(e).context(ConnectFailure)),
    };

    let mut session = ControlSession::new(stream, config);
    let identity = session.read_identity()?;
    println!("Device MAC:       {}", identity.mac);
    println!("Firmware version: {}", identity.firmware_version);

    if let Some(images) = images.as_mut() {
        let report = session.perform_update(images)?;
        if let Some(slot) = report.image {
            println!("Served image:     {}", slot);
        }
        println!(
            "Transfer:         {} packets, {} of {} bytes",
            report.packets_sent,
            report.bytes_sent,
            report.image_size.unwrap_or(0)
        );
        if !report.completed {
            bail!(
                "device disconnected before END (state {})",
                report.final_state
            );
        }
        println!("Update sent; the gateway will reboot into the new firmware.");
    }

    Ok(())
}
