//! ALPS - drive a light painting stick from the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use alps_stick as app;

use app::config::{AppConfig, ConfigLoadResult, DeviceConfig};
use app::pattern;
use app::sender::{ChannelCallbacks, Sender, SenderEvent};
use app::stick::{DeviceCapabilities, Image, StickClient};

/// Drive an ALPS light painting stick over Bluetooth serial or TCP.
#[derive(Parser)]
#[command(name = "alps", version)]
struct Cli {
    /// Config file (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Stick address, overrides the config file (/dev/rfcomm0, tcp://host:port)
    #[arg(long, global = true)]
    device: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the capabilities negotiated with the stick
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Turn every LED off
    Off,
    /// Paint an image
    Show(ShowArgs),
    /// Write a default config file
    InitConfig,
}

#[derive(Args)]
struct ShowArgs {
    /// Solid color, RRGGBB
    #[arg(long, conflicts_with_all = ["rainbow", "raw"])]
    color: Option<String>,

    /// Rainbow sweep
    #[arg(long, conflicts_with = "raw")]
    rainbow: bool,

    /// Raw row-major little-endian ARGB file
    #[arg(long, requires = "width")]
    raw: Option<PathBuf>,

    /// Width of the raw image
    #[arg(long)]
    width: Option<usize>,

    /// Image height for generated patterns (default: stick length)
    #[arg(long)]
    height: Option<usize>,

    /// Number of columns for generated patterns
    #[arg(long, default_value_t = 100)]
    columns: usize,

    /// Brightness in [0, 1]
    #[arg(long)]
    brightness: Option<f32>,

    /// Delay between columns in milliseconds
    #[arg(long)]
    delay: Option<u8>,

    /// Repeat until Ctrl-C
    #[arg(long = "loop")]
    looping: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_file.as_deref())?;

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    tracing::info!("Config path: {:?}", config_path);

    match cli.command {
        Command::InitConfig => {
            AppConfig::default().save(&config_path)?;
            println!("Wrote {}", config_path.display());
        }
        Command::Info { json } => {
            let config = load_config(&config_path, cli.device)?;
            let (_client, caps) = connect_blocking(config.device).await?;
            print_capabilities(&caps, json)?;
        }
        Command::Off => {
            let config = load_config(&config_path, cli.device)?;
            let (mut client, _) = connect_blocking(config.device).await?;
            tokio::task::spawn_blocking(move || client.off()).await??;
            println!("Stick off");
        }
        Command::Show(args) => {
            let config = load_config(&config_path, cli.device)?;
            show(config, args).await?;
        }
    }

    Ok(())
}

/// Load the config file, falling back to defaults on first run, then apply
/// the `--device` override.
fn load_config(path: &Path, device: Option<String>) -> anyhow::Result<AppConfig> {
    let mut config = match AppConfig::try_load(path) {
        ConfigLoadResult::Loaded(config) => {
            tracing::info!("Config loaded successfully");
            config
        }
        ConfigLoadResult::Missing => {
            tracing::info!("Config missing, using defaults");
            AppConfig::default()
        }
        ConfigLoadResult::Invalid(e) => {
            return Err(e).with_context(|| format!("invalid config {}", path.display()));
        }
    };
    if let Some(device) = device {
        config.device.address = device;
    }
    config.validate()?;
    Ok(config)
}

/// Console logging, plus a log file when requested.
fn init_logging(log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    let Some(path) = log_file else {
        registry.init();
        return Ok(None);
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("log file path has no file name: {}", path.display()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    registry
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

/// Open the transport and run the handshake.
fn connect(device: &DeviceConfig) -> app::Result<(StickClient, DeviceCapabilities)> {
    let conn = app::transport::open(device)?;
    let mut client = StickClient::new();
    client.set_nack_retries(device.nack_retries)?;
    let caps = client.attach(conn)?;
    Ok((client, caps))
}

async fn connect_blocking(device: DeviceConfig) -> anyhow::Result<(StickClient, DeviceCapabilities)> {
    let connected = tokio::task::spawn_blocking(move || connect(&device)).await??;
    Ok(connected)
}

fn print_capabilities(caps: &DeviceCapabilities, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(caps)?);
    } else {
        println!("Pixels per column:   {}", caps.max_pixels_per_column);
        println!("Columns per message: {}", caps.max_columns_per_message);
        println!("Extensions:          {:#04x}", caps.extensions);
    }
    Ok(())
}

fn build_image(args: &ShowArgs, caps: &DeviceCapabilities) -> app::Result<Image> {
    let height = args
        .height
        .unwrap_or_else(|| usize::from(caps.max_pixels_per_column));

    if let Some(path) = &args.raw {
        let bytes = std::fs::read(path)?;
        let width = args
            .width
            .ok_or_else(|| app::AppError::validation("--raw needs --width"))?;
        return pattern::from_raw_argb(&bytes, width);
    }
    if args.rainbow {
        return pattern::rainbow(args.columns, height);
    }
    let color = pattern::parse_color(args.color.as_deref().unwrap_or("ffffff"))?;
    pattern::solid(args.columns, height, color)
}

async fn show(config: AppConfig, args: ShowArgs) -> anyhow::Result<()> {
    let (client, caps) = connect_blocking(config.device.clone()).await?;
    let image = Arc::new(build_image(&args, &caps)?);

    let (callbacks, mut events) = ChannelCallbacks::channel();
    let sender = Sender::new(client, callbacks)?;

    let defaults = config.playback.to_playback();
    sender.set_brightness(args.brightness.unwrap_or(defaults.brightness))?;
    sender.set_delay(args.delay.unwrap_or(defaults.delay_ms));
    sender.set_loop(args.looping || defaults.looping);

    println!(
        "Painting {}x{} image{}",
        image.width(),
        image.height(),
        if sender.playback().looping { " in loop, Ctrl-C to stop" } else { "" }
    );
    sender.send_image(image);

    let mut failure = None;
    let mut stopping = false;
    let mut last_percent = None;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SenderEvent::Started) => tracing::info!("Transmission started"),
                Some(SenderEvent::Progress { percent }) => {
                    if last_percent != Some(percent) {
                        eprint!("\r{percent:3}%");
                        last_percent = Some(percent);
                    }
                }
                Some(SenderEvent::Error(message)) => failure = Some(message),
                Some(SenderEvent::Done) | None => break,
            },
            _ = tokio::signal::ctrl_c(), if !stopping => {
                eprintln!();
                tracing::info!("Ctrl-C received, stopping");
                stopping = true;
                sender.stop()?;
            }
        }
    }
    eprintln!();
    sender.kill();

    if let Some(message) = failure {
        bail!("transmission failed: {message}");
    }
    println!("{}", if stopping { "Stopped" } else { "Done" });
    Ok(())
}
