mod config;
mod fonts;
mod monitor;
mod panel;
mod render;
mod screen;
mod shutdown;
mod status;
mod telemetry;

use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::{parse_i2c_address, DisplayConfig, DEFAULT_CONFIG_PATH};
use crate::fonts::{IconFont, TextFont};
use crate::monitor::Monitor;
use crate::panel::{Panel, PanelGuard, Ssd1306Panel, TerminalPanel};
use crate::render::Renderer;
use crate::shutdown::ShutdownSignal;
use crate::status::LogSource;
use crate::telemetry::SystemTelemetry;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "SvxLink node status on a 128x64 SSD1306 OLED",
    long_about = "Alternates between a system screen (IP, CPU load, CPU temperature) and a link screen\n\
                  (conference, current speaker) on an I2C OLED, with TX/RX indicators derived from\n\
                  the SvxLink log. The display is cleared on Ctrl+C or SIGTERM."
)]
pub struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// I2C bus number (/dev/i2c-N)
    #[arg(short, long)]
    bus: Option<u8>,

    /// I2C address of the panel, decimal or 0x-prefixed hex
    #[arg(short, long, value_parser = parse_i2c_address)]
    address: Option<u8>,

    /// Seconds between screen updates
    #[arg(short, long)]
    interval: Option<u64>,

    /// SvxLink log file, tried before the standard locations
    #[arg(short, long)]
    log_file: Option<PathBuf>,

    /// Header text
    #[arg(short, long)]
    title: Option<String>,

    /// Draw in the terminal instead of on the OLED
    #[arg(short, long)]
    preview: bool,

    /// Update once, clear the display and exit
    #[arg(long)]
    once: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

// The preview owns the terminal, so routine info lines would scribble over it
fn default_log_filter(args: &Args) -> &'static str {
    if args.quiet || args.preview {
        "warn"
    } else {
        "info"
    }
}

fn init_logging(args: &Args) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_log_filter(args))).init();
}

fn open_panel(args: &Args, config: &DisplayConfig) -> Result<Box<dyn Panel>> {
    if args.preview {
        Ok(Box::new(TerminalPanel::open()?))
    } else {
        Ok(Box::new(Ssd1306Panel::open(config)?))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    let mut config = DisplayConfig::load_or_default(&args.config);
    if config.merge_with_args(&args) {
        info!("Command-line options override {}", args.config.display());
    }
    config.validate();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::from(1);
        }
    };
    let _runtime_guard = runtime.enter();

    // Installed before anything is lit so a signal during startup or the first
    // tick still goes through the cleanup below
    let mut shutdown = match ShutdownSignal::register() {
        Ok(shutdown) => shutdown,
        Err(e) => {
            eprintln!("Error: failed to install signal handlers: {}", e);
            return ExitCode::from(1);
        }
    };

    // Only the display is allowed to stop us before the loop starts
    let panel = match open_panel(&args, &config) {
        Ok(panel) => panel,
        Err(e) => {
            eprintln!("Error: failed to initialize display: {:#}", e);
            return ExitCode::from(1);
        }
    };
    let guard = PanelGuard::new(panel);

    let renderer = Renderer::new(
        TextFont::load(&config.text_font, config.text_font_px),
        IconFont::load(&config.icon_font, config.icon_font_px),
    );
    let log = LogSource::new(config.log_files.clone(), config.tail_lines);
    match log.locate() {
        Ok(Some(path)) => info!("Reading SvxLink log {}", path.display()),
        Ok(None) => info!("No SvxLink log yet, showing idle status"),
        Err(e) => warn!("SvxLink log is not reachable: {}", e),
    }

    let mut monitor = Monitor::new(
        config.title.clone(),
        SystemTelemetry::new(&config),
        log,
        renderer,
        guard,
    );

    if args.once {
        monitor.tick();
        monitor.shutdown();
        return ExitCode::SUCCESS;
    }

    info!("Updating every {}s", config.poll_interval_secs);
    runtime.block_on(monitor::run(&mut monitor, config.poll_interval(), shutdown.recv()));
    monitor.shutdown();
    ExitCode::SUCCESS
}
