mod config;
mod error;
mod pointer;
mod pool;
mod protocols;
mod render;
mod screencopy;
mod state;
mod surface;

use clap::Parser;
use log::LevelFilter;
use pipette_common::{AppLogger, SampledColor};
use std::path::PathBuf;
use std::process::ExitCode;
use wayland_client::Connection;

use config::Config;
use error::Result;
use pointer::run_until_stopped;
use state::State;

/// Pick a colour from the screen: move the swatch, click to print it.
#[derive(Parser, Debug)]
#[command(name = "pipette", version, about)]
struct Args {
    /// Read configuration from this file instead of the default locations
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Print the colour in lowercase hex
    #[arg(long)]
    lowercase: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let initial_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = AppLogger::init("pipette", initial_level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if !args.verbose {
        match config.log_level() {
            Some(level) => log::set_max_level(level),
            None => log::warn!("Unknown log level {:?}", config.log.level),
        }
    }
    let uppercase = config.output.uppercase && !args.lowercase;

    match run(config) {
        Ok(color) => {
            let color = color.unwrap_or_else(|| {
                log::warn!("No colour was sampled before the click");
                SampledColor::default()
            });
            println!("{}", color.to_hex(uppercase));
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> Result<Option<SampledColor>> {
    let conn = Connection::connect_to_env()?;
    let display = conn.display();

    let mut event_queue = conn.new_event_queue();
    let qh = event_queue.handle();

    let _registry = display.get_registry(&qh, ());

    let mut state = State::new(config);

    event_queue.roundtrip(&mut state)?;

    state.create_surfaces(&qh)?;

    event_queue.roundtrip(&mut state)?;

    run_until_stopped(&mut state, |state| event_queue.blocking_dispatch(state))?;

    if let Some(e) = state.fatal.take() {
        return Err(e);
    }
    Ok(state.session.cursor.color)
}
