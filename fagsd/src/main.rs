mod config;
mod control;
mod dispatcher;
mod station;

#[macro_use]
extern crate log;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fanet::{Gpio, Radio};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::dispatcher::Dispatcher;

const PID_FILE: &str = "/tmp/fagsd.pid";

#[derive(Clone, Debug, Parser)]
#[command(name = "fagsd", version, about = "Fanet Ground Station daemon")]
pub struct Args {
    /// Run as daemon (terse logging for the journal)
    #[arg(short, long)]
    pub daemon: bool,

    /// Send 'quit' command to a running instance
    #[arg(short, long)]
    pub quit: bool,

    /// Sets the max. log level [0..5]
    #[arg(short, long, value_name = "LEVEL")]
    pub loglevel: Option<u8>,

    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Send message to device, format: '<manufacturerId>:<deviceId> <message>',
    /// e.g. '11:1234 helloworld'
    #[arg(short, long, value_name = "MSG")]
    pub message: Option<String>,

    /// Inject fanet rx message, e.g. 'FNF 11,5C0B,1,0,A,6,5006FC0A0400' (debugging)
    #[arg(short, long, value_name = "FRAME")]
    pub inject: Option<String>,
}

fn init_logging(args: &Args) {
    let level = match args.loglevel {
        Some(0) | Some(1) => log::LevelFilter::Error,
        Some(2) => log::LevelFilter::Warn,
        None | Some(3) | Some(4) => log::LevelFilter::Info,
        Some(5) => log::LevelFilter::Debug,
        Some(other) => {
            eprintln!("unknown loglevel: '{}' (valid value range: 0..5)", other);
            log::LevelFilter::Info
        }
    };
    let mut builder = if args.daemon {
        // the journal adds its own timestamps
        pretty_env_logger::formatted_builder()
    } else {
        pretty_env_logger::formatted_timed_builder()
    };
    builder.filter_level(level).parse_default_env().init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    let argv: Vec<String> = std::env::args().collect();
    if control::forward_to_running_instance(&argv).await {
        println!("Another instance is already running. Shutting down...");
        return ExitCode::SUCCESS;
    }
    if args.quit {
        warn!("no running instance found");
        return ExitCode::SUCCESS;
    }

    let config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => {
                info!("config successfully loaded: {}", path.display());
                config
            }
            Err(error) => {
                error!("failed to load config '{}': {}", path.display(), error);
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };
    let radio_config = match config.radio_config() {
        Ok(radio_config) => radio_config,
        Err(error) => {
            error!("{}", error);
            return ExitCode::FAILURE;
        }
    };

    write_pid_file();
    info!(
        "Fanet Ground Station daemon version {} started.",
        env!("CARGO_PKG_VERSION")
    );

    let gpio = Gpio::shared();
    let (radio, packets) = Radio::open(radio_config, gpio.clone());

    let (quit_tx, mut quit_rx) = mpsc::channel(1);
    match control::ControlServer::bind(radio.clone(), quit_tx) {
        Ok(server) => {
            tokio::spawn(server.run());
        }
        Err(error) => warn!("single-instance control channel unavailable: {}", error),
    }

    let dispatcher = Dispatcher::new(
        config.fanet,
        &config.stations,
        radio.clone(),
        radio.states(),
        packets,
        gpio,
    );
    tokio::spawn(dispatcher.run());

    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(signal) => signal,
        Err(error) => {
            error!("failed to register signal handler: {}", error);
            return ExitCode::FAILURE;
        }
    };
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(signal) => signal,
        Err(error) => {
            error!("failed to register signal handler: {}", error);
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT, shutting down..."),
        _ = sigterm.recv() => info!("received SIGTERM, shutting down..."),
        _ = quit_rx.recv() => {}
    }

    radio.deinit().await;
    remove_pid_file();
    ExitCode::SUCCESS
}

fn write_pid_file() {
    if let Err(error) = std::fs::write(PID_FILE, format!("{}\n", std::process::id())) {
        warn!("failed to write pid file {}: {}", PID_FILE, error);
    }
}

/// Removes the pid file, but only if it still belongs to this process.
fn remove_pid_file() {
    if let Ok(pid) = std::fs::read_to_string(PID_FILE) {
        if pid.trim() == std::process::id().to_string() {
            let _ = std::fs::remove_file(PID_FILE);
        }
    }
}
