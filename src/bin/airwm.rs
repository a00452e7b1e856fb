use std::path::PathBuf;
use std::process;

use air_wm::actor::reactor::{self, Reactor};
use air_wm::common::config::{Config, config_file};
use air_wm::common::log;
use air_wm::common::util::execute_startup_commands;
use air_wm::sys::x11;
use clap::Parser;
use tracing::{error, info, warn};

#[derive(Parser)]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Check the configuration file for problems without starting the window
    /// manager.
    #[arg(long)]
    validate: bool,

    /// X display to manage, instead of $DISPLAY.
    #[arg(long, value_name = "NAME")]
    display: Option<String>,
}

fn main() {
    sigpipe::reset();
    let opt = Cli::parse();

    if std::env::var_os("RUST_BACKTRACE").is_none() {
        // SAFETY: We are single threaded at this point.
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }
    log::init_logging();
    install_panic_hook();

    let config_path = opt.config.clone().or_else(config_file);

    if opt.validate {
        validate(config_path);
        return;
    }

    let config = match Config::read_or_default(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            process::exit(1);
        }
    };

    let (display, setup) = match x11::connect(opt.display.as_deref()) {
        Ok(connection) => connection,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let (events_tx, events_rx) = air_wm::actor::channel();
    if let Err(e) = display.spawn_event_reader(events_tx.clone()) {
        error!("Could not start the event reader: {e}");
        process::exit(1);
    }

    let startup_applications = config.startup_applications.clone();
    let reactor = match Reactor::new(config, display, setup) {
        Ok(reactor) => reactor,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    execute_startup_commands(&startup_applications);

    if let Err(e) = ctrlc::set_handler(move || events_tx.send(reactor::Event::Exit)) {
        warn!("Could not install the Ctrl+C handler: {e}");
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Could not start the runtime: {e}");
            process::exit(1);
        }
    };
    runtime.block_on(reactor.run(events_rx));
    info!("Window manager stopped");
}

fn validate(config_path: Option<PathBuf>) {
    let Some(path) = config_path.filter(|path| path.exists()) else {
        println!("No configuration file found, the built-in defaults will be used");
        return;
    };
    let config = match Config::read(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            process::exit(1);
        }
    };
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config validation passed");
    } else {
        for issue in issues {
            eprintln!("{issue}");
        }
        process::exit(1);
    }
}

#[cfg(panic = "unwind")]
fn install_panic_hook() {
    // Abort on panic instead of leaving the display without a window manager
    // while other threads keep running.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        original_hook(info);
        std::process::abort();
    }));
}

#[cfg(not(panic = "unwind"))]
fn install_panic_hook() {}
