use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use pob_bridge::{BuildsCandidates, GlobalOpts, LogFormat};
use pob_config::Config;
use pob_logger as logger;
use pob_lua::LuaEngine;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive
const LOG_ENV: &str = "POB_BRIDGE_LOG";

#[derive(Parser)]
#[command(name = "pob-bridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Path of Building calculation bridge",
    long_about = "pob-bridge runs the Path of Building calculation engine headless and answers \
                  line-delimited JSON requests on standard input. Responses go to standard \
                  output; diagnostics go to standard error."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(logger::verbosity_filter()));
    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_writer(io::stderr),
            )
            .try_init(),
    };
    if let Err(e) = result {
        logger::warn(&format!("Failed to initialize tracing: {}", e));
    }
}

fn absolute(path: PathBuf, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

fn run(opts: &GlobalOpts) -> anyhow::Result<()> {
    let config = match &opts.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    // The engine changes the working directory while booting
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let pob_root = absolute(config.pob_root(opts.pob_path.as_deref()), &cwd);
    let candidates = BuildsCandidates::from_environment(
        config
            .builds_override(opts.builds_path.as_deref())
            .map(|dir| absolute(dir, &cwd)),
        config.user_folder(),
        &pob_root,
        &cwd,
    );

    logger::step(&format!("Starting engine at {}", pob_root.display()));
    let engine = LuaEngine::bootstrap(&pob_root)
        .with_context(|| format!("Failed to start engine at {}", pob_root.display()))?;
    logger::info(&format!("Engine loaded from {}", engine.root().display()));

    pob_bridge::start(engine, &candidates, io::stdin().lock(), io::stdout().lock())?;
    logger::success("Session ended");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logger::init_with_verbosity(cli.global.verbosity_level(), cli.global.quiet) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }
    init_tracing(cli.global.log_format);

    match run(&cli.global) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
