use anyhow::Context;
use camerax::capture::SyntheticBackend;
use camerax::config::{Config, app_name, version};
use camerax::host;
use camerax::pipeline::{AnalysisMode, AnalyzerRegistry, CaptureSession, FrameStats};
use clap::{Arg, ArgAction, Command, value_parser};
use log::info;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let matches = Command::new(app_name())
        .version(version())
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file.")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("fps")
                .long("fps")
                .value_name("FPS")
                .help("Synthetic camera frame rate, 0 for on-demand frames.")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("authorized")
                .long("authorized")
                .help("Start with camera permission already granted.")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(fps) = matches.get_one::<u32>("fps") {
        config.synthetic.fps = *fps;
    }
    if matches.get_flag("authorized") {
        config.synthetic.authorized = true;
    }

    // stop the session before exiting on Ctrl-C
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    ctrlc::set_handler(move || interrupt.cancel()).context("setting Ctrl-C handler")?;

    info!("{} {} starting", app_name(), version());
    let backend = Arc::new(SyntheticBackend::from_config(&config.synthetic));
    let mut analyzers = AnalyzerRegistry::new();
    if analyzers.register(
        AnalysisMode::from(config.synthetic.frame_stats_mode),
        Arc::new(FrameStats),
    ) {
        info!("analyzers registered for modes {:?}", analyzers.modes());
    }
    let session = CaptureSession::new(backend, analyzers, config.session);

    let input = tokio::io::BufReader::new(tokio::io::stdin());
    host::serve(session, input, tokio::io::stdout(), cancel.clone()).await?;

    if cancel.is_cancelled() {
        // the stdin reader thread would keep the runtime alive
        process::exit(130);
    }
    info!("{} exited", app_name());
    Ok(())
}
