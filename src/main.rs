use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fs::File,
    io::BufReader,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use structopt::StructOpt;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;

mod action;
mod classify;
mod config;
mod dispatch;
mod error;
mod moves;
mod pipeline;
mod point;
mod pose;

#[derive(structopt::StructOpt)]
struct Opt {
    /// Newline-delimited JSON landmark snapshots. Reads stdin when omitted.
    #[structopt(short, long)]
    input: Option<PathBuf>,

    /// TOML file with the visibility threshold, tolerances and key bindings.
    #[structopt(short, long)]
    config: Option<PathBuf>,

    /// Minimum mean landmark visibility a move's landmarks need.
    #[structopt(short, long, env = "VISIBILITY_THRESHOLD")]
    threshold: Option<f32>,

    /// Pause after each key event, in milliseconds.
    #[structopt(short, long, default_value = "100", env = "KEY_PAUSE_MS")]
    pause_ms: u64,

    /// Seconds to wait before the first snapshot is read.
    #[structopt(short, long, default_value = "0", env = "DELAY_TIME")]
    delay: u64,

    /// Wait for the classifier instead of dropping snapshots that arrive
    /// while it is busy.
    #[structopt(short, long)]
    block: bool,

    #[structopt(short, long, default_value = "info", env = "RUST_LOG")]
    log_level: tracing_subscriber::filter::EnvFilter,

    #[structopt(short, long)]
    show_progress: bool,

    #[structopt(flatten)]
    keys: config::KeyBindings,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    // stdout carries the frame reports
    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(opt.log_level),
    )?;

    let file_config = opt
        .config
        .as_deref()
        .map(config::FileConfig::load)
        .transpose()
        .context("failed loading config file")?;
    let config = config::Config::resolve(file_config, opt.threshold, &opt.keys)
        .context("failed resolving configuration")?;

    info!(
        message = "resolved configuration",
        threshold = config.visibility_threshold,
        excluded_landmarks = config.excluded_landmarks.len()
    );
    for kind in moves::Move::ALL.iter().copied() {
        let action = config.actions.get(kind);
        if action.is_noop() && !kind.is_reserved() {
            warn!(message = "move has no key binding", %kind);
        } else {
            debug!(message = "binding", %kind, %action);
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_ctrl_c = running.clone();

    ctrlc::set_handler(move || {
        info!("stopping after the next input line or end of input");
        running_ctrl_c.store(false, Ordering::SeqCst);
    })
    .context("failed setting Ctrl-C handler")?;

    if opt.delay > 0 {
        info!(message = "waiting before start", seconds = opt.delay);
        std::thread::sleep(Duration::from_secs(opt.delay));
    }

    let progress = if opt.show_progress {
        Some(
            ProgressBar::new_spinner().with_style(
                ProgressStyle::default_spinner()
                    .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
                    .template("{prefix:.bold.dim} {spinner} {wide_msg}"),
            ),
        )
    } else {
        None
    };

    let mut translator = pipeline::Translator::new(
        classify::Classifier::new(config.visibility_threshold, config.tolerances),
        Arc::new(config.actions),
        config.excluded_landmarks,
        dispatch::DryRun::new(Duration::from_millis(opt.pause_ms)),
    );
    let handoff = if opt.block {
        pipeline::Handoff::Block
    } else {
        pipeline::Handoff::DropWhenBusy
    };

    let stdout = std::io::stdout();
    let summary = match opt.input {
        Some(path) => {
            let file =
                File::open(&path).map_err(|e| error::Error::OpenInput(e, path.clone()))?;
            pipeline::run(
                BufReader::new(file),
                stdout.lock(),
                &mut translator,
                &running,
                handoff,
                progress.as_ref(),
            )
        }
        None => pipeline::run(
            BufReader::new(std::io::stdin()),
            stdout.lock(),
            &mut translator,
            &running,
            handoff,
            progress.as_ref(),
        ),
    }
    .context("failed running pipeline")?;

    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    info!(
        message = "finished",
        read = summary.read,
        classified = summary.classified,
        dropped = summary.dropped,
        malformed = summary.malformed
    );

    Ok(())
}
