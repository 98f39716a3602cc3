//! Replay driver
//!
//! ```text
//! flightcore <config.toml|config.json> [replay.jsonl]
//! ```
//!
//! Loads the configuration onto a fresh bus, builds the flight core and
//! ticks it at `driver.rate_hz`. With a replay file each tick first applies
//! one recorded frame and the loop runs as fast as it can; without one the
//! loop is paced by the wall clock.

use anyhow::{bail, Context};
use flightcore::{
    config::{self, DriverSettings},
    runtime::FlightCore,
    telemetry::{JsonLinesSink, NullSink, Telemetry, TelemetrySink},
    PropertyTree, ReplayReader,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(settings: &DriverSettings) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));

    let (file_layer, guard) = match &settings.log_path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {:?}", path))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

fn open_sink(path: Option<&Path>) -> anyhow::Result<Box<dyn TelemetrySink>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create telemetry file {:?}", path))?;
            Ok(Box::new(JsonLinesSink::new(BufWriter::new(file))))
        }
        None => Ok(Box::new(NullSink)),
    }
}

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args_os().skip(1);
    let Some(config_path) = args.next().map(PathBuf::from) else {
        bail!("usage: flightcore <config.toml|config.json> [replay.jsonl]");
    };
    let replay_path = args.next().map(PathBuf::from);

    let settings = DriverSettings::load(&config_path)?;
    let _log_guard = init_logging(&settings)?;

    tracing::info!("Starting flight core with {:?}", config_path);

    let mut tree = PropertyTree::new();
    config::load_file(&mut tree, config::CONFIG_ROOT, &config_path)?;

    let telemetry = Telemetry::new(
        open_sink(settings.remote_link_path.as_deref())?,
        open_sink(settings.logging_path.as_deref())?,
    );
    let mut core = FlightCore::new(tree, telemetry).context("Failed to build flight core")?;

    let mut replay = replay_path.as_ref().map(ReplayReader::open).transpose()?;

    let dt = settings.dt();
    let period = Duration::from_secs_f64(dt);
    let mut next_tick = Instant::now();

    loop {
        if settings.max_ticks > 0 && core.ticks() >= settings.max_ticks {
            tracing::info!("Reached max_ticks = {}", settings.max_ticks);
            break;
        }

        match replay.as_mut() {
            Some(reader) => {
                if !reader.apply_next(core.tree_mut())? {
                    tracing::info!("Replay finished after {} frames", reader.frames());
                    break;
                }
            }
            None => {
                next_tick += period;
                let now = Instant::now();
                if next_tick > now {
                    std::thread::sleep(next_tick - now);
                }
            }
        }

        core.tick(dt);
    }

    core.close();
    for line in core.profile_summaries() {
        println!("{}", line);
    }

    Ok(())
}
