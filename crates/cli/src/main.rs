mod config;
mod error;
mod input;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use storage::{
    DirectorySink, DumpFile, DumpSink, KeyValueStore, Pipeline, SharedPipeline, SqliteStore,
    Status, Timestamp, now_millis,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use config::{Backend, Config, PollConfig, StorageConfig};
use error::Result;
use input::Command;

const CONFIG_FILE: &str = "porelog.toml";
const DEFAULT_LOG_FILTER: &str = "info,storage=info,porelog=info";

type Recorder = Pipeline<SqliteStore, DirectorySink>;

#[derive(Parser)]
#[command(name = "porelog")]
#[command(about = "Event and metric recorder for the nanopore control panel", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./porelog.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a single event
    Event {
        /// Event type, e.g. "click"
        kind: String,
        /// Result message
        value: String,
        /// Request URL the event refers to
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Show stored counts
    Status,
    /// Dump everything stored to a JSON file and clear storage
    Dump {
        /// Timestamp (ms since epoch) for the file name; defaults to now
        #[arg(long)]
        ts: Option<i64>,
    },
    /// Record events and metrics typed on stdin
    Record,
    /// Store a test metric on a fixed timer, dumping on exit
    Simulate {
        /// Stop after this many ticks instead of waiting for Ctrl+C
        #[arg(short, long)]
        ticks: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Event { kind, value, url }) => {
            cmd_event(&config, &kind, url.as_deref(), &value)
        }
        Some(Commands::Status) | None => cmd_status(&config),
        Some(Commands::Dump { ts }) => cmd_dump(&config, ts),
        Some(Commands::Record) => cmd_record(&config),
        Some(Commands::Simulate { ticks }) => cmd_simulate(&config, ticks).await,
    }
}

fn cmd_event(config: &Config, kind: &str, url: Option<&str>, value: &str) -> Result<()> {
    let mut recorder = open_recorder(config)?;
    recorder.store_event(kind, url, value)?;
    println!("Stored event '{kind}' ({} stored)", recorder.event_count()?);
    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    let recorder = open_recorder(config)?;
    print_status(&recorder.status()?);
    Ok(())
}

fn cmd_dump(config: &Config, ts: Option<i64>) -> Result<()> {
    let mut recorder = open_recorder(config)?;
    let ts = ts.unwrap_or_else(now_millis);
    let file = recorder.dump(ts)?;
    print_dump(&config.dump.dir, &file, ts);
    Ok(())
}

fn cmd_record(config: &Config) -> Result<()> {
    let mut recorder = open_recorder(config)?;
    println!("porelog v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'help' for commands, 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let command = match input::parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("Error: {e}\n");
                continue;
            }
        };

        let outcome = match command {
            Command::Quit => break,
            Command::Help => {
                println!("{}", input::HELP);
                Ok(())
            }
            Command::Event { kind, url, value } => {
                recorder.store_event(&kind, url.as_deref(), &value)
            }
            Command::Metric { kind, value } => recorder.store_metric(&kind, value),
            Command::Flush => recorder.flush().map(|flushed| {
                if !flushed {
                    println!("Nothing to flush.");
                }
            }),
            Command::Dump => {
                let ts = now_millis();
                recorder
                    .dump(ts)
                    .map(|file| print_dump(&config.dump.dir, &file, ts))
            }
            Command::Status => recorder.status().map(|status| print_status(&status)),
        };

        if let Err(e) = outcome {
            eprintln!("Error: {e}\n");
        }
    }

    let pending = recorder.buffered();
    if pending > 0 {
        println!("\nDiscarding {pending} unflushed metrics.");
    }
    Ok(())
}

async fn cmd_simulate(config: &Config, ticks: Option<u64>) -> Result<()> {
    let shared = SharedPipeline::new(open_recorder(config)?);
    let poll = config.poll.clone();
    println!(
        "Recording '{}' every {} ms. Press Ctrl+C to stop.",
        poll.metric, poll.interval_ms
    );

    simulate(shared, poll, ticks, |file, ts| {
        print_dump(&config.dump.dir, file, ts)
    })
    .await
}

/// Record `poll.metric` on every tick until `ticks` run out or Ctrl+C, then
/// dump. The dump also runs when polling stops on an error, which is then
/// returned.
async fn simulate<S, D>(
    shared: SharedPipeline<S, D>,
    poll: PollConfig,
    ticks: Option<u64>,
    on_dump: impl FnOnce(&DumpFile, Timestamp),
) -> Result<()>
where
    S: KeyValueStore + Send + 'static,
    D: DumpSink + Send + 'static,
{
    let mut worker = {
        let shared = shared.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(poll.interval_ms));
            let mut count = 0u64;
            while ticks.is_none_or(|limit| count < limit) {
                interval.tick().await;
                shared.store_metric(&poll.metric, poll.value)?;
                count += 1;
                tracing::trace!(count, "Tick");
            }
            Ok::<_, storage::Error>(count)
        })
    };

    let outcome: Result<()> = tokio::select! {
        joined = &mut worker => match joined {
            Ok(Ok(count)) => {
                tracing::info!(count, "Simulation finished");
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(e.into()),
        },
        signal = tokio::signal::ctrl_c() => {
            worker.abort();
            tracing::info!("Interrupted, dumping");
            signal.map_err(Into::into)
        }
    };
    if let Err(e) = &outcome {
        tracing::warn!(error = %e, "Polling stopped early, dumping what was recorded");
    }

    print_status(&shared.status()?);
    let ts = now_millis();
    let file = shared.dump(ts)?;
    on_dump(&file, ts);
    outcome
}

fn print_status(status: &Status) {
    println!("{:<20} {}", "Dumps:", status.dumps);
    println!("{:<20} {}", "Events:", status.events);
    println!("{:<20} {}", "Metric sets stored:", status.metric_batches);
    println!("{:<20} {}", "Metrics buffered:", status.buffered_metrics);
}

fn print_dump(dir: &Path, file: &DumpFile, ts: Timestamp) {
    let when = Local
        .timestamp_millis_opt(ts)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string());
    println!(
        "[{when}] Wrote {} ({} events, {} metric sets)",
        dir.join(&file.name).display(),
        file.events,
        file.metrics
    );
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Ok(Config::load(path)?);
    }

    let default_path = Path::new(CONFIG_FILE);
    if default_path.exists() {
        Ok(Config::load(default_path)?)
    } else {
        Ok(Config::default())
    }
}

fn open_recorder(config: &Config) -> Result<Recorder> {
    let store = open_store(&config.storage)?;
    let sink = DirectorySink::new(&config.dump.dir);
    Ok(Pipeline::with_config(store, sink, config.pipeline.clone())?)
}

fn open_store(storage: &StorageConfig) -> Result<SqliteStore> {
    match storage.backend {
        Backend::Session => Ok(SqliteStore::in_memory()?),
        Backend::Local => {
            let path = match &storage.path {
                Some(path) => path.clone(),
                None => dirs_data_dir()
                    .unwrap_or_else(|| ".porelog".into())
                    .join("store.db"),
            };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            tracing::debug!(path = %path.display(), "Opening local store");
            Ok(SqliteStore::open(&path)?)
        }
    }
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/porelog"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("porelog"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("porelog"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::MemoryStore;

    /// Rejects the first `failures` metric batch writes.
    struct FlakyStore {
        inner: MemoryStore,
        failures: usize,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> storage::Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> storage::Result<()> {
            if key.starts_with("metric-") && self.failures > 0 {
                self.failures -= 1;
                return Err(storage::Error::QuotaExceeded {
                    key: key.to_string(),
                    needed: value.len(),
                    limit: 0,
                });
            }
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> storage::Result<()> {
            self.inner.remove(key)
        }
    }

    fn session_config(dump_dir: &Path) -> Config {
        let mut config = Config::default();
        config.storage.backend = Backend::Session;
        config.dump.dir = dump_dir.to_path_buf();
        config
    }

    #[test]
    fn local_backend_persists_between_recorders() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.path = Some(dir.path().join("nested/store.db"));
        config.dump.dir = dir.path().join("dumps");

        open_recorder(&config)
            .unwrap()
            .store_event("click", Some("/setVoltage?value=0.5"), "ok")
            .unwrap();

        let mut recorder = open_recorder(&config).unwrap();
        assert_eq!(recorder.event_count().unwrap(), 1);

        let file = recorder.dump(1_700_000_000_000).unwrap();
        assert_eq!(file.name, "dump_0_events_1_metrics0_ts_1700000000000.json");
        assert!(config.dump.dir.join(&file.name).exists());
        assert_eq!(open_recorder(&config).unwrap().event_count().unwrap(), 0);
    }

    #[test]
    fn session_backend_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = session_config(dir.path());

        open_recorder(&config)
            .unwrap()
            .store_event("click", None, "ok")
            .unwrap();
        assert_eq!(open_recorder(&config).unwrap().event_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn simulate_dumps_after_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = session_config(dir.path());
        config.pipeline.batch_size = 4;

        cmd_simulate(&config, Some(10)).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("dump_0_events_0_metrics3_ts_"));
    }

    #[tokio::test]
    async fn simulate_dumps_before_reporting_a_failed_tick() {
        let store = FlakyStore {
            inner: MemoryStore::new(),
            failures: 1,
        };
        let config = storage::PipelineConfig {
            batch_size: 2,
            ..Default::default()
        };
        let pipeline = Pipeline::with_config(store, Vec::<DumpFile>::new(), config).unwrap();
        let shared = SharedPipeline::new(pipeline);
        let poll = PollConfig {
            interval_ms: 1,
            ..Default::default()
        };

        let mut dumped = None;
        let err = simulate(shared.clone(), poll, Some(5), |file, _| {
            dumped = Some(file.clone())
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            error::Error::Storage(storage::Error::QuotaExceeded { .. })
        ));

        // The batch that failed mid-run was retried by the dump's flush.
        let dumped = dumped.unwrap();
        assert_eq!(dumped.metrics, 1);
        let pipeline = shared.lock();
        assert_eq!(pipeline.sink().len(), 1);
        assert_eq!(pipeline.sink()[0].name, dumped.name);
        assert_eq!(pipeline.metric_count().unwrap(), 0);
        assert_eq!(pipeline.buffered(), 0);
    }
}
