use anyhow::{Context, Result, bail};
use bus::RecordEvent;
use clap::{Parser, Subcommand};
use record::RecorderConfig;
use replay::Replayer;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

mod session;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "retrace")]
#[command(about = "Record document and canvas activity, and replay it", long_about = None)]
#[command(version)]
struct Cli {
    /// Recorder settings file (TOML). Without one, `rr-block` subtrees are
    /// blocked.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the demo session and print its stream as JSON lines
    Record,
    /// Replay a JSON-lines stream and print the rebuilt document
    Replay {
        /// Stream file, or `-` for stdin
        input: PathBuf,
    },
    /// Record the demo session, replay it, and compare both sides
    Roundtrip,
}

fn load_config(path: Option<&Path>) -> Result<RecorderConfig> {
    match path {
        Some(path) => RecorderConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(RecorderConfig {
            block_class: Some("^rr-block$".to_string()),
            check_ancestors: true,
            ..RecorderConfig::default()
        }),
    }
}

fn read_stream(input: &Path) -> Result<Vec<RecordEvent>> {
    let reader: Box<dyn BufRead> = if input == Path::new("-") {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = std::fs::File::open(input)
            .with_context(|| format!("opening {}", input.display()))?;
        Box::new(BufReader::new(file))
    };
    let mut events = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: not a record", input.display(), n + 1))?;
        events.push(event);
    }
    Ok(events)
}

fn print_replay(replayer: &Replayer, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", replayer.snapshot())?;
    for owner in replayer.calls().owners() {
        writeln!(out, "canvas {owner}:")?;
        for line in replayer.journal(owner) {
            writeln!(out, "  {line}")?;
        }
    }
    let stats = replayer.stats();
    writeln!(out, "applied {} records, dropped {}", stats.applied, stats.dropped)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Record => {
            let config = load_config(cli.config.as_deref())?;
            let recording = session::record(&config)?;
            for event in &recording.events {
                writeln!(out, "{}", serde_json::to_string(event)?)?;
            }
        }
        Commands::Replay { input } => {
            let events = read_stream(&input)?;
            let mut replayer = Replayer::new();
            let failed = replayer.apply_all(&events);
            print_replay(&replayer, &mut out)?;
            if failed > 0 {
                bail!("{failed} of {} records could not be replayed", events.len());
            }
        }
        Commands::Roundtrip => {
            let config = load_config(cli.config.as_deref())?;
            let recording = session::record(&config)?;
            // The stream goes through its wire form, as it would in transit.
            let mut events = Vec::with_capacity(recording.events.len());
            for event in &recording.events {
                events.push(serde_json::from_str::<RecordEvent>(&serde_json::to_string(event)?)?);
            }
            let mut replayer = Replayer::new();
            let failed = replayer.apply_all(&events);
            print_replay(&replayer, &mut out)?;

            let mut mismatches = failed;
            for (owner, journal) in &recording.journals {
                if *owner < 1 {
                    log::info!(target: "retrace", "canvas not recorded, journal not compared");
                    continue;
                }
                if replayer.journal(*owner) != *journal {
                    log::error!(target: "retrace", "canvas {owner}: journals differ");
                    mismatches += 1;
                }
            }
            let policy = config.policy()?;
            if policy.is_empty() && replayer.snapshot() != recording.snapshot {
                log::error!(target: "retrace", "replayed document differs");
                mismatches += 1;
            }
            if mismatches > 0 {
                bail!("round trip found {mismatches} mismatches");
            }
            writeln!(out, "round trip ok: {} records", events.len())?;
        }
    }
    Ok(())
}
