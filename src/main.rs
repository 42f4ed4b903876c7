//! Admission Scanner - command line front end
//!
//! Replays recorded OCR transcripts through the scan pipeline, and offers a
//! few utilities around extraction and the stored record.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use admission_scanner::analysis::check_digit;
use admission_scanner::capture::ReplaySource;
use admission_scanner::config::{self, AppConfig};
use admission_scanner::storage::{self, Database, RecordStore};
use admission_scanner::vision::{ScriptedOcr, TextSnapshot};
use admission_scanner::{FieldExtractor, ScanController, ScanEvent, ScanState};

/// Admission Scanner - read patient admission slips into structured records
#[derive(Parser, Debug)]
#[command(name = "admission-scan")]
#[command(about = "Reads patient admission slips from OCR text by multi-frame consensus")]
struct Args {
    /// Configuration file (defaults to config.toml in the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay transcript files as camera frames until consensus
    Scan {
        /// Directory with one OCR transcript per file, replayed in name order
        #[arg(long)]
        transcripts: PathBuf,

        /// Frames per second
        #[arg(long)]
        fps: Option<u32>,

        /// Agreeing reads required per field
        #[arg(long)]
        threshold: Option<usize>,

        /// Times the transcript set is replayed
        #[arg(long, default_value = "10")]
        repeat: u64,
    },
    /// Print the fields found in a single transcript
    Extract {
        /// Transcript file
        file: PathBuf,
    },
    /// Compute (8 digits) or verify (9 digits) a billing number check digit
    CheckDigit {
        digits: String,
    },
    /// Print the stored record
    ShowRecord,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = load_or_create_config(args.config.as_deref())?;

    match args.command {
        Command::Scan {
            transcripts,
            fps,
            threshold,
            repeat,
        } => run_scan(config, &transcripts, fps, threshold, repeat),
        Command::Extract { file } => run_extract(&config, &file),
        Command::CheckDigit { digits } => run_check_digit(&digits),
        Command::ShowRecord => run_show_record(&config),
    }
}

/// Load configuration from file or create default
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring unreadable configuration: {:#}", e),
            }
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn open_database(config: &AppConfig) -> Result<Database> {
    let path = match &config.storage.database_path {
        Some(path) => path.clone(),
        None => storage::default_database_path()?,
    };
    Database::open(&path)
}

/// Read every file in the directory, sorted by name
fn read_transcripts(dir: &Path) -> Result<Vec<Option<String>>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok((!text.trim().is_empty()).then_some(text))
        })
        .collect()
}

fn run_scan(
    mut config: AppConfig,
    dir: &Path,
    fps: Option<u32>,
    threshold: Option<usize>,
    repeat: u64,
) -> Result<()> {
    if let Some(fps) = fps {
        config.capture.target_fps = fps;
    }
    if let Some(threshold) = threshold {
        config.consensus.threshold = threshold;
    }

    let transcripts = read_transcripts(dir)?;
    if transcripts.is_empty() {
        bail!("No transcripts found in {}", dir.display());
    }
    let frames = transcripts.len() as u64 * repeat.max(1);
    info!(
        "Replaying {} transcripts as {} frames at {} fps",
        transcripts.len(),
        frames,
        config.capture.target_fps
    );

    let store = open_database(&config)?;
    let mut scanner = ScanController::new(&config, Box::new(store));
    let events = scanner.events();

    scanner.open_camera(
        Box::new(ReplaySource::finite(frames)),
        Box::new(ScriptedOcr::new(transcripts)),
    )?;
    scanner.start()?;

    let budget = Duration::from_secs_f64(frames as f64 / f64::from(config.capture.target_fps.max(1)))
        + Duration::from_secs(5);
    let state = scanner.run_until_settled(budget);

    for event in events.try_iter() {
        if let ScanEvent::Error(message) = event {
            warn!("{}", message);
        }
    }

    match (state, scanner.last_record()) {
        (ScanState::Idle, Some(record)) => {
            println!("{}", serde_json::to_string_pretty(record)?);
            Ok(())
        }
        _ => {
            let outstanding = scanner
                .session()
                .map(|s| config.consensus_policy().outstanding(s.accumulator()))
                .unwrap_or_default();
            for (field, count) in &outstanding {
                eprintln!("  {}: {}/{}", field, count, config.consensus.threshold);
            }
            bail!("Consensus not reached")
        }
    }
}

fn run_extract(config: &AppConfig, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let Some(snapshot) = TextSnapshot::from_text(0, &text) else {
        println!("No text detected");
        return Ok(());
    };

    let extraction = FieldExtractor::new(&config.extraction_options()).extract(&snapshot);
    if extraction.is_empty() {
        println!("No fields found");
    }
    for candidate in &extraction.candidates {
        println!(
            "{:<20} {:<24} (line {})",
            candidate.field.as_str(),
            candidate.value,
            candidate.source_line + 1
        );
    }
    if extraction.failures > 0 {
        warn!("{} parsers failed", extraction.failures);
    }
    Ok(())
}

fn run_check_digit(digits: &str) -> Result<()> {
    match digits.len() {
        8 => match check_digit::compute(digits) {
            Some(digit) => println!("{}{}", digits, digit),
            None => println!("{} has no valid check digit", digits),
        },
        9 => {
            let verdict = if check_digit::is_valid(digits) {
                "valid"
            } else {
                "invalid"
            };
            println!("{} is {}", digits, verdict);
        }
        _ => bail!("Expected 8 or 9 digits, got {:?}", digits),
    }
    Ok(())
}

fn run_show_record(config: &AppConfig) -> Result<()> {
    let db = open_database(config)?;
    match db.load_record(&config.storage.record_key)? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("No record stored"),
    }
    Ok(())
}
