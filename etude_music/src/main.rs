// Etude Music: CLI entry point.
//
// Composes a two-voice practice exercise and writes it as score JSON, and
// optionally as a MIDI file. Options come from an optional JSON file
// (camelCase keys, same as the library's `PracticeOptions`) with individual
// flags layered on top.
//
// Usage:
//   cargo run -p etude_music -- [output.json] [--options FILE] [--seed N]
//     [--key KEY] [--scale SCALE] [--bars N] [--beats-per-bar N]
//     [--difficulty easy|medium|hard] [--cadence none|authentic|plagal|deceptive]
//     [--title TEXT] [--bpm N] [--midi FILE]
//
// Set RUST_LOG=debug to see per-window generation details.

use clap::Parser;
use etude_music::compose::generate;
use etude_music::config::{Config, PracticeOptions};
use etude_music::error::ExportError;
use etude_music::midi::write_midi;
use etude_music::timeline::schedule;
use etude_prng::EtudeRng;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "generate")]
#[command(about = "Generate a two-voice piano practice exercise")]
struct Cli {
    /// Where to write the score JSON
    #[arg(default_value = "etude.json")]
    output: PathBuf,

    /// JSON file of practice options
    #[arg(long)]
    options: Option<PathBuf>,

    /// Seed for reproducible output (random if omitted)
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    key: Option<String>,

    #[arg(long)]
    scale: Option<String>,

    #[arg(long)]
    bars: Option<i64>,

    #[arg(long)]
    beats_per_bar: Option<i64>,

    #[arg(long)]
    difficulty: Option<String>,

    #[arg(long)]
    cadence: Option<String>,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    bpm: Option<i64>,

    /// Also write a MIDI file
    #[arg(long)]
    midi: Option<PathBuf>,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("  Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), ExportError> {
    let seed = cli.seed.unwrap_or_else(clock_seed);

    println!("=== Etude Music Generator ===");
    println!("Output: {}", cli.output.display());
    println!("Seed: {}", seed);
    println!();

    println!("[1/3] Resolving options...");
    let options = load_options(&cli)?;
    let config = Config::resolve(&options);
    println!(
        "  {} {} | {} bars of {}/4 | {:?} rhythm | {:?} cadence",
        config.key,
        config.scale,
        config.bars,
        config.beats_per_bar,
        config.rhythm_complexity,
        config.cadence
    );

    println!("[2/3] Composing...");
    let mut rng = EtudeRng::new(seed);
    let score = generate(&options, &mut rng);
    print!("{}", score.summary());

    println!("[3/3] Writing score to {}...", cli.output.display());
    let json = serde_json::to_string_pretty(&score)?;
    std::fs::write(&cli.output, json).map_err(|e| ExportError::io(&cli.output, e))?;

    if let Some(midi_path) = &cli.midi {
        println!("  Writing MIDI to {}...", midi_path.display());
        write_midi(&score, midi_path)?;
    }

    let timeline = schedule(&score, score.meta.bpm);
    println!(
        "  Done! Duration: {:.0}s at {} BPM",
        timeline.total_seconds, timeline.bpm
    );
    Ok(())
}

/// Options from the file (if any) with CLI flags layered over them.
fn load_options(cli: &Cli) -> Result<PracticeOptions, ExportError> {
    let mut options = match &cli.options {
        Some(path) => read_options(path)?,
        None => PracticeOptions::default(),
    };
    let overlay = [
        (&mut options.key, &cli.key),
        (&mut options.scale, &cli.scale),
        (&mut options.difficulty, &cli.difficulty),
        (&mut options.cadence, &cli.cadence),
        (&mut options.title, &cli.title),
    ];
    for (field, flag) in overlay {
        if flag.is_some() {
            field.clone_from(flag);
        }
    }
    if cli.bars.is_some() {
        options.bars = cli.bars;
    }
    if cli.beats_per_bar.is_some() {
        options.beats_per_bar = cli.beats_per_bar;
    }
    if cli.bpm.is_some() {
        options.bpm = cli.bpm;
    }
    Ok(options)
}

fn read_options(path: &Path) -> Result<PracticeOptions, ExportError> {
    let text = std::fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
    Ok(PracticeOptions::from_json(&text)?)
}

fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
