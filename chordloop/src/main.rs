// CLI entry point for the chord-loop generator.
//
// Generates a batch of loopable progressions, prints them as a table with
// the batch diagnostics, and (unless --dry-run) writes the MIDI pack.
//
// Usage:
//   generate [OPTIONS]
//     -n, --count <N>           Progressions to generate, 1-100 (default: 10)
//     --seed <SEED>             Batch seed (random when absent)
//     --revoice                 Re-voice chords instead of raw shapes
//     --balance <PAIRS>         Quality sliders, e.g. maj9=80,sus2=0
//     --balance-file <PATH>     Quality sliders as a JSON object
//     --banlist <PATH>          Banned chord sequences, one per line
//     --config <PATH>           JSON generator/voicing/export config
//     -o, --out <DIR>           Pack directory (default: pack)
//     --dry-run                 Print the table only
//     -v                        More logging (-v info, -vv debug, -vvv trace)

use chordloop::balance::ChordBalance;
use chordloop::banlist::{BanList, BannedSequences, NoBans};
use chordloop::config::AppConfig;
use chordloop::export::{PackExporter, summary_rows};
use chordloop::generator::{Batch, generate_batch};
use chordloop::voicing::VoicingMode;
use clap::{ArgAction, Parser};
use log::LevelFilter;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(name = "generate", version, about = "Ambient chord-loop MIDI pack generator")]
struct Cli {
    /// Number of progressions
    #[arg(short = 'n', long = "count", default_value_t = 10,
          value_parser = clap::value_parser!(u16).range(1..=100))]
    count: u16,

    /// Batch seed; the same seed reproduces the same pack
    #[arg(long)]
    seed: Option<u64>,

    /// Re-voice chords with the voicing engine
    #[arg(long, action = ArgAction::SetTrue)]
    revoice: bool,

    /// Quality sliders as quality=value pairs (0 disables, 50 neutral)
    #[arg(long, value_name = "PAIRS", conflicts_with = "balance_file")]
    balance: Option<String>,

    /// Quality sliders as a JSON object
    #[arg(long, value_name = "PATH")]
    balance_file: Option<PathBuf>,

    /// Banned chord sequences, one per line
    #[arg(long, value_name = "PATH")]
    banlist: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output directory for the pack
    #[arg(short = 'o', long = "out", default_value = "pack")]
    out: PathBuf,

    /// Print the batch without writing files
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn random_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn load_balance(cli: &Cli) -> chordloop::Result<Option<ChordBalance>> {
    if let Some(pairs) = &cli.balance {
        return ChordBalance::parse_pairs(pairs).map(Some);
    }
    cli.balance_file.as_deref().map(ChordBalance::load).transpose()
}

fn print_batch(batch: &Batch, seed: u64) {
    println!("Seed: {seed}");
    println!("{:>3}  {:<3}  {:>4}  Chords", "#", "Key", "Bars");
    for row in summary_rows(&batch.progressions) {
        println!("{:>3}  {:<3}  {:>4}  {}", row.index, row.key.name(), row.bars, row.chords);
    }

    let d = &batch.diagnostics;
    println!();
    println!(
        "Pattern repeats: {}/{}  Low-similarity transitions: {}  Tries: {}",
        d.pattern_dupe_used, d.max_pattern_dupes, d.low_sim_total, d.total_tries
    );
    let usage: Vec<String> = d.quality_usage.iter().map(|(q, n)| format!("{q}={n}")).collect();
    println!("Quality usage: {}", usage.join(", "));
}

fn run(cli: &Cli) -> chordloop::Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let balance = load_balance(cli)?;
    let banlist = cli.banlist.as_deref().map(BanList::load).transpose()?;
    let bans: &dyn BannedSequences = match &banlist {
        Some(list) => list,
        None => &NoBans,
    };
    let seed = cli.seed.unwrap_or_else(random_seed);

    let batch = generate_batch(cli.count as usize, seed, &config.generator, balance.as_ref(), bans)?;
    print_batch(&batch, seed);
    if cli.dry_run {
        return Ok(());
    }

    let exporter = PackExporter::new(&config, VoicingMode::from_flag(cli.revoice), seed);
    let report = exporter.write_pack(&batch, &cli.out)?;
    println!();
    println!(
        "Wrote {} progressions and {} chords to {}",
        report.progression_files.len(),
        report.chord_files.len(),
        cli.out.display()
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
