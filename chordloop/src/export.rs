// Pack export: validated batches to a directory of MIDI files.
//
// Layout under the output directory:
//
//   Progressions/{4-bar,8-bar,16-bar}/Prog_001_in_C_Cmaj9-Amin7-...mid
//   Chords/Cmaj9.mid
//   summary.json
//
// Revoiced packs carry a `_Revoiced` suffix on every MIDI file name. The
// chord library holds one file per distinct chord symbol of the batch, in
// sorted order, each `chord_length_bars` long. Progression numbers are
// 1-based and double as the voicing sub-stream index, so re-exporting a
// batch with the same seed writes identical files.

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::generator::{Batch, BatchDiagnostics};
use crate::midi::write_midi;
use crate::progression::{ChordSymbol, Progression};
use crate::theory::Key;
use crate::voicing::{ChordEvent, VoicingEngine, VoicingMode, schedule};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory for a progression of `bars` total bars.
pub fn bar_dir(bars: u32) -> Option<&'static str> {
    match bars {
        4 => Some("4-bar"),
        8 => Some("8-bar"),
        16 => Some("16-bar"),
        _ => None,
    }
}

/// Keep only characters that are safe in a file name.
pub fn safe_token(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '#' | '-'))
        .collect()
}

/// Check a batch before anything is written.
pub fn validate_progressions(progressions: &[Progression]) -> Result<()> {
    if progressions.is_empty() {
        return Err(Error::Validation("no progressions generated".into()));
    }
    for (i, p) in progressions.iter().enumerate() {
        let number = i + 1;
        if p.chords.len() != p.durations.len() {
            return Err(Error::Validation(format!(
                "progression {number}: {} chords but {} durations",
                p.chords.len(),
                p.durations.len()
            )));
        }
        let bars = p.total_bars();
        if bar_dir(bars).is_none() {
            return Err(Error::Validation(format!("progression {number}: invalid bar sum {bars}")));
        }
        for chord in &p.chords {
            crate::chord_name::parse_chord_name(&chord.to_string())
                .map_err(|e| Error::Validation(format!("progression {number}: {e}")))?;
        }
    }
    Ok(())
}

/// One row of the batch table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub index: usize,
    pub key: Key,
    pub bars: u32,
    pub chords: String,
}

pub fn summary_rows(progressions: &[Progression]) -> Vec<SummaryRow> {
    progressions
        .iter()
        .enumerate()
        .map(|(i, p)| SummaryRow {
            index: i + 1,
            key: p.key,
            bars: p.total_bars(),
            chords: p.chord_list(" - "),
        })
        .collect()
}

/// Contents of `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackSummary {
    pub seed: u64,
    pub mode: VoicingMode,
    pub rows: Vec<SummaryRow>,
    pub diagnostics: BatchDiagnostics,
}

/// Paths written by one export.
#[derive(Debug, Clone, Default)]
pub struct PackReport {
    pub progression_files: Vec<PathBuf>,
    pub chord_files: Vec<PathBuf>,
    pub summary_file: PathBuf,
}

/// Writes batches as MIDI packs.
pub struct PackExporter<'a> {
    config: &'a AppConfig,
    engine: VoicingEngine<'a>,
    mode: VoicingMode,
    seed: u64,
}

impl<'a> PackExporter<'a> {
    pub fn new(config: &'a AppConfig, mode: VoicingMode, seed: u64) -> Self {
        PackExporter { config, engine: VoicingEngine::new(&config.voicing), mode, seed }
    }

    /// File name of progression number `number` (1-based).
    pub fn progression_file_name(&self, number: usize, p: &Progression) -> String {
        let chords: Vec<String> = p.chords.iter().map(|c| safe_token(&c.to_string())).collect();
        format!(
            "Prog_{number:03}_in_{}_{}{}.mid",
            safe_token(p.key.name()),
            chords.join("-"),
            self.mode.file_tag()
        )
    }

    pub fn chord_file_name(&self, symbol: ChordSymbol) -> String {
        format!("{}{}.mid", safe_token(&symbol.to_string()), self.mode.file_tag())
    }

    /// Scheduled chords of progression number `number`.
    pub fn progression_events(&self, number: usize, p: &Progression) -> Vec<ChordEvent> {
        let voiced = self.engine.voice_progression(p, self.mode, self.seed, number);
        schedule(&voiced, &p.durations, &self.config.export)
    }

    /// A single sustained chord for the chord library.
    pub fn chord_events(&self, symbol: ChordSymbol) -> Result<Vec<ChordEvent>> {
        let notes = self.engine.voice_single_chord(&symbol.to_string(), self.mode, self.seed)?;
        Ok(schedule(&[notes], &[self.config.export.chord_length_bars], &self.config.export))
    }

    /// Validate `batch` and write the whole pack under `out_dir`.
    pub fn write_pack(&self, batch: &Batch, out_dir: &Path) -> Result<PackReport> {
        self.config.voicing.validate()?;
        validate_progressions(&batch.progressions)?;
        let export = &self.config.export;
        let mut report = PackReport::default();

        for (i, p) in batch.progressions.iter().enumerate() {
            let number = i + 1;
            let bars = p.total_bars();
            let sub = bar_dir(bars)
                .ok_or_else(|| Error::Validation(format!("progression {number}: invalid bar sum {bars}")))?;
            let dir = out_dir.join("Progressions").join(sub);
            fs::create_dir_all(&dir)?;
            let path = dir.join(self.progression_file_name(number, p));
            write_midi(&self.progression_events(number, p), export, &path)?;
            debug!("wrote {}", path.display());
            report.progression_files.push(path);
        }

        let unique: BTreeSet<String> = batch
            .progressions
            .iter()
            .flat_map(|p| p.chords.iter().map(|c| c.to_string()))
            .collect();
        let chords_dir = out_dir.join("Chords");
        fs::create_dir_all(&chords_dir)?;
        for name in &unique {
            let symbol = crate::chord_name::parse_chord_name(name)?.symbol;
            let path = chords_dir.join(self.chord_file_name(symbol));
            write_midi(&self.chord_events(symbol)?, export, &path)?;
            report.chord_files.push(path);
        }

        let summary = PackSummary {
            seed: self.seed,
            mode: self.mode,
            rows: summary_rows(&batch.progressions),
            diagnostics: batch.diagnostics.clone(),
        };
        report.summary_file = out_dir.join("summary.json");
        fs::write(&report.summary_file, serde_json::to_string_pretty(&summary)?)?;

        info!(
            "wrote {} progressions and {} chords to {}",
            report.progression_files.len(),
            report.chord_files.len(),
            out_dir.display()
        );
        Ok(report)
    }
}
