// MIDI output for scheduled chords.
//
// Writes a Standard MIDI File, format 1. Track 0 holds the tempo and time
// signature; track 1 holds the chords on channel 0. Every note of a chord
// starts at the chord's bar offset and ends when its bar count runs out, so
// a chord's notes sound together for its whole duration.
//
// Uses the `midly` crate for MIDI writing.

use crate::config::ExportConfig;
use crate::error::{Error, Result};
use crate::voicing::ChordEvent;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks in one bar of `export`'s time signature.
pub fn ticks_per_bar(export: &ExportConfig) -> u32 {
    let quarters_per_beat = 4.0 / export.beat_unit.max(1) as f64;
    (export.ticks_per_quarter as f64 * quarters_per_beat * export.beats_per_bar as f64).round() as u32
}

fn clamp_u7(value: i32) -> u7 {
    u7::new(value.clamp(0, 127) as u8)
}

/// A note edge at an absolute tick. Offs sort before ons at the same tick,
/// so back-to-back chords never swallow a repeated pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct NoteEdge {
    tick: u32,
    on: bool,
    key: u8,
}

fn tempo_track(export: &ExportConfig) -> Track<'static> {
    let micros_per_quarter = ((60_000_000.0 / export.bpm.max(1.0)).round() as u32).min(0xff_ffff);
    let denominator_pow2 = export.beat_unit.max(1).trailing_zeros() as u8;
    vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros_per_quarter))),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
                export.beats_per_bar,
                denominator_pow2,
                24,
                8,
            )),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ]
}

fn chord_track(events: &[ChordEvent], export: &ExportConfig) -> Track<'static> {
    let channel = u4::new(0);
    let bar_ticks = ticks_per_bar(export);

    let mut edges: Vec<NoteEdge> = Vec::new();
    for event in events {
        let start = event.start_bar * bar_ticks;
        let end = start + event.bars * bar_ticks;
        for &note in &event.notes {
            let key = note.clamp(0, 127) as u8;
            edges.push(NoteEdge { tick: start, on: true, key });
            edges.push(NoteEdge { tick: end, on: false, key });
        }
    }
    edges.sort();

    let mut track: Track<'static> = Vec::with_capacity(edges.len() + 3);
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Chords")),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange { program: clamp_u7(export.program as i32) },
        },
    });

    let velocity = clamp_u7(export.velocity as i32);
    let mut last_tick = 0u32;
    for edge in edges {
        let message = if edge.on {
            MidiMessage::NoteOn { key: u7::new(edge.key), vel: velocity }
        } else {
            MidiMessage::NoteOff { key: u7::new(edge.key), vel: u7::new(0) }
        };
        track.push(TrackEvent {
            delta: u28::new(edge.tick - last_tick),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = edge.tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

/// Build an in-memory SMF for a chord schedule.
pub fn chords_to_smf(events: &[ChordEvent], export: &ExportConfig) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(export.ticks_per_quarter.min(0x7fff))),
    ));
    smf.tracks.push(tempo_track(export));
    smf.tracks.push(chord_track(events, export));
    smf
}

/// Encode a chord schedule as SMF bytes.
pub fn encode_midi(events: &[ChordEvent], export: &ExportConfig) -> Result<Vec<u8>> {
    let smf = chords_to_smf(events, export);
    let mut buf = Vec::new();
    smf.write(&mut buf).map_err(|e| Error::Midi(e.to_string()))?;
    Ok(buf)
}

/// Write a chord schedule to a `.mid` file.
pub fn write_midi(events: &[ChordEvent], export: &ExportConfig, path: &Path) -> Result<()> {
    let bytes = encode_midi(events, export)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voicing::schedule;

    fn note_ons(smf: &Smf<'_>) -> Vec<(u32, u8)> {
        let mut tick = 0u32;
        let mut out = Vec::new();
        for ev in &smf.tracks[1] {
            tick += ev.delta.as_int();
            if let TrackEventKind::Midi { message: MidiMessage::NoteOn { key, .. }, .. } = ev.kind {
                out.push((tick, key.as_int()));
            }
        }
        out
    }

    #[test]
    fn bar_ticks_for_common_meters() {
        let mut export = ExportConfig::default();
        assert_eq!(ticks_per_bar(&export), 1920);
        export.beats_per_bar = 6;
        export.beat_unit = 8;
        assert_eq!(ticks_per_bar(&export), 1440);
    }

    #[test]
    fn chords_start_at_bar_offsets() {
        let export = ExportConfig::default();
        let events = schedule(&[vec![48, 55, 64], vec![50, 57, 65]], &[2, 2], &export);
        let smf = chords_to_smf(&events, &export);
        assert_eq!(smf.tracks.len(), 2);
        assert_eq!(smf.header.format, Format::Parallel);

        let ons = note_ons(&smf);
        assert_eq!(ons.len(), 6);
        assert!(ons[..3].iter().all(|&(t, _)| t == 0), "{ons:?}");
        assert!(ons[3..].iter().all(|&(t, _)| t == 2 * 1920), "{ons:?}");
    }

    #[test]
    fn encoded_file_parses_back() {
        let export = ExportConfig::default();
        let events = schedule(&[vec![60, 64, 67], vec![60, 65, 69]], &[1, 3], &export);
        let bytes = encode_midi(&events, &export).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.tracks.len(), 2);
        assert_eq!(smf.header.timing, Timing::Metrical(u15::new(480)));

        // Repeated C: the off at bar 1 comes before the next on.
        let mut tick = 0u32;
        let mut sounding = 0i32;
        for ev in &smf.tracks[1] {
            tick += ev.delta.as_int();
            if let TrackEventKind::Midi { message, .. } = ev.kind {
                match message {
                    MidiMessage::NoteOn { .. } => sounding += 1,
                    MidiMessage::NoteOff { .. } => sounding -= 1,
                    _ => {}
                }
                assert!(sounding <= 3, "more than one chord sounding at tick {tick}");
            }
        }
        assert_eq!(sounding, 0);
        assert_eq!(tick, 4 * 1920);
    }
}
