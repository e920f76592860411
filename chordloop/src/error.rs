// Error type for generation, voicing, and export.
//
// Every outcome of a batch is either a complete, validated set of
// progressions or exactly one of these fatal errors. Rejections inside the
// search loop are not errors; they are `BuildOutcome::Rejected` values that
// the generator retries silently (see builder.rs).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The configuration can never produce output (e.g. every chord quality
    /// disabled under strict balance, or inconsistent tables).
    #[error("configuration error: {0}")]
    Config(String),

    /// A slot exhausted its try budget.
    #[error("could not build progression {slot}: search space too constrained after {tries} tries")]
    Unsatisfiable { slot: usize, tries: usize },

    /// A generated batch failed a post-generation safety check.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("bad chord name: {0}")]
    ChordName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MIDI error: {0}")]
    Midi(String),
}
