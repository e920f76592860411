// Chord-type balance sliders and per-key degree pools.
//
// A balance maps each quality to a slider value in [0, 100]: 50 is neutral,
// 0 disables the quality, 100 strongly favors it. Qualities missing from the
// map sit at 50. Without a balance every quality is enabled at weight 1.0.
//
// The builder never samples from raw sliders. Instead, for each key we
// pre-compute `DegreePools`: for each of the seven scale degrees, the enabled
// qualities that are diatonic at that root, weighted by `balance_factor`.
// Pools are immutable data injected into the builder, computed once per key
// per batch.
//
// Strict mode: if a balance disables every quality, `DegreePools::for_key`
// fails immediately with a configuration error. A degree whose pool is empty
// is not an error; any template that lands on it is simply rejected.

use crate::error::{Error, Result};
use crate::quality::Quality;
use crate::theory::{Key, is_diatonic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Slider value used for qualities missing from a balance.
pub const NEUTRAL: u8 = 50;

/// Weight floor so that an enabled quality never gets zero probability.
const MIN_WEIGHT: f64 = 1e-9;

/// Slider value to sampling weight multiplier.
///
/// `f(0) = 0`, `f(50) = 1`, `f(v < 50) = max(0.02, v / 50)`,
/// `f(v > 50) = 1 + (v - 50) / 50`.
pub fn balance_factor(value: u8) -> f64 {
    let v = value.min(100);
    match v {
        0 => 0.0,
        50 => 1.0,
        v if v < 50 => (v as f64 / 50.0).max(0.02),
        v => 1.0 + (v as f64 - 50.0) / 50.0,
    }
}

/// Per-quality slider values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, i64>", into = "BTreeMap<String, u8>")]
pub struct ChordBalance {
    values: BTreeMap<Quality, u8>,
}

impl ChordBalance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a slider, clamping to [0, 100].
    pub fn set(&mut self, quality: Quality, value: u8) {
        self.values.insert(quality, value.min(100));
    }

    pub fn with(mut self, quality: Quality, value: u8) -> Self {
        self.set(quality, value);
        self
    }

    /// A balance that disables every quality except `only`.
    pub fn only(only: Quality) -> Self {
        let mut balance = ChordBalance::new();
        for q in Quality::ALL {
            balance.set(q, if q == only { NEUTRAL } else { 0 });
        }
        balance
    }

    /// Slider value for a quality (50 when unset).
    pub fn value(&self, quality: Quality) -> u8 {
        self.values.get(&quality).copied().unwrap_or(NEUTRAL)
    }

    pub fn factor(&self, quality: Quality) -> f64 {
        balance_factor(self.value(quality))
    }

    /// Parse the command-line form `maj9=80,sus2=0`.
    pub fn parse_pairs(text: &str) -> Result<Self> {
        let mut balance = ChordBalance::new();
        for pair in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("balance entry '{pair}' is not quality=value")))?;
            let quality: Quality = name
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("{e}")))?;
            let value: i64 = value
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("balance value '{value}' is not a number")))?;
            balance.set(quality, clamp_slider(value));
        }
        Ok(balance)
    }

    /// Load a JSON object of `quality: value` pairs.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Out-of-range slider input is clamped rather than rejected.
fn clamp_slider(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

impl TryFrom<BTreeMap<String, i64>> for ChordBalance {
    type Error = String;

    fn try_from(raw: BTreeMap<String, i64>) -> std::result::Result<Self, Self::Error> {
        let mut balance = ChordBalance::new();
        for (name, value) in raw {
            let quality: Quality = name.parse().map_err(|e| format!("{e}"))?;
            balance.set(quality, clamp_slider(value));
        }
        Ok(balance)
    }
}

impl From<ChordBalance> for BTreeMap<String, u8> {
    fn from(balance: ChordBalance) -> Self {
        balance
            .values
            .into_iter()
            .map(|(q, v)| (q.name().to_string(), v))
            .collect()
    }
}

/// Qualities the builder may use: all of them without a balance, otherwise
/// those with a non-zero slider. Canonical order.
pub fn enabled_qualities(balance: Option<&ChordBalance>) -> Vec<Quality> {
    match balance {
        None => Quality::ALL.to_vec(),
        Some(b) => Quality::ALL
            .into_iter()
            .filter(|&q| b.value(q) > 0)
            .collect(),
    }
}

/// True when a sus slider is high enough to allow a sus opening chord.
pub fn sus_start_allowed(balance: Option<&ChordBalance>, threshold: u8) -> bool {
    balance.is_some_and(|b| Quality::SUS.iter().any(|&q| b.value(q) > threshold))
}

/// Average balance factor over the sus family (1.0 without a balance).
pub fn average_sus_factor(balance: Option<&ChordBalance>) -> f64 {
    match balance {
        None => 1.0,
        Some(b) => {
            let sum: f64 = Quality::SUS.iter().map(|&q| b.factor(q)).sum();
            sum / Quality::SUS.len() as f64
        }
    }
}

/// Allowed (quality, weight) pools for each scale degree of one key.
#[derive(Debug, Clone, PartialEq)]
pub struct DegreePools {
    key: Key,
    pools: [Vec<(Quality, f64)>; 7],
}

impl DegreePools {
    /// Build the pools for `key`.
    ///
    /// Under `strict`, a balance that enables nothing is a configuration
    /// error.
    pub fn for_key(key: Key, balance: Option<&ChordBalance>, strict: bool) -> Result<Self> {
        let enabled = enabled_qualities(balance);
        if strict && balance.is_some() && enabled.is_empty() {
            return Err(Error::Config(
                "all chord-type sliders are 0; enable at least one chord type".into(),
            ));
        }

        let pools = std::array::from_fn(|deg| {
            let root = key.degree_pc(deg as u8);
            enabled
                .iter()
                .filter(|&&q| is_diatonic(key, root, q))
                .map(|&q| {
                    let weight = balance.map_or(1.0, |b| b.factor(q).max(MIN_WEIGHT));
                    (q, weight)
                })
                .collect()
        });

        Ok(DegreePools { key, pools })
    }

    pub fn key(&self) -> Key {
        self.key
    }

    /// Pool for a 0-based degree (wraps modulo 7).
    pub fn pool(&self, degree: u8) -> &[(Quality, f64)] {
        &self.pools[(degree % 7) as usize]
    }

    /// True when `quality` may be used at `degree`.
    pub fn allows(&self, degree: u8, quality: Quality) -> bool {
        self.pool(degree).iter().any(|&(q, _)| q == quality)
    }
}
