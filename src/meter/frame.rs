//! Measurement frames emitted by the loudness meter

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reporting state of one loudness scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleState {
    /// A value is being reported (live or held)
    Ok,
    /// Not enough signal to report a value
    InsufficientSignal,
}

/// Value and state of one loudness scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleReading {
    /// Loudness in LUFS, `None` while the state is `InsufficientSignal`
    pub value: Option<f64>,
    pub state: ScaleState,
}

impl ScaleReading {
    /// A reading with a value
    pub fn ok(value: f64) -> Self {
        Self {
            value: Some(value),
            state: ScaleState::Ok,
        }
    }

    /// A reading without a value
    pub fn insufficient() -> Self {
        Self {
            value: None,
            state: ScaleState::InsufficientSignal,
        }
    }

    /// True if a value is reported
    pub fn is_ok(&self) -> bool {
        self.state == ScaleState::Ok
    }
}

/// Immutable measurement snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoudnessFrame {
    /// Seconds of audio consumed when the frame was taken
    pub time: f64,
    pub momentary: ScaleReading,
    pub short_term: ScaleReading,
    pub integrated: ScaleReading,
    /// Session maximum of the oversampled peak
    pub true_peak_dbtp: f64,
    /// Session maximum of the raw sample peak
    pub sample_peak_dbfs: f64,
    /// True peak minus short-term loudness
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub crest_factor_db: Option<f64>,
    /// Target loudness minus integrated loudness
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gain_to_target_db: Option<f64>,
    /// EBU Tech 3342 loudness range
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub loudness_range_lu: Option<f64>,
}

fn write_scale(f: &mut fmt::Formatter<'_>, label: &str, reading: &ScaleReading) -> fmt::Result {
    match reading.value {
        Some(value) => write!(f, "{} {:.1} LUFS", label, value),
        None => write!(f, "{} --", label),
    }
}

impl fmt::Display for LoudnessFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>7.2}s] ", self.time)?;
        write_scale(f, "M", &self.momentary)?;
        write!(f, ", ")?;
        write_scale(f, "S", &self.short_term)?;
        write!(f, ", ")?;
        write_scale(f, "I", &self.integrated)?;
        write!(f, ", TP {:.1} dBTP", self.true_peak_dbtp)?;
        if let Some(lra) = self.loudness_range_lu {
            write!(f, ", LRA {:.1} LU", lra)?;
        }
        if let Some(gain) = self.gain_to_target_db {
            write!(f, ", to target {:+.1} dB", gain)?;
        }
        Ok(())
    }
}
