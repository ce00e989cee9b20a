//! Effect chain configuration
//!
//! A chain is a named list of stages, each a tagged variant carrying its own
//! parameters and an `enabled` flag. The list order in the file only matters
//! between stages of the same kind; execution always follows `StagePosition`:
//! 1. EQ (bands in list order)
//! 2. Compressor
//! 3. Loudness gain
//! 4. Limiter
//! 5. Tuning correction

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::dsp::{DynamicsParams, EqBand, TuningParams};
use crate::error::Result;

/// Canonical execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StagePosition {
    Eq = 0,
    Compressor = 1,
    LoudnessGain = 2,
    Limiter = 3,
    TuningCorrection = 4,
}

impl StagePosition {
    /// All positions in execution order
    pub const ALL: [StagePosition; 5] = [
        StagePosition::Eq,
        StagePosition::Compressor,
        StagePosition::LoudnessGain,
        StagePosition::Limiter,
        StagePosition::TuningCorrection,
    ];

    /// Type tag used in configuration files and progress events
    pub fn as_str(self) -> &'static str {
        match self {
            StagePosition::Eq => "eq",
            StagePosition::Compressor => "compressor",
            StagePosition::LoudnessGain => "loudness_gain",
            StagePosition::Limiter => "limiter",
            StagePosition::TuningCorrection => "tuning_correction",
        }
    }
}

fn default_limiter_release() -> f64 {
    0.05
}

fn default_enabled() -> bool {
    true
}

/// Stage parameters, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageKind {
    /// Parametric EQ
    Eq { bands: Vec<EqBand> },
    /// Compressor
    Compressor(DynamicsParams),
    /// Static loudness gain
    LoudnessGain { gain_db: f64 },
    /// Peak limiter
    Limiter {
        threshold_db: f64,
        #[serde(default = "default_limiter_release")]
        release_seconds: f64,
    },
    /// Tuning correction
    TuningCorrection(TuningParams),
}

impl StageKind {
    /// Where this stage runs
    pub fn position(&self) -> StagePosition {
        match self {
            StageKind::Eq { .. } => StagePosition::Eq,
            StageKind::Compressor(_) => StagePosition::Compressor,
            StageKind::LoudnessGain { .. } => StagePosition::LoudnessGain,
            StageKind::Limiter { .. } => StagePosition::Limiter,
            StageKind::TuningCorrection(_) => StagePosition::TuningCorrection,
        }
    }
}

/// One configured stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Disabled stages are neither validated nor run
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: StageKind,
}

impl StageConfig {
    /// An enabled stage
    pub fn new(name: impl Into<String>, kind: StageKind) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            kind,
        }
    }

    /// The same stage with `enabled` set to false
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Named, ordered list of stages
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EffectChainConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

impl EffectChainConfig {
    /// Create an empty chain
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Append a stage
    pub fn with_stage(mut self, stage: StageConfig) -> Self {
        self.stages.push(stage);
        self
    }

    /// Parse a chain from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a chain from a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Enabled stages in execution order
    ///
    /// The sort is stable, so stages of the same kind keep their list order.
    pub fn execution_order(&self) -> Vec<&StageConfig> {
        let mut stages: Vec<&StageConfig> = self.stages.iter().filter(|s| s.enabled).collect();
        stages.sort_by_key(|s| s.kind.position());
        stages
    }
}
