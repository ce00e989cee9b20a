//! Effects chain renderer
//!
//! Builds every enabled stage from the configuration first, so parameter
//! errors surface before any audio is touched, then runs the stages in
//! canonical order over the whole buffer.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use super::config::{EffectChainConfig, StageConfig, StageKind, StagePosition};
use crate::dsp::{DynamicsProcessor, Effect, Gain, ParametricEq, TuningCorrection};
use crate::engine::{encode, PcmBuffer, WavContainer};
use crate::error::{Result, TonearmError};

/// Progress after stages were built
pub const PROGRESS_SETUP: u8 = 10;
/// Progress before encoding starts
pub const PROGRESS_ENCODING: u8 = 90;
/// Progress when the pass has finished
pub const PROGRESS_COMPLETE: u8 = 100;

/// Progress reported once a stage group has run
pub fn stage_percent(position: StagePosition) -> u8 {
    match position {
        StagePosition::Eq => 20,
        StagePosition::Compressor => 30,
        StagePosition::LoudnessGain => 50,
        StagePosition::Limiter => 70,
        StagePosition::TuningCorrection => 80,
    }
}

/// One progress milestone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderProgress {
    pub stage: String,
    pub percent: u8,
}

impl RenderProgress {
    fn new(stage: &str, percent: u8) -> Self {
        Self {
            stage: stage.to_string(),
            percent,
        }
    }
}

/// A built stage ready to run
struct PlannedStage {
    position: StagePosition,
    name: String,
    effect: Box<dyn Effect>,
}

/// Build one stage for the buffer's format
fn build_stage(stage: &StageConfig, sample_rate: u32, channels: u32) -> Result<Box<dyn Effect>> {
    let effect: Box<dyn Effect> = match &stage.kind {
        StageKind::Eq { bands } => Box::new(ParametricEq::new(bands, sample_rate, channels)?),
        StageKind::Compressor(params) => Box::new(DynamicsProcessor::new(*params, sample_rate)?),
        StageKind::LoudnessGain { gain_db } => Box::new(Gain::new(*gain_db)?),
        StageKind::Limiter {
            threshold_db,
            release_seconds,
        } => Box::new(DynamicsProcessor::limiter(
            *threshold_db,
            *release_seconds,
            sample_rate,
        )?),
        StageKind::TuningCorrection(params) => {
            Box::new(TuningCorrection::new(*params, sample_rate, channels)?)
        }
    };
    Ok(effect)
}

/// Offline renderer
///
/// Stateless: every pass builds fresh stages, so identical input and
/// configuration give bit-identical output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer;

impl Renderer {
    /// Create a renderer
    pub fn new() -> Self {
        Self
    }

    /// Validate a chain against a buffer format without rendering
    pub fn validate(
        &self,
        config: &EffectChainConfig,
        sample_rate: u32,
        channels: u32,
    ) -> Result<()> {
        self.plan(config, sample_rate, channels).map(|_| ())
    }

    fn plan(
        &self,
        config: &EffectChainConfig,
        sample_rate: u32,
        channels: u32,
    ) -> Result<Vec<PlannedStage>> {
        config
            .execution_order()
            .into_iter()
            .map(|stage| {
                Ok(PlannedStage {
                    position: stage.kind.position(),
                    name: stage.name.clone(),
                    effect: build_stage(stage, sample_rate, channels)?,
                })
            })
            .collect()
    }

    /// Render a buffer through the chain
    ///
    /// Returns the processed buffer and the progress milestones.
    pub fn render(
        &self,
        input: PcmBuffer,
        config: &EffectChainConfig,
    ) -> Result<(PcmBuffer, Vec<RenderProgress>)> {
        let mut progress = Vec::new();
        let buffer = finish(self.run(input, config, &mut |p| progress.push(p))?)?;
        progress.push(RenderProgress::new("complete", PROGRESS_COMPLETE));
        Ok((buffer, progress))
    }

    /// Render and encode to a WAV container
    pub fn render_to_wav(
        &self,
        input: PcmBuffer,
        config: &EffectChainConfig,
    ) -> Result<(WavContainer, Vec<RenderProgress>)> {
        let mut progress = Vec::new();
        let wav = self.render_to_wav_with_progress(input, config, |p| progress.push(p))?;
        Ok((wav, progress))
    }

    /// Render and encode, reporting each milestone as it is reached
    pub fn render_to_wav_with_progress<F>(
        &self,
        input: PcmBuffer,
        config: &EffectChainConfig,
        mut on_progress: F,
    ) -> Result<WavContainer>
    where
        F: FnMut(RenderProgress),
    {
        let buffer = finish(self.run(input, config, &mut on_progress)?)?;

        on_progress(RenderProgress::new("encoding", PROGRESS_ENCODING));
        let wav = encode(&buffer)?;
        on_progress(RenderProgress::new("complete", PROGRESS_COMPLETE));
        Ok(wav)
    }

    fn run(
        &self,
        mut buffer: PcmBuffer,
        config: &EffectChainConfig,
        on_progress: &mut dyn FnMut(RenderProgress),
    ) -> Result<PcmBuffer> {
        let start = Instant::now();
        let mut stages = self.plan(config, buffer.sample_rate(), buffer.channels())?;
        info!(
            chain = %config.name,
            stages = stages.len(),
            channels = buffer.channels(),
            frames = buffer.frames(),
            "Rendering"
        );
        on_progress(RenderProgress::new("setup", PROGRESS_SETUP));

        for position in StagePosition::ALL {
            for stage in stages.iter_mut().filter(|s| s.position == position) {
                debug!(
                    stage = %stage.name,
                    effect = stage.effect.effect_type(),
                    "Running stage"
                );
                stage.effect.process(&mut buffer);
            }
            on_progress(RenderProgress::new(position.as_str(), stage_percent(position)));
        }

        info!(elapsed_ms = start.elapsed().as_millis() as u64, "Render finished");
        Ok(buffer)
    }
}

/// Reject buffers a stage corrupted
fn finish(buffer: PcmBuffer) -> Result<PcmBuffer> {
    if !buffer.is_finite() {
        return Err(TonearmError::InternalInvariant {
            reason: "render produced non-finite samples".to_string(),
        });
    }
    Ok(buffer)
}
