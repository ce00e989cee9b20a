//! Offline rendering
//!
//! Effect chain configuration, the renderer that applies it to a whole
//! buffer, and the worker thread that runs renders off the caller's thread.

pub mod config;
mod renderer;
mod worker;

pub use config::{EffectChainConfig, StageConfig, StageKind, StagePosition};
pub use renderer::{
    stage_percent, RenderProgress, Renderer, PROGRESS_COMPLETE, PROGRESS_ENCODING, PROGRESS_SETUP,
};
pub use worker::{RenderEvent, RenderJob, RenderWorker};
