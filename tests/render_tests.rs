//! Render Integration Tests
//!
//! End-to-end tests for the offline rendering pipeline.

use approx::assert_abs_diff_eq;
use std::io::Cursor;
use std::time::Duration;

use tonearm::dsp::{DynamicsParams, EqBand, TuningParams};
use tonearm::engine::{read_wav_from, signals, PcmBuffer, WAV_HEADER_LEN};
use tonearm::meter::{analyze_buffer, MeterConfig};
use tonearm::render::{
    EffectChainConfig, RenderEvent, RenderWorker, Renderer, StageConfig, StageKind,
};

fn integrated(buffer: &PcmBuffer) -> f64 {
    analyze_buffer(buffer, &MeterConfig::default())
        .unwrap()
        .final_frame
        .integrated
        .value
        .expect("integrated loudness should be valid")
}

fn mastering_chain() -> EffectChainConfig {
    EffectChainConfig::new("master")
        .with_stage(StageConfig::new(
            "tone",
            StageKind::Eq {
                bands: vec![
                    EqBand::low_shelf(120.0, 2.0, 0.707),
                    EqBand::peaking(3_000.0, -1.5, 1.2),
                ],
            },
        ))
        .with_stage(StageConfig::new(
            "glue",
            StageKind::Compressor(DynamicsParams {
                threshold_db: -24.0,
                ratio: 3.0,
                attack_seconds: 0.01,
                release_seconds: 0.15,
                ..DynamicsParams::default()
            }),
        ))
        .with_stage(StageConfig::new(
            "level",
            StageKind::LoudnessGain { gain_db: 4.0 },
        ))
        .with_stage(StageConfig::new(
            "ceiling",
            StageKind::Limiter {
                threshold_db: -1.0,
                release_seconds: 0.05,
            },
        ))
        .with_stage(StageConfig::new(
            "tuning",
            StageKind::TuningCorrection(TuningParams::default()),
        ))
}

#[test]
fn test_render_is_idempotent() {
    let input = signals::pink_noise(-20.0, 2.0, 2, 48_000, 3).unwrap();
    let chain = mastering_chain();
    let renderer = Renderer::new();

    let (first, _) = renderer.render_to_wav(input.clone(), &chain).unwrap();
    let (second, _) = renderer.render_to_wav(input, &chain).unwrap();
    assert_eq!(first.as_bytes(), second.as_bytes());
}

#[test]
fn test_loudness_gain_end_to_end() {
    let input = signals::pink_noise(-20.0, 5.0, 2, 44_100, 42).unwrap();
    let reference = integrated(&input);

    let chain = EffectChainConfig::new("lift").with_stage(StageConfig::new(
        "gain",
        StageKind::LoudnessGain { gain_db: 6.0 },
    ));
    let (wav, progress) = Renderer::new().render_to_wav(input, &chain).unwrap();

    assert_eq!(wav.len(), 5 * 44_100 * 2 * 2 + WAV_HEADER_LEN);
    assert_eq!(progress.last().map(|p| p.percent), Some(100));

    let decoded = read_wav_from(Cursor::new(wav.as_bytes())).unwrap();
    assert_eq!(decoded.channels(), 2);
    assert_eq!(decoded.sample_rate(), 44_100);
    assert_abs_diff_eq!(integrated(&decoded) - reference, 6.0, epsilon = 0.2);
}

#[test]
fn test_limiter_holds_ceiling() {
    let input = signals::pink_noise(-12.0, 2.0, 2, 48_000, 8).unwrap();
    let chain = mastering_chain();
    let (output, _) = Renderer::new().render(input, &chain).unwrap();
    assert!(output.is_finite());
    assert!(output.peak_db() <= -1.0 + 0.1, "peak {}", output.peak_db());
}

#[test]
fn test_chain_from_json() {
    let chain = EffectChainConfig::from_json_str(
        r#"{
            "name": "json chain",
            "stages": [
                {"type": "limiter", "threshold_db": -3.0},
                {"type": "loudness_gain", "gain_db": -6.0, "enabled": false},
                {"type": "loudness_gain", "gain_db": 2.0}
            ]
        }"#,
    )
    .unwrap();
    let input = signals::sine(440.0, -10.0, 1.0, 1, 48_000).unwrap();
    let before = input.rms_db();
    let (output, _) = Renderer::new().render(input, &chain).unwrap();
    assert_abs_diff_eq!(output.rms_db() - before, 2.0, epsilon = 0.05);
}

#[test]
fn test_worker_streams_progress() {
    let mut worker = RenderWorker::spawn().unwrap();
    let input = signals::pink_noise(-20.0, 1.0, 2, 48_000, 11).unwrap();
    let job = worker.submit(input, mastering_chain()).unwrap();

    let mut percents = Vec::new();
    let mut finished = None;
    while finished.is_none() {
        match worker.next_event(Duration::from_secs(30)) {
            Some(RenderEvent::Progress { job: id, progress }) => {
                assert_eq!(id, job);
                percents.push(progress.percent);
            }
            Some(RenderEvent::Finished { job: id, wav }) => {
                assert_eq!(id, job);
                finished = Some(wav);
            }
            Some(RenderEvent::Failed { error, .. }) => panic!("render failed: {}", error),
            None => panic!("worker stalled"),
        }
    }

    assert_eq!(percents, vec![10, 20, 30, 50, 70, 80, 90, 100]);
    assert_eq!(finished.map(|w| w.len()), Some(48_000 * 2 * 2 + WAV_HEADER_LEN));
    worker.shutdown();
}
