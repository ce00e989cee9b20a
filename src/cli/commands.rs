//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::engine::{read_wav, write_wav};
use crate::error::{Result, TonearmError};
use crate::meter::{analyze_buffer_with, AnalysisReport, LoudnessFrame, MeterConfig};
use crate::render::{EffectChainConfig, RenderWorker};

/// Analysis of one file, as printed by `analyze --json`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u32,
    #[serde(flatten)]
    pub report: AnalysisReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<LoudnessFrame>,
}

/// Result of a render command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSummary {
    pub bytes: usize,
    pub sha256: String,
}

/// Expand directories into the `.wav` files below them, sorted by path.
pub fn collect_wav_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(path).follow_links(true) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && is_wav(entry.path()) {
                found.push(entry.into_path());
            }
        }
        if found.is_empty() {
            warn!("No .wav files under {}", path.display());
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// Meter one WAV file.
pub fn analyze_file(path: &Path, config: &MeterConfig, keep_frames: bool) -> Result<FileAnalysis> {
    let buffer = read_wav(path)?;
    let mut frames: Vec<LoudnessFrame> = Vec::new();
    let report = analyze_buffer_with(&buffer, config, &mut frames)?;
    if !keep_frames {
        frames.clear();
    }
    Ok(FileAnalysis {
        path: path.to_path_buf(),
        sample_rate: buffer.sample_rate(),
        channels: buffer.channels(),
        report,
        frames,
    })
}

/// Meter every file and print the results.
pub fn analyze(paths: &[PathBuf], json: bool, frames: bool, target: Option<f64>) -> Result<()> {
    let mut config = MeterConfig::default();
    if target.is_some() {
        config.target_lufs = target;
    }

    let files = collect_wav_files(paths)?;
    if files.is_empty() {
        return Err(TonearmError::invalid_input("no WAV files to analyze"));
    }

    let mut results = Vec::with_capacity(files.len());
    for file in &files {
        info!("Analyzing: {}", file.display());
        results.push(analyze_file(file, &config, frames)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    for result in &results {
        println!("{}", result.path.display());
        println!(
            "  {} Hz, {} ch, {:.2} s, {} frames",
            result.sample_rate,
            result.channels,
            result.report.duration_secs,
            result.report.frames_emitted
        );
        for frame in &result.frames {
            println!("  {}", frame);
        }
        let last = &result.report.final_frame;
        println!("  Final: {}", last);
        println!("  Sample peak: {:.1} dBFS", last.sample_peak_dbfs);
        if let Some(crest) = last.crest_factor_db {
            println!("  Crest factor: {:.1} dB", crest);
        }
    }

    Ok(())
}

/// Render `input` through the chain in `config` and write the result to `output`.
pub fn render(input: &Path, config: &Path, output: &Path) -> Result<RenderSummary> {
    info!("Rendering {} with {}", input.display(), config.display());

    let buffer = read_wav(input)?;
    let chain = EffectChainConfig::from_path(config)?;

    let mut worker = RenderWorker::spawn()?;
    let job = worker.submit(buffer, chain)?;
    let wav = worker.wait(job, |progress| {
        println!("[{:>3}%] {}", progress.percent, progress.stage);
    })?;
    worker.shutdown();

    write_wav(output, &wav)?;

    let summary = RenderSummary {
        bytes: wav.len(),
        sha256: sha256_hex(wav.as_bytes()),
    };
    println!("Wrote {} ({} bytes)", output.display(), summary.bytes);
    println!("SHA-256: {}", summary.sha256);

    Ok(summary)
}

/// Lowercase hex SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
