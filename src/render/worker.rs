//! Background render worker
//!
//! Runs render passes on a dedicated thread so the caller never blocks.
//!
//! ```text
//! Caller thread                  Render thread
//!      │  submit(buffer, config)       │
//!      │──────────────────────────────>│ Renderer::render_to_wav
//!      │  RenderEvent::Progress        │
//!      │<──────────────────────────────│
//!      │  RenderEvent::Finished(wav)   │
//!      │<──────────────────────────────│
//! ```
//!
//! Buffers and containers are moved through the channels, never copied.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::collections::VecDeque;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::EffectChainConfig;
use super::renderer::{RenderProgress, Renderer};
use crate::engine::{PcmBuffer, WavContainer};
use crate::error::{Result, TonearmError};

/// A render request
#[derive(Debug)]
pub struct RenderJob {
    pub id: Uuid,
    pub input: PcmBuffer,
    pub config: EffectChainConfig,
}

/// Events delivered by the worker
#[derive(Debug)]
pub enum RenderEvent {
    /// A milestone was reached
    Progress { job: Uuid, progress: RenderProgress },
    /// The job finished and produced a container
    Finished { job: Uuid, wav: WavContainer },
    /// The job failed; nothing was produced
    Failed { job: Uuid, error: TonearmError },
}

impl RenderEvent {
    /// Job this event belongs to
    pub fn job(&self) -> Uuid {
        match self {
            RenderEvent::Progress { job, .. }
            | RenderEvent::Finished { job, .. }
            | RenderEvent::Failed { job, .. } => *job,
        }
    }
}

/// Dedicated render thread
pub struct RenderWorker {
    jobs: Option<Sender<RenderJob>>,
    events: Receiver<RenderEvent>,
    /// Events set aside by `wait` because they belong to other jobs
    pending: VecDeque<RenderEvent>,
    handle: Option<JoinHandle<()>>,
}

impl RenderWorker {
    /// Spawn the worker thread
    pub fn spawn() -> Result<Self> {
        let (job_tx, job_rx) = unbounded::<RenderJob>();
        let (event_tx, event_rx) = unbounded::<RenderEvent>();

        let handle = thread::Builder::new()
            .name("tonearm-render".to_string())
            .spawn(move || Self::worker_thread(job_rx, event_tx))?;

        Ok(Self {
            jobs: Some(job_tx),
            events: event_rx,
            pending: VecDeque::new(),
            handle: Some(handle),
        })
    }

    /// Queue a render; returns the job id immediately
    pub fn submit(&self, input: PcmBuffer, config: EffectChainConfig) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let sender = self.jobs.as_ref().ok_or_else(|| TonearmError::InternalInvariant {
            reason: "render worker already shut down".to_string(),
        })?;
        sender
            .send(RenderJob { id, input, config })
            .map_err(|_| TonearmError::InternalInvariant {
                reason: "render thread exited".to_string(),
            })?;
        debug!(job = %id, "Queued render job");
        Ok(id)
    }

    /// Next event without blocking
    pub fn try_event(&mut self) -> Option<RenderEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Next event, waiting at most `timeout`
    pub fn next_event(&mut self, timeout: Duration) -> Option<RenderEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Block until `job` finishes, forwarding its progress to `on_progress`
    ///
    /// Events of other jobs stay queued for `next_event` and `try_event`.
    pub fn wait<F>(&mut self, job: Uuid, mut on_progress: F) -> Result<WavContainer>
    where
        F: FnMut(&RenderProgress),
    {
        let held = std::mem::take(&mut self.pending);
        let mut outcome = None;
        for event in held {
            if outcome.is_some() || event.job() != job {
                self.pending.push_back(event);
                continue;
            }
            match event {
                RenderEvent::Progress { progress, .. } => on_progress(&progress),
                final_event => outcome = Some(final_event),
            }
        }
        if let Some(event) = outcome {
            return Self::into_result(event);
        }

        loop {
            let event = self
                .events
                .recv()
                .map_err(|_| TonearmError::InternalInvariant {
                    reason: "render thread exited before finishing the job".to_string(),
                })?;
            if event.job() != job {
                debug!(job = %event.job(), "Holding event for another job");
                self.pending.push_back(event);
                continue;
            }
            match event {
                RenderEvent::Progress { progress, .. } => on_progress(&progress),
                final_event => return Self::into_result(final_event),
            }
        }
    }

    fn into_result(event: RenderEvent) -> Result<WavContainer> {
        match event {
            RenderEvent::Finished { wav, .. } => Ok(wav),
            RenderEvent::Failed { error, .. } => Err(error),
            RenderEvent::Progress { .. } => Err(TonearmError::InternalInvariant {
                reason: "progress event has no result".to_string(),
            }),
        }
    }

    /// Stop accepting jobs and wait for queued ones to finish
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.jobs = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Render thread panicked");
            }
        }
    }

    fn worker_thread(jobs: Receiver<RenderJob>, events: Sender<RenderEvent>) {
        let renderer = Renderer::new();
        for job in jobs.iter() {
            let id = job.id;
            let result = renderer.render_to_wav_with_progress(job.input, &job.config, |progress| {
                let _ = events.send(RenderEvent::Progress { job: id, progress });
            });
            let event = match result {
                Ok(wav) => RenderEvent::Finished { job: id, wav },
                Err(error) => {
                    warn!(job = %id, error = %error, "Render failed");
                    RenderEvent::Failed { job: id, error }
                }
            };
            if events.send(event).is_err() {
                debug!(job = %id, "No listener for render result");
            }
        }
        debug!("Render thread exiting");
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::signals;
    use crate::render::config::{StageConfig, StageKind};

    fn gain_chain(gain_db: f64) -> EffectChainConfig {
        EffectChainConfig::new("gain").with_stage(StageConfig::new(
            "gain",
            StageKind::LoudnessGain { gain_db },
        ))
    }

    #[test]
    fn test_job_round_trip() {
        let mut worker = RenderWorker::spawn().unwrap();
        let input = signals::sine(440.0, -12.0, 0.25, 2, 48_000).unwrap();
        let frames = input.frames();

        let job = worker.submit(input, gain_chain(2.0)).unwrap();
        let mut percents = Vec::new();
        let wav = worker.wait(job, |p| percents.push(p.percent)).unwrap();

        assert_eq!(wav.len() as u64, 44 + frames * 2 * 2);
        assert_eq!(percents.first(), Some(&10));
        assert_eq!(percents.last(), Some(&100));
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        worker.shutdown();
    }

    #[test]
    fn test_failed_job_reports_error() {
        let mut worker = RenderWorker::spawn().unwrap();
        let input = signals::sine(440.0, -12.0, 0.1, 1, 48_000).unwrap();
        let job = worker.submit(input, gain_chain(99.0)).unwrap();
        let err = worker.wait(job, |_| {}).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_CONFIG");
    }

    #[test]
    fn test_jobs_run_in_order() {
        let mut worker = RenderWorker::spawn().unwrap();
        let first = worker
            .submit(signals::sine(440.0, -12.0, 0.1, 1, 48_000).unwrap(), gain_chain(1.0))
            .unwrap();
        let second = worker
            .submit(signals::sine(440.0, -12.0, 0.1, 1, 48_000).unwrap(), gain_chain(1.0))
            .unwrap();
        assert_ne!(first, second);

        let mut finished = Vec::new();
        while finished.len() < 2 {
            match worker.next_event(Duration::from_secs(10)) {
                Some(RenderEvent::Finished { job, .. }) => finished.push(job),
                Some(_) => {}
                None => panic!("worker stalled"),
            }
        }
        assert_eq!(finished, vec![first, second]);
    }

    #[test]
    fn test_wait_keeps_other_jobs_events() {
        let mut worker = RenderWorker::spawn().unwrap();
        let first = worker
            .submit(signals::sine(440.0, -12.0, 0.1, 1, 48_000).unwrap(), gain_chain(1.0))
            .unwrap();
        let second = worker
            .submit(signals::sine(440.0, -12.0, 0.2, 1, 48_000).unwrap(), gain_chain(1.0))
            .unwrap();

        let second_wav = worker.wait(second, |_| {}).unwrap();
        assert_eq!(second_wav.len(), 44 + 9_600 * 2);

        // Everything the first job produced is still there, in order
        let mut percents = Vec::new();
        let mut first_wav = None;
        while let Some(event) = worker.try_event() {
            assert_eq!(event.job(), first);
            match event {
                RenderEvent::Progress { progress, .. } => percents.push(progress.percent),
                RenderEvent::Finished { wav, .. } => first_wav = Some(wav),
                RenderEvent::Failed { error, .. } => panic!("render failed: {}", error),
            }
        }
        assert_eq!(percents, vec![10, 20, 30, 50, 70, 80, 90, 100]);
        assert_eq!(first_wav.map(|w| w.len()), Some(44 + 4_800 * 2));
    }

    #[test]
    fn test_wait_uses_held_result() {
        let mut worker = RenderWorker::spawn().unwrap();
        let first = worker
            .submit(signals::sine(440.0, -12.0, 0.1, 1, 48_000).unwrap(), gain_chain(1.0))
            .unwrap();
        let second = worker
            .submit(signals::sine(440.0, -12.0, 0.1, 1, 48_000).unwrap(), gain_chain(1.0))
            .unwrap();

        worker.wait(second, |_| {}).unwrap();
        let mut percents = Vec::new();
        let wav = worker.wait(first, |p| percents.push(p.percent)).unwrap();
        assert_eq!(wav.len(), 44 + 4_800 * 2);
        assert_eq!(percents.len(), 8);
        assert!(worker.try_event().is_none());
    }
}
