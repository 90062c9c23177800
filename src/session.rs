//! Session lifecycle around the pipeline: Idle -> Running -> Stopped -> Running ...
//!
//! A running session owns exactly one worker thread which in turn owns the pipeline. The
//! stop flag is checked between frames only.

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::alert::AlertSink;
use crate::config::PotholeConfig;
use crate::error::Error;
use crate::pipeline::{FrameReport, Pipeline};
use crate::source::VideoSource;

const DEFAULT_REPORT_CAPACITY: usize = 8;
const SEND_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

/// Cloneable stop request, safe to use from signal handlers and other threads
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Session {
    state: SessionState,
    pipeline: Option<Pipeline>,
    worker: Option<JoinHandle<Pipeline>>,
    stop: StopHandle,
    report_capacity: usize,
    config: Option<PotholeConfig>,
}

impl Session {
    /// A session built this way cannot recover its pipeline if the worker panics: every
    /// later `start` fails with [`Error::WorkerPanicked`]. Use [`Session::from_config`] to
    /// get a fresh pipeline instead.
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            state: SessionState::Idle,
            pipeline: Some(pipeline),
            worker: None,
            stop: StopHandle::default(),
            report_capacity: DEFAULT_REPORT_CAPACITY,
            config: None,
        }
    }

    /// Keeps the config so the pipeline can be rebuilt after a worker panic.
    pub fn from_config(cfg: &PotholeConfig) -> Result<Self, Error> {
        let mut session = Self::new(Pipeline::from_config(cfg)?);
        session.config = Some(cfg.clone());

        Ok(session)
    }

    /// Number of reports buffered before the worker waits for the consumer.
    pub fn with_report_capacity(mut self, capacity: usize) -> Self {
        self.report_capacity = capacity.max(1);
        self
    }

    /// A worker that ran out of frames counts as stopped even before it is joined.
    pub fn state(&self) -> SessionState {
        match &self.worker {
            Some(worker) if worker.is_finished() => SessionState::Stopped,
            _ => self.state,
        }
    }

    /// Handle for the current run; a new one is issued on every start.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Pipeline state between runs; `None` while running.
    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }

    pub fn start<S, A>(&mut self, source: S, sink: A) -> Result<Receiver<FrameReport>, Error>
    where
        S: VideoSource + Send + 'static,
        A: AlertSink + Send + 'static,
    {
        if let Some(worker) = &self.worker {
            if !worker.is_finished() {
                return Err(Error::AlreadyRunning);
            }
            self.join()?;
        }

        let mut pipeline = self.pipeline.take().ok_or(Error::WorkerPanicked)?;
        pipeline.reset();
        pipeline.set_frame_rate(source.fps());

        self.stop = StopHandle::default();
        let stop = self.stop.clone();
        let (tx, rx) = crossbeam_channel::bounded(self.report_capacity);

        log::info!(
            "session starting, frame interval {:.4} s",
            pipeline.frame_interval()
        );

        let worker = std::thread::Builder::new()
            .name("pothole-session".to_string())
            .spawn(move || run(pipeline, source, sink, stop, tx))?;

        self.worker = Some(worker);
        self.state = SessionState::Running;

        Ok(rx)
    }

    /// Requests a stop and waits for the worker to release its source.
    pub fn stop(&mut self) -> Result<(), Error> {
        if self.worker.is_none() {
            return Ok(());
        }

        self.stop.stop();
        self.join()
    }

    /// Waits for the worker to finish on its own (end of stream or capture failure).
    pub fn wait(&mut self) -> Result<(), Error> {
        self.join()
    }

    fn join(&mut self) -> Result<(), Error> {
        let worker = match self.worker.take() {
            Some(worker) => worker,
            None => return Ok(()),
        };

        self.state = SessionState::Stopped;

        let mut pipeline = match worker.join() {
            Ok(pipeline) => pipeline,
            Err(_) => {
                log::error!("session worker panicked");
                self.pipeline = match &self.config {
                    Some(cfg) => Some(Pipeline::from_config(cfg)?),
                    None => None,
                };
                return Err(Error::WorkerPanicked);
            }
        };
        pipeline.reset();
        self.pipeline = Some(pipeline);

        log::info!("session stopped");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("session shutdown failed: {}", err);
        }
    }
}

fn run<S, A>(
    mut pipeline: Pipeline,
    mut source: S,
    mut sink: A,
    stop: StopHandle,
    tx: Sender<FrameReport>,
) -> Pipeline
where
    S: VideoSource,
    A: AlertSink,
{
    let mut connected = true;
    let mut frames = 0u64;

    while !stop.is_stopped() {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("end of stream after {} frames", frames);
                break;
            }
            Err(err) => {
                log::warn!("capture failed after {} frames: {}", frames, err);
                break;
            }
        };

        let report = pipeline.process(&frame);
        pipeline.sound_alerts(&report, &mut sink);
        frames += 1;

        if connected {
            connected = deliver(&tx, report, &stop);
        }
    }

    source.release();
    pipeline.reset();
    pipeline
}

// false once the consumer is gone
fn deliver(tx: &Sender<FrameReport>, mut report: FrameReport, stop: &StopHandle) -> bool {
    loop {
        match tx.send_timeout(report, SEND_POLL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Disconnected(_)) => {
                log::debug!("report consumer disconnected");
                return false;
            }
            Err(SendTimeoutError::Timeout(r)) => {
                if stop.is_stopped() {
                    return true;
                }
                report = r;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::LogSink;
    use crate::source::MemorySource;

    #[test]
    fn idle_until_started() {
        let mut session = Session::new(Pipeline::default());

        assert_eq!(session.state(), SessionState::Idle);
        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Idle);
    }

    struct PanickingSink;

    impl AlertSink for PanickingSink {
        fn beep(&mut self, _tone: crate::alert::Tone) {
            panic!("speaker gone");
        }
    }

    // two frames of a 0.7 m box closing in fast enough for a high alert at 1 fps
    fn alerting_source() -> MemorySource {
        MemorySource::from_detections(
            Some(1.0),
            vec![
                vec![crate::Detection::new(0.0, 0.0, 20.0, 20.0)],
                vec![crate::Detection::new(0.0, 0.0, 35.0, 20.0)],
            ],
        )
    }

    #[test]
    fn worker_panic_rebuilds_pipeline_from_config() {
        let mut session = Session::from_config(&PotholeConfig::default())
            .unwrap()
            .with_report_capacity(16);

        let _rx = session.start(alerting_source(), PanickingSink).unwrap();
        assert!(matches!(session.wait(), Err(Error::WorkerPanicked)));
        assert_eq!(session.state(), SessionState::Stopped);

        let pipeline = session.pipeline().unwrap();
        assert_eq!(pipeline.tracked(), 0);
        assert_eq!(pipeline.history_len(), 0);

        let rx = session.start(alerting_source(), LogSink).unwrap();
        session.wait().unwrap();
        assert_eq!(rx.iter().count(), 2);
    }

    #[test]
    fn worker_panic_without_config_poisons_session() {
        let mut session = Session::new(Pipeline::default()).with_report_capacity(16);

        let _rx = session.start(alerting_source(), PanickingSink).unwrap();
        assert!(matches!(session.wait(), Err(Error::WorkerPanicked)));
        assert!(session.pipeline().is_none());
        assert!(matches!(
            session.start(alerting_source(), LogSink),
            Err(Error::WorkerPanicked)
        ));
    }

    #[test]
    fn runs_to_end_of_stream() {
        let mut session = Session::new(Pipeline::default()).with_report_capacity(16);
        let source = MemorySource::from_detections(Some(30.0), vec![vec![]; 3]);

        let rx = session.start(source, LogSink).unwrap();
        session.wait().unwrap();

        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(rx.try_iter().count(), 3);
    }
}
