//! Capture pipeline: a dedicated OS thread pulling frames from the camera,
//! running the landmark oracle and pushing events to the session task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};
use vigil_core::quality::{self, FrameQuality, QualityConfig};
use vigil_core::{LandmarkFrame, LandmarkOracle, ReasonCode};
use vigil_hw::{Camera, CameraError, Frame, FrameSource};

/// Consecutive capture errors tolerated before the pipeline gives up.
const MAX_CONSECUTIVE_CAPTURE_ERRORS: u32 = 5;

/// One unit of work delivered to a session.
#[derive(Debug)]
pub enum CaptureEvent {
    Frame {
        frame: Frame,
        /// `None` when no face was found or the frame failed the quality gate.
        landmarks: Option<LandmarkFrame>,
        quality: FrameQuality,
    },
    /// The pipeline hit a fatal local fault and stopped.
    Fault(ReasonCode),
}

enum Worker {
    Thread(std::thread::JoinHandle<()>),
    Task(tokio::task::JoinHandle<()>),
    Idle,
}

/// Ownership of a running pipeline; stop and join it to release the camera.
pub struct CaptureGuard {
    stop: Arc<AtomicBool>,
    worker: Worker,
}

impl CaptureGuard {
    pub fn thread(stop: Arc<AtomicBool>, handle: std::thread::JoinHandle<()>) -> Self {
        Self {
            stop,
            worker: Worker::Thread(handle),
        }
    }

    /// Pipeline driven by a tokio task; stopping aborts the task.
    pub fn task(handle: tokio::task::JoinHandle<()>) -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            worker: Worker::Task(handle),
        }
    }

    pub fn idle() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(true)),
            worker: Worker::Idle,
        }
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Worker::Task(handle) = &self.worker {
            handle.abort();
        }
    }

    /// Stop the pipeline and wait for it to exit.
    pub async fn join(self) {
        self.stop();
        match self.worker {
            Worker::Thread(handle) => {
                let joined = tokio::task::spawn_blocking(move || handle.join()).await;
                if !matches!(joined, Ok(Ok(()))) {
                    tracing::warn!("capture thread panicked or could not be joined");
                }
            }
            Worker::Task(handle) => {
                let _ = handle.await;
            }
            Worker::Idle => {}
        }
    }
}

/// Source of capture events for one session.
pub trait FramePipeline: Send + Sync {
    /// Start producing events into `events`. Producers never block on a full
    /// channel; frames that do not fit are dropped.
    fn launch(&self, events: mpsc::Sender<CaptureEvent>) -> CaptureGuard;
}

/// Production pipeline: V4L2 camera + shared landmark oracle.
pub struct CameraPipeline {
    device: String,
    warmup_frames: usize,
    quality: QualityConfig,
    oracle: Arc<Mutex<Box<dyn LandmarkOracle>>>,
}

impl CameraPipeline {
    pub fn new(
        device: impl Into<String>,
        warmup_frames: usize,
        quality: QualityConfig,
        oracle: Box<dyn LandmarkOracle>,
    ) -> Self {
        Self {
            device: device.into(),
            warmup_frames,
            quality,
            oracle: Arc::new(Mutex::new(oracle)),
        }
    }
}

impl FramePipeline for CameraPipeline {
    fn launch(&self, events: mpsc::Sender<CaptureEvent>) -> CaptureGuard {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let device = self.device.clone();
        let oracle = Arc::clone(&self.oracle);
        let gate = self.quality;
        let warmup = self.warmup_frames;
        let fault_tx = events.clone();

        let spawned = std::thread::Builder::new()
            .name("vigil-capture".into())
            .spawn(move || {
                tracing::info!(device = %device, "capture thread started");
                match Camera::open(&device) {
                    Ok(camera) => {
                        run_capture(camera, &oracle, &gate, warmup, &events, &thread_stop)
                    }
                    Err(e) => {
                        tracing::error!(device = %device, error = %e, "failed to open camera");
                        let _ = events.blocking_send(CaptureEvent::Fault(fault_reason(&e)));
                    }
                }
                tracing::info!("capture thread exiting");
            });

        match spawned {
            Ok(handle) => CaptureGuard::thread(stop, handle),
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn capture thread");
                let _ = fault_tx.try_send(CaptureEvent::Fault(ReasonCode::HardwareUnavailable));
                CaptureGuard::idle()
            }
        }
    }
}

/// Reason code for a camera failure.
pub fn fault_reason(e: &CameraError) -> ReasonCode {
    match e {
        CameraError::PermissionDenied(_) => ReasonCode::PermissionDenied,
        _ => ReasonCode::HardwareUnavailable,
    }
}

/// Capture loop. Runs until `stop` is set, the receiver goes away or a
/// fatal fault has been reported. The source is dropped on return.
pub fn run_capture<S: FrameSource>(
    mut source: S,
    oracle: &Mutex<Box<dyn LandmarkOracle>>,
    gate: &QualityConfig,
    warmup_frames: usize,
    events: &mpsc::Sender<CaptureEvent>,
    stop: &AtomicBool,
) {
    let mut warmup_left = warmup_frames;
    let mut consecutive_errors = 0u32;
    let mut dropped = 0u64;

    let fault = |reason: ReasonCode| {
        let _ = events.blocking_send(CaptureEvent::Fault(reason));
    };

    while !stop.load(Ordering::SeqCst) {
        let frame = match source.next_frame() {
            Ok(f) => {
                consecutive_errors = 0;
                f
            }
            Err(e) => {
                consecutive_errors += 1;
                tracing::warn!(error = %e, consecutive_errors, "frame capture failed");
                if consecutive_errors >= MAX_CONSECUTIVE_CAPTURE_ERRORS {
                    fault(fault_reason(&e));
                    break;
                }
                continue;
            }
        };

        if warmup_left > 0 {
            warmup_left -= 1;
            tracing::trace!(seq = frame.sequence, "discarding warmup frame");
            continue;
        }

        let q = quality::assess(&frame.data, frame.width, frame.height, gate);
        let landmarks = if q.acceptable() {
            let detected = match oracle.lock() {
                Ok(mut o) => o.detect(&frame.data, frame.width, frame.height),
                Err(_) => {
                    tracing::error!("landmark oracle lock poisoned");
                    fault(ReasonCode::OracleFault);
                    break;
                }
            };
            match detected {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!(error = %e, "landmark oracle failed");
                    fault(ReasonCode::OracleFault);
                    break;
                }
            }
        } else {
            tracing::debug!(
                seq = frame.sequence,
                mean_luma = q.mean_luma,
                sharpness = q.sharpness,
                "frame failed quality gate"
            );
            None
        };

        match events.try_send(CaptureEvent::Frame {
            frame,
            landmarks,
            quality: q,
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                tracing::debug!(dropped, "session busy; frame dropped");
            }
            Err(TrySendError::Closed(_)) => break,
        }
    }

    drop(source);
    tracing::debug!(dropped, "capture loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use vigil_core::fixtures::synthetic_face;
    use vigil_core::OracleError;

    struct FakeSource {
        frames: VecDeque<Result<Frame, CameraError>>,
        /// Set once the script is exhausted.
        done: Arc<AtomicBool>,
    }

    impl FakeSource {
        fn new(frames: Vec<Result<Frame, CameraError>>, done: Arc<AtomicBool>) -> Self {
            Self {
                frames: frames.into(),
                done,
            }
        }
    }

    impl FrameSource for FakeSource {
        fn next_frame(&mut self) -> Result<Frame, CameraError> {
            match self.frames.pop_front() {
                Some(f) => {
                    if self.frames.is_empty() {
                        self.done.store(true, Ordering::SeqCst);
                    }
                    f
                }
                None => {
                    self.done.store(true, Ordering::SeqCst);
                    Err(CameraError::CaptureFailed("script exhausted".into()))
                }
            }
        }
    }

    struct FakeOracle {
        fail: bool,
    }

    impl LandmarkOracle for FakeOracle {
        fn detect(
            &mut self,
            _gray: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Option<LandmarkFrame>, OracleError> {
            if self.fail {
                let missing = vigil_core::detector::DetectorError::ModelNotFound("x".into());
                return Err(OracleError::Detector(missing));
            }
            Ok(Some(synthetic_face(0.3, 0.4)))
        }
    }

    fn oracle(fail: bool) -> Mutex<Box<dyn LandmarkOracle>> {
        Mutex::new(Box::new(FakeOracle { fail }))
    }

    fn frame(seq: u32) -> Result<Frame, CameraError> {
        Ok(Frame::from_gray(vec![128; 16], 4, 4, seq).unwrap())
    }

    fn no_gate() -> QualityConfig {
        QualityConfig {
            enabled: false,
            ..QualityConfig::default()
        }
    }

    fn drain(rx: &mut mpsc::Receiver<CaptureEvent>) -> Vec<CaptureEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn test_warmup_frames_discarded() {
        let stop = Arc::new(AtomicBool::new(false));
        let source = FakeSource::new((0..5).map(frame).collect(), Arc::clone(&stop));
        let (tx, mut rx) = mpsc::channel(16);

        run_capture(source, &oracle(false), &no_gate(), 2, &tx, &stop);

        let seqs: Vec<u32> = drain(&mut rx)
            .into_iter()
            .filter_map(|ev| match ev {
                CaptureEvent::Frame { frame, landmarks, .. } => {
                    assert!(landmarks.is_some());
                    Some(frame.sequence)
                }
                CaptureEvent::Fault(r) => panic!("unexpected fault {r}"),
            })
            .collect();
        assert_eq!(seqs, vec![2, 3, 4]);
    }

    #[test]
    fn test_oracle_error_is_fault() {
        let done = Arc::new(AtomicBool::new(false));
        let stop = AtomicBool::new(false);
        let source = FakeSource::new((0..3).map(frame).collect(), done);
        let (tx, mut rx) = mpsc::channel(16);

        run_capture(source, &oracle(true), &no_gate(), 0, &tx, &stop);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], CaptureEvent::Fault(ReasonCode::OracleFault)));
    }

    #[test]
    fn test_repeated_capture_errors_are_fault() {
        let done = Arc::new(AtomicBool::new(false));
        let stop = AtomicBool::new(false);
        let source = FakeSource::new(Vec::new(), done);
        let (tx, mut rx) = mpsc::channel(16);

        run_capture(source, &oracle(false), &no_gate(), 0, &tx, &stop);

        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [CaptureEvent::Fault(ReasonCode::HardwareUnavailable)]
        ));
    }

    #[test]
    fn test_stalled_dequeue_faults_and_releases() {
        let done = Arc::new(AtomicBool::new(false));
        let stop = AtomicBool::new(false);
        let timeouts = (0..MAX_CONSECUTIVE_CAPTURE_ERRORS)
            .map(|_| Err(CameraError::Timeout(vigil_hw::camera::DEQUEUE_TIMEOUT)))
            .chain((0..3).map(frame))
            .collect();
        let source = FakeSource::new(timeouts, Arc::clone(&done));
        let (tx, mut rx) = mpsc::channel(16);

        run_capture(source, &oracle(false), &no_gate(), 0, &tx, &stop);

        assert!(matches!(
            drain(&mut rx).as_slice(),
            [CaptureEvent::Fault(ReasonCode::HardwareUnavailable)]
        ));
        assert!(!done.load(Ordering::SeqCst), "no frames read after giving up");
    }

    #[test]
    fn test_full_channel_drops_frames() {
        let stop = Arc::new(AtomicBool::new(false));
        let source = FakeSource::new((0..10).map(frame).collect(), Arc::clone(&stop));
        let (tx, mut rx) = mpsc::channel(2);

        run_capture(source, &oracle(false), &no_gate(), 0, &tx, &stop);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2, "only the queued frames survive");
    }

    #[test]
    fn test_closed_channel_ends_loop() {
        let done = Arc::new(AtomicBool::new(false));
        let stop = AtomicBool::new(false);
        let source = FakeSource::new((0..100).map(frame).collect(), Arc::clone(&done));
        let (tx, rx) = mpsc::channel(2);
        drop(rx);

        run_capture(source, &oracle(false), &no_gate(), 0, &tx, &stop);
        assert!(!done.load(Ordering::SeqCst), "loop should stop at the first send");
    }

    #[test]
    fn test_quality_gate_skips_oracle() {
        let stop = Arc::new(AtomicBool::new(false));
        // Uniform frames are blurry; the failing oracle must not be reached.
        let source = FakeSource::new((0..3).map(frame).collect(), Arc::clone(&stop));
        let (tx, mut rx) = mpsc::channel(16);

        run_capture(source, &oracle(true), &QualityConfig::default(), 0, &tx, &stop);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        for ev in events {
            match ev {
                CaptureEvent::Frame {
                    landmarks, quality, ..
                } => {
                    assert!(landmarks.is_none());
                    assert!(quality.blurry);
                }
                CaptureEvent::Fault(r) => panic!("unexpected fault {r}"),
            }
        }
    }

    #[test]
    fn test_permission_denied_reason() {
        assert_eq!(
            fault_reason(&CameraError::PermissionDenied("/dev/video0".into())),
            ReasonCode::PermissionDenied
        );
        assert_eq!(
            fault_reason(&CameraError::DeviceBusy),
            ReasonCode::HardwareUnavailable
        );
    }

    #[tokio::test]
    async fn test_camera_pipeline_missing_device_faults() {
        let pipeline = CameraPipeline::new(
            "/dev/vigil-no-such-camera",
            0,
            QualityConfig::default(),
            Box::new(FakeOracle { fail: false }),
        );
        let (tx, mut rx) = mpsc::channel(4);
        let guard = pipeline.launch(tx);

        let ev = rx.recv().await;
        assert!(matches!(
            ev,
            Some(CaptureEvent::Fault(ReasonCode::HardwareUnavailable))
        ));
        guard.join().await;
    }
}
