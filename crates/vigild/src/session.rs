//! Session/timeout controller.
//!
//! Each verification runs as one tokio task that owns its [`LivenessSession`],
//! the capture pipeline guard and the submission channel. The caller holds a
//! [`SessionHandle`] for cancellation and for the terminal result.

use crate::client::{MatchService, SubmitError};
use crate::config::Config;
use crate::engine::{CaptureEvent, CaptureGuard, FramePipeline};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use vigil_core::{
    compute_features, Directive, FrameQuality, GeometricFeatures, LandmarkFrame, LivenessConfig,
    LivenessSession, MatchVerdict, ReasonCode, VerificationResult,
};
use vigil_hw::frame::JPEG_QUALITY;

/// Frames buffered between the capture thread and the session task.
const FRAME_QUEUE: usize = 4;

/// How long a finished session stays queryable by id.
pub const FINISHED_RETENTION: Duration = Duration::from_secs(30);
/// Finished sessions kept at most, newest first.
pub const MAX_FINISHED_SESSIONS: usize = 8;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("camera is in use by another session")]
    Busy,
    #[error("claimed identity must not be empty")]
    EmptyIdentity,
    #[error("session task ended without a result")]
    Abandoned,
}

type SubmitOutcome = (u32, Result<MatchVerdict, SubmitError>);

/// Starts verification sessions; one at a time per camera.
#[derive(Clone)]
pub struct Verifier {
    pipeline: Arc<dyn FramePipeline>,
    matcher: Arc<dyn MatchService>,
    liveness: LivenessConfig,
    session_timeout: Duration,
    camera_busy: Arc<AtomicBool>,
}

impl Verifier {
    pub fn new(
        pipeline: Arc<dyn FramePipeline>,
        matcher: Arc<dyn MatchService>,
        liveness: LivenessConfig,
        session_timeout: Duration,
    ) -> Self {
        Self {
            pipeline,
            matcher,
            liveness,
            session_timeout,
            camera_busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(
        config: &Config,
        pipeline: Arc<dyn FramePipeline>,
        matcher: Arc<dyn MatchService>,
    ) -> Self {
        Self::new(
            pipeline,
            matcher,
            config.liveness.clone(),
            config.session_timeout,
        )
    }

    /// True while a session still owns the camera.
    pub fn is_busy(&self) -> bool {
        self.camera_busy.load(Ordering::SeqCst)
    }

    /// Begin verification for `claimed_identity`. Must be called inside a
    /// tokio runtime.
    pub fn start_session(&self, claimed_identity: &str) -> Result<SessionHandle, SessionError> {
        let claimed_identity = claimed_identity.trim();
        if claimed_identity.is_empty() {
            return Err(SessionError::EmptyIdentity);
        }
        if self
            .camera_busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::Busy);
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let now = Instant::now();
        let deadline = now + self.session_timeout;
        let machine = LivenessSession::new(
            session_id.clone(),
            claimed_identity,
            self.liveness.clone(),
            deadline.into_std(),
            now.into_std(),
        );

        let (result_tx, _) = watch::channel(None);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = SessionHandle {
            id: session_id.clone(),
            result: Arc::new(result_tx),
            cancel: Arc::new(cancel_tx),
        };

        let (events_tx, events_rx) = mpsc::channel(FRAME_QUEUE);
        let guard = self.pipeline.launch(events_tx);
        let (verdict_tx, verdict_rx) = mpsc::channel(1);

        let task = SessionTask {
            machine,
            matcher: Arc::clone(&self.matcher),
            result: Arc::clone(&handle.result),
            verdict_tx,
        };
        let busy = Arc::clone(&self.camera_busy);

        tracing::info!(session = %session_id, identity = claimed_identity, "session started");
        tokio::spawn(async move {
            task.run(events_rx, verdict_rx, cancel_rx, deadline, guard).await;
            busy.store(false, Ordering::SeqCst);
            tracing::debug!(session = %session_id, "camera released for next session");
        });

        Ok(handle)
    }
}

/// Caller's view of one session. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    result: Arc<watch::Sender<Option<VerificationResult>>>,
    cancel: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Abort the session. Publishes `Failed(Cancelled)` immediately unless a
    /// terminal result already exists. Idempotent; returns whether this call
    /// produced the result.
    pub fn cancel(&self) -> bool {
        let id = self.id.clone();
        let published = publish(&self.result, || {
            VerificationResult::failed(id, ReasonCode::Cancelled)
        });
        self.cancel.send_replace(true);
        if published {
            tracing::info!(session = %self.id, "session cancelled");
        }
        published
    }

    /// The terminal result, if already reached.
    pub fn result(&self) -> Option<VerificationResult> {
        self.result.borrow().clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.result.borrow().is_some()
    }

    /// Wait for the terminal result.
    pub async fn wait(&self) -> Result<VerificationResult, SessionError> {
        let mut rx = self.result.subscribe();
        let done = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| SessionError::Abandoned)?;
        done.clone().ok_or(SessionError::Abandoned)
    }

    /// Invoke `callback` exactly once with the terminal result.
    pub fn on_terminal<F>(&self, callback: F)
    where
        F: FnOnce(VerificationResult) + Send + 'static,
    {
        let handle = self.clone();
        tokio::spawn(async move {
            if let Ok(result) = handle.wait().await {
                callback(result);
            }
        });
    }
}

struct Tracked {
    handle: SessionHandle,
    finished_at: Option<Instant>,
}

/// Sessions addressable by id for callers that only hold the id.
///
/// Finished sessions are stamped the first time a prune sees them and are
/// evicted after [`FINISHED_RETENTION`], or earlier once more than
/// [`MAX_FINISHED_SESSIONS`] have piled up.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Tracked>,
}

impl SessionRegistry {
    pub fn insert(&mut self, handle: SessionHandle) {
        self.prune();
        self.sessions.insert(
            handle.id().to_string(),
            Tracked {
                handle,
                finished_at: None,
            },
        );
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.get(session_id).map(|t| t.handle.clone())
    }

    pub fn remove(&mut self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.remove(session_id).map(|t| t.handle)
    }

    /// Drop finished sessions past retention. Returns how many were evicted.
    pub fn prune(&mut self) -> usize {
        let now = Instant::now();
        for tracked in self.sessions.values_mut() {
            if tracked.finished_at.is_none() && tracked.handle.is_terminal() {
                tracked.finished_at = Some(now);
            }
        }

        let mut finished: Vec<(Instant, String)> = self
            .sessions
            .iter()
            .filter_map(|(id, t)| t.finished_at.map(|at| (at, id.clone())))
            .collect();
        finished.sort_by(|a, b| b.0.cmp(&a.0));

        let before = self.sessions.len();
        for (i, (at, id)) in finished.into_iter().enumerate() {
            if i >= MAX_FINISHED_SESSIONS || now.duration_since(at) >= FINISHED_RETENTION {
                self.sessions.remove(&id);
            }
        }
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.sessions.len(), "finished sessions evicted");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of sessions without a result yet.
    pub fn active_ids(&self) -> Vec<String> {
        self.sessions
            .values()
            .filter(|t| !t.handle.is_terminal())
            .map(|t| t.handle.id().to_string())
            .collect()
    }
}

/// Store `make()` in the slot unless a result is already there.
fn publish(
    slot: &watch::Sender<Option<VerificationResult>>,
    make: impl FnOnce() -> VerificationResult,
) -> bool {
    slot.send_if_modified(|current| {
        if current.is_some() {
            return false;
        }
        *current = Some(make());
        true
    })
}

/// Features for one delivered frame; `None` for a missing face or a frame
/// that failed the quality gate.
pub fn usable_features(
    landmarks: Option<&LandmarkFrame>,
    quality: &FrameQuality,
) -> Option<GeometricFeatures> {
    if !quality.acceptable() {
        return None;
    }
    compute_features(landmarks?).ok()
}

struct SessionTask {
    machine: LivenessSession,
    matcher: Arc<dyn MatchService>,
    result: Arc<watch::Sender<Option<VerificationResult>>>,
    verdict_tx: mpsc::Sender<SubmitOutcome>,
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl SessionTask {
    async fn run(
        mut self,
        mut events: mpsc::Receiver<CaptureEvent>,
        mut verdicts: mpsc::Receiver<SubmitOutcome>,
        mut cancel: watch::Receiver<bool>,
        deadline: Instant,
        guard: CaptureGuard,
    ) {
        self.machine.begin(now());

        while !self.machine.is_terminal() {
            let init_deadline = self.machine.init_deadline().map(Instant::from_std);

            tokio::select! {
                biased;

                changed = cancel.changed() => {
                    // A dropped sender means every handle is gone.
                    if changed.is_err() || *cancel.borrow() {
                        self.machine.cancel(now());
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    self.machine.expire(now());
                }
                _ = sleep_until_opt(init_deadline) => {
                    self.machine.check_init_grace(now());
                }
                Some((attempt, outcome)) = verdicts.recv() => {
                    self.on_outcome(attempt, outcome);
                }
                event = events.recv() => match event {
                    Some(event) => self.on_event(event),
                    None => {
                        tracing::warn!(session = %self.machine.session_id(), "capture pipeline ended");
                        self.machine.fail(ReasonCode::HardwareUnavailable, now());
                    }
                },
            }
        }

        // Frames and responses still in flight are discarded with the channels.
        drop(events);
        drop(verdicts);

        if let Some(result) = self.machine.result() {
            let delivered = publish(&self.result, || result.clone());
            tracing::info!(
                session = %self.machine.session_id(),
                status = ?result.status,
                reason = ?result.reason_code,
                match_score = ?result.match_score,
                delivered,
                "session finished"
            );
        }

        guard.join().await;
    }

    fn on_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Fault(reason) => {
                tracing::warn!(session = %self.machine.session_id(), %reason, "capture fault");
                self.machine.fail(reason, now());
            }
            CaptureEvent::Frame {
                frame,
                landmarks,
                quality,
            } => {
                let features = usable_features(landmarks.as_ref(), &quality);
                match &features {
                    None => {
                        tracing::trace!(session = %self.machine.session_id(), seq = frame.sequence, "no usable face")
                    }
                    Some(f) if f.brows_raised() => {
                        tracing::debug!(session = %self.machine.session_id(), seq = frame.sequence, brow_raise = ?f.brow_raise, "eyebrow raise observed")
                    }
                    Some(_) => {}
                }
                if self.machine.observe(features.as_ref(), now()) == Some(Directive::Capture) {
                    match frame.encode_jpeg(JPEG_QUALITY) {
                        Ok(jpeg) => self.submit(jpeg),
                        Err(e) => {
                            tracing::error!(session = %self.machine.session_id(), error = %e, "could not encode capture");
                            self.machine.fail(ReasonCode::HardwareUnavailable, now());
                        }
                    }
                }
            }
        }
    }

    fn submit(&self, jpeg: Vec<u8>) {
        let attempt = self.machine.submissions();
        let matcher = Arc::clone(&self.matcher);
        let identity = self.machine.claimed_identity().to_string();
        let tx = self.verdict_tx.clone();
        tracing::info!(session = %self.machine.session_id(), attempt, bytes = jpeg.len(), "submitting capture");

        tokio::spawn(async move {
            let outcome = matcher.submit(jpeg, &identity).await;
            // The session may be gone already; its answer is then irrelevant.
            let _ = tx.send((attempt, outcome)).await;
        });
    }

    fn on_outcome(&mut self, attempt: u32, outcome: Result<MatchVerdict, SubmitError>) {
        if attempt != self.machine.submissions() {
            tracing::debug!(session = %self.machine.session_id(), attempt, "stale submission outcome");
            return;
        }
        match outcome {
            Ok(verdict) => self.machine.on_verdict(verdict, now()),
            Err(e) => {
                tracing::warn!(session = %self.machine.session_id(), error = %e, "match service unavailable");
                self.machine.on_service_unavailable(now());
            }
        }
    }
}
