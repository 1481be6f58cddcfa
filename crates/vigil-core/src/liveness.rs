//! Staged liveness state machine.
//!
//! ```text
//! Idle → Initializing → AwaitingFace → AwaitingBlink → AwaitingSmile → Submitting
//!                            ↑                                            │
//!                            └──────────── rejected (≤ M times) ──────────┤
//!                                                                         ├→ Verified
//!   any non-terminal state ─ cancel / timeout / local fault ─→ Failed ←───┘
//! ```
//!
//! The machine is synchronous and clock-agnostic: every input carries the
//! `Instant` at which it was observed. It never performs I/O; on the
//! AwaitingSmile → Submitting edge it returns [`Directive::Capture`] and the
//! owner captures the frame and runs the submission.
//!
//! # Blink detection
//!
//! A blink is two edges: EAR falls below `ear_closed`, then rises above
//! `ear_open` within `blink_window` of the closing edge. A photo never closes
//! and a shut eye never reopens, so neither advances the machine. A reopen
//! that arrives too late is discarded and the subject has to blink again.

use crate::features::GeometricFeatures;
use crate::result::{ReasonCode, VerificationResult};
use std::time::{Duration, Instant};

/// Calibration values for the liveness stages.
#[derive(Debug, Clone, PartialEq)]
pub struct LivenessConfig {
    /// Consecutive frames with a valid face required to leave AwaitingFace.
    pub debounce_frames: usize,
    /// EAR below this counts as eyes closed.
    pub ear_closed: f32,
    /// EAR above this counts as eyes open again.
    pub ear_open: f32,
    /// Maximum time between the closing and reopening edge of a blink.
    pub blink_window: Duration,
    /// Smile ratio above this triggers capture.
    pub smile_threshold: f32,
    /// Rejections tolerated before the session fails (M).
    pub max_reject_retries: u32,
    /// Warm-up grace for the frame pipeline to deliver its first frame.
    pub init_grace: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            debounce_frames: 3,
            ear_closed: 0.22,
            ear_open: 0.25,
            blink_window: Duration::from_millis(1500),
            smile_threshold: 0.65,
            max_reject_retries: 3,
            init_grace: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessState {
    Idle,
    Initializing,
    AwaitingFace,
    AwaitingBlink,
    AwaitingSmile,
    Submitting,
    Verified,
    Failed(ReasonCode),
}

impl LivenessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LivenessState::Verified | LivenessState::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            LivenessState::Idle => "Idle",
            LivenessState::Initializing => "Initializing",
            LivenessState::AwaitingFace => "AwaitingFace",
            LivenessState::AwaitingBlink => "AwaitingBlink",
            LivenessState::AwaitingSmile => "AwaitingSmile",
            LivenessState::Submitting => "Submitting",
            LivenessState::Verified => "Verified",
            LivenessState::Failed(_) => "Failed",
        }
    }
}

/// Side effect requested by the machine from its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Capture the current frame's raw image and submit it for matching.
    Capture,
}

/// Interpreted answer from the match service.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchVerdict {
    Accepted {
        /// Display confidence 0–100.
        match_score: f32,
    },
    Rejected {
        message: Option<String>,
    },
}

/// One verification attempt for one claimed identity.
#[derive(Debug, Clone)]
pub struct LivenessSession {
    session_id: String,
    claimed_identity: String,
    config: LivenessConfig,
    state: LivenessState,
    entered_state_at: Instant,
    deadline: Instant,
    reject_retry_count: u32,
    face_streak: usize,
    eyes_closed_at: Option<Instant>,
    match_score: Option<f32>,
    submissions: u32,
}

impl LivenessSession {
    /// Create a session in `Idle`. `deadline` bounds the whole verification.
    pub fn new(
        session_id: impl Into<String>,
        claimed_identity: impl Into<String>,
        config: LivenessConfig,
        deadline: Instant,
        now: Instant,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            claimed_identity: claimed_identity.into(),
            config,
            state: LivenessState::Idle,
            entered_state_at: now,
            deadline,
            reject_retry_count: 0,
            face_streak: 0,
            eyes_closed_at: None,
            match_score: None,
            submissions: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn claimed_identity(&self) -> &str {
        &self.claimed_identity
    }

    pub fn state(&self) -> LivenessState {
        self.state
    }

    pub fn entered_state_at(&self) -> Instant {
        self.entered_state_at
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn reject_retry_count(&self) -> u32 {
        self.reject_retry_count
    }

    /// Number of submissions triggered so far; identifies the outstanding one.
    pub fn submissions(&self) -> u32 {
        self.submissions
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Instant at which the warm-up grace runs out, while Initializing.
    pub fn init_deadline(&self) -> Option<Instant> {
        match self.state {
            LivenessState::Initializing => Some(self.entered_state_at + self.config.init_grace),
            _ => None,
        }
    }

    /// Session start: `Idle → Initializing`.
    pub fn begin(&mut self, now: Instant) {
        if self.state == LivenessState::Idle {
            self.transition(LivenessState::Initializing, now);
        }
    }

    /// Evaluate one delivered frame. `features` is `None` when the frame had
    /// no usable face.
    ///
    /// Returns [`Directive::Capture`] on the AwaitingSmile → Submitting edge
    /// and nowhere else.
    pub fn observe(
        &mut self,
        features: Option<&GeometricFeatures>,
        now: Instant,
    ) -> Option<Directive> {
        if self.state.is_terminal() || self.state == LivenessState::Idle {
            return None;
        }
        if self.check_deadline(now) {
            return None;
        }

        if self.state == LivenessState::Initializing {
            tracing::debug!(session = %self.session_id, "frame pipeline live");
            self.transition(LivenessState::AwaitingFace, now);
        }

        match self.state {
            LivenessState::AwaitingFace => {
                self.observe_face(features, now);
                None
            }
            LivenessState::AwaitingBlink => {
                if let Some(f) = features {
                    self.observe_blink(f, now);
                }
                None
            }
            LivenessState::AwaitingSmile => {
                let f = features?;
                if f.smile_ratio > self.config.smile_threshold {
                    self.submissions += 1;
                    tracing::info!(
                        session = %self.session_id,
                        smile_ratio = f.smile_ratio,
                        attempt = self.submissions,
                        "smile detected; capturing frame"
                    );
                    self.transition(LivenessState::Submitting, now);
                    Some(Directive::Capture)
                } else {
                    None
                }
            }
            // Frames are ignored while a submission is outstanding.
            _ => None,
        }
    }

    /// Apply the match service's verdict for the outstanding submission.
    /// Ignored unless the machine is `Submitting`.
    pub fn on_verdict(&mut self, verdict: MatchVerdict, now: Instant) {
        if self.state != LivenessState::Submitting {
            tracing::debug!(session = %self.session_id, state = self.state.name(), "stale verdict ignored");
            return;
        }
        if self.check_deadline(now) {
            return;
        }

        match verdict {
            MatchVerdict::Accepted { match_score } => {
                self.match_score = Some(match_score);
                self.transition(LivenessState::Verified, now);
            }
            MatchVerdict::Rejected { message } => {
                self.reject_retry_count += 1;
                tracing::info!(
                    session = %self.session_id,
                    rejections = self.reject_retry_count,
                    budget = self.config.max_reject_retries,
                    message = message.as_deref().unwrap_or(""),
                    "match rejected"
                );
                if self.reject_retry_count > self.config.max_reject_retries {
                    self.transition(LivenessState::Failed(ReasonCode::MaxRetriesExceeded), now);
                } else {
                    self.face_streak = 0;
                    self.eyes_closed_at = None;
                    self.transition(LivenessState::AwaitingFace, now);
                }
            }
        }
    }

    /// The submission client gave up after its transport retry cap.
    pub fn on_service_unavailable(&mut self, now: Instant) {
        if self.state == LivenessState::Submitting {
            self.transition(LivenessState::Failed(ReasonCode::ServiceUnavailable), now);
        }
    }

    /// Fail with `HardwareUnavailable` if the warm-up grace has run out.
    /// Returns true if the session failed.
    pub fn check_init_grace(&mut self, now: Instant) -> bool {
        match self.init_deadline() {
            Some(limit) if now >= limit => {
                tracing::warn!(session = %self.session_id, "no frame within warm-up grace");
                self.transition(LivenessState::Failed(ReasonCode::HardwareUnavailable), now);
                true
            }
            _ => false,
        }
    }

    /// Deadline expiry: `Failed(Timeout)` from any non-terminal state.
    pub fn expire(&mut self, now: Instant) {
        self.fail(ReasonCode::Timeout, now);
    }

    /// Caller abort: `Failed(Cancelled)` from any non-terminal state.
    pub fn cancel(&mut self, now: Instant) {
        self.fail(ReasonCode::Cancelled, now);
    }

    /// Unrecoverable fault. No-op once terminal.
    pub fn fail(&mut self, reason: ReasonCode, now: Instant) {
        if !self.state.is_terminal() {
            self.transition(LivenessState::Failed(reason), now);
        }
    }

    /// The terminal result, once reached.
    pub fn result(&self) -> Option<VerificationResult> {
        match self.state {
            LivenessState::Verified => Some(VerificationResult::accepted(
                self.session_id.clone(),
                self.match_score.unwrap_or(0.0),
            )),
            LivenessState::Failed(reason) => {
                Some(VerificationResult::failed(self.session_id.clone(), reason))
            }
            _ => None,
        }
    }

    fn check_deadline(&mut self, now: Instant) -> bool {
        if now >= self.deadline {
            self.expire(now);
            true
        } else {
            false
        }
    }

    fn observe_face(&mut self, features: Option<&GeometricFeatures>, now: Instant) {
        if features.is_none() {
            if self.face_streak > 0 {
                tracing::trace!(session = %self.session_id, streak = self.face_streak, "face lost; debounce reset");
            }
            self.face_streak = 0;
            return;
        }
        self.face_streak += 1;
        if self.face_streak >= self.config.debounce_frames {
            self.face_streak = 0;
            self.eyes_closed_at = None;
            self.transition(LivenessState::AwaitingBlink, now);
        }
    }

    fn observe_blink(&mut self, f: &GeometricFeatures, now: Instant) {
        match self.eyes_closed_at {
            None => {
                if f.ear < self.config.ear_closed {
                    tracing::debug!(session = %self.session_id, ear = f.ear, "eyes closed");
                    self.eyes_closed_at = Some(now);
                }
            }
            Some(closed_at) => {
                if f.ear > self.config.ear_open {
                    if now.duration_since(closed_at) <= self.config.blink_window {
                        self.eyes_closed_at = None;
                        self.transition(LivenessState::AwaitingSmile, now);
                    } else {
                        tracing::debug!(
                            session = %self.session_id,
                            closed_ms = now.duration_since(closed_at).as_millis() as u64,
                            "eyes reopened outside blink window"
                        );
                        self.eyes_closed_at = None;
                    }
                }
            }
        }
    }

    fn transition(&mut self, next: LivenessState, now: Instant) {
        let from = self.state;
        self.state = next;
        self.entered_state_at = now;
        match next {
            LivenessState::Failed(reason) => tracing::warn!(
                session = %self.session_id,
                from = from.name(),
                reason = %reason,
                "session failed"
            ),
            _ => tracing::info!(
                session = %self.session_id,
                from = from.name(),
                to = next.name(),
                "liveness transition"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::compute_features;
    use crate::fixtures::synthetic_face;
    use crate::result::VerificationStatus;

    const TICK: Duration = Duration::from_millis(33);

    struct Harness {
        session: LivenessSession,
        now: Instant,
    }

    impl Harness {
        fn new(config: LivenessConfig) -> Self {
            let now = Instant::now();
            let mut session =
                LivenessSession::new("test", "EPIC0001", config, now + Duration::from_secs(60), now);
            session.begin(now);
            Self { session, now }
        }

        fn frame(&mut self, ear: f32, smile: f32) -> Option<Directive> {
            self.now += TICK;
            let f = compute_features(&synthetic_face(ear, smile)).unwrap();
            self.session.observe(Some(&f), self.now)
        }

        fn no_face(&mut self) -> Option<Directive> {
            self.now += TICK;
            self.session.observe(None, self.now)
        }

        fn verdict(&mut self, v: MatchVerdict) {
            self.now += TICK;
            self.session.on_verdict(v, self.now);
        }

        /// Drive from AwaitingFace to Submitting with the canonical sequence.
        fn run_to_submitting(&mut self) {
            for _ in 0..3 {
                self.frame(0.30, 0.50);
            }
            self.frame(0.18, 0.50);
            self.frame(0.30, 0.50);
            assert_eq!(self.frame(0.30, 0.70), Some(Directive::Capture));
            assert_eq!(self.session.state(), LivenessState::Submitting);
        }
    }

    fn rejected() -> MatchVerdict {
        MatchVerdict::Rejected { message: None }
    }

    #[test]
    fn test_begin_enters_initializing() {
        let h = Harness::new(LivenessConfig::default());
        assert_eq!(h.session.state(), LivenessState::Initializing);
        assert!(h.session.init_deadline().is_some());
    }

    #[test]
    fn test_idle_ignores_frames() {
        let now = Instant::now();
        let mut s = LivenessSession::new(
            "idle",
            "EPIC",
            LivenessConfig::default(),
            now + Duration::from_secs(60),
            now,
        );
        let f = compute_features(&synthetic_face(0.30, 0.50)).unwrap();
        assert_eq!(s.observe(Some(&f), now), None);
        assert_eq!(s.state(), LivenessState::Idle);
    }

    #[test]
    fn test_full_scenario_verified() {
        let mut h = Harness::new(LivenessConfig::default());

        h.frame(0.30, 0.50);
        assert_eq!(h.session.state(), LivenessState::AwaitingFace);
        h.frame(0.30, 0.50);
        assert_eq!(h.session.state(), LivenessState::AwaitingFace);
        h.frame(0.30, 0.50);
        assert_eq!(h.session.state(), LivenessState::AwaitingBlink, "N=3 debounce");

        h.frame(0.18, 0.50);
        assert_eq!(h.session.state(), LivenessState::AwaitingBlink);
        h.frame(0.30, 0.50);
        assert_eq!(h.session.state(), LivenessState::AwaitingSmile);

        assert_eq!(h.frame(0.30, 0.70), Some(Directive::Capture));
        assert_eq!(h.session.state(), LivenessState::Submitting);
        assert_eq!(h.session.submissions(), 1);

        h.verdict(MatchVerdict::Accepted { match_score: 95.0 });
        assert_eq!(h.session.state(), LivenessState::Verified);

        let result = h.session.result().unwrap();
        assert_eq!(result.status, VerificationStatus::Accepted);
        assert_eq!(result.match_score, Some(95.0));
    }

    #[test]
    fn test_debounce_resets_on_lost_face() {
        let mut h = Harness::new(LivenessConfig::default());
        h.frame(0.30, 0.50);
        h.frame(0.30, 0.50);
        h.no_face();
        h.frame(0.30, 0.50);
        h.frame(0.30, 0.50);
        assert_eq!(h.session.state(), LivenessState::AwaitingFace);
        h.frame(0.30, 0.50);
        assert_eq!(h.session.state(), LivenessState::AwaitingBlink);
    }

    #[test]
    fn test_static_photo_never_blinks() {
        let mut h = Harness::new(LivenessConfig::default());
        for _ in 0..100 {
            h.frame(0.30, 0.70);
        }
        assert_eq!(h.session.state(), LivenessState::AwaitingBlink);
    }

    #[test]
    fn test_shut_eye_never_reopens() {
        let mut h = Harness::new(LivenessConfig::default());
        for _ in 0..3 {
            h.frame(0.30, 0.50);
        }
        for _ in 0..100 {
            h.frame(0.10, 0.50);
        }
        assert_eq!(h.session.state(), LivenessState::AwaitingBlink);
    }

    #[test]
    fn test_late_reopen_discarded() {
        let mut h = Harness::new(LivenessConfig::default());
        for _ in 0..3 {
            h.frame(0.30, 0.50);
        }
        h.frame(0.18, 0.50);
        h.now += Duration::from_secs(2);
        h.frame(0.30, 0.50);
        assert_eq!(h.session.state(), LivenessState::AwaitingBlink, "reopen after window");

        // A fresh, quick blink still works afterwards.
        h.frame(0.18, 0.50);
        h.frame(0.30, 0.50);
        assert_eq!(h.session.state(), LivenessState::AwaitingSmile);
    }

    #[test]
    fn test_hysteresis_zone_does_not_reopen() {
        let mut h = Harness::new(LivenessConfig::default());
        for _ in 0..3 {
            h.frame(0.30, 0.50);
        }
        h.frame(0.18, 0.50);
        h.frame(0.23, 0.50); // between closed and open thresholds
        assert_eq!(h.session.state(), LivenessState::AwaitingBlink);
        h.frame(0.26, 0.50);
        assert_eq!(h.session.state(), LivenessState::AwaitingSmile);
    }

    #[test]
    fn test_no_face_during_blink_is_transient() {
        let mut h = Harness::new(LivenessConfig::default());
        for _ in 0..3 {
            h.frame(0.30, 0.50);
        }
        h.frame(0.18, 0.50);
        h.no_face();
        h.frame(0.30, 0.50);
        assert_eq!(h.session.state(), LivenessState::AwaitingSmile);
    }

    #[test]
    fn test_smile_below_threshold_waits() {
        let mut h = Harness::new(LivenessConfig::default());
        for _ in 0..3 {
            h.frame(0.30, 0.50);
        }
        h.frame(0.18, 0.50);
        h.frame(0.30, 0.50);
        assert_eq!(h.frame(0.30, 0.65), None, "threshold must be exceeded");
        assert_eq!(h.no_face(), None);
        assert_eq!(h.session.state(), LivenessState::AwaitingSmile);
    }

    #[test]
    fn test_frames_ignored_while_submitting() {
        let mut h = Harness::new(LivenessConfig::default());
        h.run_to_submitting();
        assert_eq!(h.frame(0.30, 0.90), None);
        assert_eq!(h.no_face(), None);
        assert_eq!(h.session.state(), LivenessState::Submitting);
        assert_eq!(h.session.submissions(), 1);
    }

    #[test]
    fn test_rejection_resets_to_awaiting_face() {
        let mut h = Harness::new(LivenessConfig::default());
        h.run_to_submitting();
        h.verdict(rejected());
        assert_eq!(h.session.state(), LivenessState::AwaitingFace);
        assert_eq!(h.session.reject_retry_count(), 1);

        // Debounce restarts from zero after the reset.
        h.frame(0.30, 0.90);
        h.frame(0.30, 0.90);
        assert_eq!(h.session.state(), LivenessState::AwaitingFace);
    }

    #[test]
    fn test_max_retries_exceeded_on_m_plus_one() {
        let mut h = Harness::new(LivenessConfig::default());
        for attempt in 1..=3 {
            h.run_to_submitting();
            h.verdict(rejected());
            assert_eq!(
                h.session.state(),
                LivenessState::AwaitingFace,
                "rejection {attempt} must reset"
            );
        }
        h.run_to_submitting();
        h.verdict(rejected());
        assert_eq!(
            h.session.state(),
            LivenessState::Failed(ReasonCode::MaxRetriesExceeded)
        );
        assert_eq!(h.session.reject_retry_count(), 4);
        let result = h.session.result().unwrap();
        assert_eq!(result.status, VerificationStatus::Rejected);
        assert_eq!(result.reason_code, Some(ReasonCode::MaxRetriesExceeded));
    }

    #[test]
    fn test_zero_budget_fails_on_first_rejection() {
        let mut h = Harness::new(LivenessConfig {
            max_reject_retries: 0,
            ..LivenessConfig::default()
        });
        h.run_to_submitting();
        h.verdict(rejected());
        assert_eq!(
            h.session.state(),
            LivenessState::Failed(ReasonCode::MaxRetriesExceeded)
        );
    }

    #[test]
    fn test_service_unavailable() {
        let mut h = Harness::new(LivenessConfig::default());
        h.run_to_submitting();
        h.session.on_service_unavailable(h.now);
        assert_eq!(
            h.session.state(),
            LivenessState::Failed(ReasonCode::ServiceUnavailable)
        );
    }

    #[test]
    fn test_stale_verdict_ignored() {
        let mut h = Harness::new(LivenessConfig::default());
        h.frame(0.30, 0.50);
        h.verdict(MatchVerdict::Accepted { match_score: 99.0 });
        assert_eq!(h.session.state(), LivenessState::AwaitingFace);
        h.session.on_service_unavailable(h.now);
        assert_eq!(h.session.state(), LivenessState::AwaitingFace);
    }

    #[test]
    fn test_cancel_from_every_non_terminal_state() {
        let drivers: [(LivenessState, fn(&mut Harness)); 5] = [
            (LivenessState::Initializing, |_: &mut Harness| {}),
            (LivenessState::AwaitingFace, |h: &mut Harness| {
                h.frame(0.30, 0.50);
            }),
            (LivenessState::AwaitingBlink, |h: &mut Harness| {
                for _ in 0..3 {
                    h.frame(0.30, 0.50);
                }
            }),
            (LivenessState::AwaitingSmile, |h: &mut Harness| {
                for _ in 0..3 {
                    h.frame(0.30, 0.50);
                }
                h.frame(0.18, 0.50);
                h.frame(0.30, 0.50);
            }),
            (LivenessState::Submitting, |h: &mut Harness| h.run_to_submitting()),
        ];

        for (expected, drive) in drivers {
            let mut h = Harness::new(LivenessConfig::default());
            drive(&mut h);
            assert_eq!(h.session.state(), expected);

            h.session.cancel(h.now);
            assert_eq!(h.session.state(), LivenessState::Failed(ReasonCode::Cancelled));

            // Later deliveries are no-ops.
            assert_eq!(h.frame(0.30, 0.90), None);
            h.verdict(MatchVerdict::Accepted { match_score: 90.0 });
            h.session.cancel(h.now);
            assert_eq!(h.session.state(), LivenessState::Failed(ReasonCode::Cancelled));
        }
    }

    #[test]
    fn test_cancel_from_idle() {
        let now = Instant::now();
        let mut s = LivenessSession::new(
            "idle",
            "EPIC",
            LivenessConfig::default(),
            now + Duration::from_secs(60),
            now,
        );
        s.cancel(now);
        assert_eq!(s.state(), LivenessState::Failed(ReasonCode::Cancelled));
    }

    #[test]
    fn test_terminal_verified_is_sticky() {
        let mut h = Harness::new(LivenessConfig::default());
        h.run_to_submitting();
        h.verdict(MatchVerdict::Accepted { match_score: 95.0 });
        h.session.cancel(h.now);
        h.session.expire(h.now);
        assert_eq!(h.session.state(), LivenessState::Verified);
    }

    #[test]
    fn test_no_face_until_deadline_times_out() {
        let mut h = Harness::new(LivenessConfig::default());
        let deadline = h.session.deadline();
        while h.now < deadline {
            h.no_face();
        }
        assert_eq!(h.session.state(), LivenessState::Failed(ReasonCode::Timeout));
        assert_eq!(
            h.session.result().unwrap().reason_code,
            Some(ReasonCode::Timeout)
        );
    }

    #[test]
    fn test_verdict_after_deadline_is_timeout() {
        let mut h = Harness::new(LivenessConfig::default());
        h.run_to_submitting();
        h.now = h.session.deadline();
        h.session
            .on_verdict(MatchVerdict::Accepted { match_score: 95.0 }, h.now);
        assert_eq!(h.session.state(), LivenessState::Failed(ReasonCode::Timeout));
    }

    #[test]
    fn test_init_grace_expiry() {
        let mut h = Harness::new(LivenessConfig::default());
        assert!(!h.session.check_init_grace(h.now + Duration::from_secs(1)));
        assert!(h.session.check_init_grace(h.now + Duration::from_secs(5)));
        assert_eq!(
            h.session.state(),
            LivenessState::Failed(ReasonCode::HardwareUnavailable)
        );
    }

    #[test]
    fn test_init_grace_irrelevant_after_first_frame() {
        let mut h = Harness::new(LivenessConfig::default());
        h.no_face();
        assert_eq!(h.session.state(), LivenessState::AwaitingFace);
        assert!(h.session.init_deadline().is_none());
        assert!(!h.session.check_init_grace(h.now + Duration::from_secs(30)));
    }
}
