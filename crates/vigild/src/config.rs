use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use vigil_core::{LivenessConfig, QualityConfig};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("VIGIL_EAR_OPEN ({open}) must not be below VIGIL_EAR_CLOSED ({closed})")]
    EarThresholdsInverted { closed: f32, open: f32 },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{name} must be within ({min}, {max}), got {value}")]
    OutOfRange {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    #[error("VIGIL_MATCH_URL must be an http(s) URL, got {0:?}")]
    BadUrl(String),
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Endpoint of the remote identity match service.
    pub match_url: String,
    /// Per-request timeout for the match service.
    pub match_timeout: Duration,
    /// Additional attempts after a transport failure.
    pub transport_retries: u32,
    /// Fixed delay between transport attempts.
    pub retry_backoff: Duration,
    /// Distance assumed when an accepted response carries none.
    pub fallback_distance: f32,
    /// Overall deadline of one verification session.
    pub session_timeout: Duration,
    /// Frames discarded after the camera opens (AGC/AE settling).
    pub warmup_frames: usize,
    pub liveness: LivenessConfig,
    pub quality: QualityConfig,
    /// Serve on the session bus instead of the system bus.
    pub session_bus: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            model_dir: vigil_core::default_model_dir(),
            match_url: "http://127.0.0.1:5000/api/verify-face".to_string(),
            match_timeout: Duration::from_secs(10),
            transport_retries: 3,
            retry_backoff: Duration::from_millis(500),
            fallback_distance: 0.1,
            session_timeout: Duration::from_secs(60),
            warmup_frames: 4,
            liveness: LivenessConfig::default(),
            quality: QualityConfig::default(),
            session_bus: false,
        }
    }
}

impl Config {
    /// Load configuration from `VIGIL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        let dl = &d.liveness;

        let liveness = LivenessConfig {
            debounce_frames: env_usize("VIGIL_DEBOUNCE_FRAMES", dl.debounce_frames),
            ear_closed: env_f32("VIGIL_EAR_CLOSED", dl.ear_closed),
            ear_open: env_f32("VIGIL_EAR_OPEN", dl.ear_open),
            blink_window: env_millis("VIGIL_BLINK_WINDOW_MS", dl.blink_window),
            smile_threshold: env_f32("VIGIL_SMILE_THRESHOLD", dl.smile_threshold),
            max_reject_retries: env_u32("VIGIL_MAX_REJECT_RETRIES", dl.max_reject_retries),
            init_grace: env_millis("VIGIL_INIT_GRACE_MS", dl.init_grace),
        };

        Self {
            camera_device: std::env::var("VIGIL_CAMERA_DEVICE").unwrap_or(d.camera_device),
            model_dir: std::env::var("VIGIL_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.model_dir),
            match_url: std::env::var("VIGIL_MATCH_URL").unwrap_or(d.match_url),
            match_timeout: env_millis("VIGIL_MATCH_TIMEOUT_MS", d.match_timeout),
            transport_retries: env_u32("VIGIL_TRANSPORT_RETRIES", d.transport_retries),
            retry_backoff: env_millis("VIGIL_RETRY_BACKOFF_MS", d.retry_backoff),
            fallback_distance: env_f32("VIGIL_FALLBACK_DISTANCE", d.fallback_distance),
            session_timeout: Duration::from_secs(env_u64(
                "VIGIL_SESSION_TIMEOUT_SECS",
                d.session_timeout.as_secs(),
            )),
            warmup_frames: env_usize("VIGIL_WARMUP_FRAMES", d.warmup_frames),
            liveness,
            quality: QualityConfig {
                enabled: env_flag("VIGIL_QUALITY_GATE", d.quality.enabled),
                ..d.quality
            },
            session_bus: env_flag("VIGIL_SESSION_BUS", d.session_bus),
        }
    }

    /// Reject threshold combinations the liveness machine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.liveness;
        if l.debounce_frames == 0 {
            return Err(ConfigError::Zero("VIGIL_DEBOUNCE_FRAMES"));
        }
        if l.blink_window.is_zero() {
            return Err(ConfigError::Zero("VIGIL_BLINK_WINDOW_MS"));
        }
        if self.session_timeout.is_zero() {
            return Err(ConfigError::Zero("VIGIL_SESSION_TIMEOUT_SECS"));
        }
        if l.ear_open < l.ear_closed {
            return Err(ConfigError::EarThresholdsInverted {
                closed: l.ear_closed,
                open: l.ear_open,
            });
        }
        check_range("VIGIL_EAR_CLOSED", l.ear_closed, 0.0, 1.0)?;
        check_range("VIGIL_EAR_OPEN", l.ear_open, 0.0, 1.0)?;
        check_range("VIGIL_SMILE_THRESHOLD", l.smile_threshold, 0.0, 2.0)?;
        check_range("VIGIL_FALLBACK_DISTANCE", self.fallback_distance, -0.001, 1.001)?;
        if !(self.match_url.starts_with("http://") || self.match_url.starts_with("https://")) {
            return Err(ConfigError::BadUrl(self.match_url.clone()));
        }
        Ok(())
    }
}

fn check_range(name: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if value > min && value < max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Values that do not fit a `u32` fall back to `default`.
fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    Duration::from_millis(env_u64(key, default.as_millis() as u64))
}

/// "0", "false", "off" disable; any other value enables.
fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off"))
        .unwrap_or(default)
}
