//! vigil-core: liveness verification engine.
//!
//! Turns per-frame facial landmarks into eye-openness and expression ratios,
//! sequences the face → blink → smile liveness stages, and provides the
//! ONNX-backed landmark oracle (SCRFD face box + 68-point regressor).

pub mod detector;
pub mod features;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod imaging;
pub mod landmarker;
pub mod landmarks;
pub mod liveness;
pub mod oracle;
pub mod quality;
pub mod result;

pub use features::{compute_features, GeometricFeatures, NoFace};
pub use landmarks::{LandmarkFrame, LandmarkId, Point};
pub use liveness::{Directive, LivenessConfig, LivenessSession, LivenessState, MatchVerdict};
pub use oracle::{LandmarkOracle, OnnxOracle, OracleError};
pub use quality::{FrameQuality, QualityConfig};
pub use result::{ReasonCode, VerificationResult, VerificationStatus};

use std::path::PathBuf;

/// Default directory searched for ONNX model files.
///
/// `$XDG_DATA_HOME/vigil/models`, falling back to `~/.local/share/vigil/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("vigil")
        .join("models")
}
