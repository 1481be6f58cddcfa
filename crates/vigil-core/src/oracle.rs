//! Landmark oracle: grayscale frame in, tracked landmark set (or nothing) out.

use crate::detector::{DetectorError, FaceDetector};
use crate::landmarker::{Landmarker, LandmarkerError};
use crate::landmarks::LandmarkFrame;
use std::path::Path;
use thiserror::Error;

pub const DETECTOR_MODEL: &str = "det_10g.onnx";
pub const LANDMARK_MODEL: &str = "landmark_68.onnx";

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("landmarker: {0}")]
    Landmarker(#[from] LandmarkerError),
}

/// Per-frame landmark source.
///
/// `Ok(None)` means no face in the frame. `Err` is a fault of the oracle
/// itself; callers treat it as fatal for the session.
pub trait LandmarkOracle: Send {
    fn detect(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<LandmarkFrame>, OracleError>;
}

/// SCRFD face box followed by a 68-point regressor on the best face.
pub struct OnnxOracle {
    detector: FaceDetector,
    landmarker: Landmarker,
}

impl OnnxOracle {
    pub fn load(detector_path: &str, landmark_path: &str) -> Result<Self, OracleError> {
        Ok(Self {
            detector: FaceDetector::load(detector_path)?,
            landmarker: Landmarker::load(landmark_path)?,
        })
    }

    /// Load both models by their default file names from `model_dir`.
    pub fn from_dir(model_dir: &Path) -> Result<Self, OracleError> {
        let det = model_dir.join(DETECTOR_MODEL);
        let lmk = model_dir.join(LANDMARK_MODEL);
        Self::load(&det.to_string_lossy(), &lmk.to_string_lossy())
    }
}

impl LandmarkOracle for OnnxOracle {
    fn detect(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<LandmarkFrame>, OracleError> {
        let faces = self.detector.detect(gray, width, height)?;
        let Some(face) = faces.first() else {
            return Ok(None);
        };
        tracing::trace!(confidence = face.confidence, faces = faces.len(), "face box");

        let points = self.landmarker.landmarks(gray, width, height, face)?;
        Ok(LandmarkFrame::from_ibug68(&points))
    }
}
