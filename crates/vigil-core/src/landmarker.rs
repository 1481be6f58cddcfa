//! 68-point facial landmark regressor (iBUG-68 layout) via ONNX Runtime.
//!
//! Input: a square crop around the detected face, 112×112, gray replicated
//! to 3 channels, scaled to [0, 1]. Output: 136 values, `(x, y)` pairs
//! normalized to the crop.

use crate::detector::FaceBox;
use crate::imaging;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

pub const LANDMARK_INPUT_SIZE: usize = 112;
pub const LANDMARK_COUNT: usize = 68;

/// Crop side relative to the larger box dimension.
const CROP_EXPAND: f32 = 1.2;

#[derive(Error, Debug)]
pub enum LandmarkerError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Square region of the frame fed to the regressor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
    pub x: f32,
    pub y: f32,
    pub side: f32,
}

impl CropRegion {
    /// Expanded square centred on the face box.
    pub fn around(face: &FaceBox) -> Self {
        let side = face.width.max(face.height) * CROP_EXPAND;
        let cx = face.x + face.width / 2.0;
        let cy = face.y + face.height / 2.0;
        Self {
            x: cx - side / 2.0,
            y: cy - side / 2.0,
            side,
        }
    }

    /// Map a crop-normalized point back to frame coordinates.
    pub fn to_frame(&self, nx: f32, ny: f32) -> (f32, f32) {
        (self.x + nx * self.side, self.y + ny * self.side)
    }
}

pub struct Landmarker {
    session: Session,
}

impl Landmarker {
    pub fn load(model_path: &str) -> Result<Self, LandmarkerError> {
        if !Path::new(model_path).exists() {
            return Err(LandmarkerError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, "loaded landmark model");
        Ok(Self { session })
    }

    /// Regress the 68 landmarks for one detected face.
    pub fn landmarks(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        face: &FaceBox,
    ) -> Result<Vec<(f32, f32)>, LandmarkerError> {
        let region = CropRegion::around(face);
        let input = preprocess(frame, width as usize, height as usize, &region);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| LandmarkerError::InferenceFailed(format!("landmarks: {e}")))?;

        decode(raw, &region)
    }
}

fn preprocess(frame: &[u8], width: usize, height: usize, region: &CropRegion) -> Array4<f32> {
    let size = LANDMARK_INPUT_SIZE;
    let crop = imaging::crop_square(frame, width, height, region.x, region.y, region.side, size);
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let v = crop[y * size + x] as f32 / 255.0;
            for c in 0..3 {
                tensor[[0, c, y, x]] = v;
            }
        }
    }
    tensor
}

fn decode(raw: &[f32], region: &CropRegion) -> Result<Vec<(f32, f32)>, LandmarkerError> {
    if raw.len() < LANDMARK_COUNT * 2 {
        return Err(LandmarkerError::InferenceFailed(format!(
            "expected {} landmark values, got {}",
            LANDMARK_COUNT * 2,
            raw.len()
        )));
    }
    Ok(raw[..LANDMARK_COUNT * 2]
        .chunks_exact(2)
        .map(|p| region.to_frame(p[0], p[1]))
        .collect())
}
