//! Geometric feature computer: eye aspect ratio, smile ratio and brow raise.
//!
//! All features are ratios of distances between landmark pairs, so they are
//! unchanged by uniform scaling and translation of the point set.

use crate::landmarks::{LandmarkFrame, LandmarkId, Point};
use thiserror::Error;

/// Spans shorter than this (in pixels) are treated as a degenerate detection.
const MIN_SPAN: f32 = 1e-6;

/// Brow raise above this counts as raised eyebrows.
pub const BROW_RAISE_THRESHOLD: f32 = 0.16;

/// The landmark set is missing a required point or is geometrically degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no usable face in landmark set")]
pub struct NoFace;

/// Per-frame openness and expression ratios.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometricFeatures {
    /// Eye aspect ratio averaged over both eyes.
    pub ear: f32,
    /// Mouth width divided by outer-eye-corner distance.
    pub smile_ratio: f32,
    /// Mean brow-to-upper-lid distance over nasion-to-chin height. `None`
    /// when the brow or face-height points are absent or degenerate; it
    /// is reported only and never gates a session.
    pub brow_raise: Option<f32>,
}

impl GeometricFeatures {
    pub fn brows_raised(&self) -> bool {
        self.brow_raise.is_some_and(|r| r > BROW_RAISE_THRESHOLD)
    }
}

/// Compute [`GeometricFeatures`] from one landmark set.
///
/// Returns [`NoFace`] if any required point is absent, non-finite, or if an
/// eye width or the inter-eye span collapses to zero. Never returns a partial
/// value.
pub fn compute_features(frame: &LandmarkFrame) -> Result<GeometricFeatures, NoFace> {
    let left = eye_contour(frame, &LandmarkId::LEFT_EYE)?;
    let right = eye_contour(frame, &LandmarkId::RIGHT_EYE)?;
    let ear = (eye_aspect_ratio(&left)? + eye_aspect_ratio(&right)?) / 2.0;

    let mouth = required(frame, LandmarkId::MouthLeft)?
        .distance(required(frame, LandmarkId::MouthRight)?);
    let eye_span = required(frame, LandmarkId::EyeCornerLeft)?
        .distance(required(frame, LandmarkId::EyeCornerRight)?);
    if eye_span < MIN_SPAN {
        return Err(NoFace);
    }
    let smile_ratio = mouth / eye_span;

    if !ear.is_finite() || !smile_ratio.is_finite() {
        return Err(NoFace);
    }

    Ok(GeometricFeatures {
        ear,
        smile_ratio,
        brow_raise: brow_raise(frame, &left, &right),
    })
}

fn brow_raise(frame: &LandmarkFrame, left: &[Point; 6], right: &[Point; 6]) -> Option<f32> {
    let optional = |id| required(frame, id).ok();
    let height = optional(LandmarkId::NoseBridge)?.distance(optional(LandmarkId::Chin)?);
    if height < MIN_SPAN {
        return None;
    }
    let lid = |eye: &[Point; 6]| Point::new((eye[1].x + eye[2].x) / 2.0, (eye[1].y + eye[2].y) / 2.0);
    let gap = (optional(LandmarkId::BrowLeft)?.distance(lid(left))
        + optional(LandmarkId::BrowRight)?.distance(lid(right)))
        / 2.0;
    let ratio = gap / height;
    ratio.is_finite().then_some(ratio)
}

/// EAR for one six-point contour: `(|p2−p6| + |p3−p5|) / (2·|p1−p4|)`.
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> Result<f32, NoFace> {
    let v1 = eye[1].distance(eye[5]);
    let v2 = eye[2].distance(eye[4]);
    let width = eye[0].distance(eye[3]);
    if width < MIN_SPAN {
        return Err(NoFace);
    }
    Ok((v1 + v2) / (2.0 * width))
}

fn required(frame: &LandmarkFrame, id: LandmarkId) -> Result<Point, NoFace> {
    match frame.get(id) {
        Some(p) if p.is_finite() => Ok(p),
        _ => Err(NoFace),
    }
}

fn eye_contour(frame: &LandmarkFrame, ids: &[LandmarkId; 6]) -> Result<[Point; 6], NoFace> {
    let mut pts = [Point::new(0.0, 0.0); 6];
    for (slot, &id) in pts.iter_mut().zip(ids.iter()) {
        *slot = required(frame, id)?;
    }
    Ok(pts)
}
