//! Synthetic landmark sets with exact, known feature values.

use crate::landmarks::{LandmarkFrame, LandmarkId, Point};

const EYE_WIDTH: f32 = 30.0;
const EYE_Y: f32 = 100.0;
const LEFT_EYE_X: f32 = 100.0;
const RIGHT_EYE_X: f32 = 170.0;
const EYE_SPAN: f32 = RIGHT_EYE_X + EYE_WIDTH - LEFT_EYE_X;
const MOUTH_Y: f32 = 160.0;
const CHIN_Y: f32 = 220.0;
const FACE_HEIGHT: f32 = CHIN_Y - EYE_Y;

/// Brow raise of the resting fixture face.
pub const RESTING_BROW_RAISE: f32 = 0.12;

/// Frontal face whose EAR is exactly `ear` and smile ratio exactly `smile_ratio`.
pub fn synthetic_face(ear: f32, smile_ratio: f32) -> LandmarkFrame {
    synthetic_face_with_brows(ear, smile_ratio, RESTING_BROW_RAISE)
}

/// [`synthetic_face`] with the brow raise ratio set to `brow_raise`.
pub fn synthetic_face_with_brows(ear: f32, smile_ratio: f32, brow_raise: f32) -> LandmarkFrame {
    // Lid gap 2h on both vertical pairs: EAR = 4h / (2 * width).
    let h = ear * EYE_WIDTH / 2.0;
    let mut frame = LandmarkFrame::new();
    place_eye(&mut frame, &LandmarkId::LEFT_EYE, LEFT_EYE_X, h);
    place_eye(&mut frame, &LandmarkId::RIGHT_EYE, RIGHT_EYE_X, h);

    let center = LEFT_EYE_X + EYE_SPAN / 2.0;
    let half_mouth = smile_ratio * EYE_SPAN / 2.0;
    // Brow apex straight above the upper-lid midpoint.
    let brow_y = EYE_Y - h - brow_raise * FACE_HEIGHT;
    let half_eye = EYE_WIDTH / 2.0;
    frame
        .with(LandmarkId::BrowLeft, Point::new(LEFT_EYE_X + half_eye, brow_y))
        .with(LandmarkId::BrowRight, Point::new(RIGHT_EYE_X + half_eye, brow_y))
        .with(LandmarkId::NoseBridge, Point::new(center, EYE_Y))
        .with(LandmarkId::Chin, Point::new(center, CHIN_Y))
        .with(LandmarkId::MouthLeft, Point::new(center - half_mouth, MOUTH_Y))
        .with(LandmarkId::MouthRight, Point::new(center + half_mouth, MOUTH_Y))
        .with(LandmarkId::EyeCornerLeft, Point::new(LEFT_EYE_X, EYE_Y))
        .with(LandmarkId::EyeCornerRight, Point::new(RIGHT_EYE_X + EYE_WIDTH, EYE_Y))
}

fn place_eye(frame: &mut LandmarkFrame, ids: &[LandmarkId; 6], x0: f32, h: f32) {
    let third = EYE_WIDTH / 3.0;
    let pts = [
        Point::new(x0, EYE_Y),
        Point::new(x0 + third, EYE_Y - h),
        Point::new(x0 + 2.0 * third, EYE_Y - h),
        Point::new(x0 + EYE_WIDTH, EYE_Y),
        Point::new(x0 + 2.0 * third, EYE_Y + h),
        Point::new(x0 + third, EYE_Y + h),
    ];
    for (&id, p) in ids.iter().zip(pts) {
        frame.set(id, p);
    }
}
