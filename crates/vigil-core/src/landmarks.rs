use serde::{Deserialize, Serialize};

/// A 2D point in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Named landmark slots consumed by the feature computer.
///
/// Each eye is a six-point contour in the usual EAR order:
/// P1 and P4 are the horizontal corners, P2/P3 the upper lid,
/// P5/P6 the lower lid (P2 faces P6, P3 faces P5).
/// "Left" and "Right" refer to image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandmarkId {
    LeftEyeP1,
    LeftEyeP2,
    LeftEyeP3,
    LeftEyeP4,
    LeftEyeP5,
    LeftEyeP6,
    RightEyeP1,
    RightEyeP2,
    RightEyeP3,
    RightEyeP4,
    RightEyeP5,
    RightEyeP6,
    MouthLeft,
    MouthRight,
    /// Outer corner of the image-left eye.
    EyeCornerLeft,
    /// Outer corner of the image-right eye.
    EyeCornerRight,
    /// Brow apex above the image-left eye.
    BrowLeft,
    /// Brow apex above the image-right eye.
    BrowRight,
    /// Nasion, top of the nose bridge.
    NoseBridge,
    Chin,
}

impl LandmarkId {
    pub const COUNT: usize = 20;

    pub const ALL: [LandmarkId; Self::COUNT] = [
        LandmarkId::LeftEyeP1,
        LandmarkId::LeftEyeP2,
        LandmarkId::LeftEyeP3,
        LandmarkId::LeftEyeP4,
        LandmarkId::LeftEyeP5,
        LandmarkId::LeftEyeP6,
        LandmarkId::RightEyeP1,
        LandmarkId::RightEyeP2,
        LandmarkId::RightEyeP3,
        LandmarkId::RightEyeP4,
        LandmarkId::RightEyeP5,
        LandmarkId::RightEyeP6,
        LandmarkId::MouthLeft,
        LandmarkId::MouthRight,
        LandmarkId::EyeCornerLeft,
        LandmarkId::EyeCornerRight,
        LandmarkId::BrowLeft,
        LandmarkId::BrowRight,
        LandmarkId::NoseBridge,
        LandmarkId::Chin,
    ];

    /// Slots without which a frame has no usable face.
    pub const REQUIRED: [LandmarkId; 16] = [
        LandmarkId::LeftEyeP1,
        LandmarkId::LeftEyeP2,
        LandmarkId::LeftEyeP3,
        LandmarkId::LeftEyeP4,
        LandmarkId::LeftEyeP5,
        LandmarkId::LeftEyeP6,
        LandmarkId::RightEyeP1,
        LandmarkId::RightEyeP2,
        LandmarkId::RightEyeP3,
        LandmarkId::RightEyeP4,
        LandmarkId::RightEyeP5,
        LandmarkId::RightEyeP6,
        LandmarkId::MouthLeft,
        LandmarkId::MouthRight,
        LandmarkId::EyeCornerLeft,
        LandmarkId::EyeCornerRight,
    ];

    pub const LEFT_EYE: [LandmarkId; 6] = [
        LandmarkId::LeftEyeP1,
        LandmarkId::LeftEyeP2,
        LandmarkId::LeftEyeP3,
        LandmarkId::LeftEyeP4,
        LandmarkId::LeftEyeP5,
        LandmarkId::LeftEyeP6,
    ];

    pub const RIGHT_EYE: [LandmarkId; 6] = [
        LandmarkId::RightEyeP1,
        LandmarkId::RightEyeP2,
        LandmarkId::RightEyeP3,
        LandmarkId::RightEyeP4,
        LandmarkId::RightEyeP5,
        LandmarkId::RightEyeP6,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

/// iBUG-68 index for every named slot, in [`LandmarkId::ALL`] order.
///
/// Eyes: 36–41 (image-left) and 42–47 (image-right), each listed
/// corner, upper lid ×2, corner, lower lid ×2. Mouth corners: 48, 54.
/// Brow apexes 19 and 24, nasion 27, chin 8.
const IBUG68_SLOTS: [usize; LandmarkId::COUNT] = [
    36, 37, 38, 39, 40, 41, // image-left eye
    42, 43, 44, 45, 46, 47, // image-right eye
    48, 54, // mouth corners
    36, 45, // outer eye corners
    19, 24, 27, 8,
];

/// Landmarks for one detected face in one frame.
///
/// Slots may be empty when the oracle produced a partial detection; the
/// feature computer treats any missing required slot as "no face".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkFrame {
    points: [Option<Point>; LandmarkId::COUNT],
}

impl LandmarkFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: LandmarkId, point: Point) {
        self.points[id.slot()] = Some(point);
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, id: LandmarkId, point: Point) -> Self {
        self.set(id, point);
        self
    }

    pub fn remove(&mut self, id: LandmarkId) {
        self.points[id.slot()] = None;
    }

    pub fn get(&self, id: LandmarkId) -> Option<Point> {
        self.points[id.slot()]
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.points.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when every named slot is populated.
    pub fn is_complete(&self) -> bool {
        self.points.iter().all(Option::is_some)
    }

    pub fn iter(&self) -> impl Iterator<Item = (LandmarkId, Point)> + '_ {
        LandmarkId::ALL
            .iter()
            .filter_map(|&id| self.get(id).map(|p| (id, p)))
    }

    /// Apply `f` to every populated point.
    pub fn map_points(&self, f: impl Fn(Point) -> Point) -> Self {
        let mut out = Self::new();
        for (id, p) in self.iter() {
            out.set(id, f(p));
        }
        out
    }

    /// Build a frame from an iBUG-68 point list. Returns `None` if fewer than
    /// 68 points are supplied.
    pub fn from_ibug68(points: &[(f32, f32)]) -> Option<Self> {
        if points.len() < 68 {
            return None;
        }
        let mut frame = Self::new();
        for (id, &idx) in LandmarkId::ALL.iter().zip(IBUG68_SLOTS.iter()) {
            let (x, y) = points[idx];
            frame.set(*id, Point::new(x, y));
        }
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < 1e-6);
        assert!((b.distance(a) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_frame() {
        let frame = LandmarkFrame::new();
        assert!(frame.is_empty());
        assert!(!frame.is_complete());
        assert_eq!(frame.get(LandmarkId::MouthLeft), None);
    }

    #[test]
    fn test_set_get_remove() {
        let mut frame = LandmarkFrame::new().with(LandmarkId::MouthLeft, Point::new(1.0, 2.0));
        assert_eq!(frame.get(LandmarkId::MouthLeft), Some(Point::new(1.0, 2.0)));
        assert_eq!(frame.len(), 1);
        frame.remove(LandmarkId::MouthLeft);
        assert!(frame.is_empty());
    }

    #[test]
    fn test_from_ibug68_maps_named_slots() {
        let pts: Vec<(f32, f32)> = (0..68).map(|i| (i as f32, 100.0 + i as f32)).collect();
        let frame = LandmarkFrame::from_ibug68(&pts).unwrap();
        assert!(frame.is_complete());
        assert_eq!(frame.get(LandmarkId::LeftEyeP1), Some(Point::new(36.0, 136.0)));
        assert_eq!(frame.get(LandmarkId::RightEyeP4), Some(Point::new(45.0, 145.0)));
        assert_eq!(frame.get(LandmarkId::MouthRight), Some(Point::new(54.0, 154.0)));
        assert_eq!(frame.get(LandmarkId::EyeCornerLeft), frame.get(LandmarkId::LeftEyeP1));
        assert_eq!(frame.get(LandmarkId::EyeCornerRight), frame.get(LandmarkId::RightEyeP4));
        assert_eq!(frame.get(LandmarkId::BrowRight), Some(Point::new(24.0, 124.0)));
        assert_eq!(frame.get(LandmarkId::Chin), Some(Point::new(8.0, 108.0)));
    }

    #[test]
    fn test_from_ibug68_too_short() {
        let pts = vec![(0.0, 0.0); 67];
        assert!(LandmarkFrame::from_ibug68(&pts).is_none());
    }

    #[test]
    fn test_map_points_preserves_missing_slots() {
        let frame = LandmarkFrame::new().with(LandmarkId::MouthLeft, Point::new(1.0, 1.0));
        let moved = frame.map_points(|p| Point::new(p.x + 10.0, p.y));
        assert_eq!(moved.get(LandmarkId::MouthLeft), Some(Point::new(11.0, 1.0)));
        assert_eq!(moved.len(), 1);
    }
}
