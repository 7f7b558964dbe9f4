use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A landmark position in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Plane Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Face bounding box in source image pixels, as found by the face detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// Ordered landmark sequence for one detected face.
///
/// Index meaning is fixed by the detector's topology; see [`crate::topology`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    pub points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Point> {
        self.points.get(index)
    }
}

impl From<Vec<(f64, f64)>> for LandmarkSet {
    fn from(pairs: Vec<(f64, f64)>) -> Self {
        Self {
            points: pairs.into_iter().map(|(x, y)| Point::new(x, y)).collect(),
        }
    }
}

/// The spans the ratios are derived from, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub forehead_width: f64,
    pub jawline_width: f64,
    pub cheekbone_width: f64,
    pub face_length: f64,
}

/// Dimensionless face-geometry ratios used for classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioSet {
    /// Cheekbone width / face length.
    pub width_to_length: f64,
    /// Forehead width / jawline width.
    pub forehead_to_jawline: f64,
    /// Cheekbone width / jawline width.
    pub cheekbone_to_jawline: f64,
}

impl RatioSet {
    pub const fn new(width_to_length: f64, forehead_to_jawline: f64, cheekbone_to_jawline: f64) -> Self {
        Self {
            width_to_length,
            forehead_to_jawline,
            cheekbone_to_jawline,
        }
    }

    /// Named values in presentation order.
    pub fn named(&self) -> [(&'static str, f64); 3] {
        [
            ("width_to_length_ratio", self.width_to_length),
            ("forehead_to_jawline_ratio", self.forehead_to_jawline),
            ("cheekbone_to_jawline_ratio", self.cheekbone_to_jawline),
        ]
    }
}

/// Face-shape category. OVAL is the universal fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FaceShape {
    #[default]
    Oval,
    Round,
    Square,
    Heart,
    Oblong,
}

impl FaceShape {
    pub const ALL: [FaceShape; 5] = [
        FaceShape::Oval,
        FaceShape::Round,
        FaceShape::Square,
        FaceShape::Heart,
        FaceShape::Oblong,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FaceShape::Oval => "OVAL",
            FaceShape::Round => "ROUND",
            FaceShape::Square => "SQUARE",
            FaceShape::Heart => "HEART",
            FaceShape::Oblong => "OBLONG",
        }
    }
}

impl fmt::Display for FaceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown face shape: {0}")]
pub struct UnknownShape(pub String);

impl FromStr for FaceShape {
    type Err = UnknownShape;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        FaceShape::ALL
            .into_iter()
            .find(|shape| shape.as_str().eq_ignore_ascii_case(token))
            .ok_or_else(|| UnknownShape(s.to_string()))
    }
}
