//! Geometry extraction: landmark set → measurements → ratio set.

use crate::topology::LandmarkTopology;
use crate::types::{LandmarkSet, Measurements, Point, RatioSet};
use thiserror::Error;

/// Denominators at or below this many pixels are treated as zero.
pub const EPSILON: f64 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("landmark set has {actual} points, topology needs at least {required}")]
    InsufficientLandmarks { required: usize, actual: usize },
    #[error("degenerate geometry: {measurement} is {value:.6} px")]
    DegenerateGeometry { measurement: &'static str, value: f64 },
}

/// Measure the four facial spans defined by `topology`.
pub fn measure(
    landmarks: &LandmarkSet,
    topology: &LandmarkTopology,
) -> Result<Measurements, GeometryError> {
    let required = topology.required_len();
    if landmarks.is_empty() || landmarks.len() < required {
        return Err(GeometryError::InsufficientLandmarks {
            required,
            actual: landmarks.len(),
        });
    }

    let span = |measurement: &'static str, a: usize, b: usize| -> Result<f64, GeometryError> {
        let value = point_at(landmarks, a, required)?.distance(point_at(landmarks, b, required)?);
        finite(measurement, value)
    };

    Ok(Measurements {
        forehead_width: span("forehead_width", topology.forehead_left, topology.forehead_right)?,
        jawline_width: span("jawline_width", topology.jaw_left, topology.jaw_right)?,
        cheekbone_width: span("cheekbone_width", topology.cheek_left, topology.cheek_right)?,
        face_length: span("face_length", topology.forehead_center, topology.chin)?,
    })
}

fn finite(measurement: &'static str, value: f64) -> Result<f64, GeometryError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GeometryError::DegenerateGeometry { measurement, value })
    }
}

fn point_at(landmarks: &LandmarkSet, index: usize, required: usize) -> Result<&Point, GeometryError> {
    landmarks
        .get(index)
        .ok_or(GeometryError::InsufficientLandmarks {
            required,
            actual: landmarks.len(),
        })
}

impl Measurements {
    /// Derive the ratio set, rejecting zero-width jaws, zero-length faces and
    /// any non-finite span or ratio.
    pub fn ratios(&self) -> Result<RatioSet, GeometryError> {
        guard_denominator("face_length", self.face_length)?;
        guard_denominator("jawline_width", self.jawline_width)?;
        finite("forehead_width", self.forehead_width)?;
        finite("cheekbone_width", self.cheekbone_width)?;

        Ok(RatioSet {
            width_to_length: finite("width_to_length", self.cheekbone_width / self.face_length)?,
            forehead_to_jawline: finite("forehead_to_jawline", self.forehead_width / self.jawline_width)?,
            cheekbone_to_jawline: finite("cheekbone_to_jawline", self.cheekbone_width / self.jawline_width)?,
        })
    }
}

fn guard_denominator(measurement: &'static str, value: f64) -> Result<(), GeometryError> {
    if value.is_finite() && value > EPSILON {
        Ok(())
    } else {
        Err(GeometryError::DegenerateGeometry { measurement, value })
    }
}

/// Compute the ratio set for a landmark set laid out per `topology`.
pub fn compute_ratios(
    landmarks: &LandmarkSet,
    topology: &LandmarkTopology,
) -> Result<RatioSet, GeometryError> {
    measure(landmarks, topology)?.ratios()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::topology::FACE_MESH;

    /// Build a face-mesh-sized landmark set with the measured points placed
    /// so the spans come out at the requested pixel lengths.
    pub(crate) fn synthetic_face(
        forehead_width: f64,
        jawline_width: f64,
        cheekbone_width: f64,
        face_length: f64,
    ) -> LandmarkSet {
        let t = FACE_MESH;
        let mut points = vec![Point::new(0.0, 0.0); t.required_len()];
        let cx = 300.0;
        points[t.forehead_left] = Point::new(cx - forehead_width / 2.0, 100.0);
        points[t.forehead_right] = Point::new(cx + forehead_width / 2.0, 100.0);
        points[t.cheek_left] = Point::new(cx - cheekbone_width / 2.0, 180.0);
        points[t.cheek_right] = Point::new(cx + cheekbone_width / 2.0, 180.0);
        points[t.jaw_left] = Point::new(cx - jawline_width / 2.0, 260.0);
        points[t.jaw_right] = Point::new(cx + jawline_width / 2.0, 260.0);
        points[t.forehead_center] = Point::new(cx, 80.0);
        points[t.chin] = Point::new(cx, 80.0 + face_length);
        LandmarkSet::new(points)
    }

    #[test]
    fn test_measure_spans() {
        let face = synthetic_face(150.0, 120.0, 180.0, 200.0);
        let m = measure(&face, &FACE_MESH).unwrap();
        assert!((m.forehead_width - 150.0).abs() < 1e-9);
        assert!((m.jawline_width - 120.0).abs() < 1e-9);
        assert!((m.cheekbone_width - 180.0).abs() < 1e-9);
        assert!((m.face_length - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_compute_ratios_reference_face() {
        let face = synthetic_face(150.0, 120.0, 180.0, 200.0);
        let r = compute_ratios(&face, &FACE_MESH).unwrap();
        assert!((r.width_to_length - 0.9).abs() < 1e-9);
        assert!((r.forehead_to_jawline - 1.25).abs() < 1e-9);
        assert!((r.cheekbone_to_jawline - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_diagonal_span() {
        let t = FACE_MESH;
        let mut face = synthetic_face(150.0, 120.0, 180.0, 200.0);
        face.points[t.cheek_left] = Point::new(0.0, 0.0);
        face.points[t.cheek_right] = Point::new(30.0, 40.0);
        let m = measure(&face, &t).unwrap();
        assert!((m.cheekbone_width - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_landmarks_insufficient() {
        let err = compute_ratios(&LandmarkSet::default(), &FACE_MESH).unwrap_err();
        assert_eq!(
            err,
            GeometryError::InsufficientLandmarks { required: 398, actual: 0 }
        );
    }

    #[test]
    fn test_short_landmarks_insufficient() {
        let mut face = synthetic_face(150.0, 120.0, 180.0, 200.0);
        face.points.truncate(FACE_MESH.jaw_right);
        let err = compute_ratios(&face, &FACE_MESH).unwrap_err();
        assert!(matches!(err, GeometryError::InsufficientLandmarks { actual: 397, .. }));
    }

    #[test]
    fn test_coincident_jaw_points_degenerate() {
        let t = FACE_MESH;
        let mut face = synthetic_face(150.0, 120.0, 180.0, 200.0);
        face.points[t.jaw_right] = face.points[t.jaw_left];
        let err = compute_ratios(&face, &t).unwrap_err();
        assert!(matches!(
            err,
            GeometryError::DegenerateGeometry { measurement: "jawline_width", .. }
        ));
    }

    #[test]
    fn test_zero_face_length_degenerate() {
        let face = synthetic_face(150.0, 120.0, 180.0, 0.0);
        let err = compute_ratios(&face, &FACE_MESH).unwrap_err();
        assert!(matches!(
            err,
            GeometryError::DegenerateGeometry { measurement: "face_length", .. }
        ));
    }

    #[test]
    fn test_sub_epsilon_jaw_degenerate() {
        let face = synthetic_face(150.0, 1e-9, 180.0, 200.0);
        assert!(compute_ratios(&face, &FACE_MESH).is_err());
    }

    #[test]
    fn test_ratios_never_infinite() {
        let degenerate = Measurements {
            forehead_width: 10.0,
            jawline_width: 0.0,
            cheekbone_width: 10.0,
            face_length: 0.0,
        };
        assert!(degenerate.ratios().is_err());
    }

    #[test]
    fn test_nan_measurement_degenerate() {
        let m = Measurements {
            forehead_width: 10.0,
            jawline_width: f64::NAN,
            cheekbone_width: 10.0,
            face_length: 20.0,
        };
        assert!(matches!(m.ratios(), Err(GeometryError::DegenerateGeometry { .. })));
    }

    #[test]
    fn test_nan_landmark_degenerate() {
        let t = FACE_MESH;
        let mut face = synthetic_face(150.0, 120.0, 180.0, 200.0);
        face.points[t.cheek_right].x = f64::NAN;
        let err = compute_ratios(&face, &t).unwrap_err();
        assert!(matches!(
            err,
            GeometryError::DegenerateGeometry { measurement: "cheekbone_width", .. }
        ));
    }

    #[test]
    fn test_infinite_landmark_degenerate() {
        let t = FACE_MESH;
        let mut face = synthetic_face(150.0, 120.0, 180.0, 200.0);
        face.points[t.forehead_right].x = f64::INFINITY;
        let err = compute_ratios(&face, &t).unwrap_err();
        assert!(matches!(
            err,
            GeometryError::DegenerateGeometry { measurement: "forehead_width", .. }
        ));
    }

    #[test]
    fn test_overflowing_ratio_degenerate() {
        let m = Measurements {
            forehead_width: f64::MAX,
            jawline_width: 1e-3,
            cheekbone_width: 10.0,
            face_length: 20.0,
        };
        assert!(matches!(
            m.ratios(),
            Err(GeometryError::DegenerateGeometry { measurement: "forehead_to_jawline", .. })
        ));
    }

    #[test]
    fn test_infinite_numerator_measurement_degenerate() {
        let m = Measurements {
            forehead_width: 10.0,
            jawline_width: 10.0,
            cheekbone_width: f64::INFINITY,
            face_length: 20.0,
        };
        assert!(matches!(
            m.ratios(),
            Err(GeometryError::DegenerateGeometry { measurement: "cheekbone_width", .. })
        ));
    }
}
