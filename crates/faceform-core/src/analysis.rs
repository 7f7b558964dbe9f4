//! End-to-end photo analysis: decode → detect → measure → classify → look up.

use crate::classifier::classify;
use crate::detector::{DetectorError, LandmarkDetector};
use crate::geometry::{measure, GeometryError};
use crate::overlay::render_overlay;
use crate::recommend::recommendations;
use crate::rules::RuleTable;
use crate::topology::{overlay_connections, LandmarkTopology, FACE_MESH};
use crate::types::{FaceShape, Measurements, RatioSet};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("landmark detection failed: {0}")]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

impl AnalysisError {
    /// True for failures caused by a broken detector contract rather than by
    /// the photo itself.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AnalysisError::Detector(_)
                | AnalysisError::Geometry(GeometryError::InsufficientLandmarks { .. })
        )
    }
}

/// A completed analysis of one face.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub shape: FaceShape,
    pub description: String,
    pub recommendations: Vec<String>,
    pub ratios: RatioSet,
    pub measurements: Measurements,
    /// JPEG with landmarks drawn over the photo, when rendering is enabled.
    #[serde(skip)]
    pub overlay: Option<Vec<u8>>,
}

/// Result of analyzing a photo that was decoded successfully.
#[derive(Debug, Clone)]
pub enum Outcome {
    Face(Analysis),
    NoFaceDetected,
}

impl Outcome {
    pub fn analysis(&self) -> Option<&Analysis> {
        match self {
            Outcome::Face(a) => Some(a),
            Outcome::NoFaceDetected => None,
        }
    }
}

/// Runs the full pipeline with an injected detector and rule table.
pub struct Analyzer<D> {
    detector: D,
    rules: Arc<RuleTable>,
    topology: LandmarkTopology,
    render_overlay: bool,
}

impl<D: LandmarkDetector> Analyzer<D> {
    pub fn new(detector: D, rules: Arc<RuleTable>) -> Self {
        Self {
            detector,
            rules,
            topology: FACE_MESH,
            render_overlay: false,
        }
    }

    /// Use a different landmark layout (for detectors other than the face mesh).
    pub fn with_topology(mut self, topology: LandmarkTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_overlay(mut self, enabled: bool) -> Self {
        self.render_overlay = enabled;
        self
    }

    pub fn rules(&self) -> &Arc<RuleTable> {
        &self.rules
    }

    /// Swap the whole rule table. Subsequent analyses use the new table.
    pub fn replace_rules(&mut self, rules: Arc<RuleTable>) {
        tracing::info!(entries = rules.len(), "rule table replaced");
        self.rules = rules;
    }

    /// Analyze an encoded photo.
    pub fn analyze(&mut self, image_bytes: &[u8]) -> Result<Outcome, AnalysisError> {
        let image = image::load_from_memory(image_bytes)?.to_rgb8();
        tracing::debug!(width = image.width(), height = image.height(), "decoded photo");

        let Some(landmarks) = self.detector.detect(&image)? else {
            tracing::info!("no face detected");
            return Ok(Outcome::NoFaceDetected);
        };

        let measurements = measure(&landmarks, &self.topology)?;
        let ratios = measurements.ratios()?;
        let shape = classify(&self.rules, &ratios);
        let rec = recommendations(&self.rules, shape);

        tracing::info!(
            %shape,
            width_to_length = ratios.width_to_length,
            forehead_to_jawline = ratios.forehead_to_jawline,
            cheekbone_to_jawline = ratios.cheekbone_to_jawline,
            "face analyzed"
        );

        let overlay = if self.render_overlay {
            let connections = overlay_connections(&self.topology);
            match render_overlay(&image, &landmarks, &connections) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!(error = %e, "overlay rendering failed; continuing without it");
                    None
                }
            }
        } else {
            None
        };

        Ok(Outcome::Face(Analysis {
            shape,
            description: rec.description.to_string(),
            recommendations: rec.recommendations.to_vec(),
            ratios,
            measurements,
            overlay,
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::geometry::tests::synthetic_face;
    use crate::types::LandmarkSet;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// Detector that returns a canned result regardless of the image.
    pub(crate) struct FixedDetector(pub(crate) Result<Option<LandmarkSet>, String>);

    impl LandmarkDetector for FixedDetector {
        fn detect(&mut self, _image: &RgbImage) -> Result<Option<LandmarkSet>, DetectorError> {
            self.0.clone().map_err(DetectorError::InferenceFailed)
        }
    }

    pub(crate) fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([120, 100, 90]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn analyzer(result: Result<Option<LandmarkSet>, String>) -> Analyzer<FixedDetector> {
        Analyzer::new(FixedDetector(result), Arc::new(RuleTable::builtin().unwrap()))
    }

    #[test]
    fn test_analyze_reference_face() {
        let face = synthetic_face(150.0, 120.0, 180.0, 200.0);
        let outcome = analyzer(Ok(Some(face))).analyze(&png_bytes(600, 600)).unwrap();
        let a = outcome.analysis().expect("face expected");

        assert_eq!(a.shape, FaceShape::Round);
        assert!((a.ratios.width_to_length - 0.9).abs() < 1e-9);
        assert!((a.ratios.forehead_to_jawline - 1.25).abs() < 1e-9);
        assert!((a.ratios.cheekbone_to_jawline - 1.5).abs() < 1e-9);

        let table = RuleTable::builtin().unwrap();
        let round = table.get(FaceShape::Round).unwrap();
        assert_eq!(a.description, round.description);
        assert_eq!(a.recommendations, round.recommendations);
        assert!(a.overlay.is_none());
    }

    #[test]
    fn test_analyze_no_face() {
        let outcome = analyzer(Ok(None)).analyze(&png_bytes(32, 32)).unwrap();
        assert!(matches!(outcome, Outcome::NoFaceDetected));
        assert!(outcome.analysis().is_none());
    }

    #[test]
    fn test_analyze_empty_landmarks() {
        let err = analyzer(Ok(Some(LandmarkSet::default())))
            .analyze(&png_bytes(32, 32))
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Geometry(GeometryError::InsufficientLandmarks { .. })
        ));
        assert!(err.is_internal());
    }

    #[test]
    fn test_analyze_coincident_jaw() {
        let mut face = synthetic_face(150.0, 120.0, 180.0, 200.0);
        face.points[FACE_MESH.jaw_right] = face.points[FACE_MESH.jaw_left];
        let err = analyzer(Ok(Some(face))).analyze(&png_bytes(32, 32)).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Geometry(GeometryError::DegenerateGeometry { .. })
        ));
        assert!(!err.is_internal());
    }

    #[test]
    fn test_analyze_undecodable_bytes() {
        let err = analyzer(Ok(None)).analyze(b"definitely not an image").unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(_)));
    }

    #[test]
    fn test_analyze_detector_failure() {
        let err = analyzer(Err("session crashed".into()))
            .analyze(&png_bytes(8, 8))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Detector(_)));
        assert!(err.is_internal());
    }

    #[test]
    fn test_analyzer_usable_after_failure() {
        let mut a = analyzer(Ok(Some(synthetic_face(150.0, 120.0, 180.0, 200.0))));
        assert!(a.analyze(b"garbage").is_err());
        assert!(matches!(a.analyze(&png_bytes(600, 600)), Ok(Outcome::Face(_))));
    }

    #[test]
    fn test_analyze_with_overlay() {
        let face = synthetic_face(150.0, 120.0, 180.0, 200.0);
        let outcome = analyzer(Ok(Some(face)))
            .with_overlay(true)
            .analyze(&png_bytes(600, 600))
            .unwrap();
        let overlay = outcome.analysis().unwrap().overlay.as_ref().unwrap();
        assert_eq!(&overlay[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_replace_rules_changes_result() {
        let face = synthetic_face(150.0, 120.0, 180.0, 200.0);
        let mut a = analyzer(Ok(Some(face)));
        let before = a.analyze(&png_bytes(600, 600)).unwrap();
        assert_eq!(before.analysis().unwrap().shape, FaceShape::Round);

        let only_oval = RuleTable::new(vec![crate::rules::tests::entry(
            FaceShape::Oval,
            (0.6, 0.8),
            (0.8, 1.2),
            (1.2, 1.6),
        )])
        .unwrap();
        a.replace_rules(Arc::new(only_oval));
        let after = a.analyze(&png_bytes(600, 600)).unwrap();
        assert_eq!(after.analysis().unwrap().shape, FaceShape::Oval);
        assert_eq!(after.analysis().unwrap().description, "OVAL face");
    }

    #[test]
    fn test_analysis_serializes_without_overlay() {
        let face = synthetic_face(150.0, 120.0, 180.0, 200.0);
        let outcome = analyzer(Ok(Some(face)))
            .with_overlay(true)
            .analyze(&png_bytes(600, 600))
            .unwrap();
        let json = serde_json::to_value(outcome.analysis().unwrap()).unwrap();
        assert_eq!(json["shape"], "ROUND");
        assert!(json.get("overlay").is_none());
        assert!(json["ratios"]["width_to_length"].as_f64().is_some());
    }
}
