//! faceform-core — Face-shape classification engine.
//!
//! Turns 2D facial landmarks into three geometric ratios, classifies them
//! against an ordered rule table, and looks up the matching description and
//! hairstyle recommendations. Landmarks come from an SCRFD face detector
//! followed by a 468-point face mesh model, both running via ONNX Runtime.

pub mod analysis;
pub mod classifier;
pub mod detector;
pub mod face_detector;
pub mod geometry;
pub mod overlay;
pub mod recommend;
pub mod rules;
pub mod topology;
pub mod types;

pub use analysis::{Analysis, AnalysisError, Analyzer, Outcome};
pub use classifier::classify;
pub use detector::{DetectorError, FaceMeshDetector, LandmarkDetector};
pub use face_detector::FaceDetector;
pub use geometry::{compute_ratios, GeometryError};
pub use recommend::{recommendations, recommendations_by_name, Recommendation};
pub use rules::{RatioRange, RuleEntry, RuleTable, RuleTableError};
pub use types::{BoundingBox, FaceShape, LandmarkSet, Measurements, Point, RatioSet};

use std::path::PathBuf;

/// File name of the SCRFD face detection model inside the model directory.
pub const FACE_DETECTOR_MODEL_FILE: &str = "det_10g.onnx";

/// File name of the face mesh model inside the model directory.
pub const FACE_MESH_MODEL_FILE: &str = "face_landmark.onnx";

/// Default model directory: `$XDG_DATA_HOME/faceform/models`, falling back
/// to `~/.local/share/faceform/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("faceform/models")
}
