//! 468-point face mesh landmark detector via ONNX Runtime.
//!
//! Two stages: the SCRFD face detector finds the most confident face, then a
//! single-face mesh model (192×192 RGB input, 468 × xyz landmarks and a
//! face-presence logit as outputs) runs on a square crop around it.

use crate::face_detector::FaceDetector;
use crate::topology::FACE_MESH_LANDMARKS;
use crate::types::{BoundingBox, LandmarkSet, Point};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const MESH_INPUT_SIZE: usize = 192;
const MESH_PIXEL_SCALE: f32 = 255.0;
const MESH_VALUES_PER_LANDMARK: usize = 3;
/// Side of the mesh crop relative to the longer side of the face box.
const MESH_CROP_SCALE: f32 = 1.5;
/// Face-presence probability the mesh must report for its landmarks to be used.
const MESH_PRESENCE_THRESHOLD: f32 = 0.5;
/// Default face-detection confidence threshold.
pub const DEFAULT_FACE_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}; place the ONNX model in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Produces one face's landmarks from an image, or `None` when no face is
/// present.
pub trait LandmarkDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Option<LandmarkSet>, DetectorError>;
}

/// Metadata for coordinate de-mapping after letterbox resize.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LetterboxInfo {
    pub(crate) scale: f32,
    pub(crate) pad_x: f32,
    pub(crate) pad_y: f32,
}

impl LetterboxInfo {
    pub(crate) fn fit(width: u32, height: u32, target: usize) -> Self {
        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let new_w = (width as f32 * scale).round();
        let new_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((target as f32 - new_w) / 2.0).floor(),
            pad_y: ((target as f32 - new_h) / 2.0).floor(),
        }
    }

    /// Map a model-space coordinate back to source space.
    pub(crate) fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }

    /// Map a model-space coordinate back to whole source pixels.
    fn source_point(&self, x: f32, y: f32) -> Point {
        let (sx, sy) = self.unmap(x, y);
        Point::new(sx.trunc() as f64, sy.trunc() as f64)
    }
}

/// Resize to fit a `target`×`target` square, keeping aspect ratio. The
/// caller places the result at (`pad_x`, `pad_y`).
pub(crate) fn letterbox_resize(image: &RgbImage, target: usize) -> (RgbImage, LetterboxInfo) {
    let letterbox = LetterboxInfo::fit(image.width(), image.height(), target);
    let new_w = ((image.width() as f32 * letterbox.scale).round() as u32).clamp(1, target as u32);
    let new_h = ((image.height() as f32 * letterbox.scale).round() as u32).clamp(1, target as u32);
    (imageops::resize(image, new_w, new_h, FilterType::Triangle), letterbox)
}

/// Pixel region of the source image the mesh runs on.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CropRegion {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl CropRegion {
    /// Square of side `scale` × the longer box side, centered on the box and
    /// clipped to the image. `None` when the box is unusable or off-image.
    fn around(face: &BoundingBox, image_width: u32, image_height: u32, scale: f32) -> Option<Self> {
        let fields = [face.x, face.y, face.width, face.height];
        if fields.iter().any(|v| !v.is_finite()) || face.width <= 0.0 || face.height <= 0.0 {
            return None;
        }

        let half = face.width.max(face.height) * scale / 2.0;
        let cx = face.x + face.width / 2.0;
        let cy = face.y + face.height / 2.0;

        let x0 = (cx - half).floor().max(0.0) as u32;
        let y0 = (cy - half).floor().max(0.0) as u32;
        let x1 = ((cx + half).ceil().max(0.0) as u32).min(image_width);
        let y1 = ((cy + half).ceil().max(0.0) as u32).min(image_height);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

/// Output tensor indices: (landmarks, face flag).
type MeshOutputIndices = (usize, usize);

/// Face mesh landmark detector with a face-detection front stage.
pub struct FaceMeshDetector {
    faces: FaceDetector,
    session: Session,
    output_indices: MeshOutputIndices,
}

impl FaceMeshDetector {
    /// Load the SCRFD face detector and the face mesh model. Faces scoring at
    /// or below `face_threshold` in the detection stage are ignored.
    pub fn load(
        detector_model_path: &str,
        mesh_model_path: &str,
        face_threshold: f32,
    ) -> Result<Self, DetectorError> {
        if !Path::new(mesh_model_path).exists() {
            return Err(DetectorError::ModelNotFound(mesh_model_path.to_string()));
        }
        let faces = FaceDetector::load(detector_model_path, face_threshold)?;

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(mesh_model_path)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = mesh_model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded face mesh model"
        );

        if output_names.len() < 2 {
            return Err(DetectorError::InferenceFailed(format!(
                "face mesh model requires 2 outputs (landmarks, face flag), got {}",
                output_names.len()
            )));
        }

        let output_indices = discover_output_indices(&output_names);
        tracing::debug!(?output_indices, "face mesh output tensor mapping");

        Ok(Self {
            faces,
            session,
            output_indices,
        })
    }

    /// Resize into a NHWC float tensor in [0, 1] with letterbox padding.
    fn preprocess(image: &RgbImage) -> (Array4<f32>, LetterboxInfo) {
        let (resized, letterbox) = letterbox_resize(image, MESH_INPUT_SIZE);
        let pad_x = letterbox.pad_x as usize;
        let pad_y = letterbox.pad_y as usize;
        let mut tensor = Array4::<f32>::zeros((1, MESH_INPUT_SIZE, MESH_INPUT_SIZE, 3));

        for (x, y, pixel) in resized.enumerate_pixels() {
            let tx = x as usize + pad_x;
            let ty = y as usize + pad_y;
            if tx >= MESH_INPUT_SIZE || ty >= MESH_INPUT_SIZE {
                continue;
            }
            for c in 0..3 {
                tensor[[0, ty, tx, c]] = pixel[c] as f32 / MESH_PIXEL_SCALE;
            }
        }

        (tensor, letterbox)
    }
}

impl LandmarkDetector for FaceMeshDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Option<LandmarkSet>, DetectorError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(None);
        }

        let faces = self.faces.detect(image)?;
        let Some(face) = faces.first() else {
            tracing::debug!("face detector found no face");
            return Ok(None);
        };
        let Some(crop) = CropRegion::around(face, image.width(), image.height(), MESH_CROP_SCALE) else {
            tracing::debug!(?face, "face box unusable for mesh crop");
            return Ok(None);
        };
        tracing::debug!(confidence = face.confidence, ?crop, "running face mesh on crop");

        let roi = imageops::crop_imm(image, crop.x, crop.y, crop.width, crop.height).to_image();
        let (input, letterbox) = Self::preprocess(&roi);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (landmarks_idx, flag_idx) = self.output_indices;
        let (_, flag) = outputs[flag_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("face flag: {e}")))?;
        let (_, raw) = outputs[landmarks_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("landmarks: {e}")))?;

        let logit = flag
            .first()
            .copied()
            .ok_or_else(|| DetectorError::InferenceFailed("empty face flag tensor".into()))?;
        let presence = sigmoid(logit);
        if !face_present(presence) {
            tracing::debug!(presence, "face mesh rejected the crop");
            return Ok(None);
        }

        decode_landmarks(raw, &letterbox, (crop.x, crop.y)).map(Some)
    }
}

/// NaN counts as absent.
fn face_present(presence: f32) -> bool {
    !presence.is_nan() && presence >= MESH_PRESENCE_THRESHOLD
}
/// Discover output tensor ordering by name.
///
/// Converted face mesh models name their outputs after the producing layer
/// or with descriptive names. Falls back to positional ordering
/// [0] = landmarks, [1] = face flag.
fn discover_output_indices(names: &[String]) -> MeshOutputIndices {
    let find = |needles: &[&str]| -> Option<usize> {
        names.iter().position(|n| {
            let n = n.to_ascii_lowercase();
            needles.iter().any(|needle| n.contains(needle))
        })
    };

    match (
        find(&["landmark", "conv2d_21"]),
        find(&["flag", "score", "presence", "conv2d_31"]),
    ) {
        (Some(lm), Some(flag)) if lm != flag => {
            tracing::info!("face mesh: using name-based output tensor mapping");
            (lm, flag)
        }
        _ => {
            tracing::info!(
                ?names,
                "face mesh: output names not recognized, using positional mapping [0]=landmarks, [1]=face flag"
            );
            (0, 1)
        }
    }
}

/// Decode mesh output into source-image pixels. `origin` is the top-left of
/// the crop the mesh ran on.
fn decode_landmarks(
    raw: &[f32],
    letterbox: &LetterboxInfo,
    origin: (u32, u32),
) -> Result<LandmarkSet, DetectorError> {
    let expected = FACE_MESH_LANDMARKS * MESH_VALUES_PER_LANDMARK;
    if raw.len() < expected {
        return Err(DetectorError::InferenceFailed(format!(
            "expected {expected} landmark values, got {}",
            raw.len()
        )));
    }

    let points = raw[..expected]
        .chunks_exact(MESH_VALUES_PER_LANDMARK)
        .map(|xyz| {
            let p = letterbox.source_point(xyz[0], xyz[1]);
            Point::new(p.x + origin.0 as f64, p.y + origin.1 as f64)
        })
        .collect();
    Ok(LandmarkSet::new(points))
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_letterbox_landscape() {
        let lb = LetterboxInfo::fit(640, 480, MESH_INPUT_SIZE);
        assert!((lb.scale - 0.3).abs() < 1e-6);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 24.0);
    }

    #[test]
    fn test_letterbox_coordinate_roundtrip() {
        let lb = LetterboxInfo::fit(320, 240, MESH_INPUT_SIZE);
        let (ox, oy) = (100.0f32, 50.0f32);
        let p = lb.source_point(ox * lb.scale + lb.pad_x, oy * lb.scale + lb.pad_y);
        assert!((p.x - 100.0).abs() <= 1.0, "x: {}", p.x);
        assert!((p.y - 50.0).abs() <= 1.0, "y: {}", p.y);
    }

    #[test]
    fn test_landmarks_truncate_to_whole_pixels() {
        let lb = LetterboxInfo { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };
        let p = lb.source_point(12.9, 7.2);
        assert_eq!(p, Point::new(12.0, 7.0));
    }

    #[test]
    fn test_preprocess_shape_and_padding() {
        let image = RgbImage::from_pixel(400, 200, Rgb([255, 255, 255]));
        let (tensor, lb) = FaceMeshDetector::preprocess(&image);
        assert_eq!(tensor.shape(), &[1, MESH_INPUT_SIZE, MESH_INPUT_SIZE, 3]);
        // Top padding rows stay zero, image rows are normalized to 1.0.
        assert_eq!(tensor[[0, 0, 96, 0]], 0.0);
        let mid = lb.pad_y as usize + 10;
        assert!((tensor[[0, mid, 96, 1]] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_decode_landmarks_count() {
        let raw = vec![10.0f32; FACE_MESH_LANDMARKS * 3];
        let lb = LetterboxInfo { scale: 0.5, pad_x: 0.0, pad_y: 0.0 };
        let set = decode_landmarks(&raw, &lb, (0, 0)).unwrap();
        assert_eq!(set.len(), FACE_MESH_LANDMARKS);
        assert_eq!(set.points[0], Point::new(20.0, 20.0));
    }

    #[test]
    fn test_decode_landmarks_short_output() {
        let raw = vec![0.0f32; 30];
        let lb = LetterboxInfo { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };
        assert!(matches!(decode_landmarks(&raw, &lb, (0, 0)), Err(DetectorError::InferenceFailed(_))));
    }

    #[test]
    fn test_discover_output_indices_named() {
        let names: Vec<String> = ["output_faceflag", "output_landmarks"].iter().map(|s| s.to_string()).collect();
        assert_eq!(discover_output_indices(&names), (1, 0));
    }

    #[test]
    fn test_discover_output_indices_layer_names() {
        let names: Vec<String> = ["conv2d_31", "conv2d_21"].iter().map(|s| s.to_string()).collect();
        assert_eq!(discover_output_indices(&names), (1, 0));
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names: Vec<String> = ["Identity", "Identity_1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(discover_output_indices(&names), (0, 1));
    }

    #[test]
    fn test_decode_landmarks_offset_by_crop_origin() {
        let raw = vec![10.0f32; FACE_MESH_LANDMARKS * 3];
        let lb = LetterboxInfo { scale: 0.5, pad_x: 0.0, pad_y: 0.0 };
        let set = decode_landmarks(&raw, &lb, (100, 40)).unwrap();
        assert_eq!(set.points[FACE_MESH_LANDMARKS - 1], Point::new(120.0, 60.0));
    }

    #[test]
    fn test_crop_region_square_around_box() {
        let face = BoundingBox { x: 100.0, y: 100.0, width: 80.0, height: 100.0, confidence: 0.9 };
        let crop = CropRegion::around(&face, 640, 480, 1.5).unwrap();
        // Side 150 centered on (140, 150).
        assert_eq!(crop, CropRegion { x: 65, y: 75, width: 150, height: 150 });
    }

    #[test]
    fn test_crop_region_clipped_to_image() {
        let face = BoundingBox { x: -20.0, y: 400.0, width: 100.0, height: 100.0, confidence: 0.9 };
        let crop = CropRegion::around(&face, 640, 480, 1.5).unwrap();
        assert_eq!((crop.x, crop.y), (0, 375));
        assert_eq!((crop.width, crop.height), (105, 105));
    }

    #[test]
    fn test_crop_region_rejects_bad_boxes() {
        let off_image = BoundingBox { x: 2000.0, y: 2000.0, width: 50.0, height: 50.0, confidence: 0.9 };
        assert!(CropRegion::around(&off_image, 640, 480, 1.5).is_none());
        let nan = BoundingBox { x: f32::NAN, y: 0.0, width: 50.0, height: 50.0, confidence: 0.9 };
        assert!(CropRegion::around(&nan, 640, 480, 1.5).is_none());
        let empty = BoundingBox { x: 10.0, y: 10.0, width: 0.0, height: 50.0, confidence: 0.9 };
        assert!(CropRegion::around(&empty, 640, 480, 1.5).is_none());
    }

    #[test]
    fn test_face_present_threshold() {
        assert!(face_present(sigmoid(3.0)));
        assert!(face_present(MESH_PRESENCE_THRESHOLD));
        assert!(!face_present(sigmoid(-3.0)));
        assert!(!face_present(sigmoid(f32::NAN)));
    }

    #[test]
    fn test_load_missing_model() {
        let err = FaceMeshDetector::load(
            "/nonexistent/det_10g.onnx",
            "/nonexistent/face_landmark.onnx",
            DEFAULT_FACE_THRESHOLD,
        )
        .err()
        .unwrap();
        assert!(matches!(err, DetectorError::ModelNotFound(_)));
    }
}
