use std::path::PathBuf;

/// CLI configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing the face detection and face mesh ONNX models.
    pub model_dir: PathBuf,
    /// Custom rule table; the built-in table is used when unset.
    pub rules_path: Option<PathBuf>,
    /// Face-detection confidence needed to accept a face.
    pub face_threshold: f32,
    /// Whether to render the annotated overlay image.
    pub overlay_enabled: bool,
    /// Capacity of the engine request queue.
    pub queue_depth: usize,
}

impl Config {
    /// Load configuration from `FACEFORM_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("FACEFORM_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| faceform_core::default_model_dir());

        Self {
            model_dir,
            rules_path: std::env::var("FACEFORM_RULES_PATH").ok().map(PathBuf::from),
            face_threshold: env_f32(
                "FACEFORM_FACE_THRESHOLD",
                faceform_core::detector::DEFAULT_FACE_THRESHOLD,
            ),
            overlay_enabled: std::env::var("FACEFORM_OVERLAY")
                .map(|v| v != "0")
                .unwrap_or(true),
            queue_depth: env_usize("FACEFORM_QUEUE_DEPTH", 8).max(1),
        }
    }

    /// Path to the SCRFD face detection model.
    pub fn face_detector_model_path(&self) -> String {
        self.model_path(faceform_core::FACE_DETECTOR_MODEL_FILE)
    }

    /// Path to the face mesh landmark model.
    pub fn face_mesh_model_path(&self) -> String {
        self.model_path(faceform_core::FACE_MESH_MODEL_FILE)
    }

    fn model_path(&self, file: &str) -> String {
        self.model_dir.join(file).to_string_lossy().into_owned()
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
