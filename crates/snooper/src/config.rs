use std::path::PathBuf;

use snooper_core::DistanceMetric;

/// Runtime configuration, loaded from `SNOOPER_*` environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Directory for the capture database and saved face crops.
    pub data_dir: PathBuf,
    /// Directory of labeled whitelist reference images.
    pub whitelist_dir: PathBuf,
    /// Maximum distance at which a face matches a whitelist entry.
    pub whitelist_threshold: f32,
    /// Maximum distance at which a face matches a captured unknown.
    pub dedup_threshold: f32,
    /// Distance metric shared by both galleries.
    pub metric: DistanceMetric,
}

impl Config {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("SNOOPER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let model_dir = std::env::var("SNOOPER_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("models"));

        let whitelist_dir = std::env::var("SNOOPER_WHITELIST_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("whitelist"));

        Self {
            camera_device: std::env::var("SNOOPER_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            data_dir,
            whitelist_dir,
            whitelist_threshold: env_f32("SNOOPER_WHITELIST_THRESHOLD", 0.6),
            dedup_threshold: env_f32("SNOOPER_DEDUP_THRESHOLD", 0.5),
            metric: env_metric("SNOOPER_METRIC", DistanceMetric::Cosine),
        }
    }

    /// Path to the UltraFace detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("version-RFB-320.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the face encoder model.
    pub fn encoder_model_path(&self) -> String {
        self.model_dir
            .join("w600k_mbf.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the capture metadata database.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("captures.db")
    }

    /// Directory holding one PNG per captured unknown face.
    pub fn captures_dir(&self) -> PathBuf {
        self.data_dir.join("captures")
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("snooper")
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_metric(key: &str, default: DistanceMetric) -> DistanceMetric {
    match std::env::var(key).ok().as_deref() {
        Some("cosine") => DistanceMetric::Cosine,
        Some("euclidean") => DistanceMetric::Euclidean,
        Some(other) => {
            tracing::warn!(metric = other, "unknown distance metric, using default");
            default
        }
        None => default,
    }
}
