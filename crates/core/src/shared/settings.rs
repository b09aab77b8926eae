use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::domain::capture_source::CameraFacing;
use crate::overlay::eye_overlay::OverlayStyle;
use crate::shared::constants::{
    ASPECT_TOLERANCE, DEFAULT_DETECTION_CONFIDENCE, DEFAULT_DETECTION_INTERVAL,
    DEFAULT_FRAME_TIMEOUT, DEFAULT_JPEG_QUALITY, MAX_FACES, SETTINGS_DIR_NAME, SETTINGS_FILE_NAME,
};
use crate::shared::error::PreviewError;

/// How raw camera frames become detector surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscodeMode {
    /// NV21 → JPEG → decoded RGB.
    Jpeg,
    /// NV21 → RGB.
    Direct,
}

impl std::fmt::Display for TranscodeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscodeMode::Jpeg => write!(f, "jpeg"),
            TranscodeMode::Direct => write!(f, "direct"),
        }
    }
}

/// Where the face detection model comes from and how strict it is.
///
/// An explicit `model_path` wins. Otherwise the model is looked up in the
/// model cache and, if `model_url` is set, downloaded there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub model_path: Option<PathBuf>,
    pub model_url: Option<String>,
    pub confidence: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            model_path: None,
            model_url: None,
            confidence: DEFAULT_DETECTION_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub detection_interval_ms: u64,
    pub max_faces: usize,
    pub jpeg_quality: u8,
    pub transcode: TranscodeMode,
    pub aspect_tolerance: f64,
    /// `None` lets a stalled capture request block its cycle indefinitely.
    pub frame_timeout_ms: Option<u64>,
    pub camera_facing: CameraFacing,
    pub detector: DetectorSettings,
    pub overlay: OverlayStyle,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            detection_interval_ms: DEFAULT_DETECTION_INTERVAL.as_millis() as u64,
            max_faces: MAX_FACES,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            transcode: TranscodeMode::Jpeg,
            aspect_tolerance: ASPECT_TOLERANCE,
            frame_timeout_ms: Some(DEFAULT_FRAME_TIMEOUT.as_millis() as u64),
            camera_facing: CameraFacing::Front,
            detector: DetectorSettings::default(),
            overlay: OverlayStyle::default(),
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME))
    }

    /// Loads from the user config directory, falling back to defaults when
    /// the file is missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring settings at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, PreviewError> {
        let json = fs::read_to_string(path)
            .map_err(|e| PreviewError::Config(format!("{}: {e}", path.display())))?;
        let settings: Settings = serde_json::from_str(&json)
            .map_err(|e| PreviewError::Config(format!("{}: {e}", path.display())))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<(), PreviewError> {
        let path = Self::default_path()
            .ok_or_else(|| PreviewError::Config("could not determine config directory".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), PreviewError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PreviewError::Config(format!("{}: {e}", parent.display())))?;
        }
        let json =
            serde_json::to_string_pretty(self).map_err(|e| PreviewError::Config(e.to_string()))?;
        fs::write(path, json).map_err(|e| PreviewError::Config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<(), PreviewError> {
        if self.detection_interval_ms == 0 {
            return Err(PreviewError::Config(
                "detection_interval_ms must be positive".into(),
            ));
        }
        if self.max_faces == 0 {
            return Err(PreviewError::Config("max_faces must be at least 1".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(PreviewError::Config(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        if self.aspect_tolerance.is_nan() || self.aspect_tolerance <= 0.0 {
            return Err(PreviewError::Config(format!(
                "aspect_tolerance must be positive, got {}",
                self.aspect_tolerance
            )));
        }
        let confidence = self.detector.confidence;
        if !(confidence > 0.0 && confidence <= 1.0) {
            return Err(PreviewError::Config(format!(
                "detector.confidence must be in (0, 1], got {confidence}"
            )));
        }
        Ok(())
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    pub fn frame_timeout(&self) -> Option<Duration> {
        self.frame_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_preview_widget() {
        let s = Settings::default();
        assert_eq!(s.detection_interval(), Duration::from_millis(1000));
        assert_eq!(s.max_faces, 1);
        assert_eq!(s.jpeg_quality, 80);
        assert_eq!(s.transcode, TranscodeMode::Jpeg);
        assert_eq!(s.camera_facing, CameraFacing::Front);
        assert_eq!(s.detector.model_path, None);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            detection_interval_ms: 250,
            transcode: TranscodeMode::Direct,
            frame_timeout_ms: None,
            ..Settings::default()
        };

        settings.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path).unwrap();

        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "max_faces": 3, "transcode": "direct" }"#).unwrap();

        let loaded = Settings::load_from(&path).unwrap();

        assert_eq!(loaded.max_faces, 3);
        assert_eq!(loaded.transcode, TranscodeMode::Direct);
        assert_eq!(loaded.jpeg_quality, 80);
        assert_eq!(loaded.detector, DetectorSettings::default());
    }

    #[test]
    fn test_detector_section_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "detector": { "model_path": "/opt/models/face.onnx", "confidence": 0.7 } }"#,
        )
        .unwrap();

        let loaded = Settings::load_from(&path).unwrap();

        assert_eq!(
            loaded.detector.model_path,
            Some(PathBuf::from("/opt/models/face.onnx"))
        );
        assert_eq!(loaded.detector.model_url, None);
        assert!((loaded.detector.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Settings::load_from(&path),
            Err(PreviewError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load_from(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            Settings {
                detection_interval_ms: 0,
                ..Settings::default()
            },
            Settings {
                max_faces: 0,
                ..Settings::default()
            },
            Settings {
                jpeg_quality: 0,
                ..Settings::default()
            },
            Settings {
                aspect_tolerance: 0.0,
                ..Settings::default()
            },
            Settings {
                detector: DetectorSettings {
                    confidence: 0.0,
                    ..DetectorSettings::default()
                },
                ..Settings::default()
            },
            Settings {
                detector: DetectorSettings {
                    confidence: f32::NAN,
                    ..DetectorSettings::default()
                },
                ..Settings::default()
            },
        ];
        for s in bad {
            assert!(s.validate().is_err(), "{s:?} should be rejected");
        }
    }
}
