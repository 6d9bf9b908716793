//! Application Configuration
//!
//! Scanner thresholds and collaborator settings stored in TOML format.
//! Most of the numbers in here were tuned by hand against real menus and are
//! expected to move; every section falls back to defaults when omitted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::vision::OcrBackend;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Text recognizer settings
    pub ocr: OcrSettings,
    /// Fragment grouping settings
    pub grouping: GroupingConfig,
    /// Candidate admission filter thresholds
    pub admission: AdmissionConfig,
    /// Local matching settings
    pub matching: MatchingConfig,
    /// Remote wine search settings
    pub remote: RemoteConfig,
    /// Frame pipeline settings
    pub pipeline: PipelineConfig,
}

/// Text recognizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Recognizer backend, chosen once at session start
    pub backend: OcrBackend,
    /// Language hint passed to the recognizer (e.g., "en-US")
    pub language: String,
    /// Fragments below this confidence never reach the grouper
    pub min_fragment_confidence: f32,
    /// Consecutive failures before switching to fast recognition
    pub degrade_after_failures: u32,
    /// Further consecutive failures in fast mode before reporting a fault
    pub fault_after_failures: u32,
    /// Endpoint for the remote recognizer backend
    pub remote_url: Option<String>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            backend: OcrBackend::default(),
            language: "en-US".to_string(),
            min_fragment_confidence: 0.5,
            degrade_after_failures: 3,
            fault_after_failures: 3,
            remote_url: None,
        }
    }
}

/// Fragment grouping settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Largest vertical gap (fraction of frame height) between lines of one entry
    pub line_gap: f32,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self { line_gap: 0.022 }
    }
}

/// Candidate admission filter thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Minimum trimmed text length in characters
    pub min_text_length: usize,
    /// Minimum mean fragment confidence
    pub min_confidence: f32,
    /// All-caps text with more letters than this is treated as a header
    pub max_all_caps_letters: usize,
    /// Maximum share of characters that are neither alphanumeric nor whitespace
    pub max_special_char_ratio: f32,
    /// Maximum share of non-whitespace characters that are digits or symbols
    pub max_numeric_ratio: f32,
    /// Strong wine indicators required (grape, region, vintage, producer)
    pub min_indicators: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            min_text_length: 8,
            min_confidence: 0.5,
            max_all_caps_letters: 20,
            max_special_char_ratio: 0.25,
            max_numeric_ratio: 0.5,
            min_indicators: 2,
        }
    }
}

/// Local matching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Confidence reported for an exact key hit
    pub exact_confidence: f32,
    /// Minimum similarity for a fuzzy match
    pub fuzzy_min_similarity: f32,
    /// Ceiling for fuzzy confidence; never above `exact_confidence`
    pub fuzzy_max_confidence: f32,
    /// Subtracted from fuzzy confidence when a different vintage was matched
    pub vintage_substitution_penalty: f32,
    /// Score only records sharing a phonetic bucket with the candidate
    pub use_phonetic_shortlist: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            exact_confidence: 0.98,
            fuzzy_min_similarity: 0.65,
            fuzzy_max_confidence: 0.95,
            vintage_substitution_penalty: 0.1,
            use_phonetic_shortlist: true,
        }
    }
}

/// Remote wine search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Search endpoint; remote search is disabled when unset
    pub base_url: Option<String>,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Whole request timeout in seconds
    pub request_timeout_secs: u64,
    /// Retries after the first failed attempt
    pub max_retries: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl RemoteConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Frame pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum time between the starts of two processing passes
    pub frame_interval_ms: u64,
    /// Capacity of the camera event queue
    pub camera_queue_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 400,
            camera_queue_depth: 4,
        }
    }
}

impl PipelineConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.ocr.language, "en-US");
        assert!((config.ocr.min_fragment_confidence - 0.5).abs() < 0.001);
        assert_eq!(config.ocr.degrade_after_failures, 3);

        assert!((config.grouping.line_gap - 0.022).abs() < 0.0001);

        assert_eq!(config.admission.min_text_length, 8);
        assert_eq!(config.admission.min_indicators, 2);
        assert_eq!(config.admission.max_all_caps_letters, 20);

        assert!((config.matching.exact_confidence - 0.98).abs() < 0.001);
        assert!((config.matching.fuzzy_min_similarity - 0.65).abs() < 0.001);
        assert!(config.matching.fuzzy_max_confidence < config.matching.exact_confidence);
        assert!((config.matching.vintage_substitution_penalty - 0.1).abs() < 0.001);
        assert!(config.matching.use_phonetic_shortlist);

        assert!(config.remote.base_url.is_none());
        assert_eq!(config.remote.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.remote.request_timeout(), Duration::from_secs(30));

        assert_eq!(config.pipeline.frame_interval(), Duration::from_millis(400));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.remote.base_url = Some("https://wines.example.com".to_string());
        config.pipeline.frame_interval_ms = 300;
        config.admission.min_indicators = 3;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.remote.base_url.as_deref(), Some("https://wines.example.com"));
        assert_eq!(parsed.pipeline.frame_interval_ms, 300);
        assert_eq!(parsed.admission.min_indicators, 3);
        assert_eq!(parsed.ocr.backend, config.ocr.backend);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [pipeline]
            frame_interval_ms = 250

            [admission]
            min_text_length = 5
            "#,
        )
        .unwrap();

        assert_eq!(parsed.pipeline.frame_interval_ms, 250);
        assert_eq!(parsed.pipeline.camera_queue_depth, 4);
        assert_eq!(parsed.admission.min_text_length, 5);
        assert_eq!(parsed.admission.min_indicators, 2);
        assert_eq!(parsed.ocr.language, "en-US");
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();
        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(config.remote.max_retries, loaded.remote.max_retries);
        assert_eq!(config.ocr.fault_after_failures, loaded.ocr.fault_after_failures);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
