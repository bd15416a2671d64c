// Tue Jan 13 2026 - Alex

use crate::rtti::{ScanConfig, SegmentSelection};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target_binary: Option<PathBuf>,
    pub output_file: PathBuf,
    pub text_output: Option<PathBuf>,
    pub place_structures: bool,
    pub overwrite_comments: bool,
    pub segments: Vec<SegmentSelection>,
    pub cancel_check_interval: usize,
    pub name_retry_limit: usize,
    pub force: bool,
    pub enable_progress_bars: bool,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let scan = ScanConfig::default();
        Self {
            target_binary: None,
            output_file: PathBuf::from("results.json"),
            text_output: None,
            place_structures: scan.place_structures,
            overwrite_comments: scan.overwrite_comments,
            segments: Vec::new(),
            cancel_check_interval: scan.cancel_check_interval,
            name_retry_limit: scan.name_retry_limit,
            force: false,
            enable_progress_bars: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_target_binary(mut self, binary: PathBuf) -> Self {
        self.target_binary = Some(binary);
        self
    }

    pub fn with_output_file(mut self, output: PathBuf) -> Self {
        self.output_file = output;
        self
    }

    pub fn with_text_output(mut self, output: PathBuf) -> Self {
        self.text_output = Some(output);
        self
    }

    pub fn with_segment(mut self, segment: SegmentSelection) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn with_place_structures(mut self, place: bool) -> Self {
        self.place_structures = place;
        self
    }

    pub fn with_overwrite_comments(mut self, overwrite: bool) -> Self {
        self.overwrite_comments = overwrite;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_binary.is_none() {
            return Err(ConfigError::Invalid("target_binary must be set".to_string()));
        }
        if self.cancel_check_interval == 0 {
            return Err(ConfigError::Invalid("cancel_check_interval must be greater than 0".to_string()));
        }
        if self.name_retry_limit == 0 {
            return Err(ConfigError::Invalid("name_retry_limit must be greater than 0".to_string()));
        }
        for segment in &self.segments {
            if let SegmentSelection::Range { start, end } = segment {
                if start >= end {
                    return Err(ConfigError::Invalid(format!("empty segment range {}", segment)));
                }
            }
        }
        Ok(())
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            place_structures: self.place_structures,
            overwrite_comments: self.overwrite_comments,
            segments: if self.segments.is_empty() { None } else { Some(self.segments.clone()) },
            cancel_check_interval: self.cancel_check_interval,
            name_retry_limit: self.name_retry_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = Config::new().with_target_binary(PathBuf::from("a.exe"));
        assert!(config.validate().is_ok());

        let zero_interval = Config { cancel_check_interval: 0, ..config.clone() };
        assert!(matches!(zero_interval.validate(), Err(ConfigError::Invalid(_))));

        let zero_retries = Config { name_retry_limit: 0, ..config.clone() };
        assert!(zero_retries.validate().is_err());

        let bad_range = config.with_segment(SegmentSelection::Range { start: 0x20, end: 0x10 });
        assert!(bad_range.validate().is_err());
        assert!(Config::new().validate().is_err());
    }

    #[test]
    fn test_scan_config_projection() {
        let config = Config::new()
            .with_place_structures(false)
            .with_segment(SegmentSelection::Named(".rdata".to_string()));
        let scan = config.scan_config();
        assert!(!scan.place_structures);
        assert_eq!(scan.segments, Some(vec![SegmentSelection::Named(".rdata".to_string())]));
        assert_eq!(Config::new().scan_config().segments, None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"overwrite_comments": true, "segments": [{"named": ".data"}]}"#).unwrap();
        assert!(config.overwrite_comments);
        assert!(config.place_structures);
        assert_eq!(config.output_file, PathBuf::from("results.json"));
        assert_eq!(config.segments.len(), 1);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Config::load_from_file("/nonexistent/rtti.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rtti.json"));
    }
}
