//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};

/// Configuration for a [`TrackSession`](crate::TrackSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Initial master switch, and the flag given to a newly sighted activity type.
    /// Default: true
    pub show_tracks_on_init: bool,

    /// Keep info popups open for every visible track.
    /// Default: false
    pub show_track_info: bool,

    /// Refit the map viewport to the visible tracks after every change.
    /// Default: true
    pub auto_fit: bool,

    /// Animate viewport fits.
    /// Default: true
    pub animate_fit: bool,

    /// chrono formats for the date at the first digit of a track name. The
    /// format matching the longest prefix wins; ties go to the earlier one,
    /// so `%y` listed first reads "05/01/20" as 2020 rather than the year 20.
    /// Default: `%m/%d/%y`, `%m/%d/%Y`, `%Y-%m-%d`, `%Y/%m/%d`
    pub date_formats: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            show_tracks_on_init: true,
            show_track_info: false,
            auto_fit: true,
            animate_fit: true,
            date_formats: vec![
                "%m/%d/%y".to_string(),
                "%m/%d/%Y".to_string(),
                "%Y-%m-%d".to_string(),
                "%Y/%m/%d".to_string(),
            ],
        }
    }
}

impl SessionConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| TrackError::ConfigError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the config for values the session cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.date_formats.is_empty() {
            return Err(TrackError::ConfigError {
                message: "date_formats must not be empty".to_string(),
            });
        }
        if let Some(fmt) = self.date_formats.iter().find(|f| f.trim().is_empty()) {
            return Err(TrackError::ConfigError {
                message: format!("blank date format {:?}", fmt),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(config.show_tracks_on_init);
        assert!(!config.show_track_info);
        assert!(config.auto_fit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = SessionConfig::from_json(r#"{"auto_fit": false}"#).unwrap();
        assert!(!config.auto_fit);
        assert!(config.show_tracks_on_init);
        assert_eq!(config.date_formats, SessionConfig::default().date_formats);
    }

    #[test]
    fn test_from_json_rejects_empty_formats() {
        let result = SessionConfig::from_json(r#"{"date_formats": []}"#);
        assert!(matches!(result, Err(TrackError::ConfigError { .. })));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let result = SessionConfig::from_json("not json");
        assert!(matches!(result, Err(TrackError::ConfigError { .. })));
    }
}
