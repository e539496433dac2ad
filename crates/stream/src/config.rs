use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use chunkworld_kernel::{NodeQuery, Tree, TreeError};

/// Errors from loading or validating a [`StreamConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("max_radius must be positive, got {0}")]
    InvalidRadius(f32),
    #[error("lod_factor must be positive, got {0}")]
    InvalidLodFactor(f32),
    #[error("poll_interval_ms must be non-zero")]
    ZeroPollInterval,
}

/// Streaming configuration: tree depth, query range and worker pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Depth of the implicit octree; the root spans `2^root_level` chunks.
    pub root_level: u32,
    /// Radius (in chunks) around the viewer within which nodes are streamed.
    pub max_radius: f32,
    /// Distance/size ratio beyond which coarse nodes are kept whole.
    /// `None` streams leaves only.
    pub lod_factor: Option<f32>,
    /// How long the worker sleeps when an iteration changed nothing.
    pub poll_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            root_level: 8,
            max_radius: 12.0,
            lod_factor: None,
            poll_interval_ms: 250,
        }
    }
}

impl StreamConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        tracing::debug!(path = %path.as_ref().display(), ?config, "loaded stream config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Tree::new(self.root_level)?;
        if self.max_radius.is_nan() || self.max_radius <= 0.0 {
            return Err(ConfigError::InvalidRadius(self.max_radius));
        }
        if let Some(factor) = self.lod_factor {
            if factor.is_nan() || factor <= 0.0 {
                return Err(ConfigError::InvalidLodFactor(factor));
            }
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn node_query(&self) -> NodeQuery {
        NodeQuery {
            max_radius: self.max_radius,
            lod_factor: self.lod_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn stream_config_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.root_level, 8);
        assert_eq!(config.max_radius, 12.0);
        assert_eq!(config.lod_factor, None);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let bad_level = StreamConfig {
            root_level: 0,
            ..StreamConfig::default()
        };
        assert!(matches!(bad_level.validate(), Err(ConfigError::Tree(_))));

        let bad_radius = StreamConfig {
            max_radius: f32::NAN,
            ..StreamConfig::default()
        };
        assert!(matches!(
            bad_radius.validate(),
            Err(ConfigError::InvalidRadius(_))
        ));

        let bad_lod = StreamConfig {
            lod_factor: Some(0.0),
            ..StreamConfig::default()
        };
        assert!(matches!(
            bad_lod.validate(),
            Err(ConfigError::InvalidLodFactor(_))
        ));

        let bad_poll = StreamConfig {
            poll_interval_ms: 0,
            ..StreamConfig::default()
        };
        assert!(matches!(
            bad_poll.validate(),
            Err(ConfigError::ZeroPollInterval)
        ));
    }

    #[test]
    fn load_fills_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "root_level": 5, "lod_factor": 3.0 }}"#).unwrap();

        let config = StreamConfig::load(file.path()).unwrap();
        assert_eq!(config.root_level, 5);
        assert_eq!(config.lod_factor, Some(3.0));
        assert_eq!(config.max_radius, 12.0);
    }

    #[test]
    fn load_reports_parse_and_validation_errors() {
        let mut garbage = tempfile::NamedTempFile::new().unwrap();
        write!(garbage, "not json").unwrap();
        assert!(matches!(
            StreamConfig::load(garbage.path()),
            Err(ConfigError::Json(_))
        ));

        let mut invalid = tempfile::NamedTempFile::new().unwrap();
        write!(invalid, r#"{{ "root_level": 99 }}"#).unwrap();
        assert!(matches!(
            StreamConfig::load(invalid.path()),
            Err(ConfigError::Tree(_))
        ));
    }
}
