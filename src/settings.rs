use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use bevy::prelude::*;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ureq::Agent;

use crate::{
    stations::{FeatureSource, HttpFeatureSource, LocalStationSource},
    types::LatLng,
};

/// Points at a config file to use instead of the per-user one.
pub const CONFIG_ENV: &str = "SUBWAY_MAP_CONFIG";

pub struct SettingsPlugin;

impl Plugin for SettingsPlugin {
    fn build(&self, app: &mut App) {
        let (config, origin) = ViewerConfig::load();
        match &origin {
            ConfigOrigin::Defaults => {
                info!("No config file found, using defaults");
                config.write_defaults();
            }
            ConfigOrigin::File(path) => info!("Loaded config from {}", path.display()),
            ConfigOrigin::Invalid { path, error } => {
                error!("Ignoring config at {}: {error}", path.display())
            }
        }
        app.insert_resource(config).insert_resource(origin);
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where the station layer gets its features from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StationSourceConfig {
    /// `GET {url}?viewport=..&zoom=..`
    Http { url: String },
    /// Clustered in-process from a GeoJSON file.
    Local { path: PathBuf },
}

impl Default for StationSourceConfig {
    fn default() -> Self {
        StationSourceConfig::Local {
            path: PathBuf::from("assets/data/subway-stations.geojson"),
        }
    }
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub starting_location: LatLng,
    pub starting_zoom: u32,
    pub tile_quality: f32,
    pub cache_dir: String,
    pub stations: StationSourceConfig,
    /// File path or http(s) URL of the route lines FeatureCollection.
    pub route_lines: String,
    pub request_timeout_secs: u64,
    /// How long the camera has to rest before the viewport is fetched.
    pub settle_delay_ms: u64,
    pub drop_stale_responses: bool,
    /// Minimum click distance for picking a feature, in screen pixels.
    pub pick_radius_px: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig {
            starting_location: LatLng::new(40.7305, -73.9091),
            starting_zoom: 14,
            tile_quality: 256.0,
            cache_dir: "cache".to_string(),
            stations: StationSourceConfig::default(),
            route_lines: "assets/data/subway-lines.geojson".to_string(),
            request_timeout_secs: 10,
            settle_delay_ms: 150,
            drop_stale_responses: true,
            pick_radius_px: 12.0,
        }
    }
}

/// Which file, if any, the running config came from.
#[derive(Resource, Debug, Clone, PartialEq)]
pub enum ConfigOrigin {
    Defaults,
    File(PathBuf),
    /// The file exists but couldn't be used; defaults are in effect.
    Invalid { path: PathBuf, error: String },
}

impl ViewerConfig {
    /// `$SUBWAY_MAP_CONFIG`, falling back to `config.json` in the platform
    /// config directory.
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        ProjectDirs::from("org", "subway-map", "subway-map")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn load() -> (Self, ConfigOrigin) {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(path),
            _ => (Self::default(), ConfigOrigin::Defaults),
        }
    }

    fn load_from(path: PathBuf) -> (Self, ConfigOrigin) {
        match Self::from_path(&path) {
            Ok(config) => (config, ConfigOrigin::File(path)),
            Err(err) => (
                Self::default(),
                ConfigOrigin::Invalid {
                    path,
                    error: err.to_string(),
                },
            ),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Leaves a config file with every default filled in on first run, so
    /// there is something to edit.
    fn write_defaults(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        if let Some(dir) = path.parent() {
            if let Err(err) = std::fs::create_dir_all(dir) {
                warn!("Couldn't create {}: {err}", dir.display());
                return;
            }
        }
        match self.save(&path) {
            Ok(()) => info!("Wrote default config to {}", path.display()),
            Err(err) => warn!("Couldn't write default config: {err}"),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn http_agent(&self) -> Agent {
        Agent::config_builder()
            .timeout_global(Some(self.request_timeout()))
            .build()
            .into()
    }

    /// An unreadable stations file leaves the layer empty rather than
    /// stopping the viewer.
    pub fn build_source(&self) -> Arc<dyn FeatureSource> {
        match &self.stations {
            StationSourceConfig::Http { url } => {
                Arc::new(HttpFeatureSource::new(url, self.request_timeout()))
            }
            StationSourceConfig::Local { path } => match LocalStationSource::from_file(path) {
                Ok(source) => {
                    if source.is_empty() {
                        warn!("{} has no station points", path.display());
                    }
                    Arc::new(source)
                }
                Err(err) => {
                    error!("Couldn't load stations: {err}");
                    Arc::new(LocalStationSource::default())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"starting_zoom": 12, "stations": {{"kind": "http", "url": "http://localhost:8080/data/subway-stations"}}}}"#
        )
        .unwrap();

        let config = ViewerConfig::from_path(file.path()).unwrap();
        assert_eq!(config.starting_zoom, 12);
        assert_eq!(
            config.stations,
            StationSourceConfig::Http {
                url: "http://localhost:8080/data/subway-stations".into()
            }
        );
        assert_eq!(config.settle_delay_ms, ViewerConfig::default().settle_delay_ms);
        assert!(config.drop_stale_responses);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = ViewerConfig {
            drop_stale_responses: false,
            starting_location: LatLng::new(40.75, -73.98),
            ..Default::default()
        };
        config.save(&path).unwrap();

        let (loaded, origin) = ViewerConfig::load_from(path.clone());
        assert_eq!(loaded, config);
        assert_eq!(origin, ConfigOrigin::File(path));
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let (config, origin) = ViewerConfig::load_from(file.path().to_path_buf());
        assert_eq!(config, ViewerConfig::default());
        assert!(matches!(origin, ConfigOrigin::Invalid { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ViewerConfig::from_path(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn missing_stations_file_gives_an_empty_source() {
        let config = ViewerConfig {
            stations: StationSourceConfig::Local {
                path: PathBuf::from("/nonexistent/stations.geojson"),
            },
            ..Default::default()
        };
        let source = config.build_source();
        assert!(source.describe().starts_with("0 in-memory stations"));
    }
}
