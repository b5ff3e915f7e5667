use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use geojson::GeoJson;
use thiserror::Error;
use ureq::Agent;

use crate::types::{FeatureGeometry, LatLng, MapFeature};

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("couldn't read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("couldn't download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("expected a FeatureCollection or a Feature")]
    NotAFeature,
    #[error("a position needs both longitude and latitude")]
    ShortPosition,
    #[error("feature {feature} has no string property {property:?}")]
    MissingProperty { feature: String, property: String },
}

/// Parses a GeoJSON document into map features. Features without geometry,
/// or with geometry that isn't a point or a line, are skipped.
pub fn features_from_str(data: &str) -> Result<Vec<MapFeature>, FeatureError> {
    features_from_geojson(data.parse::<GeoJson>()?)
}

pub fn features_from_file(path: &Path) -> Result<Vec<MapFeature>, FeatureError> {
    let file = File::open(path).map_err(|source| FeatureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    features_from_geojson(GeoJson::from_reader(reader)?)
}

/// Loads a GeoJSON document from an `http(s)://` URL or a file path.
pub fn features_from_location(
    agent: &Agent,
    location: &str,
) -> Result<Vec<MapFeature>, FeatureError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let download = |source: ureq::Error| FeatureError::Download {
            url: location.to_string(),
            source: Box::new(source),
        };
        let mut response = agent.get(location).call().map_err(download)?;
        let body = response.body_mut().read_to_string().map_err(download)?;
        features_from_str(&body)
    } else {
        features_from_file(Path::new(location))
    }
}

pub fn features_from_geojson(geojson: GeoJson) -> Result<Vec<MapFeature>, FeatureError> {
    let features = match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => return Err(FeatureError::NotAFeature),
    };

    let mut map_features = Vec::with_capacity(features.len());
    for feature in features {
        if let Some(map_feature) = convert_feature(feature)? {
            map_features.push(map_feature);
        }
    }
    Ok(map_features)
}

fn convert_feature(feature: geojson::Feature) -> Result<Option<MapFeature>, FeatureError> {
    let Some(geometry) = feature.geometry else {
        return Ok(None);
    };

    let geometry = match geometry.value {
        geojson::Value::Point(position) => FeatureGeometry::Point(position_to_lat_lng(&position)?),
        geojson::Value::LineString(line) => FeatureGeometry::Path(line_to_path(&line)?),
        geojson::Value::MultiLineString(lines) => FeatureGeometry::MultiPath(
            lines
                .iter()
                .map(|line| line_to_path(line))
                .collect::<Result<_, _>>()?,
        ),
        _ => return Ok(None),
    };

    let mut map_feature = MapFeature::new(geometry, feature.properties.unwrap_or_default());
    map_feature.id = feature.id.map(|id| match id {
        geojson::feature::Id::String(id) => id,
        geojson::feature::Id::Number(id) => id.to_string(),
    });
    Ok(Some(map_feature))
}

fn position_to_lat_lng(position: &[f64]) -> Result<LatLng, FeatureError> {
    LatLng::from_position(position).ok_or(FeatureError::ShortPosition)
}

fn line_to_path(line: &[Vec<f64>]) -> Result<Vec<LatLng>, FeatureError> {
    line.iter().map(|p| position_to_lat_lng(p)).collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::types::FeatureKind;

    use super::*;

    const STATIONS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": 7,
                "geometry": {"type": "Point", "coordinates": [-73.991, 40.730]},
                "properties": {"type": "station", "title": "Astor Pl Station", "description": "6 train"}
            },
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [-73.98, 40.74]},
                "properties": {"type": "cluster", "title": "Cluster #1"}
            },
            {
                "type": "Feature",
                "geometry": {"type": "MultiLineString", "coordinates": [[[-73.9, 40.7], [-73.8, 40.8]], [[-73.7, 40.6], [-73.6, 40.5]]]},
                "properties": {"rt_symbol": "G"}
            },
            {
                "type": "Feature",
                "geometry": null,
                "properties": {"type": "station"}
            },
            {
                "type": "Feature",
                "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]},
                "properties": {}
            }
        ]
    }"#;

    #[test]
    fn parses_points_and_lines_and_skips_the_rest() {
        let features = features_from_str(STATIONS).unwrap();
        assert_eq!(features.len(), 3);

        assert_eq!(features[0].id.as_deref(), Some("7"));
        assert_eq!(features[0].kind, FeatureKind::Station);
        assert_eq!(
            features[0].geometry,
            FeatureGeometry::Point(LatLng::new(40.730, -73.991))
        );

        assert_eq!(features[1].kind, FeatureKind::Cluster);
        assert_eq!(features[1].description, None);

        assert_eq!(features[2].kind, FeatureKind::Route);
        assert_eq!(features[2].geometry.paths().len(), 2);
    }

    #[test]
    fn empty_collection_is_valid() {
        let features =
            features_from_str(r#"{"type": "FeatureCollection", "features": []}"#).unwrap();
        assert!(features.is_empty());
    }

    #[test]
    fn bare_geometry_is_rejected() {
        let result = features_from_str(r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#);
        assert!(matches!(result, Err(FeatureError::NotAFeature)));
    }

    #[test]
    fn malformed_text_is_reported() {
        assert!(matches!(
            features_from_str("<html>502</html>"),
            Err(FeatureError::GeoJson(_))
        ));
    }

    #[test]
    fn file_and_string_agree() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(STATIONS.as_bytes()).unwrap();

        let from_file = features_from_location(&Agent::new_with_defaults(), &file.path().to_string_lossy()).unwrap();
        assert_eq!(from_file, features_from_str(STATIONS).unwrap());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = features_from_file(Path::new("does/not/exist.geojson")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.geojson"));
    }
}
