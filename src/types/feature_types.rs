use bevy::prelude::*;
use serde_json::{Map, Value};

use super::LatLng;

/// The `type` property shared by the stations endpoint and the lines file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Station,
    Cluster,
    /// Route lines carry no `type` tag, only `rt_symbol`.
    Route,
    Other(String),
}

impl FeatureKind {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("station") => Self::Station,
            Some("cluster") => Self::Cluster,
            None => Self::Route,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Station => Some("station"),
            Self::Cluster => Some("cluster"),
            Self::Route => None,
            Self::Other(tag) => Some(tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    Point(LatLng),
    Path(Vec<LatLng>),
    MultiPath(Vec<Vec<LatLng>>),
}

impl FeatureGeometry {
    pub fn paths(&self) -> Vec<&[LatLng]> {
        match self {
            Self::Point(_) => Vec::new(),
            Self::Path(path) => vec![path.as_slice()],
            Self::MultiPath(paths) => paths.iter().map(Vec::as_slice).collect(),
        }
    }
}

#[derive(Component, Clone, Debug, PartialEq)]
pub struct MapFeature {
    pub id: Option<String>,
    pub kind: FeatureKind,
    pub title: Option<String>,
    /// Never an empty string; blank descriptions are stored as `None`.
    pub description: Option<String>,
    pub geometry: FeatureGeometry,
    pub properties: Map<String, Value>,
}

impl MapFeature {
    pub fn new(geometry: FeatureGeometry, properties: Map<String, Value>) -> Self {
        let text = |key: &str| {
            properties
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            id: None,
            kind: FeatureKind::from_tag(properties.get("type").and_then(Value::as_str)),
            title: text("title"),
            description: text("description").filter(|d| !d.is_empty()),
            geometry,
            properties,
        }
    }

    /// A point feature with its `type`/`title`/`description` set, mirrored into
    /// `properties` so it serialises the same way it was described.
    pub fn labelled_point(
        at: LatLng,
        kind: FeatureKind,
        title: impl Into<String>,
        description: impl Into<String>,
        mut properties: Map<String, Value>,
    ) -> Self {
        let title = title.into();
        let description = description.into();
        properties.insert("title".into(), Value::String(title.clone()));
        properties.insert("description".into(), Value::String(description.clone()));
        if let Some(tag) = kind.tag() {
            properties.insert("type".into(), Value::String(tag.to_string()));
        }
        Self {
            id: None,
            kind,
            title: Some(title),
            description: Some(description).filter(|d| !d.is_empty()),
            geometry: FeatureGeometry::Point(at),
            properties,
        }
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn route_symbol(&self) -> Option<&str> {
        self.property_str("rt_symbol")
    }

    /// Where an info window for this feature is anchored.
    pub fn anchor(&self) -> Option<LatLng> {
        match &self.geometry {
            FeatureGeometry::Point(at) => Some(*at),
            FeatureGeometry::Path(path) => path.first().copied(),
            FeatureGeometry::MultiPath(paths) => paths.iter().flatten().next().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn reads_type_title_and_description() {
        let feature = MapFeature::new(
            FeatureGeometry::Point(LatLng::new(40.7, -73.9)),
            props(json!({"type": "station", "title": "Astor Pl Station", "description": "6 train"})),
        );
        assert_eq!(feature.kind, FeatureKind::Station);
        assert_eq!(feature.title.as_deref(), Some("Astor Pl Station"));
        assert_eq!(feature.description.as_deref(), Some("6 train"));
    }

    #[test]
    fn blank_description_counts_as_missing() {
        let feature = MapFeature::new(
            FeatureGeometry::Point(LatLng::default()),
            props(json!({"type": "cluster", "description": ""})),
        );
        assert_eq!(feature.description, None);
    }

    #[test]
    fn untagged_features_are_routes() {
        let feature = MapFeature::new(
            FeatureGeometry::Path(vec![LatLng::new(1.0, 2.0), LatLng::new(3.0, 4.0)]),
            props(json!({"rt_symbol": "A"})),
        );
        assert_eq!(feature.kind, FeatureKind::Route);
        assert_eq!(feature.route_symbol(), Some("A"));
        assert_eq!(feature.anchor(), Some(LatLng::new(1.0, 2.0)));
        assert_eq!(
            FeatureKind::from_tag(Some("ferry")),
            FeatureKind::Other("ferry".into())
        );
    }

    #[test]
    fn labelled_points_mirror_their_labels() {
        let feature = MapFeature::labelled_point(
            LatLng::new(40.0, -74.0),
            FeatureKind::Cluster,
            "Cluster #1",
            "Contains 3 stations",
            Map::new(),
        );
        assert_eq!(feature.property_str("type"), Some("cluster"));
        assert_eq!(feature.property_str("title"), Some("Cluster #1"));
        assert_eq!(feature.property_str("description"), Some("Contains 3 stations"));
    }
}
