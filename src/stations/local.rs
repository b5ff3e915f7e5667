use std::path::{Path, PathBuf};

use rstar::{AABB, RTree, RTreeObject};

use crate::{
    geojson::{FeatureError, features_from_file},
    types::{FeatureGeometry, FeatureKind, LatLng, MapFeature, ViewportBounds, ViewportQuery},
};

use super::{FeatureSource, FetchError, dbscan, radius_and_min_cluster_size};

#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    /// Position in the source file, keeps query results in a stable order.
    pub index: usize,
    pub location: LatLng,
    pub feature: MapFeature,
}

impl RTreeObject for Station {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.location.lng, self.location.lat])
    }
}

impl Station {
    fn required(&self, property: &str) -> Result<&str, FeatureError> {
        self.feature
            .property_str(property)
            .ok_or_else(|| FeatureError::MissingProperty {
                feature: self
                    .feature
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("#{}", self.index)),
                property: property.to_string(),
            })
    }
}

/// Serves viewport queries from a stations file held in memory, clustering
/// stations that would overlap at the requested zoom.
#[derive(Debug, Default)]
pub struct LocalStationSource {
    stations: RTree<Station>,
    origin: Option<PathBuf>,
}

impl LocalStationSource {
    /// Indexes the point features; anything else is ignored.
    pub fn from_features(features: Vec<MapFeature>) -> Self {
        let stations = features
            .into_iter()
            .filter_map(|feature| match feature.geometry {
                FeatureGeometry::Point(location) => Some((location, feature)),
                _ => None,
            })
            .enumerate()
            .map(|(index, (location, feature))| Station {
                index,
                location,
                feature,
            })
            .collect();

        LocalStationSource {
            stations: RTree::bulk_load(stations),
            origin: None,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, FeatureError> {
        let mut source = Self::from_features(features_from_file(path)?);
        source.origin = Some(path.to_path_buf());
        Ok(source)
    }

    pub fn len(&self) -> usize {
        self.stations.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stations_in(&self, bounds: &ViewportBounds) -> Vec<&Station> {
        let rect = bounds.search_rect();
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        let mut found: Vec<&Station> = self.stations.locate_in_envelope_intersecting(&envelope).collect();
        found.sort_by_key(|station| station.index);
        found
    }

    /// Noise stations come first as `station` features, followed by one
    /// `cluster` feature per cluster at its centroid.
    pub fn cluster(&self, stations: &[&Station], zoom: u32) -> Result<Vec<MapFeature>, FeatureError> {
        let points: Vec<LatLng> = stations.iter().map(|s| s.location).collect();
        let (radius, min_size) = radius_and_min_cluster_size(zoom);
        let clustering = dbscan(&points, radius, min_size);

        let mut features = Vec::with_capacity(clustering.noise.len() + clustering.clusters.len());
        for &i in &clustering.noise {
            let station = stations[i];
            let name = station.required("name")?;
            let notes = station.required("notes")?;
            let mut feature = MapFeature::labelled_point(
                station.location,
                FeatureKind::Station,
                format!("{name} Station"),
                notes,
                station.feature.properties.clone(),
            );
            feature.id = station.feature.id.clone();
            features.push(feature);
        }

        for (n, cluster) in clustering.clusters.iter().enumerate() {
            let Some(centre) = cluster.centroid(&points) else {
                continue;
            };
            features.push(MapFeature::labelled_point(
                centre,
                FeatureKind::Cluster,
                format!("Cluster #{}", n + 1),
                format!("Contains {} stations", cluster.members.len()),
                Default::default(),
            ));
        }
        Ok(features)
    }
}

impl FeatureSource for LocalStationSource {
    fn fetch(&self, query: &ViewportQuery) -> Result<Vec<MapFeature>, FetchError> {
        let bounds = query.decode()?;
        let stations = self.stations_in(&bounds);
        Ok(self.cluster(&stations, bounds.zoom)?)
    }

    fn describe(&self) -> String {
        match &self.origin {
            Some(path) => format!("{} stations from {}", self.len(), path.display()),
            None => format!("{} in-memory stations", self.len()),
        }
    }
}
