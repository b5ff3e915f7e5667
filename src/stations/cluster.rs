use geo::{Centroid, MultiPoint, Point};
use rstar::{AABB, RTree, primitives::GeomWithData};

use crate::types::LatLng;

/// From this zoom on, stations are only merged when they practically overlap.
pub const MIN_ZOOM_STOP_CLUSTER: u32 = 14;
/// Every ground resolution is computed at the latitude of New York City.
pub const REFERENCE_LATITUDE: f64 = 40.7305;
/// On-screen width of a station marker in pixels.
pub const STATION_MARKER_WIDTH: f64 = 40.0;
const EQUATORIAL_RADIUS_KM: f64 = 6378.137;
const MEAN_RADIUS_KM: f64 = 6371.0;

/// Clustering radius (km) and minimum cluster size for a zoom level.
pub fn radius_and_min_cluster_size(zoom: u32) -> (f64, usize) {
    if zoom >= MIN_ZOOM_STOP_CLUSTER {
        return (0.01, 2);
    }
    let ground_resolution = ground_resolution_km(REFERENCE_LATITUDE, zoom);
    (ground_resolution * STATION_MARKER_WIDTH, 3)
}

/// Kilometres covered by one pixel of a 256px web mercator tile.
/// <https://wiki.openstreetmap.org/wiki/Zoom_levels>
pub fn ground_resolution_km(lat: f64, zoom: u32) -> f64 {
    let pixels = 2f64.powi(8 + zoom as i32);
    lat.to_radians().cos() * 2.0 * std::f64::consts::PI * EQUATORIAL_RADIUS_KM / pixels
}

/// Equirectangular distance, accurate enough at station spacing.
pub fn distance_km(a: LatLng, b: LatLng) -> f64 {
    let d_lat = a.lat - b.lat;
    let d_lng = (a.lng - b.lng) * ((a.lat + b.lat) / 2.0).to_radians().cos();
    (d_lat * d_lat + d_lng * d_lng).sqrt().to_radians() * MEAN_RADIUS_KM
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Indices into the clustered point slice, ascending.
    pub members: Vec<usize>,
}

impl Cluster {
    pub fn centroid(&self, points: &[LatLng]) -> Option<LatLng> {
        let multi: MultiPoint<f64> = self
            .members
            .iter()
            .map(|&i| Point::new(points[i].lng, points[i].lat))
            .collect();
        multi.centroid().map(|c| LatLng::new(c.y(), c.x()))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clustering {
    pub clusters: Vec<Cluster>,
    /// Points that belong to no cluster, ascending.
    pub noise: Vec<usize>,
}

type IndexedPoint = GeomWithData<[f64; 2], usize>;

struct Neighbourhood<'a> {
    points: &'a [LatLng],
    tree: RTree<IndexedPoint>,
    radius_km: f64,
}

impl Neighbourhood<'_> {
    fn around(&self, i: usize) -> Vec<usize> {
        let centre = self.points[i];
        let d_lat = (self.radius_km / MEAN_RADIUS_KM).to_degrees();
        // Generous on longitude: the distance uses the mean latitude of both points.
        let d_lng = 1.5 * d_lat / centre.lat.to_radians().cos().abs().max(1e-6);
        let envelope = AABB::from_corners(
            [centre.lng - d_lng, centre.lat - d_lat * 1.5],
            [centre.lng + d_lng, centre.lat + d_lat * 1.5],
        );
        self.tree
            .locate_in_envelope(&envelope)
            .map(|p| p.data)
            .filter(|&j| distance_km(centre, self.points[j]) <= self.radius_km)
            .collect()
    }
}

/// Density based clustering. A point with at least `min_size` points within
/// `radius_km` (itself included) is a core point; clusters are grown through
/// core points and absorb the border points they reach.
pub fn dbscan(points: &[LatLng], radius_km: f64, min_size: usize) -> Clustering {
    let neighbourhood = Neighbourhood {
        points,
        tree: RTree::bulk_load(
            points
                .iter()
                .enumerate()
                .map(|(i, p)| GeomWithData::new([p.lng, p.lat], i))
                .collect(),
        ),
        radius_km,
    };

    let mut labels: Vec<Option<usize>> = vec![None; points.len()];
    let mut visited = vec![false; points.len()];
    let mut clusters: Vec<Cluster> = Vec::new();

    for i in 0..points.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let seeds = neighbourhood.around(i);
        if seeds.len() < min_size {
            continue;
        }

        let id = clusters.len();
        clusters.push(Cluster {
            members: Vec::new(),
        });
        labels[i] = Some(id);
        clusters[id].members.push(i);

        let mut queue = seeds;
        while let Some(j) = queue.pop() {
            if labels[j].is_none() {
                labels[j] = Some(id);
                clusters[id].members.push(j);
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;
            let reach = neighbourhood.around(j);
            if reach.len() >= min_size {
                queue.extend(reach);
            }
        }
        clusters[id].members.sort_unstable();
    }

    let noise = labels
        .iter()
        .enumerate()
        .filter_map(|(i, label)| label.is_none().then_some(i))
        .collect();

    Clustering { clusters, noise }
}
