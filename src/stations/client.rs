use std::time::Duration;

use bevy::log::debug;
use ureq::Agent;

use crate::{
    geojson::features_from_str,
    types::{MapFeature, ViewportQuery},
};

use super::{FeatureSource, FetchError};

/// Fetches viewport features from an HTTP endpoint that answers
/// `?viewport=sw_lat,sw_lng|ne_lat,ne_lng&zoom=N` with a FeatureCollection.
#[derive(Clone)]
pub struct HttpFeatureSource {
    url: String,
    pub agent: Agent,
}

impl HttpFeatureSource {
    pub fn new(url: &str, timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        let agent: Agent = config.into();
        HttpFeatureSource {
            agent,
            url: url.to_string(),
        }
    }

    /// The full request as it appears in logs (unescaped).
    pub fn request_url(&self, query: &ViewportQuery) -> String {
        format!("{}?{}", self.url, query)
    }

    pub fn send_viewport_query(&self, query: &ViewportQuery) -> Result<String, ureq::Error> {
        let mut request = self.agent.get(&self.url);
        for (key, value) in query.pairs() {
            request = request.query(key, value);
        }
        let mut response = request.call()?;
        response.body_mut().read_to_string()
    }
}

impl FeatureSource for HttpFeatureSource {
    fn fetch(&self, query: &ViewportQuery) -> Result<Vec<MapFeature>, FetchError> {
        debug!("GET {}", self.request_url(query));
        let body = self.send_viewport_query(query)?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }
        Ok(features_from_str(&body)?)
    }

    fn describe(&self) -> String {
        format!("stations endpoint {}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{LatLng, ViewportBounds};

    use super::*;

    #[test]
    fn request_url_carries_both_parameters() {
        let source = HttpFeatureSource::new("http://localhost:8080/data/subway-stations", Duration::from_secs(1));
        let query =
            ViewportBounds::new(LatLng::new(40.70, -74.01), LatLng::new(40.75, -73.95), 15).query();
        assert_eq!(
            source.request_url(&query),
            "http://localhost:8080/data/subway-stations?viewport=40.7,-74.01|40.75,-73.95&zoom=15"
        );
    }

    #[test]
    fn unreachable_endpoint_is_a_transport_error() {
        // Port 9 (discard) on loopback is closed on test machines.
        let source = HttpFeatureSource::new("http://127.0.0.1:9/data", Duration::from_millis(500));
        let query = ViewportBounds::new(LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0), 3).query();
        assert!(matches!(source.fetch(&query), Err(FetchError::Transport(_))));
    }
}
