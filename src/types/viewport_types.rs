use std::{
    fmt,
    num::{ParseFloatError, ParseIntError},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A WGS84 position. Latitude first, the way the stations endpoint expects it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// GeoJSON positions are `[longitude, latitude, ...]`.
    pub fn from_position(position: &[f64]) -> Option<Self> {
        match position {
            [lng, lat, ..] => Some(Self::new(*lat, *lng)),
            _ => None,
        }
    }

    pub fn to_position(self) -> Vec<f64> {
        vec![self.lng, self.lat]
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

impl FromStr for LatLng {
    type Err = ViewportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| ViewportError::MalformedCorner(s.to_string()))?;
        Ok(Self::new(lat.trim().parse()?, lng.trim().parse()?))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ViewportError {
    #[error("viewport needs two corners separated by '|', got {0:?}")]
    MissingCorner(String),
    #[error("corner must look like 'lat,lng', got {0:?}")]
    MalformedCorner(String),
    #[error("couldn't parse coordinate: {0}")]
    Coordinate(#[from] ParseFloatError),
    #[error("couldn't parse zoom: {0}")]
    Zoom(#[from] ParseIntError),
}

/// The visible rectangle of the map plus the integer zoom it was read at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
    pub zoom: u32,
}

impl ViewportBounds {
    pub const fn new(south_west: LatLng, north_east: LatLng, zoom: u32) -> Self {
        Self {
            south_west,
            north_east,
            zoom,
        }
    }

    pub fn query(&self) -> ViewportQuery {
        ViewportQuery {
            viewport: format!("{}|{}", self.south_west, self.north_east),
            zoom: self.zoom.to_string(),
        }
    }

    /// Reference decoder for [`ViewportQuery`] parameters.
    pub fn parse(viewport: &str, zoom: &str) -> Result<Self, ViewportError> {
        let (south_west, north_east) = viewport
            .split_once('|')
            .ok_or_else(|| ViewportError::MissingCorner(viewport.to_string()))?;
        Ok(Self::new(
            south_west.parse()?,
            north_east.parse()?,
            zoom.trim().parse()?,
        ))
    }

    /// The rectangle stations are looked up in: the corners normalised to
    /// min/max and grown by a tenth of the span on every side, so markers
    /// sitting just outside the screen edge are still returned.
    /// `x` is longitude, `y` is latitude.
    pub fn search_rect(&self) -> geo::Rect<f64> {
        let min_lat = self.south_west.lat.min(self.north_east.lat);
        let min_lng = self.south_west.lng.min(self.north_east.lng);
        let dist_lat = self.south_west.lat.max(self.north_east.lat) - min_lat;
        let dist_lng = self.south_west.lng.max(self.north_east.lng) - min_lng;

        let min = geo::Coord {
            x: min_lng - dist_lng / 10.0,
            y: min_lat - dist_lat / 10.0,
        };
        let max = geo::Coord {
            x: min.x + dist_lng * 1.2,
            y: min.y + dist_lat * 1.2,
        };
        geo::Rect::new(min, max)
    }
}

/// Encoded request parameters for one viewport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewportQuery {
    pub viewport: String,
    pub zoom: String,
}

impl ViewportQuery {
    pub const VIEWPORT_PARAM: &'static str = "viewport";
    pub const ZOOM_PARAM: &'static str = "zoom";

    pub fn pairs(&self) -> [(&'static str, &str); 2] {
        [
            (Self::VIEWPORT_PARAM, self.viewport.as_str()),
            (Self::ZOOM_PARAM, self.zoom.as_str()),
        ]
    }

    pub fn decode(&self) -> Result<ViewportBounds, ViewportError> {
        ViewportBounds::parse(&self.viewport, &self.zoom)
    }
}

impl fmt::Display for ViewportQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}&{}={}",
            Self::VIEWPORT_PARAM,
            self.viewport,
            Self::ZOOM_PARAM,
            self.zoom
        )
    }
}
