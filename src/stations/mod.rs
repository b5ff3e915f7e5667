//! # Station Sources
//!
//! Answers viewport queries with the station features to show for that
//! viewport: either by asking the stations endpoint over HTTP or by indexing
//! and clustering a local stations file in-process.
//!
//! ## Sub-modules
//! - `client`: HTTP source, `GET {url}?viewport=..&zoom=..`
//! - `cluster`: zoom-dependent DBSCAN over station positions
//! - `local`: R-tree backed in-process source

mod client;
mod cluster;
mod local;

use thiserror::Error;

pub use client::*;
pub use cluster::*;
pub use local::*;

use crate::{
    geojson::FeatureError,
    types::{MapFeature, ViewportError, ViewportQuery},
};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] Box<ureq::Error>),
    #[error("endpoint returned an empty body")]
    EmptyBody,
    #[error("couldn't decode features: {0}")]
    Feature(#[from] FeatureError),
    #[error("viewport rejected: {0}")]
    Viewport(#[from] ViewportError),
}

impl From<ureq::Error> for FetchError {
    fn from(err: ureq::Error) -> Self {
        FetchError::Transport(Box::new(err))
    }
}

/// Anything that can answer "which features belong in this viewport".
///
/// `fetch` blocks; callers run it on a task pool.
pub trait FeatureSource: Send + Sync + 'static {
    fn fetch(&self, query: &ViewportQuery) -> Result<Vec<MapFeature>, FetchError>;

    /// Short human readable description for logs.
    fn describe(&self) -> String;
}
