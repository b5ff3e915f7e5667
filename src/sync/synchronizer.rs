use crate::{
    stations::FetchError,
    types::{MapFeature, ViewportBounds, ViewportQuery},
};

/// Whatever features are drawn on. Features handed to `add_feature` are owned
/// by the surface from then on; callers only keep the returned handle.
pub trait RenderSurface {
    type Handle;

    fn add_feature(&mut self, feature: MapFeature) -> Self::Handle;
    fn remove_feature(&mut self, handle: Self::Handle);
}

/// Handles to the features currently shown in the dynamic layer.
///
/// Only ever replaced as a whole: [`DisplayedFeatureSet::replace`] consumes
/// the old set and returns the new one.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedFeatureSet<H> {
    handles: Vec<H>,
}

impl<H> Default for DisplayedFeatureSet<H> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<H> DisplayedFeatureSet<H> {
    pub fn empty() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Removes every previously displayed feature from `surface`, then adds
    /// `features` and records their handles as the new set.
    #[must_use]
    pub fn replace<S>(self, surface: &mut S, features: Vec<MapFeature>) -> Self
    where
        S: RenderSurface<Handle = H>,
    {
        for handle in self.handles {
            surface.remove_feature(handle);
        }
        Self {
            handles: features
                .into_iter()
                .map(|feature| surface.add_feature(feature))
                .collect(),
        }
    }
}

/// One issued viewport request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTicket {
    pub sequence: u64,
    pub bounds: ViewportBounds,
    pub query: ViewportQuery,
}

/// A finished request, ready to be applied.
#[derive(Debug)]
pub struct FetchOutcome {
    pub ticket: RequestTicket,
    pub result: Result<Vec<MapFeature>, FetchError>,
}

#[derive(Debug)]
pub enum SwapResult {
    Replaced { removed: usize, added: usize },
    /// The request failed; the previous features stay on screen.
    KeptOnFailure(FetchError),
    /// A newer response was already applied.
    DroppedStale { newest_applied: u64 },
}

/// Issues sequence numbered viewport requests and applies their responses
/// to the displayed set.
#[derive(Debug, Clone, Default)]
pub struct ViewportSynchronizer {
    next_sequence: u64,
    newest_applied: Option<u64>,
    drop_stale_responses: bool,
}

impl ViewportSynchronizer {
    /// With `drop_stale_responses` off, whichever response arrives last wins,
    /// even if it was requested for an older viewport.
    pub fn new(drop_stale_responses: bool) -> Self {
        Self {
            drop_stale_responses,
            ..Default::default()
        }
    }

    pub fn issue(&mut self, bounds: ViewportBounds) -> RequestTicket {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        RequestTicket {
            sequence,
            bounds,
            query: bounds.query(),
        }
    }

    pub fn issued(&self) -> u64 {
        self.next_sequence
    }

    pub fn newest_applied(&self) -> Option<u64> {
        self.newest_applied
    }

    pub fn is_stale(&self, ticket: &RequestTicket) -> bool {
        self.drop_stale_responses
            && self
                .newest_applied
                .is_some_and(|newest| ticket.sequence < newest)
    }

    pub fn apply<S>(
        &mut self,
        outcome: FetchOutcome,
        displayed: DisplayedFeatureSet<S::Handle>,
        surface: &mut S,
    ) -> (DisplayedFeatureSet<S::Handle>, SwapResult)
    where
        S: RenderSurface,
    {
        let features = match outcome.result {
            Ok(features) => features,
            Err(err) => return (displayed, SwapResult::KeptOnFailure(err)),
        };
        if let Some(newest_applied) = self.newest_applied.filter(|_| self.is_stale(&outcome.ticket)) {
            return (displayed, SwapResult::DroppedStale { newest_applied });
        }

        let removed = displayed.len();
        let added = features.len();
        let displayed = displayed.replace(surface, features);
        self.newest_applied = Some(
            self.newest_applied
                .map_or(outcome.ticket.sequence, |n| n.max(outcome.ticket.sequence)),
        );
        (displayed, SwapResult::Replaced { removed, added })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::Map;

    use crate::types::{FeatureGeometry, LatLng};

    use super::*;

    #[derive(Default)]
    struct RecordingSurface {
        next: u32,
        shown: BTreeMap<u32, MapFeature>,
        removed: Vec<u32>,
    }

    impl RenderSurface for RecordingSurface {
        type Handle = u32;

        fn add_feature(&mut self, feature: MapFeature) -> u32 {
            self.next += 1;
            self.shown.insert(self.next, feature);
            self.next
        }

        fn remove_feature(&mut self, handle: u32) {
            assert!(self.shown.remove(&handle).is_some(), "removed {handle} twice");
            self.removed.push(handle);
        }
    }

    impl RecordingSurface {
        fn titles(&self) -> Vec<&str> {
            self.shown
                .values()
                .filter_map(|f| f.title.as_deref())
                .collect()
        }
    }

    fn named(title: &str) -> MapFeature {
        let mut feature = MapFeature::new(FeatureGeometry::Point(LatLng::default()), Map::new());
        feature.title = Some(title.to_string());
        feature
    }

    fn bounds(offset: f64) -> ViewportBounds {
        ViewportBounds::new(
            LatLng::new(40.70 + offset, -74.01),
            LatLng::new(40.75 + offset, -73.95),
            15,
        )
    }

    fn success(ticket: RequestTicket, titles: &[&str]) -> FetchOutcome {
        FetchOutcome {
            ticket,
            result: Ok(titles.iter().map(|t| named(t)).collect()),
        }
    }

    fn failure(ticket: RequestTicket) -> FetchOutcome {
        FetchOutcome {
            ticket,
            result: Err(FetchError::EmptyBody),
        }
    }

    #[test]
    fn each_response_fully_replaces_the_last() {
        let mut sync = ViewportSynchronizer::new(true);
        let mut surface = RecordingSurface::default();
        let mut displayed = DisplayedFeatureSet::empty();

        let rounds: [&[&str]; 3] = [&["F1", "F2"], &["F3"], &["F4", "F5", "F6"]];
        for (i, &titles) in rounds.iter().enumerate() {
            let ticket = sync.issue(bounds(i as f64 * 0.01));
            let (next, _) = sync.apply(success(ticket, titles), displayed, &mut surface);
            displayed = next;
            assert_eq!(surface.titles(), titles.to_vec());
            assert_eq!(displayed.len(), titles.len());
        }
    }

    #[test]
    fn failed_fetch_keeps_previous_features() {
        let mut sync = ViewportSynchronizer::new(true);
        let mut surface = RecordingSurface::default();

        let first = sync.issue(bounds(0.0));
        let (displayed, _) =
            sync.apply(success(first, &["F1", "F2"]), DisplayedFeatureSet::empty(), &mut surface);
        let before = displayed.clone();

        let second = sync.issue(bounds(0.01));
        let (displayed, result) = sync.apply(failure(second), displayed, &mut surface);

        assert!(matches!(result, SwapResult::KeptOnFailure(FetchError::EmptyBody)));
        assert_eq!(displayed, before);
        assert_eq!(surface.titles(), ["F1", "F2"]);
        assert!(surface.removed.is_empty());
    }

    #[test]
    fn swap_removes_every_old_feature() {
        let mut sync = ViewportSynchronizer::new(true);
        let mut surface = RecordingSurface::default();

        let first = sync.issue(bounds(0.0));
        let (displayed, _) = sync.apply(
            success(first, &["F1", "F2", "F3"]),
            DisplayedFeatureSet::empty(),
            &mut surface,
        );

        let second = sync.issue(bounds(0.0));
        let (displayed, result) = sync.apply(success(second, &["F4"]), displayed, &mut surface);

        assert!(matches!(result, SwapResult::Replaced { removed: 3, added: 1 }));
        assert_eq!(surface.removed, [1, 2, 3]);
        assert_eq!(surface.titles(), ["F4"]);
        assert_eq!(displayed.len(), 1);
    }

    #[test]
    fn empty_response_clears_the_layer() {
        let mut sync = ViewportSynchronizer::new(true);
        let mut surface = RecordingSurface::default();

        let first = sync.issue(bounds(0.0));
        let (displayed, _) =
            sync.apply(success(first, &["F1"]), DisplayedFeatureSet::empty(), &mut surface);
        let second = sync.issue(bounds(0.0));
        let (displayed, _) = sync.apply(success(second, &[]), displayed, &mut surface);

        assert!(displayed.is_empty());
        assert!(surface.shown.is_empty());
    }

    #[test]
    fn late_response_for_an_older_viewport_is_dropped() {
        let mut sync = ViewportSynchronizer::new(true);
        let mut surface = RecordingSurface::default();

        let older = sync.issue(bounds(0.0));
        let newer = sync.issue(bounds(0.05));
        assert!(!sync.is_stale(&older));

        let (displayed, _) =
            sync.apply(success(newer, &["new"]), DisplayedFeatureSet::empty(), &mut surface);
        let (displayed, result) = sync.apply(success(older, &["old"]), displayed, &mut surface);

        assert!(matches!(result, SwapResult::DroppedStale { newest_applied: 1 }));
        assert_eq!(surface.titles(), ["new"]);
        assert_eq!(displayed.len(), 1);
    }

    #[test]
    fn without_stale_dropping_the_last_arrival_wins() {
        let mut sync = ViewportSynchronizer::new(false);
        let mut surface = RecordingSurface::default();

        let older = sync.issue(bounds(0.0));
        let newer = sync.issue(bounds(0.05));
        let (displayed, _) =
            sync.apply(success(newer, &["new"]), DisplayedFeatureSet::empty(), &mut surface);
        let (_, result) = sync.apply(success(older, &["old"]), displayed, &mut surface);

        assert!(matches!(result, SwapResult::Replaced { removed: 1, added: 1 }));
        assert_eq!(surface.titles(), ["old"]);
        assert_eq!(sync.newest_applied(), Some(1));
    }

    #[test]
    fn tickets_are_numbered_in_issue_order() {
        let mut sync = ViewportSynchronizer::default();
        let a = sync.issue(bounds(0.0));
        let b = sync.issue(bounds(0.0));
        assert_eq!((a.sequence, b.sequence), (0, 1));
        assert_eq!(a.query, b.query);
        assert_eq!(sync.issued(), 2);
    }
}
