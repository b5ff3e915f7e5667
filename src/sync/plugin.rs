use std::{sync::Arc, time::Duration};

use bevy::{prelude::*, window::PrimaryWindow};
use bevy_map_viewer::{MapViewerMarker, TileMapResources, ZoomChangedEvent};
use bevy_tasks::{AsyncComputeTaskPool, Task, futures_lite::future};

use crate::{
    geojson::{EntitySurface, FeatureLayer, IconAssets},
    settings::ViewerConfig,
    stations::FeatureSource,
    types::{LatLng, ViewportBounds},
};

use super::{
    CameraSample, DisplayedFeatureSet, FetchOutcome, SettleDetector, SwapResult,
    ViewportSynchronizer,
};

pub struct ViewportSyncPlugin;

impl Plugin for ViewportSyncPlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<ViewerConfig>()
            .cloned()
            .unwrap_or_default();
        let source = config.build_source();
        info!("Viewport features come from {}", source.describe());

        app.add_event::<ViewSettled>()
            .insert_resource(FeatureSourceResource(source))
            .insert_resource(StationLayer::new(config.drop_stale_responses))
            .insert_resource(SettleState(SettleDetector::new(Duration::from_millis(
                config.settle_delay_ms,
            ))))
            .add_systems(
                Update,
                (
                    detect_view_settled,
                    request_viewport_features,
                    apply_fetch_results,
                )
                    .chain(),
            );
    }
}

/// The map stopped moving. Sent once per rest period, including the first
/// one after startup.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSettled;

#[derive(Resource, Clone)]
pub struct FeatureSourceResource(pub Arc<dyn FeatureSource>);

/// The viewport dependent layer: what is on screen and which request put it there.
#[derive(Resource, Default)]
pub struct StationLayer {
    pub displayed: DisplayedFeatureSet<Entity>,
    pub synchronizer: ViewportSynchronizer,
}

impl StationLayer {
    pub fn new(drop_stale_responses: bool) -> Self {
        StationLayer {
            displayed: DisplayedFeatureSet::empty(),
            synchronizer: ViewportSynchronizer::new(drop_stale_responses),
        }
    }
}

#[derive(Resource)]
pub struct SettleState(pub SettleDetector);

/// A viewport fetch running on the async compute pool.
#[derive(Component)]
pub struct PendingFetch(pub Task<FetchOutcome>);

pub fn detect_view_settled(
    time: Res<Time>,
    camera: Query<(&Transform, &Projection), With<MapViewerMarker>>,
    mut zoom_change: EventReader<ZoomChangedEvent>,
    mut state: ResMut<SettleState>,
    mut settled: EventWriter<ViewSettled>,
) {
    let now = time.elapsed();
    if !zoom_change.is_empty() {
        zoom_change.clear();
        state.0.mark_motion(now);
    }

    let Ok((transform, projection)) = camera.single() else {
        return;
    };
    let scale = match projection {
        Projection::Orthographic(ortho) => ortho.scale,
        _ => 1.0,
    };
    let sample = CameraSample {
        translation: transform.translation.truncate(),
        scale,
    };
    if state.0.observe(sample, now) {
        settled.write(ViewSettled);
    }
}

/// Reads the geographic rectangle currently covered by the window.
pub fn viewport_bounds(
    camera: &Camera,
    camera_transform: &GlobalTransform,
    window: &Window,
    tiles: &TileMapResources,
) -> Option<ViewportBounds> {
    let bottom_left = camera
        .viewport_to_world_2d(camera_transform, Vec2::new(0.0, window.height()))
        .ok()?;
    let top_right = camera
        .viewport_to_world_2d(camera_transform, Vec2::new(window.width(), 0.0))
        .ok()?;

    let south_west = tiles.point_to_coord(bottom_left);
    let north_east = tiles.point_to_coord(top_right);
    Some(ViewportBounds::new(
        LatLng::new(south_west.lat as f64, south_west.long as f64),
        LatLng::new(north_east.lat as f64, north_east.long as f64),
        tiles.zoom_manager.zoom_level as u32,
    ))
}

pub fn request_viewport_features(
    mut commands: Commands,
    mut settled: EventReader<ViewSettled>,
    camera: Query<(&Camera, &GlobalTransform), With<MapViewerMarker>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    tiles: Res<TileMapResources>,
    source: Res<FeatureSourceResource>,
    mut layer: ResMut<StationLayer>,
) {
    if settled.is_empty() {
        return;
    }
    settled.clear();

    let (Ok((camera, camera_transform)), Ok(window)) = (camera.single(), windows.single()) else {
        return;
    };
    let Some(bounds) = viewport_bounds(camera, camera_transform, window, &tiles) else {
        warn!("Couldn't read the viewport from the camera");
        return;
    };

    info!("Current zoom level: {}", bounds.zoom);
    let ticket = layer.synchronizer.issue(bounds);
    debug!("Requesting #{} {}", ticket.sequence, ticket.query);

    let source = Arc::clone(&source.0);
    let task = AsyncComputeTaskPool::get().spawn(async move {
        let result = source.fetch(&ticket.query);
        FetchOutcome { ticket, result }
    });
    commands.spawn(PendingFetch(task));
}

pub fn apply_fetch_results(
    mut commands: Commands,
    mut pending: Query<(Entity, &mut PendingFetch)>,
    mut layer: ResMut<StationLayer>,
    icons: Res<IconAssets>,
    tiles: Res<TileMapResources>,
) {
    for (entity, mut task) in &mut pending {
        let Some(outcome) = future::block_on(future::poll_once(&mut task.0)) else {
            continue;
        };
        commands.entity(entity).despawn();

        let sequence = outcome.ticket.sequence;
        let query = outcome.ticket.query.to_string();
        let displayed = std::mem::take(&mut layer.displayed);
        let mut surface = EntitySurface {
            commands: &mut commands,
            icons: &icons,
            tiles: &tiles,
            layer: FeatureLayer::Dynamic,
        };
        let (displayed, result) = layer.synchronizer.apply(outcome, displayed, &mut surface);
        layer.displayed = displayed;

        match result {
            SwapResult::Replaced { removed, added } => {
                info!("Showing {added} features for #{sequence} (removed {removed})");
            }
            SwapResult::KeptOnFailure(err) => {
                warn!(
                    "Fetch #{sequence} ({query}) failed, keeping {} features: {err}",
                    layer.displayed.len()
                );
            }
            SwapResult::DroppedStale { newest_applied } => {
                debug!("Dropped #{sequence}, #{newest_applied} is already shown");
            }
        }
    }
}
