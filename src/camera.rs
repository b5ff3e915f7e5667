use bevy::{prelude::*, render::view::RenderLayers};
use bevy_map_viewer::{Coord, EguiBlockInputState, MapViewerMarker, MapViewerPlugin, TileMapResources};
use bevy_pancam::{DirectionKeys, PanCam, PanCamPlugin};

use crate::settings::ViewerConfig;

pub struct CameraSystemPlugin;

impl Plugin for CameraSystemPlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<ViewerConfig>()
            .cloned()
            .unwrap_or_default();

        app.add_plugins(PanCamPlugin)
            .add_plugins(MapViewerPlugin {
                starting_location: Coord::new(
                    config.starting_location.lat as f32,
                    config.starting_location.lng as f32,
                ),
                starting_zoom: config.starting_zoom,
                tile_quality: config.tile_quality.into(),
                cache_dir: config.cache_dir.clone(),
            })
            .add_systems(Update, (setup_camera, handle_pancam).chain());
    }
}

fn pancam() -> PanCam {
    PanCam {
        grab_buttons: vec![MouseButton::Left, MouseButton::Middle],
        move_keys: DirectionKeys {
            up: vec![KeyCode::ArrowUp],
            down: vec![KeyCode::ArrowDown],
            left: vec![KeyCode::ArrowLeft],
            right: vec![KeyCode::ArrowRight],
        },
        speed: 400.,
        enabled: true,
        zoom_to_cursor: true,
        min_scale: 0.01,
        max_scale: f32::INFINITY,
        min_x: f32::NEG_INFINITY,
        max_x: f32::INFINITY,
        min_y: f32::NEG_INFINITY,
        max_y: f32::INFINITY,
    }
}

/// Gives the map camera panning and the feature render layer. Spawns one at
/// the starting location if the viewer hasn't.
fn setup_camera(
    mut commands: Commands,
    res_manager: Option<Res<TileMapResources>>,
    cameras: Query<(Entity, Has<PanCam>), With<MapViewerMarker>>,
    mut spawned: Local<bool>,
) {
    if cameras.is_empty() {
        if *spawned {
            return;
        }
        let Some(res_manager) = res_manager else {
            error!("TileMapResources not found. Please add the tilemap addon first.");
            *spawned = true;
            return;
        };
        let starting = res_manager
            .location_manager
            .location
            .to_game_coords(res_manager.clone());

        commands.spawn((
            Camera2d,
            MapViewerMarker,
            RenderLayers::from_layers(&[0, 1]),
            Transform {
                translation: Vec3::new(starting.x, starting.y, 1.0),
                ..Default::default()
            },
            pancam(),
        ));
        *spawned = true;
        return;
    }

    for (entity, has_pancam) in &cameras {
        if !has_pancam {
            commands
                .entity(entity)
                .insert((pancam(), RenderLayers::from_layers(&[0, 1])));
        }
    }
}

fn handle_pancam(mut query: Query<&mut PanCam>, state: Res<EguiBlockInputState>) {
    if state.is_changed() {
        for mut pancam in &mut query {
            pancam.enabled = !state.block_input;
        }
    }
}
