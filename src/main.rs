use bevy::{
    prelude::*,
    winit::{UpdateMode, WinitSettings},
};
use bevy_egui::{EguiContexts, EguiPlugin, EguiPreUpdateSet};
use bevy_map_viewer::EguiBlockInputState;

use camera::CameraSystemPlugin;
use debug::DebugPlugin;
use geojson::{FeatureRenderPlugin, RouteLinesPlugin, background_color};
use interaction::InteractionPlugin;
use settings::SettingsPlugin;
use sync::ViewportSyncPlugin;

pub mod camera;
pub mod debug;
pub mod geojson;
pub mod interaction;
pub mod settings;
pub mod stations;
pub mod sync;
pub mod types;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Subway Map".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }))
        // Loads the config every other plugin reads.
        .add_plugins(SettingsPlugin)
        .add_plugins(EguiPlugin {
            enable_multipass_for_primary_context: false,
        })
        .add_plugins((
            CameraSystemPlugin,
            FeatureRenderPlugin,
            RouteLinesPlugin,
            ViewportSyncPlugin,
            InteractionPlugin,
        ))
        .add_plugins(DebugPlugin)
        .insert_resource(WinitSettings {
            unfocused_mode: UpdateMode::Reactive {
                wait: std::time::Duration::from_secs(1),
                react_to_device_events: true,
                react_to_user_events: true,
                react_to_window_events: true,
            },
            ..Default::default()
        })
        .insert_resource(ClearColor(background_color()))
        .add_systems(
            Update,
            absorb_egui_inputs.after(EguiPreUpdateSet::InitContexts),
        )
        .run();
}

fn absorb_egui_inputs(
    mut contexts: EguiContexts,
    state: Option<ResMut<EguiBlockInputState>>,
) {
    let Some(mut state) = state else {
        return;
    };
    let ctx = contexts.ctx_mut();
    let block_input = ctx.wants_pointer_input() || ctx.is_pointer_over_area();
    if state.block_input != block_input {
        state.block_input = block_input;
    }
}
