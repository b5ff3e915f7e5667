use bevy::{
    color::palettes::css::GOLD,
    diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin},
    prelude::*,
};

use crate::sync::{PendingFetch, SettleState, StationLayer};

pub struct DebugPlugin;

impl Plugin for DebugPlugin {
    fn build(&self, app: &mut App) {
        if cfg!(debug_assertions) {
            app.add_plugins(FrameTimeDiagnosticsPlugin::default())
                .add_systems(Startup, debug_draw_overlay)
                .add_systems(Update, (text_update_fps, text_update_layer));
        }
    }
}

#[derive(Component)]
pub struct FpsText;

/// Stations on screen and fetches still in flight.
#[derive(Component)]
pub struct LayerText;

fn overlay_line(
    commands: &mut Commands,
    label: &str,
    node: Node,
    marker: impl Component,
) {
    commands
        .spawn((
            Text::new(label),
            TextFont {
                font_size: 18.0,
                ..default()
            },
            node,
        ))
        .with_child((
            TextSpan::default(),
            TextFont {
                font_size: 16.0,
                ..default()
            },
            TextColor(GOLD.into()),
            marker,
        ));
}

pub fn debug_draw_overlay(mut commands: Commands) {
    overlay_line(
        &mut commands,
        "FPS: ",
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(5.0),
            right: Val::Px(5.0),
            ..default()
        },
        FpsText,
    );
    overlay_line(
        &mut commands,
        "Stations: ",
        Node {
            position_type: PositionType::Absolute,
            bottom: Val::Px(5.0),
            right: Val::Px(5.0),
            ..default()
        },
        LayerText,
    );
}

pub fn text_update_fps(
    diagnostics: Res<DiagnosticsStore>,
    mut query: Query<&mut TextSpan, With<FpsText>>,
) {
    for mut span in &mut query {
        if let Some(value) = diagnostics
            .get(&FrameTimeDiagnosticsPlugin::FPS)
            .and_then(|fps| fps.smoothed())
        {
            **span = format!("{value:.2}");
        }
    }
}

pub fn text_update_layer(
    layer: Res<StationLayer>,
    settle: Res<SettleState>,
    pending: Query<(), With<PendingFetch>>,
    mut query: Query<&mut TextSpan, With<LayerText>>,
) {
    let shown = match layer.synchronizer.newest_applied() {
        Some(sequence) => format!("#{sequence}"),
        None => "none".to_string(),
    };
    let camera = if settle.0.is_moving() { "moving" } else { "settled" };
    for mut span in &mut query {
        **span = format!(
            "{} from {shown} ({} issued, {} in flight, {camera})",
            layer.displayed.len(),
            layer.synchronizer.issued(),
            pending.iter().count()
        );
    }
}
