use bevy::{prelude::*, window::PrimaryWindow};
use bevy_egui::{EguiContexts, EguiPreUpdateSet, egui};
use bevy_map_viewer::{EguiBlockInputState, MapViewerMarker, TileMapResources};

use crate::{
    geojson::{FeatureIcon, FeatureStroke, project},
    settings::ViewerConfig,
    types::{LatLng, MapFeature},
};

/// Screen offset of an info window from its anchor; negative y is up.
pub const INFO_PIXEL_OFFSET: Vec2 = Vec2::new(0.0, -30.0);

pub struct InteractionPlugin;

impl Plugin for InteractionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InfoWindow>()
            .add_systems(Update, handle_feature_click)
            .add_systems(
                Update,
                draw_info_window
                    .after(EguiPreUpdateSet::InitContexts)
                    .after(handle_feature_click),
            );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfoContent {
    pub title: String,
    pub description: String,
}

impl InfoContent {
    /// Bold title, line break, description.
    pub fn markup(&self) -> String {
        format!("<b>{}</b><br/> {}", self.title, self.description)
    }
}

/// Something that can pop up feature details over the map.
pub trait InfoDisplay {
    fn show(&mut self, content: InfoContent, anchor: LatLng, pixel_offset: Vec2);
}

/// Shows `feature`'s details on `display`. Features without a description
/// are ignored and nothing is shown; returns whether anything was.
pub fn show_feature_info(feature: &MapFeature, display: &mut impl InfoDisplay) -> bool {
    let Some(description) = feature.description.as_deref() else {
        return false;
    };
    let Some(anchor) = feature.anchor() else {
        return false;
    };
    let content = InfoContent {
        title: feature.title.clone().unwrap_or_default(),
        description: description.to_string(),
    };
    display.show(content, anchor, INFO_PIXEL_OFFSET);
    true
}

/// Closest candidate within its own reach. Candidates are
/// `(item, distance, reach)`.
pub fn pick_nearest<T>(candidates: impl IntoIterator<Item = (T, f32, f32)>) -> Option<T> {
    candidates
        .into_iter()
        .filter(|(_, distance, reach)| distance <= reach)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(item, _, _)| item)
}

pub fn distance_to_path(point: Vec2, path: &[Vec2]) -> f32 {
    match path {
        [] => f32::INFINITY,
        [only] => point.distance(*only),
        _ => path
            .windows(2)
            .map(|segment| distance_to_segment(point, segment[0], segment[1]))
            .fold(f32::INFINITY, f32::min),
    }
}

fn distance_to_segment(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let length_squared = ab.length_squared();
    if length_squared == 0.0 {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / length_squared).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenInfoWindow {
    pub content: InfoContent,
    pub anchor: LatLng,
    pub pixel_offset: Vec2,
}

/// The single info window. Showing new content replaces whatever was open.
#[derive(Resource, Debug, Default)]
pub struct InfoWindow {
    pub open: Option<OpenInfoWindow>,
}

impl InfoDisplay for InfoWindow {
    fn show(&mut self, content: InfoContent, anchor: LatLng, pixel_offset: Vec2) {
        self.open = Some(OpenInfoWindow {
            content,
            anchor,
            pixel_offset,
        });
    }
}

pub fn handle_feature_click(
    buttons: Res<ButtonInput<MouseButton>>,
    q_windows: Query<&Window, With<PrimaryWindow>>,
    camera: Query<(&Camera, &GlobalTransform, &Projection), With<MapViewerMarker>>,
    icons: Query<(&MapFeature, &GlobalTransform, &FeatureIcon)>,
    strokes: Query<(&MapFeature, &FeatureStroke)>,
    state: Res<EguiBlockInputState>,
    config: Res<ViewerConfig>,
    mut info: ResMut<InfoWindow>,
) {
    if !buttons.just_pressed(MouseButton::Left) || state.block_input {
        return;
    }
    let Ok((camera, camera_transform, projection)) = camera.single() else {
        return;
    };
    let Some(cursor) = q_windows.single().ok().and_then(Window::cursor_position) else {
        return;
    };
    let Ok(world) = camera.viewport_to_world_2d(camera_transform, cursor) else {
        return;
    };

    let scale = match projection {
        Projection::Orthographic(ortho) => ortho.scale,
        _ => 1.0,
    };
    let slack = config.pick_radius_px * scale;

    let icon_hits = icons.iter().map(|(feature, transform, icon)| {
        let distance = world.distance(transform.translation().truncate());
        (feature, distance, icon.radius.max(slack))
    });
    let stroke_hits = strokes.iter().map(|(feature, stroke)| {
        let distance = stroke
            .paths
            .iter()
            .map(|path| distance_to_path(world, path))
            .fold(f32::INFINITY, f32::min);
        (feature, distance, slack)
    });

    if let Some(feature) = pick_nearest(icon_hits.chain(stroke_hits)) {
        if !show_feature_info(feature, &mut *info) {
            debug!("Clicked {:?} without a description", feature.title);
        }
    }
}

pub fn draw_info_window(
    mut contexts: EguiContexts,
    mut info: ResMut<InfoWindow>,
    camera: Query<(&Camera, &GlobalTransform), With<MapViewerMarker>>,
    tiles: Res<TileMapResources>,
) {
    let Some(open) = info.open.clone() else {
        return;
    };
    let Ok((camera, camera_transform)) = camera.single() else {
        return;
    };
    let world = project(&tiles, open.anchor);
    let Ok(screen) = camera.world_to_viewport(camera_transform, world.extend(0.0)) else {
        return;
    };
    let position = screen + open.pixel_offset;

    let ctx = contexts.ctx_mut();
    let mut close = false;
    egui::Area::new("info_window".into())
        .fixed_pos(egui::pos2(position.x, position.y))
        .pivot(egui::Align2::CENTER_BOTTOM)
        .show(ctx, |ui| {
            egui::Frame::new()
                .fill(egui::Color32::from_rgb(245, 241, 230))
                .corner_radius(6.0)
                .inner_margin(8.0)
                .shadow(egui::epaint::Shadow {
                    color: egui::Color32::from_black_alpha(60),
                    offset: [2, 2],
                    blur: 6,
                    spread: 1,
                })
                .show(ui, |ui| {
                    ui.set_max_width(240.0);
                    ui.horizontal(|ui| {
                        ui.label(
                            egui::RichText::new(open.content.title.as_str())
                                .strong()
                                .color(egui::Color32::from_rgb(82, 55, 53)),
                        );
                        if ui.small_button("x").clicked() {
                            close = true;
                        }
                    });
                    ui.label(open.content.description.as_str());
                });
        });

    if close {
        info.open = None;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use crate::types::FeatureGeometry;

    use super::*;

    #[derive(Default)]
    struct RecordingDisplay {
        shown: Vec<(InfoContent, LatLng, Vec2)>,
    }

    impl InfoDisplay for RecordingDisplay {
        fn show(&mut self, content: InfoContent, anchor: LatLng, pixel_offset: Vec2) {
            self.shown.push((content, anchor, pixel_offset));
        }
    }

    fn feature(properties: serde_json::Value) -> MapFeature {
        MapFeature::new(
            FeatureGeometry::Point(LatLng::new(40.73, -73.99)),
            properties.as_object().cloned().unwrap_or_else(Map::new),
        )
    }

    #[test]
    fn described_feature_opens_info_window() {
        let mut display = RecordingDisplay::default();
        let astor = feature(json!({"type": "station", "title": "Astor Pl Station", "description": "6 all times"}));

        assert!(show_feature_info(&astor, &mut display));
        let (content, anchor, offset) = &display.shown[0];
        assert_eq!(content.markup(), "<b>Astor Pl Station</b><br/> 6 all times");
        assert_eq!(*anchor, LatLng::new(40.73, -73.99));
        assert_eq!(*offset, Vec2::new(0.0, -30.0));
    }

    #[test]
    fn feature_without_description_shows_nothing() {
        let mut display = RecordingDisplay::default();
        assert!(!show_feature_info(&feature(json!({"title": "Route 6"})), &mut display));
        assert!(!show_feature_info(
            &feature(json!({"title": "Blank", "description": ""})),
            &mut display
        ));
        assert!(display.shown.is_empty());
    }

    #[test]
    fn new_click_replaces_open_window() {
        let mut window = InfoWindow::default();
        show_feature_info(&feature(json!({"title": "A", "description": "first"})), &mut window);
        show_feature_info(&feature(json!({"title": "B", "description": "second"})), &mut window);
        let open = window.open.unwrap();
        assert_eq!(open.content.title, "B");
        assert_eq!(open.content.description, "second");
    }

    #[test]
    fn picks_closest_within_reach() {
        let picked = pick_nearest([("far", 30.0, 10.0), ("near", 4.0, 10.0), ("nearer", 3.0, 2.0)]);
        assert_eq!(picked, Some("near"));
        assert_eq!(pick_nearest([("none", 11.0, 10.0)]), None);
    }

    #[test]
    fn path_distance_uses_nearest_segment() {
        let path = [Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0)];
        assert_eq!(distance_to_path(Vec2::new(5.0, 3.0), &path), 3.0);
        assert_eq!(distance_to_path(Vec2::new(12.0, 5.0), &path), 2.0);
        assert_eq!(distance_to_path(Vec2::new(-4.0, 3.0), &path), 5.0);
        assert_eq!(distance_to_path(Vec2::ZERO, &[]), f32::INFINITY);
    }
}
