use bevy::{prelude::*, render::view::RenderLayers};
use bevy_map_viewer::{Coord, TileMapResources, ZoomChangedEvent};

use crate::{
    sync::RenderSurface,
    types::{FeatureGeometry, LatLng, MapFeature},
};

use super::{CLUSTER_ICON, FeatureStyle, IconStyle, STATION_ICON, feature_style, hex_color};

/// Icon radius in world units at scale 1.0.
const ICON_BASE_RADIUS: f32 = 6.0;

pub struct FeatureRenderPlugin;

impl Plugin for FeatureRenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PreStartup, setup_icon_assets)
            .add_systems(Update, (relayout_features, draw_feature_strokes).chain());
    }
}

#[derive(Clone)]
pub struct IconAsset {
    pub mesh: Handle<Mesh>,
    pub material: Handle<ColorMaterial>,
    pub radius: f32,
}

/// Meshes and materials shared by every icon of the same style.
#[derive(Resource, Clone)]
pub struct IconAssets {
    pub station: IconAsset,
    pub cluster: IconAsset,
    /// Point features that are styled as lines, e.g. a route terminus.
    pub marker: IconAsset,
}

impl IconAssets {
    fn for_style(&self, style: &FeatureStyle) -> &IconAsset {
        match style {
            FeatureStyle::Icon(icon) if *icon == CLUSTER_ICON => &self.cluster,
            FeatureStyle::Icon(_) => &self.station,
            FeatureStyle::Line { .. } => &self.marker,
        }
    }
}

fn icon_asset(
    style: &IconStyle,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<ColorMaterial>,
) -> IconAsset {
    let radius = ICON_BASE_RADIUS * style.scale;
    let fill = hex_color(style.fill).with_alpha(style.fill_opacity);
    IconAsset {
        mesh: meshes.add(Circle::new(radius)),
        material: materials.add(fill),
        radius,
    }
}

fn setup_icon_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
) {
    let marker = IconStyle {
        scale: 0.8,
        ..STATION_ICON
    };
    commands.insert_resource(IconAssets {
        station: icon_asset(&STATION_ICON, &mut meshes, &mut materials),
        cluster: icon_asset(&CLUSTER_ICON, &mut meshes, &mut materials),
        marker: icon_asset(&marker, &mut meshes, &mut materials),
    });
}

#[derive(Component, Clone, Copy, Debug)]
pub struct FeatureIcon {
    pub radius: f32,
}

/// Polyline geometry in world space, drawn every frame with gizmos.
#[derive(Component, Clone, Debug)]
pub struct FeatureStroke {
    pub color: Color,
    pub paths: Vec<Vec<Vec2>>,
}

/// Loaded once, never refetched.
#[derive(Component)]
pub struct StaticFeature;

/// Part of the viewport dependent layer.
#[derive(Component)]
pub struct DynamicFeature;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureLayer {
    Static,
    Dynamic,
}

impl FeatureLayer {
    fn elevation(self) -> f32 {
        match self {
            FeatureLayer::Static => 1.0,
            FeatureLayer::Dynamic => 2.0,
        }
    }
}

pub fn project(tiles: &TileMapResources, at: LatLng) -> Vec2 {
    Coord::new(at.lat as f32, at.lng as f32).to_game_coords(tiles.clone())
}

fn project_paths(tiles: &TileMapResources, geometry: &FeatureGeometry) -> Vec<Vec<Vec2>> {
    geometry
        .paths()
        .into_iter()
        .map(|path| path.iter().map(|at| project(tiles, *at)).collect())
        .collect()
}

/// Draws features as ECS entities; a handle is the feature's entity.
pub struct EntitySurface<'a, 'w, 's> {
    pub commands: &'a mut Commands<'w, 's>,
    pub icons: &'a IconAssets,
    pub tiles: &'a TileMapResources,
    pub layer: FeatureLayer,
}

impl RenderSurface for EntitySurface<'_, '_, '_> {
    type Handle = Entity;

    fn add_feature(&mut self, feature: MapFeature) -> Entity {
        let style = feature_style(&feature);
        let elevation = self.layer.elevation();

        let mut entity = match &feature.geometry {
            FeatureGeometry::Point(at) => {
                let icon = self.icons.for_style(&style).clone();
                let position = project(self.tiles, *at);
                self.commands.spawn((
                    Mesh2d(icon.mesh),
                    MeshMaterial2d(icon.material),
                    Transform::from_xyz(position.x, position.y, elevation),
                    FeatureIcon {
                        radius: icon.radius,
                    },
                    RenderLayers::layer(1),
                ))
            }
            geometry => {
                let stroke = match style {
                    FeatureStyle::Line { stroke } => stroke,
                    FeatureStyle::Icon(icon) => icon.stroke,
                };
                let paths = project_paths(self.tiles, geometry);
                self.commands.spawn((
                    FeatureStroke {
                        color: hex_color(stroke),
                        paths,
                    },
                    Transform::from_xyz(0.0, 0.0, elevation),
                ))
            }
        };

        match self.layer {
            FeatureLayer::Static => entity.insert(StaticFeature),
            FeatureLayer::Dynamic => entity.insert(DynamicFeature),
        };
        entity.insert(feature).id()
    }

    fn remove_feature(&mut self, entity: Entity) {
        self.commands.entity(entity).despawn();
    }
}

/// World coordinates depend on the tile zoom, so every drawn feature is
/// moved when it changes. Entities are kept; only positions are recomputed.
pub fn relayout_features(
    mut zoom_change: EventReader<ZoomChangedEvent>,
    tiles: Res<TileMapResources>,
    mut icons: Query<(&MapFeature, &mut Transform), With<FeatureIcon>>,
    mut strokes: Query<(&MapFeature, &mut FeatureStroke)>,
) {
    if zoom_change.is_empty() {
        return;
    }
    zoom_change.clear();

    for (feature, mut transform) in &mut icons {
        if let Some(at) = feature.anchor() {
            let position = project(&tiles, at);
            transform.translation.x = position.x;
            transform.translation.y = position.y;
        }
    }
    for (feature, mut stroke) in &mut strokes {
        stroke.paths = project_paths(&tiles, &feature.geometry);
    }
}

pub fn draw_feature_strokes(mut gizmos: Gizmos, strokes: Query<&FeatureStroke>) {
    for stroke in &strokes {
        for path in &stroke.paths {
            gizmos.linestrip_2d(path.iter().copied(), stroke.color);
        }
    }
}
