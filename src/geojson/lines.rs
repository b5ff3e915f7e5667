use bevy::prelude::*;
use bevy_map_viewer::TileMapResources;
use crossbeam_channel::{Receiver, TryRecvError, bounded};

use crate::{settings::ViewerConfig, sync::DisplayedFeatureSet, types::MapFeature};

use super::{EntitySurface, FeatureError, FeatureLayer, IconAssets, features_from_location};

/// The route lines: fetched once at startup and never refetched.
pub struct RouteLinesPlugin;

impl Plugin for RouteLinesPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RouteLayer>()
            .add_systems(Startup, load_route_lines)
            .add_systems(FixedUpdate, read_route_lines_receiver);
    }
}

#[derive(Resource)]
pub struct RouteLinesReceiver {
    location: String,
    receiver: Receiver<Result<Vec<MapFeature>, FeatureError>>,
}

#[derive(Resource, Default)]
pub struct RouteLayer {
    pub displayed: DisplayedFeatureSet<Entity>,
}

pub fn load_route_lines(mut commands: Commands, config: Res<ViewerConfig>) {
    let (tx, rx) = bounded(1);
    let agent = config.http_agent();
    let location = config.route_lines.clone();
    info!("Loading route lines from {location}");

    let source = location.clone();
    std::thread::spawn(move || {
        // Nobody is listening if the app closed before the lines arrived.
        let _ = tx.send(features_from_location(&agent, &source));
    });
    commands.insert_resource(RouteLinesReceiver {
        location,
        receiver: rx,
    });
}

pub fn read_route_lines_receiver(
    mut commands: Commands,
    receiver: Option<Res<RouteLinesReceiver>>,
    icons: Option<Res<IconAssets>>,
    tiles: Res<TileMapResources>,
    mut layer: ResMut<RouteLayer>,
) {
    let (Some(receiver), Some(icons)) = (receiver, icons) else {
        return;
    };
    match receiver.receiver.try_recv() {
        Ok(Ok(features)) => {
            info!("Got {} route features", features.len());
            let displayed = std::mem::take(&mut layer.displayed);
            let mut surface = EntitySurface {
                commands: &mut commands,
                icons: &icons,
                tiles: &tiles,
                layer: FeatureLayer::Static,
            };
            layer.displayed = displayed.replace(&mut surface, features);
        }
        Ok(Err(err)) => error!("Couldn't load route lines from {}: {err}", receiver.location),
        Err(TryRecvError::Empty) => return,
        Err(TryRecvError::Disconnected) => {
            warn!("Route lines loader for {} stopped without a result", receiver.location)
        }
    }
    commands.remove_resource::<RouteLinesReceiver>();
}
