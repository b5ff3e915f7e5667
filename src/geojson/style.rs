use bevy::prelude::*;

use crate::types::{FeatureKind, MapFeature};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Styler {
    Color(&'static str),
    Visibility(bool),
}

/// One entry of the map theme. `None` matches every feature/element type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleRule {
    pub feature_type: Option<&'static str>,
    pub element_type: Option<&'static str>,
    pub styler: Styler,
}

const fn rule(
    feature_type: Option<&'static str>,
    element_type: Option<&'static str>,
    styler: Styler,
) -> StyleRule {
    StyleRule {
        feature_type,
        element_type,
        styler,
    }
}

use Styler::{Color as C, Visibility as V};

/// Warm "retro" palette. Later rules override earlier ones.
pub const MAP_THEME: &[StyleRule] = &[
    rule(None, Some("geometry"), C("#ebe3cd")),
    rule(None, Some("labels.text.fill"), C("#523735")),
    rule(None, Some("labels.text.stroke"), C("#f5f1e6")),
    rule(Some("administrative"), Some("geometry.stroke"), C("#c9b2a6")),
    rule(Some("administrative.land_parcel"), None, V(false)),
    rule(Some("administrative.land_parcel"), Some("geometry.stroke"), C("#dcd2be")),
    rule(Some("administrative.land_parcel"), Some("labels.text.fill"), C("#ae9e90")),
    rule(Some("administrative.neighborhood"), None, V(false)),
    rule(Some("landscape.natural"), Some("geometry"), C("#dfd2ae")),
    rule(Some("poi"), Some("geometry"), C("#dfd2ae")),
    rule(Some("poi"), Some("labels.text"), V(false)),
    rule(Some("poi"), Some("labels.text.fill"), C("#93817c")),
    rule(Some("poi.business"), None, V(false)),
    rule(Some("poi.park"), Some("geometry.fill"), C("#a5b076")),
    rule(Some("poi.park"), Some("labels.text.fill"), C("#447530")),
    rule(Some("road"), Some("geometry"), C("#f5f1e6")),
    rule(Some("road"), Some("labels"), V(false)),
    rule(Some("road"), Some("labels.icon"), V(false)),
    rule(Some("road.arterial"), Some("geometry"), C("#fdfcf8")),
    rule(Some("road.arterial"), Some("labels"), V(false)),
    rule(Some("road.highway"), Some("geometry"), C("#f8c967")),
    rule(Some("road.highway"), Some("geometry.stroke"), C("#e9bc62")),
    rule(Some("road.highway"), Some("labels"), V(false)),
    rule(Some("road.highway.controlled_access"), Some("geometry"), C("#e98d58")),
    rule(Some("road.highway.controlled_access"), Some("geometry.stroke"), C("#db8555")),
    rule(Some("road.local"), None, V(false)),
    rule(Some("road.local"), Some("labels.text.fill"), C("#806b63")),
    rule(Some("transit"), None, V(false)),
    rule(Some("transit.line"), Some("geometry"), C("#dfd2ae")),
    rule(Some("transit.line"), Some("labels.text.fill"), C("#8f7d77")),
    rule(Some("transit.line"), Some("labels.text.stroke"), C("#ebe3cd")),
    rule(Some("transit.station"), Some("geometry"), C("#dfd2ae")),
    rule(Some("water"), Some("geometry.fill"), C("#b9d3c2")),
    rule(Some("water"), Some("labels.text"), V(false)),
    rule(Some("water"), Some("labels.text.fill"), C("#92998d")),
];

fn matches(selector: Option<&str>, wanted: Option<&str>) -> bool {
    match (selector, wanted) {
        (None, _) => true,
        (Some(selector), Some(wanted)) => {
            wanted == selector
                || wanted
                    .strip_prefix(selector)
                    .is_some_and(|rest| rest.starts_with('.'))
        }
        (Some(_), None) => false,
    }
}

fn matching_rules(
    feature_type: Option<&str>,
    element_type: Option<&str>,
) -> impl Iterator<Item = &'static StyleRule> {
    MAP_THEME.iter().filter(move |rule| {
        matches(rule.feature_type, feature_type) && matches(rule.element_type, element_type)
    })
}

/// The color the theme assigns, following the same prefix rules as feature
/// types: a `road` rule also styles `road.highway`.
pub fn theme_color(feature_type: Option<&str>, element_type: Option<&str>) -> Option<&'static str> {
    matching_rules(feature_type, element_type)
        .filter_map(|rule| match rule.styler {
            Styler::Color(color) => Some(color),
            Styler::Visibility(_) => None,
        })
        .last()
}

pub fn theme_visible(feature_type: Option<&str>, element_type: Option<&str>) -> bool {
    matching_rules(feature_type, element_type)
        .filter_map(|rule| match rule.styler {
            Styler::Visibility(visible) => Some(visible),
            Styler::Color(_) => None,
        })
        .last()
        .unwrap_or(true)
}

/// Official MTA trunk-line colors, keyed by route symbol.
pub fn route_color(symbol: &str) -> Option<&'static str> {
    Some(match symbol {
        // IND Eighth Avenue Line
        "A" | "C" | "E" => "#2850ad",
        // IND Sixth Avenue Line
        "B" | "D" | "F" | "M" => "#ff6319",
        // IND Crosstown Line
        "G" => "#6cbe45",
        // BMT Canarsie Line
        "L" => "#a7a9ac",
        // BMT Nassau Street Line
        "J" | "Z" => "#996633",
        // BMT Broadway Line
        "N" | "Q" | "R" | "W" => "#fccc0a",
        // IRT Broadway - Seventh Avenue Line
        "1" | "2" | "3" => "#ee352e",
        // IRT Lexington Avenue Line
        "4" | "5" | "6" => "#00933c",
        // IRT Flushing Line
        "7" => "#b933ad",
        // Shuttles
        "S" => "#808183",
        _ => return None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IconStyle {
    pub fill: &'static str,
    pub stroke: &'static str,
    pub fill_opacity: f32,
    pub scale: f32,
    /// Material icon outline on a 24x24 grid.
    pub path: &'static str,
}

pub const CLUSTER_ICON: IconStyle = IconStyle {
    fill: "#3bb896",
    stroke: "#3bb896",
    fill_opacity: 1.0,
    scale: 1.5,
    path: "M13 7h-2v4H7v2h4v4h2v-4h4v-2h-4V7zm-1-5C6.48 2 2 6.48 2 12s4.48 10 10 10 10-4.48 \
           10-10S17.52 2 12 2zm0 18c-4.41 0-8-3.59-8-8s3.59-8 8-8 8 3.59 8 8-3.59 8-8 8z",
};

pub const STATION_ICON: IconStyle = IconStyle {
    fill: "#683bb8",
    stroke: "#683bb8",
    fill_opacity: 1.0,
    scale: 1.2,
    path: "M12 2c-4 0-8 .5-8 4v9.5C4 17.43 5.57 19 7.5 19L6 20.5v.5h2.23l2-2H14l2 2h2v-.5L16.5 \
           19c1.93 0 3.5-1.57 3.5-3.5V6c0-3.5-3.58-4-8-4zM7.5 17c-.83 0-1.5-.67-1.5-1.5S6.67 14 \
           7.5 14s1.5.67 1.5 1.5S8.33 17 7.5 17zm3.5-7H6V6h5v4zm2 0V6h5v4h-5zm3.5 7c-.83 \
           0-1.5-.67-1.5-1.5s.67-1.5 1.5-1.5 1.5.67 1.5 1.5-.67 1.5-1.5 1.5z",
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureStyle {
    Icon(IconStyle),
    Line { stroke: &'static str },
}

pub fn feature_style(feature: &MapFeature) -> FeatureStyle {
    match feature.kind {
        FeatureKind::Cluster => FeatureStyle::Icon(CLUSTER_ICON),
        FeatureKind::Station => FeatureStyle::Icon(STATION_ICON),
        FeatureKind::Route | FeatureKind::Other(_) => FeatureStyle::Line {
            stroke: feature
                .route_symbol()
                .and_then(route_color)
                .unwrap_or_else(default_line_color),
        },
    }
}

fn default_line_color() -> &'static str {
    theme_color(Some("transit.line"), Some("geometry")).unwrap_or("#808183")
}

/// Parses a `#rrggbb` theme color. Malformed entries render magenta so they
/// are easy to spot.
pub fn hex_color(hex: &str) -> Color {
    match Srgba::hex(hex) {
        Ok(color) => Color::from(color),
        Err(err) => {
            warn!("Invalid theme color {hex:?}: {err}");
            Color::srgb(1.0, 0.0, 1.0)
        }
    }
}

pub fn background_color() -> Color {
    hex_color(theme_color(None, Some("geometry")).unwrap_or("#ebe3cd"))
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use crate::types::{FeatureGeometry, LatLng};

    use super::*;

    fn feature(properties: serde_json::Value) -> MapFeature {
        MapFeature::new(
            FeatureGeometry::Point(LatLng::default()),
            properties.as_object().cloned().unwrap_or_else(Map::new),
        )
    }

    #[test]
    fn route_symbols_share_trunk_colors() {
        assert_eq!(route_color("A"), route_color("E"));
        assert_eq!(route_color("7"), Some("#b933ad"));
        assert_eq!(route_color("S"), Some("#808183"));
        assert_eq!(route_color("X"), None);
    }

    #[test]
    fn icons_follow_feature_type() {
        assert_eq!(
            feature_style(&feature(json!({"type": "cluster"}))),
            FeatureStyle::Icon(CLUSTER_ICON)
        );
        assert_eq!(
            feature_style(&feature(json!({"type": "station"}))),
            FeatureStyle::Icon(STATION_ICON)
        );
    }

    #[test]
    fn lines_are_stroked_by_route() {
        assert_eq!(
            feature_style(&feature(json!({"rt_symbol": "L"}))),
            FeatureStyle::Line { stroke: "#a7a9ac" }
        );
        assert_eq!(
            feature_style(&feature(json!({"rt_symbol": "unknown"}))),
            FeatureStyle::Line { stroke: "#dfd2ae" }
        );
    }

    #[test]
    fn theme_rules_cascade_by_prefix() {
        assert_eq!(theme_color(None, Some("geometry")), Some("#ebe3cd"));
        assert_eq!(
            theme_color(Some("road.highway"), Some("geometry")),
            Some("#f8c967")
        );
        assert_eq!(theme_color(Some("road.local"), Some("geometry")), Some("#f5f1e6"));
        assert!(!theme_visible(Some("poi.business"), Some("geometry")));
        assert!(!theme_visible(Some("transit.line"), Some("geometry")));
        assert!(theme_visible(Some("water"), Some("geometry")));
    }

    #[test]
    fn theme_colors_parse() {
        for rule in MAP_THEME {
            if let Styler::Color(hex) = rule.styler {
                assert!(Srgba::hex(hex).is_ok(), "{hex}");
            }
        }
        assert_eq!(background_color(), Color::from(Srgba::hex("#ebe3cd").unwrap()));
    }
}
