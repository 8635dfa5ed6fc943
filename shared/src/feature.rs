use serde::{Deserialize, Serialize};

use crate::geometry::{Extent, Polygon};
use crate::mercator;
use crate::style::Value;

/// Per-feature interaction state, exposed to style expressions as the
/// numeric `hover` property (0/1/2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoverState {
    #[default]
    None,
    Hovered,
    Selected,
}

impl HoverState {
    pub fn code(self) -> f64 {
        match self {
            HoverState::None => 0.0,
            HoverState::Hovered => 1.0,
            HoverState::Selected => 2.0,
        }
    }
}

/// A styled polygon placed on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub kind: String,
    pub hover: HoverState,
    pub geometry: Polygon,
}

impl Feature {
    /// Attribute lookup for style expressions (`get("...")`).
    pub fn property(&self, key: &str) -> Option<Value> {
        match key {
            "hover" => Some(Value::Number(self.hover.code())),
            "kind" => Some(Value::Text(self.kind.clone())),
            "name" => Some(Value::Text(self.name.clone())),
            _ => None,
        }
    }
}

/// Stable index into a `FeatureCollection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureId(pub usize);

/// Ordered arena of features. Features are created once at startup and never
/// removed, so a `FeatureId` stays valid for the whole session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn push(&mut self, feature: Feature) -> FeatureId {
        self.features.push(feature);
        FeatureId(self.features.len() - 1)
    }

    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(id.0)
    }

    pub fn set_hover(&mut self, id: FeatureId, state: HoverState) {
        if let Some(feature) = self.features.get_mut(id.0) {
            feature.hover = state;
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (FeatureId, &Feature)> {
        self.features
            .iter()
            .enumerate()
            .map(|(i, f)| (FeatureId(i), f))
    }

    /// Bounding extent of every feature, or `None` when empty.
    pub fn extent(&self) -> Option<Extent> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.extent())
            .reduce(|acc, e| acc.union(&e))
    }
}

/// Authored source polygon over the Alboran Sea, lon/lat degrees.
/// One exterior ring and one interior ring; rings are open.
const SOURCE_EXTERIOR: [[f64; 2]; 6] = [
    [-4.637_467_859_9, 36.213_865_258_5],
    [-4.958_198_030_2, 36.048_936_954_6],
    [-4.839_746_546_8, 35.762_438_583_5],
    [-4.473_458_113_8, 35.723_963_128_5],
    [-4.340_427_986_4, 35.930_918_981_3],
    [-4.404_209_554_3, 36.144_696_481_3],
];

const SOURCE_HOLE: [[f64; 2]; 5] = [
    [-4.652_046_504, 36.054_833_217_6],
    [-4.763_208_665_3, 36.025_347_486],
    [-4.788_721_292_5, 35.919_107_476_2],
    [-4.670_269_809_2, 35.886_616_741_7],
    [-4.551_818_325_8, 35.914_677_706_9],
];

/// Offsets for the two derived copies, EPSG:3857 meters.
const COPY_EAST_DX: f64 = 70_000.0;
const COPY_SOUTH_DY: f64 = -70_000.0;

fn project_ring(ring: &[[f64; 2]]) -> Vec<[f64; 2]> {
    ring.iter().map(|p| mercator::project(p[0], p[1])).collect()
}

/// Build the fixed startup feature set: the authored polygon plus an eastward
/// and a southward copy. Two features are `type2`, one is `type3`; all start
/// with no hover state.
pub fn build_features() -> FeatureCollection {
    let authored = Polygon::new(
        project_ring(&SOURCE_EXTERIOR),
        vec![project_ring(&SOURCE_HOLE)],
    );
    let east = authored.translated(COPY_EAST_DX, 0.0);
    let south = authored.translated(0.0, COPY_SOUTH_DY);

    let mut collection = FeatureCollection::default();
    for (name, kind, geometry) in [
        ("F1", "type2", authored),
        ("F2", "type2", east),
        ("F3", "type3", south),
    ] {
        collection.push(Feature {
            name: name.to_string(),
            kind: kind.to_string(),
            hover: HoverState::None,
            geometry,
        });
    }
    collection
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_three_features_with_no_hover() {
        let features = build_features();
        assert_eq!(features.len(), 3);
        for (_, f) in features.iter() {
            assert_eq!(f.hover, HoverState::None);
            assert_eq!(f.geometry.holes.len(), 1);
        }
    }

    #[test]
    fn kinds_and_names_match_source_data() {
        let features = build_features();
        let summary: Vec<(&str, &str)> = features
            .iter()
            .map(|(_, f)| (f.name.as_str(), f.kind.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![("F1", "type2"), ("F2", "type2"), ("F3", "type3")]
        );
    }

    #[test]
    fn copies_are_translated_not_shared() {
        let features = build_features();
        let e1 = features.get(FeatureId(0)).unwrap().geometry.extent().unwrap();
        let e2 = features.get(FeatureId(1)).unwrap().geometry.extent().unwrap();
        let e3 = features.get(FeatureId(2)).unwrap().geometry.extent().unwrap();

        let tol = 1e-6;
        assert!((e2.min_x - e1.min_x - COPY_EAST_DX).abs() < tol);
        assert!((e2.min_y - e1.min_y).abs() < tol);
        assert!((e3.min_y - e1.min_y - COPY_SOUTH_DY).abs() < tol);
        assert!((e3.min_x - e1.min_x).abs() < tol);
    }

    #[test]
    fn authored_polygon_lands_in_the_alboran_sea() {
        let features = build_features();
        let extent = features.get(FeatureId(0)).unwrap().geometry.extent().unwrap();
        // Rough sanity bounds: west of Greenwich, mid-northern latitudes.
        assert!(extent.min_x < -480_000.0 && extent.max_x < -450_000.0);
        assert!(extent.min_y > 4_200_000.0 && extent.max_y < 4_400_000.0);
    }

    #[test]
    fn hover_property_tracks_state_code() {
        let mut features = build_features();
        let id = FeatureId(0);
        assert_eq!(
            features.get(id).unwrap().property("hover"),
            Some(Value::Number(0.0))
        );
        features.set_hover(id, HoverState::Selected);
        assert_eq!(
            features.get(id).unwrap().property("hover"),
            Some(Value::Number(2.0))
        );
        assert_eq!(features.get(id).unwrap().property("bogus"), None);
    }

    #[test]
    fn collection_extent_unions_all_features() {
        let features = build_features();
        let all = features.extent().unwrap();
        for (_, f) in features.iter() {
            let e = f.geometry.extent().unwrap();
            assert!(all.min_x <= e.min_x && all.max_x >= e.max_x);
            assert!(all.min_y <= e.min_y && all.max_y >= e.max_y);
        }
    }
}
