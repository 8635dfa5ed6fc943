use alboran_shared::{FeatureCollection, FeatureId, StyleRule, resolve};

/// Find the topmost styled feature at a world coordinate.
///
/// Mirrors renderer hit-testing semantics: features the active rule set
/// resolves to no style are not drawn, so they are not hittable either.
/// Later features draw on top, hence the reverse scan.
pub fn feature_at(
    features: &FeatureCollection,
    rules: &[StyleRule],
    wx: f64,
    wy: f64,
) -> Option<FeatureId> {
    features.iter().rev().find_map(|(id, feature)| {
        let extent = feature.geometry.extent()?;
        if !extent.contains(wx, wy) {
            return None;
        }
        if resolve(rules, feature).ok().flatten().is_none() {
            return None;
        }
        feature.geometry.contains(wx, wy).then_some(id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alboran_shared::mercator::project;
    use alboran_shared::{build_features, common_rules, filtered_rules};

    // Inside the authored exterior, east of the interior ring.
    const INSIDE_F1: (f64, f64) = (-4.40, 35.95);
    // Inside the interior ring (the hole).
    const INSIDE_HOLE: (f64, f64) = (-4.67, 35.96);

    #[test]
    fn hits_the_feature_under_the_point() {
        let features = build_features();
        let rules = common_rules();
        let [wx, wy] = project(INSIDE_F1.0, INSIDE_F1.1);
        assert_eq!(feature_at(&features, &rules, wx, wy), Some(FeatureId(0)));
        // The eastward copy is 70 km to the right.
        assert_eq!(
            feature_at(&features, &rules, wx + 70_000.0, wy),
            Some(FeatureId(1))
        );
        // The southward copy.
        assert_eq!(
            feature_at(&features, &rules, wx, wy - 70_000.0),
            Some(FeatureId(2))
        );
    }

    #[test]
    fn the_hole_is_not_part_of_the_feature() {
        let features = build_features();
        let rules = common_rules();
        let [wx, wy] = project(INSIDE_HOLE.0, INSIDE_HOLE.1);
        assert_eq!(feature_at(&features, &rules, wx, wy), None);
    }

    #[test]
    fn open_water_hits_nothing() {
        let features = build_features();
        let rules = common_rules();
        let [wx, wy] = project(-3.0, 36.5);
        assert_eq!(feature_at(&features, &rules, wx, wy), None);
    }

    #[test]
    fn filtered_rules_make_unstyled_features_unhittable() {
        let features = build_features();
        let [wx, wy] = project(INSIDE_F1.0, INSIDE_F1.1);
        let (wx3, wy3) = (wx, wy - 70_000.0);

        assert_eq!(
            feature_at(&features, &common_rules(), wx3, wy3),
            Some(FeatureId(2))
        );
        // F3 is type3: invisible under the filtered set, so not hittable.
        assert_eq!(feature_at(&features, &filtered_rules(), wx3, wy3), None);
        // F1 stays hittable either way.
        assert_eq!(
            feature_at(&features, &filtered_rules(), wx, wy),
            Some(FeatureId(0))
        );
    }
}
