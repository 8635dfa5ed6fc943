pub mod feature;
pub mod geometry;
pub mod mercator;
pub mod style;

pub use feature::{Feature, FeatureCollection, FeatureId, HoverState, build_features};
pub use geometry::{Extent, Polygon};
pub use style::{
    Expr, ResolvedStyle, Rgba, StyleError, StyleRule, StyleTarget, Value, common_rules,
    filtered_rules, resolve, validate_rules,
};
