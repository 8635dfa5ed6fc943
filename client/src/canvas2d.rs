use web_sys::{CanvasRenderingContext2d, CanvasWindingRule};

use alboran_shared::{FeatureCollection, Polygon, StyleError, StyleRule, StyleTarget, resolve,
    validate_rules};

use crate::viewport::Viewport;

/// Conventional canvas vector backend.
///
/// The CPU style compiler runs at construction and style-assignment time:
/// a rule set it rejects (see `StyleTarget::Cpu`) never produces a layer,
/// so the failure is visible instead of a silent mis-render.
pub struct CanvasVectorLayer {
    rules: Vec<StyleRule>,
}

impl CanvasVectorLayer {
    pub fn new(rules: &[StyleRule]) -> Result<Self, StyleError> {
        validate_rules(rules, StyleTarget::Cpu)?;
        Ok(Self {
            rules: rules.to_vec(),
        })
    }

    pub fn set_rules(&mut self, rules: &[StyleRule]) -> Result<(), StyleError> {
        validate_rules(rules, StyleTarget::Cpu)?;
        self.rules = rules.to_vec();
        Ok(())
    }

    /// Draw every styled feature into the overlay context. Features the rule
    /// set resolves to no style are skipped entirely.
    pub fn draw(
        &self,
        ctx: &CanvasRenderingContext2d,
        vp: &Viewport,
        features: &FeatureCollection,
    ) {
        for (_, feature) in features.iter() {
            let Ok(Some(style)) = resolve(&self.rules, feature) else {
                continue;
            };

            trace_polygon(ctx, vp, &feature.geometry);
            ctx.set_fill_style_str(&style.fill_color.css());
            ctx.fill_with_canvas_winding_rule(CanvasWindingRule::Evenodd);
            ctx.set_stroke_style_str(&style.stroke_color.css());
            ctx.set_line_width(style.stroke_width);
            ctx.stroke();
        }
    }
}

/// Build one path from all rings; even-odd fill turns interior rings into
/// holes without caring about winding.
fn trace_polygon(ctx: &CanvasRenderingContext2d, vp: &Viewport, polygon: &Polygon) {
    ctx.begin_path();
    for ring in std::iter::once(&polygon.exterior).chain(polygon.holes.iter()) {
        let mut points = ring.iter().map(|p| vp.world_to_screen(p[0], p[1]));
        let Some((sx, sy)) = points.next() else {
            continue;
        };
        ctx.move_to(sx, sy);
        for (sx, sy) in points {
            ctx.line_to(sx, sy);
        }
        ctx.close_path();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alboran_shared::{Expr, Value, common_rules, filtered_rules};

    /// The shipped width expression rewritten in the explicit three-branch
    /// form the CPU compiler accepts.
    fn cpu_compatible_rules() -> Vec<StyleRule> {
        let mut rules = common_rules();
        rules[0].stroke_width = Expr::matching(
            Expr::get("hover"),
            [
                (Value::from(2.0), Expr::literal(5.0)),
                (Value::from(1.0), Expr::literal(1.0)),
            ],
            Expr::literal(1.0),
        );
        rules
    }

    #[test]
    fn shipped_rule_sets_are_rejected_at_construction() {
        for rules in [common_rules(), filtered_rules()] {
            let err = CanvasVectorLayer::new(&rules).err().unwrap();
            assert!(matches!(err, StyleError::ShortMatch { .. }));
        }
    }

    #[test]
    fn explicit_three_branch_rules_are_accepted() {
        assert!(CanvasVectorLayer::new(&cpu_compatible_rules()).is_ok());
    }

    #[test]
    fn style_assignment_revalidates() {
        let mut layer = CanvasVectorLayer::new(&cpu_compatible_rules()).unwrap();
        let err = layer.set_rules(&common_rules()).err().unwrap();
        assert!(matches!(err, StyleError::ShortMatch { .. }));
        assert!(layer.set_rules(&cpu_compatible_rules()).is_ok());
    }
}
