use alboran_shared::{StyleError, StyleRule, StyleTarget, validate_rules};

use crate::canvas2d::CanvasVectorLayer;

/// Which concrete implementation draws the vector features. The basemap
/// tiles always go through the GPU tile pipeline regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VectorBackend {
    #[default]
    Gpu,
    Canvas,
}

impl VectorBackend {
    /// Value used by the `layerType` select control.
    pub fn control_value(self) -> &'static str {
        match self {
            VectorBackend::Gpu => "WEBGL",
            VectorBackend::Canvas => "vector",
        }
    }

    pub fn from_control_value(value: &str) -> Option<Self> {
        match value {
            "WEBGL" => Some(VectorBackend::Gpu),
            "vector" => Some(VectorBackend::Canvas),
            _ => None,
        }
    }

    pub fn style_target(self) -> StyleTarget {
        match self {
            VectorBackend::Gpu => StyleTarget::Gpu,
            VectorBackend::Canvas => StyleTarget::Cpu,
        }
    }
}

/// Owns whichever vector layer currently presents the feature collection.
///
/// Switching disposes the previous backend's layer before constructing the
/// replacement; the feature collection itself is never touched, so a switch
/// is purely a presentation change. A rule set the target backend's compiler
/// rejects leaves that backend without a vector layer until a valid set is
/// assigned; the caller surfaces the error.
#[derive(Default)]
pub struct LayerSwitcher {
    active: VectorBackend,
    canvas_layer: Option<CanvasVectorLayer>,
    gpu_vector_enabled: bool,
}

impl LayerSwitcher {
    pub fn active(&self) -> VectorBackend {
        self.active
    }

    pub fn canvas_layer(&self) -> Option<&CanvasVectorLayer> {
        self.canvas_layer.as_ref()
    }

    pub fn gpu_vector_enabled(&self) -> bool {
        self.gpu_vector_enabled
    }

    /// True when the active backend accepted the current rule set and is
    /// drawing features (hit-testing targets visible features only).
    pub fn has_vector_layer(&self) -> bool {
        self.gpu_vector_enabled || self.canvas_layer.is_some()
    }

    /// Route a control change: a backend change switches layers, a rule
    /// change on the same backend is a style assignment.
    pub fn apply(&mut self, kind: VectorBackend, rules: &[StyleRule]) -> Result<(), StyleError> {
        if kind != self.active {
            self.switch(kind, rules)
        } else {
            self.set_rules(rules)
        }
    }

    pub fn switch(&mut self, kind: VectorBackend, rules: &[StyleRule]) -> Result<(), StyleError> {
        // Dispose the previous layer before constructing the replacement.
        self.canvas_layer = None;
        self.gpu_vector_enabled = false;
        self.active = kind;
        match kind {
            VectorBackend::Gpu => {
                validate_rules(rules, kind.style_target())?;
                self.gpu_vector_enabled = true;
                Ok(())
            }
            VectorBackend::Canvas => {
                self.canvas_layer = Some(CanvasVectorLayer::new(rules)?);
                Ok(())
            }
        }
    }

    pub fn set_rules(&mut self, rules: &[StyleRule]) -> Result<(), StyleError> {
        match self.active {
            VectorBackend::Gpu => {
                validate_rules(rules, self.active.style_target())?;
                self.gpu_vector_enabled = true;
                Ok(())
            }
            VectorBackend::Canvas => {
                // A layer in the failed state gets another chance with the
                // newly assigned rules.
                self.canvas_layer = None;
                self.canvas_layer = Some(CanvasVectorLayer::new(rules)?);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::InteractionState;
    use alboran_shared::{FeatureId, HoverState, build_features, common_rules, filtered_rules};

    #[test]
    fn control_values_round_trip() {
        for kind in [VectorBackend::Gpu, VectorBackend::Canvas] {
            assert_eq!(
                VectorBackend::from_control_value(kind.control_value()),
                Some(kind)
            );
        }
        assert_eq!(VectorBackend::from_control_value("canvas"), None);
        assert_eq!(VectorBackend::Gpu.control_value(), "WEBGL");
        assert_eq!(VectorBackend::Canvas.control_value(), "vector");
    }

    #[test]
    fn defaults_to_the_gpu_backend() {
        let switcher = LayerSwitcher::default();
        assert_eq!(switcher.active(), VectorBackend::Gpu);
        assert!(!switcher.has_vector_layer());
    }

    #[test]
    fn gpu_backend_accepts_the_shipped_rules() {
        let mut switcher = LayerSwitcher::default();
        assert!(switcher.apply(VectorBackend::Gpu, &common_rules()).is_ok());
        assert!(switcher.gpu_vector_enabled());
        assert!(switcher.apply(VectorBackend::Gpu, &filtered_rules()).is_ok());
        assert!(switcher.has_vector_layer());
    }

    #[test]
    fn canvas_backend_rejects_the_shipped_rules_and_stays_layerless() {
        let mut switcher = LayerSwitcher::default();
        switcher.apply(VectorBackend::Gpu, &common_rules()).unwrap();

        let err = switcher
            .apply(VectorBackend::Canvas, &common_rules())
            .unwrap_err();
        assert!(matches!(err, StyleError::ShortMatch { .. }));
        assert_eq!(switcher.active(), VectorBackend::Canvas);
        assert!(!switcher.has_vector_layer());
        // The GPU layer was still disposed by the switch.
        assert!(!switcher.gpu_vector_enabled());
    }

    #[test]
    fn switching_back_restores_the_gpu_layer() {
        let mut switcher = LayerSwitcher::default();
        switcher.apply(VectorBackend::Gpu, &common_rules()).unwrap();
        let _ = switcher.apply(VectorBackend::Canvas, &common_rules());
        switcher.apply(VectorBackend::Gpu, &common_rules()).unwrap();
        assert!(switcher.gpu_vector_enabled());
        assert!(switcher.canvas_layer().is_none());
    }

    #[test]
    fn switching_preserves_features_and_hover_states() {
        let mut features = build_features();
        let mut state = InteractionState::default();
        state.pointer_move(&mut features, Some(FeatureId(0)));
        state.click(&mut features);
        state.pointer_move(&mut features, Some(FeatureId(2)));
        let before = features.clone();

        let mut switcher = LayerSwitcher::default();
        switcher.apply(VectorBackend::Gpu, &common_rules()).unwrap();
        let _ = switcher.apply(VectorBackend::Canvas, &common_rules());
        let _ = switcher.apply(VectorBackend::Gpu, &filtered_rules());

        assert_eq!(features, before);
        assert_eq!(features.len(), 3);
        assert_eq!(
            features.get(FeatureId(0)).unwrap().hover,
            HoverState::Selected
        );
        assert_eq!(
            features.get(FeatureId(2)).unwrap().hover,
            HoverState::Hovered
        );
    }
}
