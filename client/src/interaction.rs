use alboran_shared::{FeatureCollection, FeatureId, HoverState};

/// Session-wide hover/selection state, tracked by arena index rather than by
/// live feature references so it can be driven and tested without a renderer.
///
/// Invariants after every transition: at most one feature is Hovered, at most
/// one is Selected, and the selected feature never carries the Hovered state
/// (selection wins while the pointer rests on it).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionState {
    pub hovered: Option<FeatureId>,
    pub selected: Option<FeatureId>,
}

impl InteractionState {
    /// Apply a pointer-move hit-test result. Returns true when any state or
    /// feature attribute changed. Repeated moves over the same feature are
    /// no-ops.
    pub fn pointer_move(
        &mut self,
        features: &mut FeatureCollection,
        candidate: Option<FeatureId>,
    ) -> bool {
        if candidate == self.hovered {
            return false;
        }

        if candidate.is_none() {
            if let Some(prev) = self.hovered.take() {
                if Some(prev) != self.selected {
                    features.set_hover(prev, HoverState::None);
                }
                return true;
            }
            return false;
        }

        if let Some(next) = candidate
            && Some(next) != self.selected
        {
            features.set_hover(next, HoverState::Hovered);
        }
        if let Some(prev) = self.hovered
            && Some(prev) != self.selected
        {
            features.set_hover(prev, HoverState::None);
        }
        self.hovered = candidate;
        true
    }

    /// Apply a click. Branches are mutually exclusive against the entry
    /// state: selecting a new feature while another is selected takes two
    /// clicks (the first only deselects).
    pub fn click(&mut self, features: &mut FeatureCollection) -> bool {
        match (self.hovered, self.selected) {
            (Some(hovered), Some(selected)) if hovered != selected => {
                features.set_hover(selected, HoverState::None);
                self.selected = None;
                true
            }
            (Some(hovered), None) => {
                self.selected = Some(hovered);
                features.set_hover(hovered, HoverState::Selected);
                true
            }
            (None, Some(selected)) => {
                features.set_hover(selected, HoverState::None);
                self.selected = None;
                true
            }
            _ => false,
        }
    }
}
