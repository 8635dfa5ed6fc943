use leptos::prelude::*;

use alboran_shared::{FeatureCollection, StyleRule, build_features, common_rules, filtered_rules};

use crate::canvas::MapCanvas;
use crate::interaction::InteractionState;
use crate::renderer::VectorBackend;
use crate::tiles::{self, LoadedTile};
use crate::viewport::Viewport;

/// Newtype wrappers give same-shaped signals distinct types for Leptos
/// context (without them, `provide_context` overwrites one with the other).
#[derive(Clone, Copy)]
pub(crate) struct Interaction(pub RwSignal<InteractionState>);
#[derive(Clone, Copy)]
pub(crate) struct StyleFilterEnabled(pub RwSignal<bool>);
#[derive(Clone, Copy)]
pub(crate) struct BackendChoice(pub RwSignal<VectorBackend>);
#[derive(Clone, Copy)]
pub(crate) struct ActiveRules(pub Memo<Vec<StyleRule>>);

/// Root application component. Provides global reactive signals via context.
/// Nothing is persisted: a reload starts from the same fixed state.
#[component]
pub fn App() -> impl IntoView {
    let features: RwSignal<FeatureCollection> = RwSignal::new(build_features());
    let viewport: RwSignal<Viewport> = RwSignal::new(Viewport::default());
    let interaction: RwSignal<InteractionState> = RwSignal::new(InteractionState::default());
    let filter_enabled: RwSignal<bool> = RwSignal::new(false);
    let backend: RwSignal<VectorBackend> = RwSignal::new(VectorBackend::default());
    let loaded_tiles: RwSignal<Vec<LoadedTile>> = RwSignal::new(Vec::new());

    let active_rules: Memo<Vec<StyleRule>> = Memo::new(move |_| {
        if filter_enabled.get() {
            filtered_rules()
        } else {
            common_rules()
        }
    });

    provide_context(features);
    provide_context(viewport);
    provide_context(loaded_tiles);
    provide_context(Interaction(interaction));
    provide_context(StyleFilterEnabled(filter_enabled));
    provide_context(BackendChoice(backend));
    provide_context(ActiveRules(active_rules));

    // Start basemap loading once; the feature set is fixed at startup.
    Effect::new(move || {
        let Some(extent) = features.with_untracked(|f| f.extent()) else {
            return;
        };
        tiles::fetch_basemap(&extent, loaded_tiles);
    });

    view! {
        <div style="position: relative; width: 100%; height: 100%; overflow: hidden; background: #e8e5de;">
            <MapCanvas />
            <ControlPanel />
            <Attribution />
        </div>
    }
}

/// The two demo controls: the style-filter checkbox and the vector backend
/// selector.
#[component]
fn ControlPanel() -> impl IntoView {
    let StyleFilterEnabled(filter_enabled) = expect_context();
    let BackendChoice(backend) = expect_context();

    view! {
        <div style="position: absolute; top: 16px; right: 16px; z-index: 10; background: #13161f; border: 1px solid #282c3e; border-radius: 6px; padding: 10px 14px; display: flex; flex-direction: column; gap: 8px; color: #e2e0d8; font-family: 'JetBrains Mono', monospace; font-size: 0.78rem;">
            <label style="display: flex; align-items: center; gap: 8px; cursor: pointer;">
                <input
                    id="filter"
                    type="checkbox"
                    prop:checked=move || filter_enabled.get()
                    on:input=move |e| filter_enabled.set(event_target_checked(&e))
                />
                "Filter: style type2 only"
            </label>
            <label style="display: flex; align-items: center; gap: 8px;">
                "Layer"
                <select
                    id="layerType"
                    style="background: #1a1d2a; color: #e2e0d8; border: 1px solid #282c3e; border-radius: 4px; padding: 2px 6px;"
                    prop:value=move || backend.get().control_value()
                    on:change=move |e| {
                        if let Some(kind) = VectorBackend::from_control_value(&event_target_value(&e)) {
                            backend.set(kind);
                        }
                    }
                >
                    <option value="WEBGL">"WEBGL"</option>
                    <option value="vector">"vector"</option>
                </select>
            </label>
        </div>
    }
}

#[component]
fn Attribution() -> impl IntoView {
    view! {
        <div style="position: absolute; bottom: 4px; right: 8px; z-index: 10; font-size: 0.68rem; color: #444; background: rgba(255,255,255,0.65); padding: 1px 6px; border-radius: 3px;">
            "\u{00A9} OpenStreetMap contributors"
        </div>
    }
}
