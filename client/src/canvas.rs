use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, PointerEvent, WheelEvent};

use alboran_shared::FeatureCollection;

use crate::app::{ActiveRules, BackendChoice, Interaction};
use crate::gpu::{GpuRenderer, RenderFrameInput};
use crate::hit_test;
use crate::render_loop::RenderScheduler;
use crate::renderer::LayerSwitcher;
use crate::tessellate::build_mesh;
use crate::tiles::LoadedTile;
use crate::viewport::{FitPadding, Viewport};

/// View fit applied once on load: room on the right for the control panel
/// and at the bottom for the attribution strip.
pub const FIT_PADDING: FitPadding = FitPadding {
    top: 50.0,
    right: 280.0,
    bottom: 180.0,
    left: 50.0,
};

/// A pointer that traveled further than this between down and up was a drag,
/// not a click.
const CLICK_SLOP_PX: f64 = 5.0;

/// Two-canvas map stack: wgpu draws the basemap tiles (and the vector mesh
/// when the GPU backend is active); the overlay canvas carries the Canvas 2D
/// vector backend.
#[component]
pub fn MapCanvas() -> impl IntoView {
    let features: RwSignal<FeatureCollection> = expect_context();
    let viewport: RwSignal<Viewport> = expect_context();
    let Interaction(interaction) = expect_context();
    let ActiveRules(rules) = expect_context();
    let BackendChoice(backend) = expect_context();
    let loaded_tiles: RwSignal<Vec<LoadedTile>> = expect_context();

    let gpu_canvas_ref = NodeRef::<leptos::html::Canvas>::new();
    let overlay_canvas_ref = NodeRef::<leptos::html::Canvas>::new();

    // GPU world coordinates are relative to the feature extent center.
    let origin = features.with_untracked(|f| {
        f.extent()
            .map(|extent| extent.center())
            .unwrap_or((0.0, 0.0))
    });

    // Drag state
    let is_dragging = Rc::new(Cell::new(false));
    let drag_start_x = Rc::new(Cell::new(0.0f64));
    let drag_start_y = Rc::new(Cell::new(0.0f64));
    let last_x = Rc::new(Cell::new(0.0f64));
    let last_y = Rc::new(Cell::new(0.0f64));

    let switcher: Rc<RefCell<LayerSwitcher>> = Rc::new(RefCell::new(LayerSwitcher::default()));

    // GPU renderer (initialized async, None until ready)
    let gpu: Rc<RefCell<Option<GpuRenderer>>> = Rc::new(RefCell::new(None));
    let gpu_init_started = Rc::new(Cell::new(false));

    let fitted = Rc::new(Cell::new(false));
    let last_tile_count: Rc<Cell<usize>> = Rc::new(Cell::new(0));

    // Cached overlay 2D context (invalidated on canvas resize)
    let cached_overlay_ctx: Rc<RefCell<Option<CanvasRenderingContext2d>>> =
        Rc::new(RefCell::new(None));

    // --- Render function ---

    let gpu_render = gpu.clone();
    let switcher_render = switcher.clone();
    let fitted_render = fitted.clone();
    let last_tile_count_render = last_tile_count.clone();
    let cached_overlay_ctx_render = cached_overlay_ctx.clone();
    let scheduler = RenderScheduler::new(move || {
        let Some(gpu_canvas) = gpu_canvas_ref.get_untracked() else {
            return;
        };
        let gpu_canvas: &HtmlCanvasElement = &gpu_canvas;
        let Some(overlay_canvas) = overlay_canvas_ref.get_untracked() else {
            return;
        };
        let overlay_canvas: &HtmlCanvasElement = &overlay_canvas;

        let Some(parent) = gpu_canvas.parent_element() else {
            return;
        };
        let w = parent.client_width() as u32;
        let h = parent.client_height() as u32;
        if w == 0 || h == 0 {
            return;
        }
        let dpr = web_sys::window()
            .map(|win| win.device_pixel_ratio())
            .unwrap_or(1.0)
            .max(1.0);
        let pw = (w as f64 * dpr).round() as u32;
        let ph = (h as f64 * dpr).round() as u32;
        if gpu_canvas.width() != pw || gpu_canvas.height() != ph {
            gpu_canvas.set_width(pw);
            gpu_canvas.set_height(ph);
            overlay_canvas.set_width(pw);
            overlay_canvas.set_height(ph);
            // Canvas resize resets 2D context state; drop the cached context.
            *cached_overlay_ctx_render.borrow_mut() = None;
            if let Some(renderer) = gpu_render.borrow_mut().as_mut() {
                renderer.resize(pw, ph, dpr as f32);
            }
        }

        // Fit to the feature extent once the canvas size is known. The
        // viewport update re-marks the scheduler; the next frame draws.
        if !fitted_render.get() {
            fitted_render.set(true);
            if let Some(extent) = features.with_untracked(|f| f.extent()) {
                viewport.update(|vp| {
                    vp.fit_extent(&extent, w as f64, h as f64, FIT_PADDING);
                });
            }
            return;
        }

        let vp = viewport.get_untracked();

        loaded_tiles.with_untracked(|tiles| {
            if let Some(renderer) = gpu_render.borrow_mut().as_mut() {
                if tiles.len() != last_tile_count_render.get() {
                    renderer.upload_tiles(tiles);
                    last_tile_count_render.set(tiles.len());
                }
                renderer.render(RenderFrameInput {
                    vp: &vp,
                    tiles,
                    draw_vectors: switcher_render.borrow().gpu_vector_enabled(),
                });
            }
        });

        // Overlay: the Canvas 2D vector backend, or nothing.
        let ctx = {
            let mut ctx_cache = cached_overlay_ctx_render.borrow_mut();
            if ctx_cache.is_none() {
                let Some(ctx) = overlay_canvas
                    .get_context("2d")
                    .ok()
                    .flatten()
                    .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
                else {
                    return;
                };
                // All drawing stays in CSS pixel coordinates.
                ctx.scale(dpr, dpr).ok();
                *ctx_cache = Some(ctx);
            }
            let Some(ctx) = ctx_cache.clone() else {
                return;
            };
            ctx
        };

        ctx.clear_rect(0.0, 0.0, w as f64, h as f64);
        if let Some(layer) = switcher_render.borrow().canvas_layer() {
            features.with_untracked(|fc| layer.draw(&ctx, &vp, fc));
        }
    });
    let scheduler = Rc::new(scheduler);

    // Initialize the GPU renderer asynchronously. The overlay backend and
    // hit-testing stay functional if this fails.
    let sched_for_init = scheduler.clone();
    Effect::new({
        let gpu = gpu.clone();
        let gpu_init_started = gpu_init_started.clone();
        let switcher = switcher.clone();
        move || {
            if gpu_init_started.get() {
                return;
            }
            let Some(canvas_el) = gpu_canvas_ref.get() else {
                return;
            };
            gpu_init_started.set(true);

            let canvas: &HtmlCanvasElement = &canvas_el;
            let canvas: HtmlCanvasElement = canvas.clone();
            let gpu = gpu.clone();
            let switcher = switcher.clone();
            let sched = sched_for_init.clone();

            wasm_bindgen_futures::spawn_local(async move {
                match GpuRenderer::init(canvas, origin).await {
                    Ok(mut renderer) => {
                        if switcher.borrow().gpu_vector_enabled() {
                            let rules = rules.get_untracked();
                            match features.with_untracked(|fc| build_mesh(fc, &rules, origin)) {
                                Ok(mesh) => renderer.upload_mesh(&mesh),
                                Err(err) => web_sys::console::error_1(
                                    &format!("vector tessellation failed: {err}").into(),
                                ),
                            }
                        }
                        *gpu.borrow_mut() = Some(renderer);
                        sched.mark_dirty();
                    }
                    Err(e) => {
                        web_sys::console::warn_1(
                            &format!("wgpu init failed, basemap disabled: {e}").into(),
                        );
                    }
                }
            });
        }
    });

    // Backend/rule-set effect: switch or restyle the vector layer. A rule
    // set the backend's compiler rejects is surfaced here and leaves that
    // backend without a vector layer.
    let sched_backend = scheduler.clone();
    let switcher_backend = switcher.clone();
    let gpu_backend = gpu.clone();
    Effect::new(move || {
        let kind = backend.get();
        let active_rules = rules.get();
        let mut sw = switcher_backend.borrow_mut();
        if let Err(err) = sw.apply(kind, &active_rules) {
            web_sys::console::error_1(
                &format!(
                    "'{}' backend rejected the style rules: {err}",
                    kind.control_value()
                )
                .into(),
            );
        }
        if let Some(renderer) = gpu_backend.borrow_mut().as_mut() {
            if sw.gpu_vector_enabled() {
                match features.with_untracked(|fc| build_mesh(fc, &active_rules, origin)) {
                    Ok(mesh) => renderer.upload_mesh(&mesh),
                    Err(err) => web_sys::console::error_1(
                        &format!("vector tessellation failed: {err}").into(),
                    ),
                }
            } else {
                renderer.clear_mesh();
            }
        }
        sched_backend.mark_dirty();
    });

    // Hover/selection effect: feature attributes drive the baked mesh
    // colors, so the GPU mesh rebuilds on interaction changes.
    let sched_state = scheduler.clone();
    let switcher_state = switcher.clone();
    let gpu_state = gpu.clone();
    Effect::new(move || {
        features.track();
        if switcher_state.borrow().gpu_vector_enabled()
            && let Some(renderer) = gpu_state.borrow_mut().as_mut()
        {
            let active_rules = rules.get_untracked();
            match features.with_untracked(|fc| build_mesh(fc, &active_rules, origin)) {
                Ok(mesh) => renderer.upload_mesh(&mesh),
                Err(err) => {
                    web_sys::console::error_1(&format!("vector tessellation failed: {err}").into())
                }
            }
        }
        sched_state.mark_dirty();
    });

    // Viewport/tile effect: pan, zoom and newly loaded tiles need a repaint.
    let sched_vp = scheduler.clone();
    Effect::new(move || {
        viewport.track();
        loaded_tiles.track();
        sched_vp.mark_dirty();
    });

    // --- Input handlers ---

    let on_wheel = move |e: WheelEvent| {
        e.prevent_default();
        let delta = e.delta_y();
        let x = e.offset_x() as f64;
        let y = e.offset_y() as f64;
        viewport.update(|vp| vp.zoom_at(delta, x, y));
    };

    let on_pointer_down = {
        let is_dragging = is_dragging.clone();
        let drag_start_x = drag_start_x.clone();
        let drag_start_y = drag_start_y.clone();
        let last_x = last_x.clone();
        let last_y = last_y.clone();
        move |e: PointerEvent| {
            is_dragging.set(true);
            drag_start_x.set(e.client_x() as f64);
            drag_start_y.set(e.client_y() as f64);
            last_x.set(e.client_x() as f64);
            last_y.set(e.client_y() as f64);

            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.set_pointer_capture(e.pointer_id()).ok();
            }
        }
    };

    let on_pointer_move = {
        let is_dragging = is_dragging.clone();
        let last_x = last_x.clone();
        let last_y = last_y.clone();
        let switcher_move = switcher.clone();
        move |e: PointerEvent| {
            if is_dragging.get() {
                let dx = e.client_x() as f64 - last_x.get();
                let dy = e.client_y() as f64 - last_y.get();
                last_x.set(e.client_x() as f64);
                last_y.set(e.client_y() as f64);
                viewport.update(|vp| vp.pan(dx, dy));
                return;
            }

            // Hover only applies while the pointer is over the render
            // surface itself, not the controls floating above it.
            let over_canvas = e
                .target()
                .is_some_and(|t| t.dyn_ref::<HtmlCanvasElement>().is_some());
            if !over_canvas {
                return;
            }

            let local = gpu_canvas_ref
                .get_untracked()
                .map(|el| {
                    let rect = el.get_bounding_client_rect();
                    (
                        e.client_x() as f64 - rect.left(),
                        e.client_y() as f64 - rect.top(),
                    )
                })
                .unwrap_or((e.offset_x() as f64, e.offset_y() as f64));
            let vp = viewport.get_untracked();
            let (wx, wy) = vp.screen_to_world(local.0, local.1);

            // Only features the active backend actually draws are hittable.
            let candidate = if switcher_move.borrow().has_vector_layer() {
                let active_rules = rules.get_untracked();
                features.with_untracked(|fc| hit_test::feature_at(fc, &active_rules, wx, wy))
            } else {
                None
            };

            if let Some(el) = gpu_canvas_ref.get_untracked() {
                let cursor = if candidate.is_some() { "pointer" } else { "" };
                web_sys::HtmlElement::style(&el).set_property("cursor", cursor).ok();
            }

            if interaction.with_untracked(|st| st.hovered) != candidate {
                interaction.update(|st| {
                    features.update(|fc| {
                        st.pointer_move(fc, candidate);
                    });
                });
            }
        }
    };

    let on_pointer_up = {
        let is_dragging = is_dragging.clone();
        move |_: PointerEvent| {
            is_dragging.set(false);
        }
    };

    let on_click = {
        let drag_start_x = drag_start_x.clone();
        let drag_start_y = drag_start_y.clone();
        move |e: MouseEvent| {
            let dx = (e.client_x() as f64 - drag_start_x.get()).abs();
            let dy = (e.client_y() as f64 - drag_start_y.get()).abs();
            if dx < CLICK_SLOP_PX && dy < CLICK_SLOP_PX {
                // No pixel information: a click acts purely on the current
                // hovered/selected state.
                interaction.update(|st| {
                    features.update(|fc| {
                        st.click(fc);
                    });
                });
            }
        }
    };

    let on_pointer_leave = {
        let is_dragging = is_dragging.clone();
        move |_: PointerEvent| {
            is_dragging.set(false);
            if interaction.with_untracked(|st| st.hovered).is_some() {
                interaction.update(|st| {
                    features.update(|fc| {
                        st.pointer_move(fc, None);
                    });
                });
            }
            if let Some(el) = gpu_canvas_ref.get_untracked() {
                web_sys::HtmlElement::style(&el).set_property("cursor", "").ok();
            }
        }
    };

    view! {
        <div
            style="position: relative; width: 100%; height: 100%; overflow: hidden;"
            on:wheel=on_wheel
            on:pointerdown=on_pointer_down
            on:pointermove=on_pointer_move
            on:pointerup=on_pointer_up
            on:pointerleave=on_pointer_leave
            on:click=on_click
        >
            <canvas
                node_ref=gpu_canvas_ref
                style="position: absolute; inset: 0; width: 100%; height: 100%; touch-action: none;"
            />
            <canvas
                node_ref=overlay_canvas_ref
                style="position: absolute; inset: 0; width: 100%; height: 100%; pointer-events: none;"
            />
        </div>
    }
}
