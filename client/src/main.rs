mod app;
mod canvas;
mod canvas2d;
#[cfg(target_arch = "wasm32")]
mod gpu;
mod hit_test;
mod interaction;
mod render_loop;
mod renderer;
mod tessellate;
mod tiles;
mod viewport;

#[cfg(not(target_arch = "wasm32"))]
mod gpu {
    use crate::tessellate::VectorMesh;
    use crate::tiles::LoadedTile;
    use crate::viewport::Viewport;

    pub struct RenderFrameInput<'a> {
        pub vp: &'a Viewport,
        pub tiles: &'a [LoadedTile],
        pub draw_vectors: bool,
    }

    pub struct GpuRenderer;

    impl GpuRenderer {
        pub async fn init(
            _canvas: web_sys::HtmlCanvasElement,
            _origin: (f64, f64),
        ) -> Result<Self, String> {
            Err("not wasm".into())
        }
        pub fn resize(&mut self, _width: u32, _height: u32, _dpr: f32) {}
        pub fn upload_tiles(&mut self, _tiles: &[LoadedTile]) {}
        pub fn upload_mesh(&mut self, _mesh: &VectorMesh) {}
        pub fn clear_mesh(&mut self) {}
        pub fn render(&mut self, frame: RenderFrameInput<'_>) {
            let _ = (frame.vp, frame.tiles, frame.draw_vectors);
        }
    }
}

use leptos::mount::mount_to;
use std::any::Any;
use std::cell::RefCell;
use wasm_bindgen::JsCast;

thread_local! {
    static APP_MOUNT_HANDLE: RefCell<Option<Box<dyn Any>>> = RefCell::new(None);
}

fn main() {
    console_error_panic_hook::set_once();
    let Some(window) = web_sys::window() else {
        return;
    };
    let Some(document) = window.document() else {
        return;
    };
    let mount_target = document
        .get_element_by_id("app")
        .and_then(|node| node.dyn_into::<web_sys::HtmlElement>().ok())
        .or_else(|| document.body());
    let Some(target) = mount_target else {
        return;
    };

    APP_MOUNT_HANDLE.with(move |slot| {
        // If main() is re-entered (dev/hot-reload runtime quirks), drop the
        // old mount so stale effects can't keep mutating app state.
        let _old = slot.borrow_mut().take();
        let handle = mount_to(target, app::App);
        *slot.borrow_mut() = Some(Box::new(handle));
    });
}
