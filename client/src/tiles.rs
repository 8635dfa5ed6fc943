#![cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use js_sys::Reflect;
use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;
use web_sys::HtmlImageElement;

use alboran_shared::Extent;
use alboran_shared::mercator::HALF_WORLD_M;

/// Fixed basemap zoom: a handful of tiles covers the feature extent.
pub const BASEMAP_ZOOM: u32 = 9;
/// Extra ring of tiles around the extent so panning a little stays covered.
pub const GRID_MARGIN: u32 = 1;

/// Polite cap on parallel downloads from the public tile server.
const MAX_PARALLEL_LOADS: usize = 4;
const TILE_SERVER: &str = "https://tile.openstreetmap.org";
const ONLOAD_HANDLE_KEY: &str = "__alboranTileOnload";
const ONERROR_HANDLE_KEY: &str = "__alboranTileOnerror";

/// A loaded basemap tile image with its world-coordinate extent.
#[derive(Clone)]
pub struct LoadedTile {
    pub id: u32,
    pub image: HtmlImageElement,
    pub extent: Extent,
}

/// Inclusive slippy-grid tile range at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl TileRange {
    pub fn tiles(self) -> impl Iterator<Item = (u32, u32)> {
        (self.min_y..=self.max_y)
            .flat_map(move |y| (self.min_x..=self.max_x).map(move |x| (x, y)))
    }

    pub fn len(&self) -> usize {
        ((self.max_x - self.min_x + 1) * (self.max_y - self.min_y + 1)) as usize
    }
}

fn tiles_across(zoom: u32) -> u32 {
    1 << zoom
}

/// Slippy tile containing a world coordinate. Tile y grows southward.
pub fn tile_at(zoom: u32, wx: f64, wy: f64) -> (u32, u32) {
    let n = tiles_across(zoom);
    let world = 2.0 * HALF_WORLD_M;
    let fx = ((wx + HALF_WORLD_M) / world * n as f64).floor();
    let fy = ((HALF_WORLD_M - wy) / world * n as f64).floor();
    (
        (fx.max(0.0) as u32).min(n - 1),
        (fy.max(0.0) as u32).min(n - 1),
    )
}

/// World-coordinate extent of one slippy tile.
pub fn tile_extent(zoom: u32, tx: u32, ty: u32) -> Extent {
    let size = 2.0 * HALF_WORLD_M / tiles_across(zoom) as f64;
    let min_x = -HALF_WORLD_M + tx as f64 * size;
    let max_y = HALF_WORLD_M - ty as f64 * size;
    Extent {
        min_x,
        min_y: max_y - size,
        max_x: min_x + size,
        max_y,
    }
}

/// Tile range covering `extent` plus `margin` tiles on every side, clamped
/// to the world grid.
pub fn grid_for_extent(extent: &Extent, zoom: u32, margin: u32) -> TileRange {
    let n = tiles_across(zoom);
    let (min_x, min_y) = tile_at(zoom, extent.min_x, extent.max_y);
    let (max_x, max_y) = tile_at(zoom, extent.max_x, extent.min_y);
    TileRange {
        zoom,
        min_x: min_x.saturating_sub(margin),
        min_y: min_y.saturating_sub(margin),
        max_x: (max_x + margin).min(n - 1),
        max_y: (max_y + margin).min(n - 1),
    }
}

pub fn tile_url(zoom: u32, tx: u32, ty: u32) -> String {
    format!("{TILE_SERVER}/{zoom}/{tx}/{ty}.png")
}

struct LoadJob {
    id: u32,
    url: String,
    extent: Extent,
}

/// Fetch the basemap grid covering `extent`, pushing tiles into the signal
/// as their images arrive. Failed tiles are logged and skipped; the map
/// stays usable without them.
pub fn fetch_basemap(extent: &Extent, tiles_signal: RwSignal<Vec<LoadedTile>>) {
    let range = grid_for_extent(extent, BASEMAP_ZOOM, GRID_MARGIN);
    let n = tiles_across(range.zoom);
    let jobs: VecDeque<LoadJob> = range
        .tiles()
        .map(|(tx, ty)| LoadJob {
            id: ty * n + tx,
            url: tile_url(range.zoom, tx, ty),
            extent: tile_extent(range.zoom, tx, ty),
        })
        .collect();

    let queue = Rc::new(RefCell::new(jobs));
    let in_flight = Rc::new(Cell::new(0usize));
    pump_queue(tiles_signal, queue, in_flight);
}

fn pump_queue(
    tiles_signal: RwSignal<Vec<LoadedTile>>,
    queue: Rc<RefCell<VecDeque<LoadJob>>>,
    in_flight: Rc<Cell<usize>>,
) {
    while in_flight.get() < MAX_PARALLEL_LOADS {
        let Some(job) = queue.borrow_mut().pop_front() else {
            break;
        };
        in_flight.set(in_flight.get() + 1);

        let queue_next = queue.clone();
        let in_flight_next = in_flight.clone();
        let on_done: Rc<dyn Fn()> = Rc::new(move || {
            in_flight_next.set(in_flight_next.get().saturating_sub(1));
            pump_queue(tiles_signal, queue_next.clone(), in_flight_next.clone());
        });

        load_tile(tiles_signal, job, on_done);
    }
}

fn load_tile(tiles_signal: RwSignal<Vec<LoadedTile>>, job: LoadJob, on_done: Rc<dyn Fn()>) {
    let img = match HtmlImageElement::new() {
        Ok(img) => img,
        Err(_) => {
            on_done();
            return;
        }
    };
    // Required for canvas readback (the GPU upload path draws the image to a
    // scratch canvas and extracts pixels).
    img.set_cross_origin(Some("anonymous"));

    let img_for_load = img.clone();
    let on_done_load = on_done.clone();
    let onload = Closure::<dyn FnMut()>::new(move || {
        clear_image_handlers(&img_for_load);
        tiles_signal.update(|loaded| {
            if loaded.iter().all(|tile| tile.id != job.id) {
                loaded.push(LoadedTile {
                    id: job.id,
                    image: img_for_load.clone(),
                    extent: job.extent,
                });
                loaded.sort_by_key(|tile| tile.id);
            }
        });
        on_done_load();
    });

    let img_for_error = img.clone();
    let url_for_error = job.url.clone();
    let on_done_error = on_done.clone();
    let onerror = Closure::<dyn FnMut()>::new(move || {
        clear_image_handlers(&img_for_error);
        web_sys::console::warn_1(&format!("basemap tile failed: {url_for_error}").into());
        on_done_error();
    });

    let onload_js = onload.into_js_value();
    let onerror_js = onerror.into_js_value();
    img.set_onload(Some(onload_js.unchecked_ref()));
    img.set_onerror(Some(onerror_js.unchecked_ref()));
    let _ = Reflect::set(
        img.as_ref(),
        &JsValue::from_str(ONLOAD_HANDLE_KEY),
        &onload_js,
    );
    let _ = Reflect::set(
        img.as_ref(),
        &JsValue::from_str(ONERROR_HANDLE_KEY),
        &onerror_js,
    );
    img.set_src(&job.url);
}

fn clear_image_handlers(img: &HtmlImageElement) {
    img.set_onload(None);
    img.set_onerror(None);
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONLOAD_HANDLE_KEY));
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONERROR_HANDLE_KEY));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_one_quadrants() {
        assert_eq!(tile_at(1, -1.0, 1.0), (0, 0));
        assert_eq!(tile_at(1, 1.0, 1.0), (1, 0));
        assert_eq!(tile_at(1, -1.0, -1.0), (0, 1));
        assert_eq!(tile_at(1, 1.0, -1.0), (1, 1));
    }

    #[test]
    fn world_edges_clamp_into_the_grid() {
        let n = 1 << BASEMAP_ZOOM;
        assert_eq!(tile_at(BASEMAP_ZOOM, -HALF_WORLD_M, HALF_WORLD_M), (0, 0));
        assert_eq!(
            tile_at(BASEMAP_ZOOM, HALF_WORLD_M, -HALF_WORLD_M),
            (n - 1, n - 1)
        );
    }

    #[test]
    fn zoom_zero_tile_is_the_whole_world() {
        let e = tile_extent(0, 0, 0);
        assert_eq!(e.min_x, -HALF_WORLD_M);
        assert_eq!(e.max_x, HALF_WORLD_M);
        assert_eq!(e.min_y, -HALF_WORLD_M);
        assert_eq!(e.max_y, HALF_WORLD_M);
    }

    #[test]
    fn tile_extent_round_trips_through_tile_at() {
        for (tx, ty) in [(0, 0), (250, 200), (511, 511)] {
            let e = tile_extent(BASEMAP_ZOOM, tx, ty);
            let (cx, cy) = e.center();
            assert_eq!(tile_at(BASEMAP_ZOOM, cx, cy), (tx, ty));
        }
    }

    #[test]
    fn grid_covers_the_extent_with_margin() {
        let extent = Extent {
            min_x: -560_000.0,
            min_y: 4_180_000.0,
            max_x: -410_000.0,
            max_y: 4_310_000.0,
        };
        let tight = grid_for_extent(&extent, BASEMAP_ZOOM, 0);
        let padded = grid_for_extent(&extent, BASEMAP_ZOOM, GRID_MARGIN);

        for (wx, wy) in [
            (extent.min_x, extent.min_y),
            (extent.min_x, extent.max_y),
            (extent.max_x, extent.min_y),
            (extent.max_x, extent.max_y),
        ] {
            let (tx, ty) = tile_at(BASEMAP_ZOOM, wx, wy);
            assert!(tx >= tight.min_x && tx <= tight.max_x);
            assert!(ty >= tight.min_y && ty <= tight.max_y);
        }

        assert_eq!(padded.min_x, tight.min_x - 1);
        assert_eq!(padded.max_y, tight.max_y + 1);
        assert_eq!(
            padded.len(),
            ((padded.max_x - padded.min_x + 1) * (padded.max_y - padded.min_y + 1)) as usize
        );
        // Small fixed grid: this demo never requests hundreds of tiles.
        assert!(padded.len() <= 36, "grid too large: {}", padded.len());
    }

    #[test]
    fn margin_saturates_at_the_world_edge() {
        let corner = Extent {
            min_x: -HALF_WORLD_M,
            min_y: HALF_WORLD_M - 10.0,
            max_x: -HALF_WORLD_M + 10.0,
            max_y: HALF_WORLD_M,
        };
        let range = grid_for_extent(&corner, BASEMAP_ZOOM, 2);
        assert_eq!((range.min_x, range.min_y), (0, 0));
    }

    #[test]
    fn osm_url_shape() {
        assert_eq!(
            tile_url(9, 249, 201),
            "https://tile.openstreetmap.org/9/249/201.png"
        );
    }

    #[test]
    fn tiles_iterates_row_major_over_the_range() {
        let range = TileRange {
            zoom: 9,
            min_x: 3,
            min_y: 7,
            max_x: 4,
            max_y: 8,
        };
        let all: Vec<(u32, u32)> = range.tiles().collect();
        assert_eq!(all, vec![(3, 7), (4, 7), (3, 8), (4, 8)]);
        assert_eq!(all.len(), range.len());
    }
}
