use alboran_shared::Extent;
use alboran_shared::mercator::HALF_WORLD_M;

/// Pan/zoom transform between world coordinates (EPSG:3857 meters, y up) and
/// screen coordinates (CSS pixels, y down).
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

/// Scale bounds in px per meter: slippy zoom 0 through 18 at 256 px tiles.
const MIN_SCALE: f64 = 256.0 / (2.0 * HALF_WORLD_M);
const MAX_SCALE: f64 = MIN_SCALE * (1 << 18) as f64;
const ZOOM_SENSITIVITY: f64 = 0.001;

/// Pixel padding applied by `fit_extent`, clockwise from the top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitPadding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale: MIN_SCALE,
        }
    }
}

impl Viewport {
    pub fn world_to_screen(&self, wx: f64, wy: f64) -> (f64, f64) {
        (
            wx * self.scale + self.offset_x,
            self.offset_y - wy * self.scale,
        )
    }

    pub fn screen_to_world(&self, sx: f64, sy: f64) -> (f64, f64) {
        (
            (sx - self.offset_x) / self.scale,
            (self.offset_y - sy) / self.scale,
        )
    }

    /// Zoom toward a focus point (screen coordinates).
    pub fn zoom_at(&mut self, delta: f64, screen_x: f64, screen_y: f64) {
        let factor = (-delta * ZOOM_SENSITIVITY).exp();
        let new_scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        let ratio = new_scale / self.scale;

        // Keep the world point under the cursor fixed.
        self.offset_x = screen_x - (screen_x - self.offset_x) * ratio;
        self.offset_y = screen_y - (screen_y - self.offset_y) * ratio;
        self.scale = new_scale;
    }

    /// Pan by screen-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Fit the viewport so `extent` is centered inside the canvas minus the
    /// given pixel padding.
    pub fn fit_extent(&mut self, extent: &Extent, canvas_w: f64, canvas_h: f64, pad: FitPadding) {
        let avail_w = canvas_w - pad.left - pad.right;
        let avail_h = canvas_h - pad.top - pad.bottom;
        if extent.width() <= 0.0 || extent.height() <= 0.0 || avail_w <= 0.0 || avail_h <= 0.0 {
            return;
        }

        self.scale = (avail_w / extent.width())
            .min(avail_h / extent.height())
            .clamp(MIN_SCALE, MAX_SCALE);

        let (cx, cy) = extent.center();
        self.offset_x = pad.left + avail_w / 2.0 - cx * self.scale;
        self.offset_y = pad.top + avail_h / 2.0 + cy * self.scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAD: FitPadding = FitPadding {
        top: 50.0,
        right: 280.0,
        bottom: 180.0,
        left: 50.0,
    };

    fn extent() -> Extent {
        Extent {
            min_x: -500_000.0,
            min_y: 4_200_000.0,
            max_x: -400_000.0,
            max_y: 4_300_000.0,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        let diff = (actual - expected).abs();
        assert!(diff < 1e-6, "expected {expected}, got {actual} (diff: {diff})");
    }

    #[test]
    fn screen_world_roundtrip() {
        let mut vp = Viewport::default();
        vp.fit_extent(&extent(), 1280.0, 720.0, PAD);
        let (sx, sy) = vp.world_to_screen(-450_000.0, 4_250_000.0);
        let (wx, wy) = vp.screen_to_world(sx, sy);
        assert_close(wx, -450_000.0);
        assert_close(wy, 4_250_000.0);
    }

    #[test]
    fn north_maps_above_south_on_screen() {
        let vp = Viewport {
            offset_x: 0.0,
            offset_y: 500.0,
            scale: 0.001,
        };
        let (_, y_north) = vp.world_to_screen(0.0, 4_300_000.0);
        let (_, y_south) = vp.world_to_screen(0.0, 4_200_000.0);
        assert!(y_north < y_south);
    }

    #[test]
    fn fit_centers_extent_in_the_padded_box() {
        let mut vp = Viewport::default();
        let (w, h) = (1280.0, 720.0);
        vp.fit_extent(&extent(), w, h, PAD);

        let avail_w = w - PAD.left - PAD.right;
        let avail_h = h - PAD.top - PAD.bottom;
        assert_close(vp.scale, (avail_w / 100_000.0).min(avail_h / 100_000.0));

        let (cx, cy) = extent().center();
        let (sx, sy) = vp.world_to_screen(cx, cy);
        assert_close(sx, PAD.left + avail_w / 2.0);
        assert_close(sy, PAD.top + avail_h / 2.0);

        // Every corner stays inside the padded box.
        for (wx, wy) in [
            (extent().min_x, extent().min_y),
            (extent().max_x, extent().max_y),
        ] {
            let (sx, sy) = vp.world_to_screen(wx, wy);
            assert!(sx >= PAD.left - 1e-6 && sx <= w - PAD.right + 1e-6);
            assert!(sy >= PAD.top - 1e-6 && sy <= h - PAD.bottom + 1e-6);
        }
    }

    #[test]
    fn fit_ignores_degenerate_input() {
        let mut vp = Viewport::default();
        let before = vp.clone();
        let flat = Extent {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 10.0,
        };
        vp.fit_extent(&flat, 1280.0, 720.0, PAD);
        assert_eq!(vp, before);
        vp.fit_extent(&extent(), 100.0, 720.0, PAD);
        assert_eq!(vp, before);
    }

    #[test]
    fn zoom_keeps_the_anchor_fixed() {
        let mut vp = Viewport::default();
        vp.fit_extent(&extent(), 1280.0, 720.0, PAD);
        let (ax, ay) = (400.0, 300.0);
        let before = vp.screen_to_world(ax, ay);
        vp.zoom_at(-240.0, ax, ay);
        let after = vp.screen_to_world(ax, ay);
        assert_close(after.0, before.0);
        assert_close(after.1, before.1);
        assert!(vp.scale > MIN_SCALE);
    }

    #[test]
    fn zoom_clamps_at_the_scale_bounds() {
        let mut vp = Viewport::default();
        vp.fit_extent(&extent(), 1280.0, 720.0, PAD);
        for _ in 0..200 {
            vp.zoom_at(-10_000.0, 640.0, 360.0);
        }
        assert_close(vp.scale, MAX_SCALE);
        for _ in 0..200 {
            vp.zoom_at(10_000.0, 640.0, 360.0);
        }
        assert_close(vp.scale, MIN_SCALE);
    }

    #[test]
    fn pan_shifts_screen_space() {
        let mut vp = Viewport::default();
        vp.fit_extent(&extent(), 1280.0, 720.0, PAD);
        let (sx, sy) = vp.world_to_screen(-450_000.0, 4_250_000.0);
        vp.pan(15.0, -7.0);
        let (sx2, sy2) = vp.world_to_screen(-450_000.0, 4_250_000.0);
        assert_close(sx2 - sx, 15.0);
        assert_close(sy2 - sy, -7.0);
    }
}
