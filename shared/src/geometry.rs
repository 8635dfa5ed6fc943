use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in world coordinates (EPSG:3857 meters, y up).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn from_points(points: &[[f64; 2]]) -> Option<Self> {
        let first = points.first()?;
        let mut extent = Self {
            min_x: first[0],
            min_y: first[1],
            max_x: first[0],
            max_y: first[1],
        };
        for p in &points[1..] {
            extent.min_x = extent.min_x.min(p[0]);
            extent.min_y = extent.min_y.min(p[1]);
            extent.max_x = extent.max_x.max(p[0]);
            extent.max_y = extent.max_y.max(p[1]);
        }
        Some(extent)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn union(&self, other: &Extent) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// A polygon with one exterior ring and zero or more interior rings (holes).
/// Rings are open (first vertex not repeated); coordinates are world meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<[f64; 2]>,
    pub holes: Vec<Vec<[f64; 2]>>,
}

impl Polygon {
    pub fn new(exterior: Vec<[f64; 2]>, holes: Vec<Vec<[f64; 2]>>) -> Self {
        Self { exterior, holes }
    }

    /// Shifted copy of this polygon. `dx`/`dy` are world meters (y positive north).
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        let shift = |ring: &[[f64; 2]]| ring.iter().map(|p| [p[0] + dx, p[1] + dy]).collect();
        Self {
            exterior: shift(&self.exterior),
            holes: self.holes.iter().map(|h| shift(h)).collect(),
        }
    }

    pub fn extent(&self) -> Option<Extent> {
        Extent::from_points(&self.exterior)
    }

    /// Even-odd containment: inside the exterior ring and outside every hole.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        if !ring_contains(&self.exterior, x, y) {
            return false;
        }
        !self.holes.iter().any(|hole| ring_contains(hole, x, y))
    }
}

/// Ray-cast point-in-ring test. Points exactly on an edge may land either way.
fn ring_contains(ring: &[[f64; 2]], x: f64, y: f64) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
