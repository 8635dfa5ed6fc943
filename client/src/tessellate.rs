use lyon_path::Path;
use lyon_path::math::point;
use lyon_tessellation::{
    BuffersBuilder, FillOptions, FillTessellator, FillVertex, StrokeOptions, StrokeTessellator,
    StrokeVertex, VertexBuffers,
};

use alboran_shared::{FeatureCollection, Polygon, StyleRule, resolve};

/// One vertex of the GPU vector mesh.
///
/// Fill vertices have a zero normal and width. Stroke vertices sit on the
/// path centerline and carry the lyon extrusion normal plus the resolved
/// stroke width in pixels; the vertex shader pushes them outward by
/// `normal * width / 2` in screen space, so stroke width stays constant
/// under zoom.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 2],
    pub normal: [f32; 2],
    pub color: [f32; 4],
    pub width_px: f32,
}

/// Tessellated triangle lists for every styled feature, fills and strokes
/// interleaved in draw order. Positions are world meters relative to
/// `origin` to keep f32 precision at mercator magnitudes.
#[derive(Debug, Clone, Default)]
pub struct VectorMesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl VectorMesh {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

fn polygon_path(polygon: &Polygon, origin: (f64, f64)) -> Path {
    let mut builder = Path::builder();
    for ring in std::iter::once(&polygon.exterior).chain(polygon.holes.iter()) {
        let mut points = ring
            .iter()
            .map(|p| point((p[0] - origin.0) as f32, (p[1] - origin.1) as f32));
        let Some(first) = points.next() else {
            continue;
        };
        builder.begin(first);
        for p in points {
            builder.line_to(p);
        }
        builder.close();
    }
    builder.build()
}

/// Tessellate every feature the rule set styles. Features resolving to no
/// style produce no geometry. Draw order follows collection order, matching
/// the reverse-order hit-test.
pub fn build_mesh(
    features: &FeatureCollection,
    rules: &[StyleRule],
    origin: (f64, f64),
) -> Result<VectorMesh, String> {
    let mut buffers: VertexBuffers<MeshVertex, u32> = VertexBuffers::new();
    let mut fill = FillTessellator::new();
    let mut stroke = StrokeTessellator::new();

    for (_, feature) in features.iter() {
        let Some(style) = resolve(rules, feature).map_err(|e| e.to_string())? else {
            continue;
        };
        let path = polygon_path(&feature.geometry, origin);

        let fill_color = style.fill_color.to_f32();
        fill.tessellate_path(
            &path,
            &FillOptions::default(),
            &mut BuffersBuilder::new(&mut buffers, |v: FillVertex| MeshVertex {
                position: v.position().to_array(),
                normal: [0.0, 0.0],
                color: fill_color,
                width_px: 0.0,
            }),
        )
        .map_err(|e| format!("fill tessellation failed for {}: {e:?}", feature.name))?;

        let stroke_color = style.stroke_color.to_f32();
        let width_px = style.stroke_width as f32;
        // Unit line width: the shader scales the extrusion to width_px.
        stroke
            .tessellate_path(
                &path,
                &StrokeOptions::default().with_line_width(1.0),
                &mut BuffersBuilder::new(&mut buffers, |v: StrokeVertex| MeshVertex {
                    position: v.position_on_path().to_array(),
                    normal: v.normal().to_array(),
                    color: stroke_color,
                    width_px,
                }),
            )
            .map_err(|e| format!("stroke tessellation failed for {}: {e:?}", feature.name))?;
    }

    Ok(VectorMesh {
        vertices: buffers.vertices,
        indices: buffers.indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alboran_shared::{
        Feature, FeatureCollection, HoverState, Polygon, build_features, common_rules,
        filtered_rules,
    };

    fn origin(features: &FeatureCollection) -> (f64, f64) {
        features.extent().unwrap().center()
    }

    fn fill_area(mesh: &VectorMesh) -> f64 {
        mesh.indices.chunks_exact(3).fold(0.0, |acc, tri| {
            let [a, b, c] = [
                mesh.vertices[tri[0] as usize],
                mesh.vertices[tri[1] as usize],
                mesh.vertices[tri[2] as usize],
            ];
            if a.width_px != 0.0 || b.width_px != 0.0 || c.width_px != 0.0 {
                return acc;
            }
            let [ax, ay] = a.position.map(f64::from);
            let [bx, by] = b.position.map(f64::from);
            let [cx, cy] = c.position.map(f64::from);
            acc + ((bx - ax) * (cy - ay) - (cx - ax) * (by - ay)).abs() / 2.0
        })
    }

    fn square_feature(half: f64, holes: Vec<Vec<[f64; 2]>>) -> FeatureCollection {
        let mut features = FeatureCollection::default();
        features.push(Feature {
            name: "probe".to_string(),
            kind: "type2".to_string(),
            hover: HoverState::None,
            geometry: Polygon::new(
                vec![[-half, -half], [half, -half], [half, half], [-half, half]],
                holes,
            ),
        });
        features
    }

    #[test]
    fn mesh_is_valid_and_nonempty_for_the_startup_features() {
        let features = build_features();
        let mesh = build_mesh(&features, &common_rules(), origin(&features)).unwrap();
        assert!(!mesh.is_empty());
        assert_eq!(mesh.indices.len() % 3, 0);
        let max = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < max));
        // Both fill and extruded stroke geometry are present.
        assert!(mesh.vertices.iter().any(|v| v.width_px == 0.0));
        assert!(mesh.vertices.iter().any(|v| v.width_px == 1.0));
    }

    #[test]
    fn filtered_rules_drop_type3_geometry() {
        let features = build_features();
        let o = origin(&features);
        let common = build_mesh(&features, &common_rules(), o).unwrap();
        let filtered = build_mesh(&features, &filtered_rules(), o).unwrap();
        assert!(!filtered.is_empty());
        assert!(filtered.vertices.len() < common.vertices.len());
        // Two of three near-identical features remain.
        let ratio = filtered.vertices.len() as f64 / common.vertices.len() as f64;
        assert!((ratio - 2.0 / 3.0).abs() < 0.05, "ratio {ratio}");
    }

    #[test]
    fn a_hole_reduces_fill_area() {
        let solid = square_feature(10.0, vec![]);
        let holed = square_feature(
            10.0,
            vec![vec![[-3.0, -3.0], [3.0, -3.0], [3.0, 3.0], [-3.0, 3.0]]],
        );
        let rules = common_rules();
        let solid_area = fill_area(&build_mesh(&solid, &rules, (0.0, 0.0)).unwrap());
        let holed_area = fill_area(&build_mesh(&holed, &rules, (0.0, 0.0)).unwrap());
        assert!((solid_area - 400.0).abs() < 1e-3);
        assert!((holed_area - (400.0 - 36.0)).abs() < 1e-3);
    }

    #[test]
    fn stroke_width_follows_the_resolved_style() {
        let mut features = square_feature(10.0, vec![]);
        features.set_hover(alboran_shared::FeatureId(0), HoverState::Selected);
        let mesh = build_mesh(&features, &common_rules(), (0.0, 0.0)).unwrap();
        let widths: Vec<f32> = mesh
            .vertices
            .iter()
            .filter(|v| v.width_px != 0.0)
            .map(|v| v.width_px)
            .collect();
        assert!(!widths.is_empty());
        assert!(widths.iter().all(|&w| w == 5.0));
    }

    #[test]
    fn fill_color_is_baked_per_hover_state() {
        let features = square_feature(10.0, vec![]);
        let mesh = build_mesh(&features, &common_rules(), (0.0, 0.0)).unwrap();
        let resting = [40.0 / 255.0, 40.0 / 255.0, 40.0 / 255.0, 0.1];
        for v in mesh.vertices.iter().filter(|v| v.width_px == 0.0) {
            assert_eq!(v.color, resting);
        }
    }

    #[test]
    fn positions_are_origin_relative() {
        let features = build_features();
        let o = origin(&features);
        let mesh = build_mesh(&features, &common_rules(), o).unwrap();
        // The whole extent spans well under 400 km around its center.
        assert!(
            mesh.vertices
                .iter()
                .all(|v| v.position[0].abs() < 200_000.0 && v.position[1].abs() < 200_000.0)
        );
    }
}
