use std::collections::HashMap;

use wasm_bindgen::JsCast;
use web_sys::HtmlCanvasElement;
use wgpu::util::DeviceExt;

use alboran_shared::Extent;

use crate::tessellate::{MeshVertex, VectorMesh};
use crate::tiles::LoadedTile;
use crate::viewport::Viewport;

pub struct RenderFrameInput<'a> {
    pub vp: &'a Viewport,
    pub tiles: &'a [LoadedTile],
    pub draw_vectors: bool,
}

// --- GPU data types ---

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct QuadVertex {
    position: [f32; 2],
}

const QUAD_VERTICES: &[QuadVertex] = &[
    QuadVertex {
        position: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, 0.0],
    },
    QuadVertex {
        position: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
    },
];

const QUAD_INDICES: &[u16] = &[0, 1, 2, 2, 1, 3];

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ViewportUniform {
    origin_screen: [f32; 2],
    scale: f32,
    _pad: f32,
    resolution: [f32; 2],
    _pad2: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct TileRectUniform {
    rect: [f32; 4],
}

// --- Tile texture cache ---

struct TileTexture {
    bind_group: wgpu::BindGroup,
    extent: Extent,
}

// --- GpuRenderer ---

/// wgpu renderer over the map canvas. Always draws the basemap tiles; draws
/// the tessellated vector mesh only while the GPU vector backend is active.
///
/// All world coordinates on the GPU are relative to a fixed origin (the
/// feature extent center) so f32 stays precise at mercator magnitudes.
pub struct GpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,

    // Shared quad geometry for tiles
    quad_vertex_buffer: wgpu::Buffer,
    quad_index_buffer: wgpu::Buffer,

    // Viewport uniform (shared by both pipelines)
    viewport_buffer: wgpu::Buffer,
    viewport_bind_group: wgpu::BindGroup,

    // Tile pipeline
    tile_pipeline: wgpu::RenderPipeline,
    tile_bind_group_layout: wgpu::BindGroupLayout,
    tile_sampler: wgpu::Sampler,
    tile_textures: HashMap<u32, TileTexture>,

    // Vector mesh pipeline
    vector_pipeline: wgpu::RenderPipeline,
    vector_vertex_buffer: Option<wgpu::Buffer>,
    vector_index_buffer: Option<wgpu::Buffer>,
    vector_index_count: u32,

    origin: (f64, f64),
    width: u32,
    height: u32,
    dpr: f32,
}

impl GpuRenderer {
    /// Async initialization, WebGL2 path (works everywhere the demo runs).
    pub async fn init(canvas: HtmlCanvasElement, origin: (f64, f64)) -> Result<Self, String> {
        let width = canvas.width().max(1);
        let height = canvas.height().max(1);
        let rect = canvas.get_bounding_client_rect();
        let css_width = rect.width() as f32;
        let dpr = if css_width > 0.0 {
            (width as f32 / css_width).max(0.5)
        } else {
            web_sys::window()
                .map(|w| w.device_pixel_ratio() as f32)
                .unwrap_or(1.0)
        };

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas))
            .map_err(|e| format!("wgpu init create_surface: {e}"))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                ..Default::default()
            })
            .await
            .ok_or_else(|| "wgpu init: no suitable GPU adapter found".to_string())?;

        // WebGL2 adapters expose zero compute limits, so the plain default
        // limits (which include compute) fail validation.
        let required_limits =
            wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("alboran-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| format!("wgpu init request_device: {e}"))?;

        let mut surface_config = surface
            .get_default_config(&adapter, width, height)
            .ok_or_else(|| "wgpu init: surface unsupported by adapter".to_string())?;
        let caps = surface.get_capabilities(&adapter);

        // Prefer a non-sRGB format so tile textures (uploaded as Rgba8Unorm)
        // pass through without double gamma correction.
        if let Some(format) = caps.formats.iter().copied().find(|f| !f.is_srgb()) {
            surface_config.format = format;
        }
        if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::Opaque) {
            surface_config.alpha_mode = wgpu::CompositeAlphaMode::Opaque;
        }
        let format = surface_config.format;

        web_sys::console::log_1(
            &format!(
                "wgpu init: format={:?} present={:?} alpha={:?}",
                surface_config.format, surface_config.present_mode, surface_config.alpha_mode,
            )
            .into(),
        );
        surface.configure(&device, &surface_config);

        // --- Shared geometry and viewport uniform ---
        let quad_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad-verts"),
            contents: bytemuck::cast_slice(QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let quad_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad-indices"),
            contents: bytemuck::cast_slice(QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let viewport_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("viewport-bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let viewport_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("viewport-ubo"),
            contents: bytemuck::cast_slice(&[ViewportUniform {
                origin_screen: [0.0, 0.0],
                scale: 1.0,
                _pad: 0.0,
                resolution: [width as f32 / dpr, height as f32 / dpr],
                _pad2: [0.0, 0.0],
            }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let viewport_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("viewport-bg"),
            layout: &viewport_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: viewport_buffer.as_entire_binding(),
            }],
        });

        let quad_vertex_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            }],
        };

        // --- Tile pipeline ---
        let tile_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tile-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("tile.wgsl").into()),
        });

        let tile_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("tile-bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let tile_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("tile-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let tile_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tile-pl"),
            bind_group_layouts: &[&viewport_bind_group_layout, &tile_bind_group_layout],
            push_constant_ranges: &[],
        });

        let tile_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("tile-pipeline"),
            layout: Some(&tile_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &tile_shader,
                entry_point: Some("vs_main"),
                buffers: &[quad_vertex_layout],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &tile_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        // --- Vector mesh pipeline ---
        let polygon_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("polygon-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("polygon.wgsl").into()),
        });

        let mesh_vertex_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2, // position
                },
                wgpu::VertexAttribute {
                    offset: 8,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2, // normal
                },
                wgpu::VertexAttribute {
                    offset: 16,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x4, // color
                },
                wgpu::VertexAttribute {
                    offset: 32,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32, // width_px
                },
            ],
        };

        let vector_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("polygon-pl"),
                bind_group_layouts: &[&viewport_bind_group_layout],
                push_constant_ranges: &[],
            });

        let vector_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("polygon-pipeline"),
            layout: Some(&vector_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &polygon_shader,
                entry_point: Some("vs_main"),
                buffers: &[mesh_vertex_layout],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &polygon_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            quad_vertex_buffer,
            quad_index_buffer,
            viewport_buffer,
            viewport_bind_group,
            tile_pipeline,
            tile_bind_group_layout,
            tile_sampler,
            tile_textures: HashMap::new(),
            vector_pipeline,
            vector_vertex_buffer: None,
            vector_index_buffer: None,
            vector_index_count: 0,
            origin,
            width,
            height,
            dpr,
        })
    }

    /// Resize the surface when the canvas size changes.
    pub fn resize(&mut self, width: u32, height: u32, dpr: f32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
        self.dpr = dpr;
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    /// Upload tile images as GPU textures with pre-baked rect uniforms.
    /// Tiles already uploaded are skipped.
    pub fn upload_tiles(&mut self, tiles: &[LoadedTile]) {
        let Some(document) = web_sys::window().and_then(|window| window.document()) else {
            web_sys::console::warn_1(&"skipping tile upload: document unavailable".into());
            return;
        };

        for tile in tiles {
            if self.tile_textures.contains_key(&tile.id) {
                continue;
            }

            let img = &tile.image;
            let w = img.natural_width();
            let h = img.natural_height();
            if w == 0 || h == 0 {
                continue;
            }

            // Draw the image to a scratch canvas to extract pixel data.
            let Some(tmp_canvas) = document
                .create_element("canvas")
                .ok()
                .and_then(|element| element.dyn_into::<HtmlCanvasElement>().ok())
            else {
                continue;
            };
            tmp_canvas.set_width(w);
            tmp_canvas.set_height(h);
            let Some(tmp_ctx) = tmp_canvas
                .get_context("2d")
                .ok()
                .flatten()
                .and_then(|ctx| ctx.dyn_into::<web_sys::CanvasRenderingContext2d>().ok())
            else {
                continue;
            };
            tmp_ctx
                .draw_image_with_html_image_element(img, 0.0, 0.0)
                .ok();
            let image_data = match tmp_ctx.get_image_data(0.0, 0.0, w as f64, h as f64) {
                Ok(d) => d,
                Err(_) => continue,
            };
            let pixels = image_data.data();

            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("tile-tex"),
                size: wgpu::Extent3d {
                    width: w,
                    height: h,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });

            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * w),
                    rows_per_image: Some(h),
                },
                wgpu::Extent3d {
                    width: w,
                    height: h,
                    depth_or_array_layers: 1,
                },
            );

            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

            // rect = (min_x, max_y, width, height), origin-relative.
            let rect = [
                (tile.extent.min_x - self.origin.0) as f32,
                (tile.extent.max_y - self.origin.1) as f32,
                tile.extent.width() as f32,
                tile.extent.height() as f32,
            ];

            let rect_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("tile-rect-ubo"),
                    contents: bytemuck::cast_slice(&[TileRectUniform { rect }]),
                    usage: wgpu::BufferUsages::UNIFORM,
                });

            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("tile-bg"),
                layout: &self.tile_bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: rect_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.tile_sampler),
                    },
                ],
            });

            self.tile_textures.insert(
                tile.id,
                TileTexture {
                    bind_group,
                    extent: tile.extent,
                },
            );
        }
    }

    /// Replace the vector mesh buffers with freshly tessellated geometry.
    pub fn upload_mesh(&mut self, mesh: &VectorMesh) {
        if mesh.is_empty() {
            self.clear_mesh();
            return;
        }
        self.vector_vertex_buffer = Some(self.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("vector-verts"),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            },
        ));
        self.vector_index_buffer = Some(self.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("vector-indices"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            },
        ));
        self.vector_index_count = mesh.indices.len() as u32;
    }

    /// Release the vector mesh buffers (backend switched away).
    pub fn clear_mesh(&mut self) {
        self.vector_vertex_buffer = None;
        self.vector_index_buffer = None;
        self.vector_index_count = 0;
    }

    /// Render one frame: basemap tiles, then the vector mesh if enabled.
    pub fn render(&mut self, frame: RenderFrameInput<'_>) {
        let RenderFrameInput {
            vp,
            tiles,
            draw_vectors,
        } = frame;

        // CSS pixel dimensions; shaders work in CSS space.
        let w = self.width as f32 / self.dpr;
        let h = self.height as f32 / self.dpr;

        let (origin_sx, origin_sy) = vp.world_to_screen(self.origin.0, self.origin.1);
        self.queue.write_buffer(
            &self.viewport_buffer,
            0,
            bytemuck::cast_slice(&[ViewportUniform {
                origin_screen: [origin_sx as f32, origin_sy as f32],
                scale: vp.scale as f32,
                _pad: 0.0,
                resolution: [w, h],
                _pad2: [0.0, 0.0],
            }]),
        );

        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.surface_config);
                return;
            }
            Err(_) => return,
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("render-encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.91,
                            g: 0.90,
                            b: 0.87,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });

            if !tiles.is_empty() {
                pass.set_pipeline(&self.tile_pipeline);
                pass.set_bind_group(0, &self.viewport_bind_group, &[]);
                pass.set_vertex_buffer(0, self.quad_vertex_buffer.slice(..));
                pass.set_index_buffer(self.quad_index_buffer.slice(..), wgpu::IndexFormat::Uint16);

                for tile in tiles {
                    let Some(tile_tex) = self.tile_textures.get(&tile.id) else {
                        continue;
                    };

                    // Screen-space frustum cull.
                    let (sx, sy) = vp.world_to_screen(tile_tex.extent.min_x, tile_tex.extent.max_y);
                    let sw = tile_tex.extent.width() * vp.scale;
                    let sh = tile_tex.extent.height() * vp.scale;
                    if sx + sw < 0.0 || sy + sh < 0.0 || sx > w as f64 || sy > h as f64 {
                        continue;
                    }

                    pass.set_bind_group(1, &tile_tex.bind_group, &[]);
                    pass.draw_indexed(0..6, 0, 0..1);
                }
            }

            if draw_vectors
                && self.vector_index_count > 0
                && let (Some(vertices), Some(indices)) =
                    (&self.vector_vertex_buffer, &self.vector_index_buffer)
            {
                pass.set_pipeline(&self.vector_pipeline);
                pass.set_bind_group(0, &self.viewport_bind_group, &[]);
                pass.set_vertex_buffer(0, vertices.slice(..));
                pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..self.vector_index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
    }
}
