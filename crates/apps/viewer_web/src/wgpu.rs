#[cfg(target_arch = "wasm32")]
mod imp {
    use ::wgpu::util::DeviceExt;
    use foundation::math::TileCoord;
    use gpu::{
        BatchHandle, GpuBackend, InstanceData, Mat4, MeshData, MeshHandle, MeshKind,
        RenderCommand, RenderFrame,
    };
    use std::borrow::Cow;
    use std::collections::HashMap;
    use tracing::warn;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;

    const FOREST_SHADER: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
    light_dir: vec3<f32>,
    _pad: f32,
};

struct Batch {
    opacity: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var<uniform> batch: Batch;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) color: vec3<f32>,
};

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) m0: vec4<f32>,
    @location(3) m1: vec4<f32>,
    @location(4) m2: vec4<f32>,
    @location(5) m3: vec4<f32>,
    @location(6) color: vec3<f32>,
) -> VsOut {
    let model = mat4x4<f32>(m0, m1, m2, m3);
    let world = model * vec4<f32>(position, 1.0);
    let n = (model * vec4<f32>(normal, 0.0)).xyz;
    return VsOut(globals.view_proj * world, n, color);
}

@fragment
fn fs_main(fs_in: VsOut) -> @location(0) vec4<f32> {
    let n = normalize(fs_in.normal);
    let l = normalize(globals.light_dir);
    let shade = 0.6 + 0.5 * max(dot(n, l), 0.0);
    return vec4<f32>(fs_in.color * shade, batch.opacity);
}
"#;

    const GROUND_SHADER: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
    light_dir: vec3<f32>,
    _pad: f32,
};

struct Tile {
    center: vec2<f32>,
    size: vec2<f32>,
    elevation: f32,
    opacity: f32,
    _pad: vec2<f32>,
};

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var<uniform> tile: Tile;

@group(1) @binding(1)
var tile_tex: texture_2d<f32>;

@group(1) @binding(2)
var tile_sampler: sampler;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vid: u32) -> VsOut {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0), vec2<f32>(0.0, 1.0), vec2<f32>(1.0, 0.0),
        vec2<f32>(1.0, 0.0), vec2<f32>(0.0, 1.0), vec2<f32>(1.0, 1.0),
    );
    let uv = corners[vid];
    // Texture v runs north to south, scene z runs south.
    let x = tile.center.x + (uv.x - 0.5) * tile.size.x;
    let z = tile.center.y + (uv.y - 0.5) * tile.size.y;
    return VsOut(globals.view_proj * vec4<f32>(x, tile.elevation, z, 1.0), uv);
}

@fragment
fn fs_main(fs_in: VsOut) -> @location(0) vec4<f32> {
    let c = textureSample(tile_tex, tile_sampler, fs_in.uv);
    return vec4<f32>(c.rgb, c.a * tile.opacity);
}
"#;

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct Vertex {
        position: [f32; 3],
        normal: [f32; 3],
    }

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct InstanceRaw {
        model: [[f32; 4]; 4],
        color: [f32; 3],
        _pad: f32,
    }

    impl From<&InstanceData> for InstanceRaw {
        fn from(i: &InstanceData) -> Self {
            Self {
                model: i.model,
                color: i.color,
                _pad: 0.0,
            }
        }
    }

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct Globals {
        view_proj: [[f32; 4]; 4],
        light_dir: [f32; 3],
        _pad: f32,
    }

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct BatchUniform {
        opacity: f32,
        _pad: [f32; 3],
    }

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct TileUniform {
        center: [f32; 2],
        size: [f32; 2],
        elevation: f32,
        opacity: f32,
        _pad: [f32; 2],
    }

    const LIGHT_DIR: [f32; 3] = [0.6, 1.0, 0.4];

    #[derive(Debug)]
    struct GpuMesh {
        vertices: ::wgpu::Buffer,
        indices: ::wgpu::Buffer,
        index_count: u32,
    }

    #[derive(Debug)]
    struct GpuBatch {
        instances: ::wgpu::Buffer,
        capacity: usize,
        uniform: ::wgpu::Buffer,
        bind_group: ::wgpu::BindGroup,
    }

    #[derive(Debug)]
    struct GpuTile {
        texture: ::wgpu::Texture,
        uniform: ::wgpu::Buffer,
        bind_group: ::wgpu::BindGroup,
    }

    /// Browser backend: one render pass per frame drawing ground tiles, then
    /// every instanced batch from the frame's command list.
    #[derive(Debug)]
    pub struct WgpuBackend {
        _instance: &'static ::wgpu::Instance,
        surface: ::wgpu::Surface<'static>,
        device: ::wgpu::Device,
        queue: ::wgpu::Queue,
        config: ::wgpu::SurfaceConfiguration,
        _canvas: web_sys::HtmlCanvasElement,
        forest_pipeline: ::wgpu::RenderPipeline,
        ground_pipeline: ::wgpu::RenderPipeline,
        globals_buffer: ::wgpu::Buffer,
        globals_bind_group: ::wgpu::BindGroup,
        batch_layout: ::wgpu::BindGroupLayout,
        tile_layout: ::wgpu::BindGroupLayout,
        sampler: ::wgpu::Sampler,
        depth_view: ::wgpu::TextureView,
        meshes: HashMap<MeshHandle, GpuMesh>,
        batches: HashMap<BatchHandle, GpuBatch>,
        tiles: HashMap<TileCoord, GpuTile>,
        next_id: u32,
    }

    fn create_depth_view(
        device: &::wgpu::Device,
        config: &::wgpu::SurfaceConfiguration,
    ) -> ::wgpu::TextureView {
        let tex = device.create_texture(&::wgpu::TextureDescriptor {
            label: Some("canopy-depth"),
            size: ::wgpu::Extent3d {
                width: config.width.max(1),
                height: config.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: ::wgpu::TextureDimension::D2,
            format: ::wgpu::TextureFormat::Depth24Plus,
            usage: ::wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        tex.create_view(&::wgpu::TextureViewDescriptor::default())
    }

    fn uniform_entry(binding: u32) -> ::wgpu::BindGroupLayoutEntry {
        ::wgpu::BindGroupLayoutEntry {
            binding,
            visibility: ::wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: ::wgpu::BindingType::Buffer {
                ty: ::wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    }

    fn alpha_target(format: ::wgpu::TextureFormat) -> [Option<::wgpu::ColorTargetState>; 1] {
        [Some(::wgpu::ColorTargetState {
            format,
            blend: Some(::wgpu::BlendState::ALPHA_BLENDING),
            write_mask: ::wgpu::ColorWrites::ALL,
        })]
    }

    fn triangles() -> ::wgpu::PrimitiveState {
        ::wgpu::PrimitiveState {
            topology: ::wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: ::wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: ::wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        }
    }

    fn depth_state(write: bool) -> ::wgpu::DepthStencilState {
        ::wgpu::DepthStencilState {
            format: ::wgpu::TextureFormat::Depth24Plus,
            depth_write_enabled: write,
            depth_compare: ::wgpu::CompareFunction::LessEqual,
            stencil: ::wgpu::StencilState::default(),
            bias: ::wgpu::DepthBiasState::default(),
        }
    }

    pub async fn init_wgpu_from_canvas_id(canvas_id: &str) -> Result<WgpuBackend, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("window missing"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("document missing"))?;
        let canvas_elem = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| JsValue::from_str("canvas missing"))?
            .dyn_into::<web_sys::HtmlCanvasElement>()?;

        let width = canvas_elem.width();
        let height = canvas_elem.height();

        // The surface must not outlive its instance, so the instance lives for
        // the rest of the page.
        let instance: &'static ::wgpu::Instance = Box::leak(Box::new(::wgpu::Instance::new(
            &::wgpu::InstanceDescriptor {
                backends: ::wgpu::Backends::BROWSER_WEBGPU | ::wgpu::Backends::GL,
                ..Default::default()
            },
        )));

        let surface = instance
            .create_surface(::wgpu::SurfaceTarget::Canvas(canvas_elem.clone()))
            .map_err(|e| JsValue::from_str(&format!("surface error: {e}")))?;

        let adapter = instance
            .request_adapter(&::wgpu::RequestAdapterOptions {
                power_preference: ::wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| JsValue::from_str(&format!("adapter error: {e}")))?;

        let (device, queue) = adapter
            .request_device(&::wgpu::DeviceDescriptor {
                label: Some("canopy-wgpu-device"),
                required_features: ::wgpu::Features::empty(),
                required_limits: ::wgpu::Limits::downlevel_webgl2_defaults(),
                ..Default::default()
            })
            .await
            .map_err(|e| JsValue::from_str(&format!("device error: {e}")))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| JsValue::from_str("surface has no formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(::wgpu::CompositeAlphaMode::Auto);

        let config = ::wgpu::SurfaceConfiguration {
            usage: ::wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            desired_maximum_frame_latency: 2,
            present_mode: ::wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, &config);

        let forest_shader = device.create_shader_module(::wgpu::ShaderModuleDescriptor {
            label: Some("canopy-forest-shader"),
            source: ::wgpu::ShaderSource::Wgsl(Cow::Borrowed(FOREST_SHADER)),
        });
        let ground_shader = device.create_shader_module(::wgpu::ShaderModuleDescriptor {
            label: Some("canopy-ground-shader"),
            source: ::wgpu::ShaderSource::Wgsl(Cow::Borrowed(GROUND_SHADER)),
        });

        let globals_buffer = device.create_buffer_init(&::wgpu::util::BufferInitDescriptor {
            label: Some("canopy-globals"),
            contents: bytemuck::bytes_of(&Globals {
                view_proj: [[0.0; 4]; 4],
                light_dir: LIGHT_DIR,
                _pad: 0.0,
            }),
            usage: ::wgpu::BufferUsages::UNIFORM | ::wgpu::BufferUsages::COPY_DST,
        });
        let globals_layout = device.create_bind_group_layout(&::wgpu::BindGroupLayoutDescriptor {
            label: Some("canopy-globals-bgl"),
            entries: &[uniform_entry(0)],
        });
        let globals_bind_group = device.create_bind_group(&::wgpu::BindGroupDescriptor {
            label: Some("canopy-globals-bg"),
            layout: &globals_layout,
            entries: &[::wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let batch_layout = device.create_bind_group_layout(&::wgpu::BindGroupLayoutDescriptor {
            label: Some("canopy-batch-bgl"),
            entries: &[uniform_entry(0)],
        });
        let tile_layout = device.create_bind_group_layout(&::wgpu::BindGroupLayoutDescriptor {
            label: Some("canopy-tile-bgl"),
            entries: &[
                uniform_entry(0),
                ::wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ::wgpu::ShaderStages::FRAGMENT,
                    ty: ::wgpu::BindingType::Texture {
                        sample_type: ::wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: ::wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                ::wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ::wgpu::ShaderStages::FRAGMENT,
                    ty: ::wgpu::BindingType::Sampler(::wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let forest_layout = device.create_pipeline_layout(&::wgpu::PipelineLayoutDescriptor {
            label: Some("canopy-forest-pipeline-layout"),
            bind_group_layouts: &[&globals_layout, &batch_layout],
            immediate_size: 0,
        });
        let ground_layout = device.create_pipeline_layout(&::wgpu::PipelineLayoutDescriptor {
            label: Some("canopy-ground-pipeline-layout"),
            bind_group_layouts: &[&globals_layout, &tile_layout],
            immediate_size: 0,
        });

        let forest_pipeline = device.create_render_pipeline(&::wgpu::RenderPipelineDescriptor {
            label: Some("canopy-forest-pipeline"),
            layout: Some(&forest_layout),
            vertex: ::wgpu::VertexState {
                module: &forest_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[
                    ::wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as ::wgpu::BufferAddress,
                        step_mode: ::wgpu::VertexStepMode::Vertex,
                        attributes: &::wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
                    },
                    ::wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<InstanceRaw>() as ::wgpu::BufferAddress,
                        step_mode: ::wgpu::VertexStepMode::Instance,
                        attributes: &::wgpu::vertex_attr_array![
                            2 => Float32x4,
                            3 => Float32x4,
                            4 => Float32x4,
                            5 => Float32x4,
                            6 => Float32x3
                        ],
                    },
                ],
            },
            fragment: Some(::wgpu::FragmentState {
                module: &forest_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &alpha_target(config.format),
            }),
            primitive: triangles(),
            depth_stencil: Some(depth_state(true)),
            multisample: ::wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        // Ground sits under everything and never writes depth.
        let ground_pipeline = device.create_render_pipeline(&::wgpu::RenderPipelineDescriptor {
            label: Some("canopy-ground-pipeline"),
            layout: Some(&ground_layout),
            vertex: ::wgpu::VertexState {
                module: &ground_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(::wgpu::FragmentState {
                module: &ground_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &alpha_target(config.format),
            }),
            primitive: triangles(),
            depth_stencil: Some(depth_state(false)),
            multisample: ::wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let sampler = device.create_sampler(&::wgpu::SamplerDescriptor {
            label: Some("canopy-tile-sampler"),
            mag_filter: ::wgpu::FilterMode::Linear,
            min_filter: ::wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(WgpuBackend {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            _canvas: canvas_elem,
            forest_pipeline,
            ground_pipeline,
            globals_buffer,
            globals_bind_group,
            batch_layout,
            tile_layout,
            sampler,
            depth_view,
            meshes: HashMap::new(),
            batches: HashMap::new(),
            tiles: HashMap::new(),
            next_id: 0,
        })
    }

    impl WgpuBackend {
        fn next(&mut self) -> u32 {
            self.next_id += 1;
            self.next_id
        }

        pub fn resize(&mut self, width: u32, height: u32) {
            self.config.width = width.max(1);
            self.config.height = height.max(1);
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, &self.config);
        }

        /// Uploads a decoded map tile; it is drawn once a frame lists it.
        pub fn upload_tile(
            &mut self,
            tile: TileCoord,
            bitmap: &web_sys::ImageBitmap,
            center: [f64; 2],
            size: [f64; 2],
            elevation: f64,
            opacity: f32,
        ) {
            let extent = ::wgpu::Extent3d {
                width: bitmap.width().max(1),
                height: bitmap.height().max(1),
                depth_or_array_layers: 1,
            };
            let texture = self.device.create_texture(&::wgpu::TextureDescriptor {
                label: Some("canopy-tile"),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: ::wgpu::TextureDimension::D2,
                format: ::wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: ::wgpu::TextureUsages::TEXTURE_BINDING
                    | ::wgpu::TextureUsages::COPY_DST
                    | ::wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            self.queue.copy_external_image_to_texture(
                &::wgpu::CopyExternalImageSourceInfo {
                    source: ::wgpu::ExternalImageSource::ImageBitmap(bitmap.clone()),
                    origin: ::wgpu::Origin2d::ZERO,
                    flip_y: false,
                },
                ::wgpu::CopyExternalImageDestInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: ::wgpu::Origin3d::ZERO,
                    aspect: ::wgpu::TextureAspect::All,
                    color_space: ::wgpu::PredefinedColorSpace::Srgb,
                    premultiplied_alpha: false,
                },
                extent,
            );
            let view = texture.create_view(&::wgpu::TextureViewDescriptor::default());
            let uniform = self
                .device
                .create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                    label: Some("canopy-tile-uniform"),
                    contents: bytemuck::bytes_of(&TileUniform {
                        center: [center[0] as f32, center[1] as f32],
                        size: [size[0] as f32, size[1] as f32],
                        elevation: elevation as f32,
                        opacity,
                        _pad: [0.0; 2],
                    }),
                    usage: ::wgpu::BufferUsages::UNIFORM,
                });
            let bind_group = self.device.create_bind_group(&::wgpu::BindGroupDescriptor {
                label: Some("canopy-tile-bg"),
                layout: &self.tile_layout,
                entries: &[
                    ::wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform.as_entire_binding(),
                    },
                    ::wgpu::BindGroupEntry {
                        binding: 1,
                        resource: ::wgpu::BindingResource::TextureView(&view),
                    },
                    ::wgpu::BindGroupEntry {
                        binding: 2,
                        resource: ::wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            if let Some(old) = self.tiles.insert(
                tile,
                GpuTile {
                    texture,
                    uniform,
                    bind_group,
                },
            ) {
                old.texture.destroy();
                old.uniform.destroy();
            }
        }

        pub fn render(&mut self, frame: &RenderFrame) -> Result<(), JsValue> {
            let surface_tex = self
                .surface
                .get_current_texture()
                .map_err(|e| JsValue::from_str(&format!("surface acquire failed: {e}")))?;
            let view = surface_tex
                .texture
                .create_view(&::wgpu::TextureViewDescriptor::default());

            let view_proj: Mat4 = frame.view_proj;
            self.queue.write_buffer(
                &self.globals_buffer,
                0,
                bytemuck::bytes_of(&Globals {
                    view_proj,
                    light_dir: LIGHT_DIR,
                    _pad: 0.0,
                }),
            );

            let mut encoder = self
                .device
                .create_command_encoder(&::wgpu::CommandEncoderDescriptor {
                    label: Some("canopy-frame-encoder"),
                });
            {
                let mut rpass = encoder.begin_render_pass(&::wgpu::RenderPassDescriptor {
                    label: Some("canopy-frame-pass"),
                    color_attachments: &[Some(::wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        depth_slice: None,
                        ops: ::wgpu::Operations {
                            load: ::wgpu::LoadOp::Clear(::wgpu::Color {
                                r: 0.043,
                                g: 0.055,
                                b: 0.071,
                                a: 1.0,
                            }),
                            store: ::wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(::wgpu::RenderPassDepthStencilAttachment {
                        view: &self.depth_view,
                        depth_ops: Some(::wgpu::Operations {
                            load: ::wgpu::LoadOp::Clear(1.0),
                            store: ::wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                    multiview_mask: None,
                });
                rpass.set_bind_group(0, &self.globals_bind_group, &[]);

                for command in &frame.commands {
                    match command {
                        RenderCommand::GroundTile { tile, .. } => {
                            let Some(gpu_tile) = self.tiles.get(tile) else {
                                continue;
                            };
                            rpass.set_pipeline(&self.ground_pipeline);
                            rpass.set_bind_group(1, &gpu_tile.bind_group, &[]);
                            rpass.draw(0..6, 0..1);
                        }
                        RenderCommand::Instanced(draw) => {
                            let (Some(batch), Some(mesh)) =
                                (self.batches.get(&draw.batch), self.meshes.get(&draw.mesh))
                            else {
                                continue;
                            };
                            rpass.set_pipeline(&self.forest_pipeline);
                            rpass.set_bind_group(1, &batch.bind_group, &[]);
                            rpass.set_vertex_buffer(0, mesh.vertices.slice(..));
                            rpass.set_vertex_buffer(1, batch.instances.slice(..));
                            rpass.set_index_buffer(mesh.indices.slice(..), ::wgpu::IndexFormat::Uint32);
                            rpass.draw_indexed(0..mesh.index_count, 0, 0..draw.instances);
                        }
                    }
                }
            }

            self.queue.submit(std::iter::once(encoder.finish()));
            surface_tex.present();
            Ok(())
        }
    }

    impl GpuBackend for WgpuBackend {
        fn create_mesh(&mut self, kind: MeshKind, mesh: &MeshData) -> MeshHandle {
            let vertices: Vec<Vertex> = mesh
                .positions
                .iter()
                .zip(&mesh.normals)
                .map(|(&position, &normal)| Vertex { position, normal })
                .collect();
            let label = format!("canopy-mesh-{kind:?}");
            let gpu_mesh = GpuMesh {
                vertices: self
                    .device
                    .create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                        label: Some(&label),
                        contents: bytemuck::cast_slice(&vertices),
                        usage: ::wgpu::BufferUsages::VERTEX,
                    }),
                indices: self
                    .device
                    .create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                        label: Some(&label),
                        contents: bytemuck::cast_slice(&mesh.indices),
                        usage: ::wgpu::BufferUsages::INDEX,
                    }),
                index_count: mesh.indices.len() as u32,
            };
            let handle = MeshHandle(self.next());
            self.meshes.insert(handle, gpu_mesh);
            handle
        }

        fn create_batch(&mut self, _mesh: MeshHandle, capacity: usize) -> BatchHandle {
            let instances = self.device.create_buffer(&::wgpu::BufferDescriptor {
                label: Some("canopy-instances"),
                size: (capacity.max(1) * std::mem::size_of::<InstanceRaw>()) as u64,
                usage: ::wgpu::BufferUsages::VERTEX | ::wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let uniform = self
                .device
                .create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                    label: Some("canopy-batch-uniform"),
                    contents: bytemuck::bytes_of(&BatchUniform {
                        opacity: 1.0,
                        _pad: [0.0; 3],
                    }),
                    usage: ::wgpu::BufferUsages::UNIFORM | ::wgpu::BufferUsages::COPY_DST,
                });
            let bind_group = self.device.create_bind_group(&::wgpu::BindGroupDescriptor {
                label: Some("canopy-batch-bg"),
                layout: &self.batch_layout,
                entries: &[::wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                }],
            });
            let handle = BatchHandle(self.next());
            self.batches.insert(
                handle,
                GpuBatch {
                    instances,
                    capacity,
                    uniform,
                    bind_group,
                },
            );
            handle
        }

        fn write_instances(&mut self, batch: BatchHandle, first: usize, data: &[InstanceData]) {
            let Some(gpu_batch) = self.batches.get(&batch) else {
                return;
            };
            if first + data.len() > gpu_batch.capacity {
                warn!(batch = batch.0, first, len = data.len(), "instance write past capacity");
                return;
            }
            let raw: Vec<InstanceRaw> = data.iter().map(InstanceRaw::from).collect();
            let offset = (first * std::mem::size_of::<InstanceRaw>()) as u64;
            self.queue
                .write_buffer(&gpu_batch.instances, offset, bytemuck::cast_slice(&raw));
        }

        fn set_batch_opacity(&mut self, batch: BatchHandle, opacity: f32) {
            if let Some(gpu_batch) = self.batches.get(&batch) {
                self.queue.write_buffer(
                    &gpu_batch.uniform,
                    0,
                    bytemuck::bytes_of(&BatchUniform {
                        opacity,
                        _pad: [0.0; 3],
                    }),
                );
            }
        }

        fn release_batch(&mut self, batch: BatchHandle) {
            if let Some(gpu_batch) = self.batches.remove(&batch) {
                gpu_batch.instances.destroy();
                gpu_batch.uniform.destroy();
            }
        }

        fn release_mesh(&mut self, mesh: MeshHandle) {
            if let Some(gpu_mesh) = self.meshes.remove(&mesh) {
                gpu_mesh.vertices.destroy();
                gpu_mesh.indices.destroy();
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use foundation::math::TileCoord;
    use gpu::{
        BatchHandle, GpuBackend, InstanceData, MeshData, MeshHandle, MeshKind, RenderFrame,
    };
    use wasm_bindgen::prelude::JsValue;

    #[derive(Debug, Default)]
    pub struct WgpuBackend;

    pub async fn init_wgpu_from_canvas_id(_canvas_id: &str) -> Result<WgpuBackend, JsValue> {
        Err(JsValue::from_str(
            "wgpu initialization is only available on wasm32 targets",
        ))
    }

    impl WgpuBackend {
        pub fn resize(&mut self, _width: u32, _height: u32) {}

        pub fn upload_tile(
            &mut self,
            _tile: TileCoord,
            _bitmap: &web_sys::ImageBitmap,
            _center: [f64; 2],
            _size: [f64; 2],
            _elevation: f64,
            _opacity: f32,
        ) {
        }

        pub fn render(&mut self, _frame: &RenderFrame) -> Result<(), JsValue> {
            Err(JsValue::from_str(
                "wgpu rendering is only available on wasm32 targets",
            ))
        }
    }

    impl GpuBackend for WgpuBackend {
        fn create_mesh(&mut self, _kind: MeshKind, _mesh: &MeshData) -> MeshHandle {
            MeshHandle(0)
        }

        fn create_batch(&mut self, _mesh: MeshHandle, _capacity: usize) -> BatchHandle {
            BatchHandle(0)
        }

        fn write_instances(&mut self, _batch: BatchHandle, _first: usize, _data: &[InstanceData]) {}

        fn set_batch_opacity(&mut self, _batch: BatchHandle, _opacity: f32) {}

        fn release_batch(&mut self, _batch: BatchHandle) {}

        fn release_mesh(&mut self, _mesh: MeshHandle) {}
    }
}

pub use imp::{WgpuBackend, init_wgpu_from_canvas_id};
