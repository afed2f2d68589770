//! wgpu renderer shared by the web and native frontends.
//!
//! Everything is an instanced camera-facing quad; the fragment shader turns
//! each quad into a lit sphere, a flat disc lying in its instance plane or a
//! glow halo. Opaque instances write depth, glow instances are blended on top
//! without writing it.

use std::rc::Rc;

use glam::Vec3;
use wgpu::util::DeviceExt;

use crate::camera::Camera;
use crate::color::Color;
use crate::error::GlobeError;
use crate::glow::{Geometry, GlowShell};
use crate::scene::{Renderer, SceneView, TextureData, TextureState};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const UNTEXTURED_GLOBE: Color = Color::rgb(0.8, 0.8, 0.8);

const KIND_GLOBE: f32 = 0.0;
const KIND_SPHERE: f32 = 1.0;
const KIND_GLOW: f32 = 2.0;
const KIND_DISC: f32 = 3.0;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
    cam_right: [f32; 4],
    cam_up: [f32; 4],
    cam_pos: [f32; 4],
    light_pos: [f32; 4],
    ambient: [f32; 4],
    point: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct InstanceData {
    center: [f32; 3],
    radius: f32,
    color: [f32; 4],
    params: [f32; 4],
    extra: [f32; 4],
}

impl InstanceData {
    fn solid(kind: f32, center: Vec3, radius: f32, color: Color, textured: bool) -> Self {
        Self {
            center: center.to_array(),
            radius,
            color: color.to_vec4(1.0).to_array(),
            params: [kind, if textured { 1.0 } else { 0.0 }, 0.0, 0.0],
            extra: [0.0; 4],
        }
    }

    /// `normal` is carried in `extra.xyz`.
    fn disc(center: Vec3, radius: f32, color: Color, normal: Vec3) -> Self {
        Self {
            extra: normal.extend(0.0).to_array(),
            ..Self::solid(KIND_DISC, center, radius, color, false)
        }
    }

    fn glow(center: Vec3, shell: &GlowShell, scale: f32) -> Self {
        let outer = shell.outer_radius.max(f32::EPSILON) * scale;
        Self {
            center: center.to_array(),
            radius: outer,
            color: shell.color.to_vec4(1.0).to_array(),
            params: [KIND_GLOW, shell.coefficient, shell.power, 0.0],
            extra: [
                (shell.inner_radius * scale / outer).clamp(0.0, 1.0),
                if shell.backside { 1.0 } else { 0.0 },
                0.0,
                0.0,
            ],
        }
    }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let tex = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_globe_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    data: &TextureData,
) -> wgpu::TextureView {
    let tex = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("globe_texture"),
            size: wgpu::Extent3d {
                width: data.width,
                height: data.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &data.rgba,
    );
    tex.create_view(&wgpu::TextureViewDescriptor::default())
}

fn make_scene_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    frag_entry: &str,
    color_format: wgpu::TextureFormat,
    depth_write: bool,
) -> wgpu::RenderPipeline {
    let vertex_buffers = [
        // slot 0: quad corners
        wgpu::VertexBufferLayout {
            array_stride: (std::mem::size_of::<f32>() * 2) as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 0,
                shader_location: 0,
            }],
        },
        // slot 1: instance data
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceData>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x3,
                    offset: 0,
                    shader_location: 1,
                },
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32,
                    offset: 12,
                    shader_location: 2,
                },
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x4,
                    offset: 16,
                    shader_location: 3,
                },
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x4,
                    offset: 32,
                    shader_location: 4,
                },
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x4,
                    offset: 48,
                    shader_location: 5,
                },
            ],
        },
    ];
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(frag_entry),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &vertex_buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(frag_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        cache: None,
        multiview: None,
    })
}

pub struct GpuRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    opaque_pipeline: wgpu::RenderPipeline,
    glow_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    quad_vb: wgpu::Buffer,
    instance_vb: wgpu::Buffer,
    instance_capacity: usize,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    uploaded: Option<Rc<TextureData>>,
    depth_view: wgpu::TextureView,
    clear: wgpu::Color,
    width: u32,
    height: u32,
}

impl GpuRenderer {
    pub async fn new(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
    ) -> anyhow::Result<Self> {
        let width = width.max(1);
        let height = height.max(1);
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("No GPU adapter"))?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    // default limits keep older WebGPU implementations happy
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    label: None,
                },
                None,
            )
            .await
            .map_err(|e| anyhow::anyhow!(format!("request_device error: {:?}", e)))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("surface reports no formats"))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene"),
            source: wgpu::ShaderSource::Wgsl(crate::SCENE_WGSL.into()),
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let quad_vertices: [f32; 12] = [
            -1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0, 1.0,
        ];
        let quad_vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_vb"),
            contents: bytemuck::cast_slice(&quad_vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let instance_capacity = 64;
        let instance_vb = Self::create_instance_buffer(&device, instance_capacity);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("globe_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let fallback = TextureData {
            width: 1,
            height: 1,
            rgba: vec![255; 4],
        };
        let fallback_view = create_globe_texture(&device, &queue, &fallback);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
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
        let bind_group = Self::create_bind_group(
            &device,
            &bind_group_layout,
            &uniform_buffer,
            &fallback_view,
            &sampler,
        );
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pl"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let opaque_pipeline =
            make_scene_pipeline(&device, &pipeline_layout, &shader, "fs_opaque", format, true);
        let glow_pipeline =
            make_scene_pipeline(&device, &pipeline_layout, &shader, "fs_glow", format, false);
        let depth_view = create_depth_view(&device, width, height);

        log::info!("[gpu] renderer ready ({:?}, {}x{})", format, width, height);
        Ok(Self {
            surface,
            device,
            queue,
            config,
            opaque_pipeline,
            glow_pipeline,
            uniform_buffer,
            quad_vb,
            instance_vb,
            instance_capacity,
            bind_group_layout,
            bind_group,
            sampler,
            uploaded: None,
            depth_view,
            clear: wgpu::Color::WHITE,
            width,
            height,
        })
    }

    fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("instance_vb"),
            size: (std::mem::size_of::<InstanceData>() * capacity) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        uniforms: &wgpu::Buffer,
        texture: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bg"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(texture),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn resize_if_needed(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if width != self.width || height != self.height {
            self.width = width;
            self.height = height;
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, width, height);
        }
    }

    fn sync_texture(&mut self, state: &TextureState) {
        let TextureState::Ready(data) = state else {
            return;
        };
        if self.uploaded.as_ref().is_some_and(|u| Rc::ptr_eq(u, data)) {
            return;
        }
        // recorded first so a failing upload is not retried every frame
        self.uploaded = Some(data.clone());
        let limit = self.device.limits().max_texture_dimension_2d;
        let view = match data.fit_within(limit) {
            Some(smaller) => {
                log::warn!(
                    "[gpu] globe texture {}x{} exceeds the {} texel limit, using {}x{}",
                    data.width,
                    data.height,
                    limit,
                    smaller.width,
                    smaller.height
                );
                create_globe_texture(&self.device, &self.queue, &smaller)
            }
            None => create_globe_texture(&self.device, &self.queue, data),
        };
        self.bind_group = Self::create_bind_group(
            &self.device,
            &self.bind_group_layout,
            &self.uniform_buffer,
            &view,
            &self.sampler,
        );
        log::info!("[gpu] globe texture uploaded ({}x{})", data.width, data.height);
    }

    fn build_instances(scene: &SceneView<'_>) -> (Vec<InstanceData>, usize) {
        let textured = matches!(scene.globe.texture, TextureState::Ready(_));
        let globe_color = if textured { Color::WHITE } else { UNTEXTURED_GLOBE };

        let mut opaque = Vec::with_capacity(scene.markers.len() + 1);
        let mut glows = Vec::new();
        opaque.push(InstanceData::solid(
            KIND_GLOBE,
            Vec3::ZERO,
            scene.globe.radius,
            globe_color,
            textured,
        ));
        if let Some(shell) = &scene.globe.glow {
            glows.push(InstanceData::glow(Vec3::ZERO, shell, 1.0));
        }
        for object in scene.markers {
            let radius = object.mesh.geometry.bounding_radius() * object.scale;
            let color = object.mesh.color;
            opaque.push(match object.mesh.geometry {
                Geometry::Sphere { .. } => {
                    InstanceData::solid(KIND_SPHERE, object.position, radius, color, false)
                }
                Geometry::Disc { .. } => {
                    InstanceData::disc(object.position, radius, color, object.normal())
                }
            });
            if let Some(shell) = &object.mesh.glow {
                glows.push(InstanceData::glow(object.position, shell, object.scale));
            }
        }
        let opaque_count = opaque.len();
        opaque.extend(glows);
        (opaque, opaque_count)
    }
}

impl Renderer for GpuRenderer {
    fn render(&mut self, scene: &SceneView<'_>, camera: &Camera) -> Result<(), GlobeError> {
        self.sync_texture(&scene.globe.texture);
        self.clear = to_wgpu_color(scene.clear_color);

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Err(GlobeError::Render("surface lost, reconfigured".into()));
            }
            Err(e) => return Err(GlobeError::Render(format!("{:?}", e))),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let lights = scene.lights;
        let uniforms = Uniforms {
            view_proj: camera.view_projection().to_cols_array_2d(),
            cam_right: camera.right().extend(0.0).to_array(),
            cam_up: camera.up_axis().extend(0.0).to_array(),
            cam_pos: camera.eye.extend(1.0).to_array(),
            light_pos: lights.point_position.extend(1.0).to_array(),
            ambient: lights.ambient.to_vec4(1.0).to_array(),
            point: lights.point.to_vec4(1.0).to_array(),
        };
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let (instances, opaque_count) = Self::build_instances(scene);
        if instances.len() > self.instance_capacity {
            self.instance_capacity = instances.len().next_power_of_two();
            self.instance_vb = Self::create_instance_buffer(&self.device, self.instance_capacity);
        }
        self.queue
            .write_buffer(&self.instance_vb, 0, bytemuck::cast_slice(&instances));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("rpass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rpass.set_bind_group(0, &self.bind_group, &[]);
            rpass.set_vertex_buffer(0, self.quad_vb.slice(..));
            rpass.set_vertex_buffer(1, self.instance_vb.slice(..));
            rpass.set_pipeline(&self.opaque_pipeline);
            rpass.draw(0..6, 0..opaque_count as u32);
            if instances.len() > opaque_count {
                rpass.set_pipeline(&self.glow_pipeline);
                rpass.draw(0..6, opaque_count as u32..instances.len() as u32);
            }
        }
        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.resize_if_needed(width, height);
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear = to_wgpu_color(color);
    }
}

fn to_wgpu_color(c: Color) -> wgpu::Color {
    wgpu::Color {
        r: c.r as f64,
        g: c.g as f64,
        b: c.b as f64,
        a: 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::{GpuRenderer, KIND_DISC, KIND_GLOBE, KIND_GLOW, KIND_SPHERE};
    use crate::color::Color;
    use crate::coords::Coordinates;
    use crate::glow::{Geometry, ShellGlowFactory};
    use crate::interaction::HoverSink;
    use crate::markers::{build_marker_set, Marker, MarkerMesh};
    use crate::options::MarkerOptions;
    use crate::scene::{GlobeSurface, Lights, SceneView, TextureState};
    use glam::Vec3;
    use std::rc::Rc;

    #[test]
    fn discs_carry_their_outward_normal() {
        let options = MarkerOptions {
            renderer: Some(Rc::new(|m: &Marker| MarkerMesh {
                geometry: if m.value > 1.0 {
                    Geometry::Disc { radius: 3.0 }
                } else {
                    Geometry::Sphere {
                        radius: 3.0,
                        segments: 8,
                    }
                },
                color: Color::WHITE,
                glow: None,
            })),
            ..MarkerOptions::default()
        };
        let markers = [
            Marker::new(Coordinates::new(0.0, 0.0).unwrap(), 1.0),
            Marker::new(Coordinates::new(30.0, 60.0).unwrap(), 2.0),
        ];
        let set = build_marker_set(
            &markers,
            &options,
            100.0,
            &ShellGlowFactory,
            1,
            &HoverSink::default(),
        );
        let surface = GlobeSurface {
            radius: 100.0,
            segments: 16,
            texture: TextureState::Pending,
            glow: None,
        };
        let scene = SceneView {
            globe: &surface,
            markers: &set.objects,
            lights: Lights {
                ambient: Color::WHITE,
                point: Color::WHITE,
                point_position: Vec3::ZERO,
            },
            clear_color: Color::WHITE,
        };

        let (instances, opaque) = GpuRenderer::build_instances(&scene);
        assert_eq!((instances.len(), opaque), (3, 3));
        assert_eq!(instances[0].params[0], KIND_GLOBE);
        assert_eq!(instances[1].params[0], KIND_SPHERE);
        assert_eq!(instances[1].extra, [0.0; 4]);

        let disc = &instances[2];
        assert_eq!(disc.params[0], KIND_DISC);
        let normal = Vec3::from_slice(&disc.extra[..3]);
        assert!((normal - set.objects[1].normal()).length() < 1e-6);
        assert!(normal.dot(Vec3::from(disc.center).normalize()) > 0.999);
        assert!(instances.iter().all(|i| i.params[0] != KIND_GLOW));
    }
}
