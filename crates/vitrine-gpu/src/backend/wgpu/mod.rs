//! wgpu backend.
//!
//! Responsibilities:
//! - device/queue bring-up (instance, adapter, feature negotiation)
//! - the shared bind group layouts and pipeline layout every pipeline uses
//! - render pipeline compilation from the WGSL library
//! - pass recording: the op-stream match lives in `submit_pass`
//!
//! One `WgpuBackend` backs one `Device`; surfaces attach through
//! [`WgpuDrawContext`].

mod buffer;
mod fence;
mod image;
mod shaders;
mod surface;

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::backend::{
    Backend, BufferKind, GpuImage, LoadAction, PassDescriptor, SubmitArgs,
};
use crate::error::GpuError;
use crate::image::{ImageFormat, ImageInfo, ImageUsage};
use crate::ops::{OpList, RenderOp};
use crate::pipeline::{CompileEffort, PipelineKey, ShaderFlags};
use crate::texture::{mip_extent, Texture};

pub use self::buffer::WgpuBuffer;
pub use self::fence::WgpuFence;
pub use self::image::{WgpuImage, WgpuRenderTarget, WgpuTexture};
pub use self::surface::{SurfaceInit, WgpuDrawContext};

use self::image::map_format;
use self::shaders::{blend_state, ShaderLibrary};

/// Setting this environment variable (to anything but "0") makes backend
/// bring-up fail with `BackendUnavailable`, forcing callers onto their
/// fallback path.
pub const DISABLE_ENV: &str = "VITRINE_GPU_DISABLE";

/// Vertex layout shared by every shader.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position in device pixels, origin top-left.
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    /// Premultiplied color.
    pub color: [f32; 4],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32x4];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Per-pass uniform data, written into the frame's globals buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Globals {
    /// xy = render target size in device pixels; zw unused.
    pub target_size: [f32; 4],
    /// Fine clip rect (x, y, w, h) for the `CLIP_RECT` shader path.
    pub clip_rect: [f32; 4],
}

/// Backend bring-up options.
#[derive(Debug, Clone)]
pub struct WgpuBackendInit {
    pub power_preference: wgpu::PowerPreference,
    pub force_fallback_adapter: bool,
}

impl Default for WgpuBackendInit {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::None,
            force_fallback_adapter: false,
        }
    }
}

pub struct WgpuBackend {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    globals_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    storage_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler_nearest: wgpu::Sampler,
    sampler_linear: wgpu::Sampler,
    /// 1x1 white, bound for draws without a sampled image so the texture
    /// bind group is always valid.
    fallback_texture: WgpuImage,
    /// Zeroed buffer bound when a pass carries no storage data.
    fallback_storage: wgpu::Buffer,
    shaders: ShaderLibrary,
}

impl WgpuBackend {
    pub fn new(init: WgpuBackendInit) -> Result<Self, GpuError> {
        if std::env::var_os(DISABLE_ENV).is_some_and(|v| v != "0") {
            return Err(GpuError::BackendUnavailable {
                backend: "wgpu",
                reason: format!("disabled via {DISABLE_ENV}"),
            });
        }

        // All backends so wgpu can pick the optimal platform backend.
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: init.power_preference,
            force_fallback_adapter: init.force_fallback_adapter,
            compatible_surface: None,
        }))
        .map_err(|err| GpuError::BackendUnavailable {
            backend: "wgpu",
            reason: format!("no suitable adapter: {err}"),
        })?;

        let info = adapter.get_info();
        log::info!("wgpu adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("vitrine device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|err| GpuError::BackendUnavailable {
            backend: "wgpu",
            reason: format!("device request failed: {err}"),
        })?;

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("vitrine globals layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("vitrine texture layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let storage_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("vitrine storage layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        // One layout for every pipeline; shaders bind a subset of it.
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("vitrine pipeline layout"),
            bind_group_layouts: &[&globals_layout, &texture_layout, &storage_layout],
            push_constant_ranges: &[],
        });

        let sampler_nearest = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("vitrine nearest sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let sampler_linear = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("vitrine linear sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let fallback_texture = WgpuImage::create(
            &device,
            ImageInfo::new(ImageFormat::Rgba8Unorm, 1, 1, ImageUsage::Sampled),
        )?;
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: fallback_texture.raw(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[0xff, 0xff, 0xff, 0xff],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );

        // Large enough for a color matrix (4 rows + offset).
        let fallback_storage = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("vitrine fallback storage"),
            contents: &[0u8; 80],
            usage: wgpu::BufferUsages::STORAGE,
        });

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            globals_layout,
            texture_layout,
            storage_layout,
            pipeline_layout,
            sampler_nearest,
            sampler_linear,
            fallback_texture,
            fallback_storage,
            shaders: ShaderLibrary::new(),
        })
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn raw_device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn raw_queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn texture_bind_group(&self, view: &wgpu::TextureView, linear: bool) -> wgpu::BindGroup {
        let sampler = if linear {
            &self.sampler_linear
        } else {
            &self.sampler_nearest
        };
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("vitrine texture bind group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }
}

impl Backend for WgpuBackend {
    type Buffer = WgpuBuffer;
    type Image = WgpuImage;
    type Pipeline = wgpu::RenderPipeline;
    type Fence = WgpuFence;
    type RenderTarget = WgpuRenderTarget;

    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_buffer(&self, kind: BufferKind, size: u64) -> Result<Self::Buffer, GpuError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = WgpuBuffer::new(&self.device, &self.queue, kind, size);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(GpuError::BufferAllocation {
                size,
                reason: err.to_string(),
            });
        }
        Ok(buffer)
    }

    fn create_image(&self, info: ImageInfo) -> Result<Self::Image, GpuError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let image = WgpuImage::create(&self.device, info);
        let scope_err = pollster::block_on(self.device.pop_error_scope());
        let image = image?;
        if let Some(err) = scope_err {
            return Err(GpuError::ImageAllocation {
                info,
                reason: err.to_string(),
            });
        }
        Ok(image)
    }

    fn upload_image(
        &self,
        image: &Self::Image,
        mip_level: u32,
        data: &[u8],
    ) -> Result<(), GpuError> {
        let (width, height) = mip_extent(image.width(), image.height(), mip_level);
        let bytes_per_row = width * image.info().format.bytes_per_pixel();
        debug_assert_eq!(
            data.len() as u64,
            bytes_per_row as u64 * height as u64,
            "upload data does not cover mip {mip_level} of {}x{}",
            image.width(),
            image.height(),
        );

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: image.raw(),
                mip_level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn create_render_target(&self, image: &Self::Image) -> Self::RenderTarget {
        // Attachment views cover the base mip only.
        let view = image.raw().create_view(&wgpu::TextureViewDescriptor {
            label: Some("vitrine render target view"),
            mip_level_count: Some(1),
            ..Default::default()
        });
        WgpuRenderTarget { view }
    }

    fn compile_pipeline(
        &self,
        key: &PipelineKey,
        effort: CompileEffort,
    ) -> Result<Self::Pipeline, GpuError> {
        let module = self.shaders.module(&self.device, key, effort)?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(key.shader.shader_name()),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[Vertex::layout()],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: map_format(key.format),
                        blend: blend_state(key.blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(GpuError::PipelineCompile {
                key: *key,
                reason: err.to_string(),
            });
        }

        Ok(pipeline)
    }

    fn create_fence(&self) -> Self::Fence {
        WgpuFence::new(self.device.clone())
    }

    fn try_wrap_texture(&self, texture: &dyn Texture) -> Option<Self::Image> {
        let native = texture.as_any().downcast_ref::<WgpuTexture>()?;
        let raw = native.raw();
        if !raw.usage().contains(wgpu::TextureUsages::TEXTURE_BINDING) {
            return None;
        }
        let mut info = ImageInfo::new(
            native.format(),
            raw.width(),
            raw.height(),
            ImageUsage::Sampled,
        );
        if raw.mip_level_count() > 1 {
            info = info.with_mipmaps();
        }
        Some(WgpuImage::wrap(raw.clone(), info))
    }

    fn submit_pass(
        &self,
        pass: &PassDescriptor<'_, Self>,
        ops: &OpList,
        args: &SubmitArgs<'_, Self>,
        fence: &Self::Fence,
        signal_value: u64,
    ) -> Result<(), GpuError> {
        let target_w = pass.target.width();
        let target_h = pass.target.height();

        let globals_bg = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("vitrine globals bind group"),
            layout: &self.globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: args.globals.raw().as_entire_binding(),
            }],
        });

        let storage_raw = args
            .storage
            .map(WgpuBuffer::raw)
            .unwrap_or(&self.fallback_storage);
        let storage_bg = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("vitrine storage bind group"),
            layout: &self.storage_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: storage_raw.as_entire_binding(),
            }],
        });

        // Bind groups must outlive the render pass; collect the (image,
        // sampler) combinations the op stream needs up front.
        let mut texture_bgs: HashMap<(Option<u32>, bool), wgpu::BindGroup> = HashMap::new();
        for op in ops.iter() {
            if let RenderOp::Draw(draw) = op {
                let slot = draw.texture.map(|s| s.0);
                let linear = draw.flags.contains(ShaderFlags::LINEAR_SAMPLING);
                texture_bgs.entry((slot, linear)).or_insert_with(|| {
                    let view = match slot {
                        Some(index) => args.images[index as usize].view(),
                        None => self.fallback_texture.view(),
                    };
                    self.texture_bind_group(view, linear)
                });
            }
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("vitrine pass encoder"),
            });

        {
            let load = match pass.load {
                LoadAction::Clear(c) => wgpu::LoadOp::Clear(wgpu::Color {
                    r: c.r as f64,
                    g: c.g as f64,
                    b: c.b as f64,
                    a: c.a as f64,
                }),
                LoadAction::Load => wgpu::LoadOp::Load,
            };

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("vitrine render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: pass.target.view(),
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            // Scissor to the damage region; explicit scissor ops narrow
            // further within it.
            let damage = pass.damage.map(|d| d.clamped_to(target_w, target_h));
            let mut scissor_empty = matches!(damage, Some(d) if d.is_empty());
            if let Some(d) = damage {
                if !d.is_empty() {
                    rpass.set_scissor_rect(d.x, d.y, d.width, d.height);
                }
            }

            rpass.set_vertex_buffer(0, args.vertices.raw().slice(..));
            rpass.set_bind_group(0, &globals_bg, &[]);
            rpass.set_bind_group(2, &storage_bg, &[]);

            let mut next_pipeline = 0usize;
            for op in ops.iter() {
                match op {
                    RenderOp::Scissor(rect) => {
                        let rect = match pass.damage {
                            Some(d) => rect.intersect(d).unwrap_or_default(),
                            None => *rect,
                        }
                        .clamped_to(target_w, target_h);
                        scissor_empty = rect.is_empty();
                        if !scissor_empty {
                            rpass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);
                        }
                    }
                    RenderOp::Draw(draw) => {
                        let pipeline = &args.pipelines[next_pipeline];
                        next_pipeline += 1;

                        // A draw under an empty scissor cannot produce
                        // fragments; skip it rather than set a zero-area
                        // scissor, which wgpu rejects.
                        if scissor_empty || draw.vertices.is_empty() {
                            continue;
                        }

                        rpass.set_pipeline(pipeline);
                        let key = (
                            draw.texture.map(|s| s.0),
                            draw.flags.contains(ShaderFlags::LINEAR_SAMPLING),
                        );
                        rpass.set_bind_group(1, &texture_bgs[&key], &[]);
                        rpass.draw(draw.vertices.clone(), 0..1);
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        fence.signal_on_done(&self.queue, signal_value);
        Ok(())
    }
}
