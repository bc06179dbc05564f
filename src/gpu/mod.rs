//! wgpu implementation of [`ComputeBackend`].
//!
//! [`GpuKernel`] owns everything that outlives a frame: pipelines, the
//! uniform buffers and every resource handed out through a handle.
//! [`GpuBackend`] pairs it with the [`Screen`] for the duration of a frame.

mod buffers;
mod texture;

use std::collections::HashMap;

use wgpu::include_wgsl;

pub use texture::{procedural_skybox, Texture};

use self::buffers::{
    IndexBuffer, StorageBuffer, UniformBuffer, Vertex, VertexBuffer, QUAD_INDICES, QUAD_VERTICES,
};
use crate::{
    application::Screen,
    backend::{BindingValue, BufferHandle, ComputeBackend, ImageHandle, Slot, TextureHandle},
    error::RenderError,
    scene::Sphere,
    uniforms::FrameUniforms,
};

/// Bytes per accumulation texel: RGBA, 32-bit float each.
const TEXEL_SIZE: u64 = 16;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct PresentUniforms {
    size: [u32; 2],
    _padding: [u32; 2],
}

struct AccumulationImage {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
}

#[derive(Default)]
struct PendingBindings {
    output: Option<ImageHandle>,
    skybox: Option<TextureHandle>,
    spheres: Option<BufferHandle>,
    uniforms: FrameUniforms,
}

type BindingKey = (ImageHandle, BufferHandle, TextureHandle);

pub struct GpuKernel {
    compute_layout: wgpu::BindGroupLayout,
    compute_pipeline: wgpu::ComputePipeline,
    present_layout: wgpu::BindGroupLayout,
    present_pipeline: wgpu::RenderPipeline,
    frame_uniforms: UniformBuffer<FrameUniforms>,
    present_uniforms: UniformBuffer<PresentUniforms>,
    vertex_buffer: VertexBuffer,
    index_buffer: IndexBuffer,
    images: HashMap<ImageHandle, AccumulationImage>,
    scenes: HashMap<BufferHandle, StorageBuffer>,
    textures: HashMap<TextureHandle, Texture>,
    next_id: u32,
    pending: PendingBindings,
    compute_bind_group: Option<(BindingKey, wgpu::BindGroup)>,
    present_bind_group: Option<(ImageHandle, wgpu::BindGroup)>,
}

impl GpuKernel {
    pub fn new(screen: &Screen) -> Self {
        let device = &screen.device;

        let compute_shader = device.create_shader_module(include_wgsl!("../asset/shader/ray_tracing.wgsl"));
        let present_shader = device.create_shader_module(include_wgsl!("../asset/shader/present.wgsl"));

        let compute_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                buffer_layout_entry(0, wgpu::ShaderStages::COMPUTE, wgpu::BufferBindingType::Uniform),
                buffer_layout_entry(
                    1,
                    wgpu::ShaderStages::COMPUTE,
                    wgpu::BufferBindingType::Storage { read_only: false },
                ),
                buffer_layout_entry(
                    2,
                    wgpu::ShaderStages::COMPUTE,
                    wgpu::BufferBindingType::Storage { read_only: true },
                ),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
            label: Some("ray_tracing_bind_group_layout"),
        });

        let present_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                buffer_layout_entry(0, wgpu::ShaderStages::FRAGMENT, wgpu::BufferBindingType::Uniform),
                buffer_layout_entry(
                    1,
                    wgpu::ShaderStages::FRAGMENT,
                    wgpu::BufferBindingType::Storage { read_only: true },
                ),
            ],
            label: Some("present_bind_group_layout"),
        });

        let compute_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Ray Tracing Pipeline Layout"),
            bind_group_layouts: &[&compute_layout],
            push_constant_ranges: &[],
        });

        let compute_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Ray Tracing Pipeline"),
            layout: Some(&compute_pipeline_layout),
            module: &compute_shader,
            entry_point: "main",
        });

        let present_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Present Pipeline Layout"),
            bind_group_layouts: &[&present_layout],
            push_constant_ranges: &[],
        });

        let present_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Present Pipeline"),
            layout: Some(&present_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &present_shader,
                entry_point: "vs_main",
                buffers: &[Vertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &present_shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: screen.config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        Self {
            compute_layout,
            compute_pipeline,
            present_layout,
            present_pipeline,
            frame_uniforms: UniformBuffer::init_immediate(
                device,
                &FrameUniforms::default(),
                Some("Frame Uniforms"),
            ),
            present_uniforms: UniformBuffer::init_immediate(
                device,
                &PresentUniforms::default(),
                Some("Present Uniforms"),
            ),
            vertex_buffer: VertexBuffer::init_immediate(
                device,
                bytemuck::cast_slice(QUAD_VERTICES),
                Some("Vertex Buffer"),
            ),
            index_buffer: IndexBuffer::init_immediate_u16(device, QUAD_INDICES, Some("Index Buffer")),
            images: HashMap::new(),
            scenes: HashMap::new(),
            textures: HashMap::new(),
            next_id: 0,
            pending: PendingBindings::default(),
            compute_bind_group: None,
            present_bind_group: None,
        }
    }

    pub fn create_texture(&mut self, screen: &Screen, img: &image::RgbaImage) -> TextureHandle {
        let texture = Texture::from_image(&screen.device, &screen.queue, img, Some("Skybox"));
        let handle = TextureHandle(self.next_id());
        self.textures.insert(handle, texture);
        handle
    }

    pub fn backend<'a>(&'a mut self, screen: &'a Screen) -> GpuBackend<'a> {
        GpuBackend {
            screen,
            kernel: self,
        }
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

fn buffer_layout_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    ty: wgpu::BufferBindingType,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub struct GpuBackend<'a> {
    screen: &'a Screen,
    kernel: &'a mut GpuKernel,
}

impl ComputeBackend for GpuBackend<'_> {
    fn create_image(&mut self, width: u32, height: u32) -> Result<ImageHandle, RenderError> {
        let device = &self.screen.device;
        let limits = device.limits();
        let size = width as u64 * height as u64 * TEXEL_SIZE;

        if size > limits.max_storage_buffer_binding_size as u64 || size > limits.max_buffer_size {
            return Err(RenderError::TargetAllocation {
                width,
                height,
                reason: format!("{size} bytes exceeds the device's storage buffer limit"),
            });
        }

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Accumulation Target"),
            size,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::TargetAllocation {
                width,
                height,
                reason: err.to_string(),
            });
        }

        let handle = ImageHandle(self.kernel.next_id());
        self.kernel.images.insert(
            handle,
            AccumulationImage {
                buffer,
                width,
                height,
            },
        );
        Ok(handle)
    }

    fn release_image(&mut self, image: ImageHandle) {
        if let Some(released) = self.kernel.images.remove(&image) {
            released.buffer.destroy();
        }
        if matches!(&self.kernel.compute_bind_group, Some(((output, _, _), _)) if *output == image) {
            self.kernel.compute_bind_group = None;
        }
        if matches!(&self.kernel.present_bind_group, Some((output, _)) if *output == image) {
            self.kernel.present_bind_group = None;
        }
        if self.kernel.pending.output == Some(image) {
            self.kernel.pending.output = None;
        }
    }

    fn create_scene_buffer(&mut self, spheres: &[Sphere]) -> Result<BufferHandle, RenderError> {
        let device = &self.screen.device;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = StorageBuffer::init_immediate(device, spheres, Some("Scene Buffer"));
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::SceneUpload(err.to_string()));
        }

        let handle = BufferHandle(self.kernel.next_id());
        self.kernel.scenes.insert(handle, buffer);
        Ok(handle)
    }

    fn release_scene_buffer(&mut self, buffer: BufferHandle) {
        if let Some(released) = self.kernel.scenes.remove(&buffer) {
            released.buffer().destroy();
        }
        if matches!(&self.kernel.compute_bind_group, Some(((_, spheres, _), _)) if *spheres == buffer) {
            self.kernel.compute_bind_group = None;
        }
        if self.kernel.pending.spheres == Some(buffer) {
            self.kernel.pending.spheres = None;
        }
    }

    fn bind(&mut self, slot: Slot, value: BindingValue) -> Result<(), RenderError> {
        let pending = &mut self.kernel.pending;
        let uniforms = &mut pending.uniforms;

        match (slot, value) {
            (Slot::Output, BindingValue::Image(image)) => pending.output = Some(image),
            (Slot::Skybox, BindingValue::Texture(texture)) => pending.skybox = Some(texture),
            (Slot::Spheres, BindingValue::Buffer(buffer)) => pending.spheres = Some(buffer),
            (Slot::CameraToWorld, BindingValue::Mat4(m)) => uniforms.camera_to_world = m,
            (Slot::CameraInverseProjection, BindingValue::Mat4(m)) => {
                uniforms.camera_inverse_projection = m
            }
            (Slot::Light, BindingValue::Vec4(v)) => uniforms.light = v,
            (Slot::PixelOffset, BindingValue::Vec2(v)) => uniforms.pixel_offset = v,
            (Slot::MaxBounces, BindingValue::U32(n)) => uniforms.max_bounces = n,
            (Slot::Sample, BindingValue::U32(n)) => uniforms.sample = n,
            (Slot::Time, BindingValue::F32(t)) => uniforms.time = t,
            (Slot::BlendWeight, BindingValue::F32(w)) => uniforms.blend_weight = w,
            (Slot::Animate, BindingValue::Bool(b)) => uniforms.animate = b as u32,
            (Slot::Accumulate, BindingValue::Bool(b)) => uniforms.accumulate = b as u32,
            (slot, _) => {
                return Err(RenderError::BindingMismatch {
                    slot,
                    expected: slot.kind(),
                })
            }
        }

        Ok(())
    }

    fn dispatch(&mut self, groups_x: u32, groups_y: u32, groups_z: u32) -> Result<(), RenderError> {
        let Self { screen, kernel } = self;
        let pending = &mut kernel.pending;

        let output = pending.output.ok_or(RenderError::Unbound(Slot::Output))?;
        let spheres = pending.spheres.ok_or(RenderError::Unbound(Slot::Spheres))?;
        let skybox = pending.skybox.ok_or(RenderError::Unbound(Slot::Skybox))?;

        let image = kernel
            .images
            .get(&output)
            .ok_or_else(|| RenderError::Dispatch(format!("unknown image {output:?}")))?;
        let scene = kernel
            .scenes
            .get(&spheres)
            .ok_or_else(|| RenderError::Dispatch(format!("unknown scene buffer {spheres:?}")))?;
        let texture = kernel
            .textures
            .get(&skybox)
            .ok_or_else(|| RenderError::Dispatch(format!("unknown texture {skybox:?}")))?;

        pending.uniforms.size = [image.width, image.height];
        pending.uniforms.sphere_count = scene.len();
        kernel.frame_uniforms.write(&screen.queue, &pending.uniforms);

        let key = (output, spheres, skybox);
        if !matches!(&kernel.compute_bind_group, Some((cached, _)) if *cached == key) {
            let bind_group = screen.device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &kernel.compute_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: kernel.frame_uniforms.buffer().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: image.buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: scene.buffer().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::Sampler(&texture.sampler),
                    },
                ],
                label: Some("ray_tracing_bind_group"),
            });
            kernel.compute_bind_group = Some((key, bind_group));
        }

        let Some((_, bind_group)) = &kernel.compute_bind_group else {
            return Err(RenderError::Dispatch("bind group missing".to_owned()));
        };

        screen.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut encoder = screen
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Ray Tracing Encoder"),
            });

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Ray Tracing Pass"),
            });
            compute_pass.set_pipeline(&kernel.compute_pipeline);
            compute_pass.set_bind_group(0, bind_group, &[]);
            compute_pass.dispatch_workgroups(groups_x, groups_y, groups_z);
        }

        screen.queue.submit(std::iter::once(encoder.finish()));

        if let Some(err) = pollster::block_on(screen.device.pop_error_scope()) {
            return Err(RenderError::Dispatch(err.to_string()));
        }

        Ok(())
    }

    fn present(&mut self, image: ImageHandle) -> Result<(), RenderError> {
        let Self { screen, kernel } = self;

        let source = kernel
            .images
            .get(&image)
            .ok_or_else(|| RenderError::Dispatch(format!("unknown image {image:?}")))?;

        kernel.present_uniforms.write(
            &screen.queue,
            &PresentUniforms {
                size: [source.width, source.height],
                _padding: [0; 2],
            },
        );

        if !matches!(&kernel.present_bind_group, Some((cached, _)) if *cached == image) {
            let bind_group = screen.device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &kernel.present_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: kernel.present_uniforms.buffer().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: source.buffer.as_entire_binding(),
                    },
                ],
                label: Some("present_bind_group"),
            });
            kernel.present_bind_group = Some((image, bind_group));
        }

        let Some((_, bind_group)) = &kernel.present_bind_group else {
            return Err(RenderError::Dispatch("bind group missing".to_owned()));
        };

        let output = screen.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = screen
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Present Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            render_pass.set_pipeline(&kernel.present_pipeline);
            render_pass.set_bind_group(0, bind_group, &[]);
            render_pass.set_vertex_buffer(0, kernel.vertex_buffer.buffer().slice(..));
            render_pass.set_index_buffer(
                kernel.index_buffer.buffer().slice(..),
                kernel.index_buffer.format(),
            );
            render_pass.draw_indexed(0..kernel.index_buffer.count(), 0, 0..1);
        }

        // Same queue as the dispatch, so this reads its finished output.
        screen.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
