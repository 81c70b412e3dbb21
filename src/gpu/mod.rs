//! wgpu implementation of [`GraphicsDevice`].
//!
//! wgpu has no notion of per-draw uniform pushes, so draws are recorded
//! between [`WgpuDevice::begin_frame`] and [`WgpuDevice::end_frame`] together
//! with a snapshot of the program's uniform block, then replayed in a single
//! render pass using dynamic uniform offsets.
//!
//! Shader stages are checked with naga before wgpu sees them, and every
//! module and pipeline is created inside a validation error scope, so a bad
//! user shader ends up in a [`BuildReport`] instead of a panic.

mod frame;
mod uniforms;

use std::num::NonZeroU64;
use std::sync::Arc;

use image::RgbaImage;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::config::RenderConfig;
use crate::device::{
    BlendMode, BufferHandle, BuildReport, GraphicsDevice, ProgramHandle, ShaderHandle,
    ShaderStage, UniformLocation, UniformValue,
};
use crate::error::DemoError;
use crate::texture::{soft_disc, SpriteTexture};
use crate::types::QuadVertex;

use frame::{DrawCall, FrameRecorder};
use uniforms::{UniformBlock, UNIFORM_BLOCK_SIZE};

// Draw slots the uniform buffer starts with; it grows on demand
const INITIAL_DRAW_SLOTS: u64 = 1024;

// (group, binding) pairs the particle pipeline layout provides
const RESOURCE_SLOTS: [(u32, u32); 3] = [(0, 0), (1, 0), (1, 1)];

struct StageModule {
    module: wgpu::ShaderModule,
    ir: naga::Module,
}

struct CompiledShader {
    stage: ShaderStage,
    compiled: Option<StageModule>,
}

struct Pipelines {
    alpha: wgpu::RenderPipeline,
    additive: wgpu::RenderPipeline,
}

impl Pipelines {
    fn for_blend(&self, blend: BlendMode) -> &wgpu::RenderPipeline {
        match blend {
            BlendMode::Alpha => &self.alpha,
            BlendMode::Additive => &self.additive,
        }
    }
}

struct LinkedProgram {
    pipelines: Option<Pipelines>,
    uniforms: UniformBlock,
    warned: bool,
}

pub struct WgpuDevice {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline_layout: wgpu::PipelineLayout,
    uniform_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    sprite_bind_group: wgpu::BindGroup,
    clear_color: wgpu::Color,
    buffers: Vec<Option<wgpu::Buffer>>,
    shaders: Vec<CompiledShader>,
    programs: Vec<LinkedProgram>,
    current_program: Option<ProgramHandle>,
    blend: BlendMode,
    frame: FrameRecorder,
    dropped_draws: usize,
}

impl WgpuDevice {
    pub async fn new(
        window: Arc<Window>,
        render: &RenderConfig,
        sprite: &RgbaImage,
    ) -> Result<Self, DemoError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(surface_caps.formats.first())
            .copied()
            .ok_or(DemoError::NoSurfaceFormat)?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if render.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(UNIFORM_BLOCK_SIZE as u64),
                },
                count: None,
            }],
        });
        let sprite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Sprite Layout"),
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
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &sprite_layout],
            immediate_size: 0,
        });

        let limits = device.limits();
        let alignment = limits.min_uniform_buffer_offset_alignment as u64;
        let stride = wgpu::util::align_to(UNIFORM_BLOCK_SIZE as u64, alignment);
        let frame = FrameRecorder::new(stride as usize, limits.max_buffer_size);
        log::debug!("Up to {} particle draws per frame", frame.max_draws());

        let initial_size = (stride * INITIAL_DRAW_SLOTS).min(limits.max_buffer_size);
        let uniform_buffer = create_uniform_buffer(&device, initial_size);
        let uniform_bind_group =
            create_uniform_bind_group(&device, &uniform_layout, &uniform_buffer);

        let sprite = match SpriteTexture::from_image(&device, &queue, sprite) {
            Ok(sprite) => sprite,
            Err(e) => {
                log::error!("{e}; using a generated sprite");
                SpriteTexture::from_image(&device, &queue, &soft_disc(64))?
            }
        };
        let sprite_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Sprite Bind Group"),
            layout: &sprite_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&sprite.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sprite.sampler),
                },
            ],
        });

        let [r, g, b, a] = render.clear_color;
        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline_layout,
            uniform_layout,
            uniform_buffer,
            uniform_bind_group,
            sprite_bind_group,
            clear_color: wgpu::Color { r, g, b, a },
            buffers: Vec::new(),
            shaders: Vec::new(),
            programs: Vec::new(),
            current_program: None,
            blend: BlendMode::Alpha,
            frame,
            dropped_draws: 0,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }

    pub fn begin_frame(&mut self) {
        self.frame.clear();
        self.dropped_draws = 0;
    }

    /// Submits everything drawn since `begin_frame` and presents it.
    pub fn end_frame(&mut self) -> Result<(), DemoError> {
        if self.dropped_draws > 0 {
            log::warn!(
                "Dropped {} draws past the {}-draw frame limit",
                self.dropped_draws,
                self.frame.max_draws()
            );
        }
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(DemoError::OutOfMemory),
            Err(e) => {
                log::warn!("Skipping frame: {e}");
                return Ok(());
            }
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.ensure_uniform_capacity(self.frame.staging().len() as u64);
        if !self.frame.staging().is_empty() {
            self.queue.write_buffer(&self.uniform_buffer, 0, self.frame.staging());
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Particle Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            pass.set_bind_group(1, &self.sprite_bind_group, &[]);
            for draw in self.frame.draws() {
                let Some(pipelines) = self.programs[draw.program as usize].pipelines.as_ref()
                else {
                    continue;
                };
                let Some(buffer) = self.buffers[draw.buffer as usize].as_ref() else {
                    continue;
                };
                pass.set_pipeline(pipelines.for_blend(draw.blend));
                pass.set_bind_group(0, &self.uniform_bind_group, &[draw.uniform_offset]);
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(draw.first..draw.first + draw.count, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// The frame recorder never stages more than `max_buffer_size` bytes.
    fn ensure_uniform_capacity(&mut self, needed: u64) {
        if needed <= self.uniform_buffer.size() {
            return;
        }
        let size = needed.next_power_of_two().min(self.device.limits().max_buffer_size);
        log::debug!("Growing particle uniform buffer to {size} bytes");
        self.uniform_buffer = create_uniform_buffer(&self.device, size);
        self.uniform_bind_group =
            create_uniform_bind_group(&self.device, &self.uniform_layout, &self.uniform_buffer);
    }

    fn build_pipeline(
        &self,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
        blend: BlendMode,
    ) -> wgpu::RenderPipeline {
        let (label, blend_state) = match blend {
            BlendMode::Alpha => ("Particle Pipeline (alpha)", wgpu::BlendState::ALPHA_BLENDING),
            BlendMode::Additive => (
                "Particle Pipeline (additive)",
                wgpu::BlendState {
                    color: wgpu::BlendComponent {
                        src_factor: wgpu::BlendFactor::SrcAlpha,
                        dst_factor: wgpu::BlendFactor::One,
                        operation: wgpu::BlendOperation::Add,
                    },
                    alpha: wgpu::BlendComponent {
                        src_factor: wgpu::BlendFactor::One,
                        dst_factor: wgpu::BlendFactor::One,
                        operation: wgpu::BlendOperation::Add,
                    },
                },
            ),
        };

        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: vertex,
                entry_point: None,
                buffers: &[QuadVertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: fragment,
                entry_point: None,
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.config.format,
                    blend: Some(blend_state),
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
            multiview_mask: None,
            cache: None,
        })
    }

    fn link_stages(
        &self,
        vertex: &StageModule,
        fragment: &StageModule,
    ) -> Result<Pipelines, String> {
        check_link(&vertex.ir, &fragment.ir)?;

        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipelines = Pipelines {
            alpha: self.build_pipeline(&vertex.module, &fragment.module, BlendMode::Alpha),
            additive: self.build_pipeline(&vertex.module, &fragment.module, BlendMode::Additive),
        };
        match pollster::block_on(scope.pop()) {
            None => Ok(pipelines),
            Some(e) => Err(e.to_string()),
        }
    }

    fn stage_module(&self, handle: ShaderHandle, stage: ShaderStage) -> Option<&StageModule> {
        self.shaders
            .get(handle.0 as usize)
            .filter(|s| s.stage == stage)
            .and_then(|s| s.compiled.as_ref())
    }
}

impl GraphicsDevice for WgpuDevice {
    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> BufferHandle {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: wgpu::BufferUsages::VERTEX,
        });
        self.buffers.push(Some(buffer));
        BufferHandle(self.buffers.len() as u32 - 1)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(slot) = self.buffers.get_mut(buffer.0 as usize) {
            if let Some(buffer) = slot.take() {
                buffer.destroy();
            }
        }
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> (ShaderHandle, BuildReport) {
        let (compiled, report) = match validate_stage(stage, source) {
            Ok(ir) => {
                let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
                let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(stage.name()),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                });
                match pollster::block_on(scope.pop()) {
                    None => (Some(StageModule { module, ir }), BuildReport::ok()),
                    Some(e) => (None, BuildReport::failed(e.to_string())),
                }
            }
            Err(log) => (None, BuildReport::failed(log)),
        };
        self.shaders.push(CompiledShader { stage, compiled });
        (ShaderHandle(self.shaders.len() as u32 - 1), report)
    }

    fn link_program(&mut self, shaders: &[ShaderHandle]) -> (ProgramHandle, BuildReport) {
        let find = |stage| shaders.iter().find_map(|&h| self.stage_module(h, stage));
        let unsupported = shaders
            .iter()
            .filter_map(|h| self.shaders.get(h.0 as usize))
            .any(|s| s.stage == ShaderStage::Geometry);

        let linked = match (find(ShaderStage::Vertex), find(ShaderStage::Fragment)) {
            _ if unsupported => Err("geometry stage attached".to_string()),
            (Some(vertex), Some(fragment)) => self.link_stages(vertex, fragment),
            (None, _) => Err("no compiled vertex stage attached".to_string()),
            (_, None) => Err("no compiled fragment stage attached".to_string()),
        };
        let (pipelines, report) = match linked {
            Ok(pipelines) => (Some(pipelines), BuildReport::ok()),
            Err(log) => (None, BuildReport::failed(log)),
        };

        self.programs.push(LinkedProgram {
            pipelines,
            uniforms: UniformBlock::new(),
            warned: false,
        });
        (ProgramHandle(self.programs.len() as u32 - 1), report)
    }

    fn use_program(&mut self, program: ProgramHandle) {
        if (program.0 as usize) < self.programs.len() {
            self.current_program = Some(program);
        } else {
            log::warn!("use_program: unknown program {:?}", program);
        }
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let linked = self.programs.get(program.0 as usize)?;
        linked.pipelines.as_ref()?;
        UniformBlock::slot(name).map(|slot| UniformLocation { program, slot })
    }

    fn set_uniform(&mut self, location: Option<UniformLocation>, value: UniformValue) {
        let Some(location) = location else {
            return;
        };
        let Some(linked) = self.programs.get_mut(location.program.0 as usize) else {
            return;
        };
        if !linked.uniforms.write(location.slot, &value) {
            log::warn!("Uniform slot {} does not take {:?}", location.slot, value);
        }
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend = mode;
    }

    fn draw_triangles(&mut self, buffer: BufferHandle, first: u32, count: u32) {
        let Some(program) = self.current_program else {
            log::warn!("Draw with no program bound");
            return;
        };
        if self.buffers.get(buffer.0 as usize).and_then(Option::as_ref).is_none() {
            log::warn!("Draw from released buffer {:?}", buffer);
            return;
        }
        let linked = &mut self.programs[program.0 as usize];
        if linked.pipelines.is_none() {
            if !linked.warned {
                log::warn!("Program {:?} failed to link, its draws are dropped", program);
                linked.warned = true;
            }
            return;
        }
        let draw = DrawCall {
            program: program.0,
            blend: self.blend,
            buffer: buffer.0,
            first,
            count,
            uniform_offset: 0,
        };
        if !self.frame.push(linked.uniforms.as_bytes(), self.blend, draw) {
            self.dropped_draws += 1;
        }
    }
}

fn naga_stage(stage: ShaderStage) -> Option<naga::ShaderStage> {
    match stage {
        ShaderStage::Vertex => Some(naga::ShaderStage::Vertex),
        ShaderStage::Fragment => Some(naga::ShaderStage::Fragment),
        ShaderStage::Geometry => None,
    }
}

/// The single entry point for `stage`; pipelines are built with
/// `entry_point: None`, which needs exactly one.
fn entry_point(module: &naga::Module, stage: ShaderStage) -> Result<&naga::EntryPoint, String> {
    let naga_stage = naga_stage(stage)
        .ok_or_else(|| format!("{} shaders are not supported by wgpu", stage.name()))?;
    let mut found = module.entry_points.iter().filter(|ep| ep.stage == naga_stage);
    match (found.next(), found.next()) {
        (Some(ep), None) => Ok(ep),
        (None, _) => Err(format!("no {} entry point", stage.name())),
        (Some(_), Some(_)) => Err(format!("more than one {} entry point", stage.name())),
    }
}

/// Parses and validates `source` with naga and checks it has exactly one
/// entry point for `stage`. Invalid WGSL never reaches wgpu.
pub fn validate_stage(stage: ShaderStage, source: &str) -> Result<naga::Module, String> {
    if naga_stage(stage).is_none() {
        return Err(format!("{} shaders are not supported by wgpu", stage.name()));
    }
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| e.emit_to_string(source))?;
    entry_point(&module, stage)?;
    Ok(module)
}

/// Checks the two stages against each other and against the particle
/// pipeline: vertex inputs come from the quad, every fragment input is
/// written by the vertex stage, and resources sit in the bound slots.
pub fn check_link(vertex: &naga::Module, fragment: &naga::Module) -> Result<(), String> {
    let vs = entry_point(vertex, ShaderStage::Vertex)?;
    let fs = entry_point(fragment, ShaderStage::Fragment)?;

    for location in argument_locations(vertex, &vs.function) {
        if location != 0 {
            return Err(format!("vertex input @location({location}) is not provided by the quad"));
        }
    }
    let outputs = vs
        .function
        .result
        .as_ref()
        .map(|r| binding_locations(vertex, r.ty, r.binding.as_ref()))
        .unwrap_or_default();
    for location in argument_locations(fragment, &fs.function) {
        if !outputs.contains(&location) {
            return Err(format!(
                "fragment input @location({location}) is not written by the vertex stage"
            ));
        }
    }

    check_resources(vertex)?;
    check_resources(fragment)
}

fn argument_locations(module: &naga::Module, function: &naga::Function) -> Vec<u32> {
    function
        .arguments
        .iter()
        .flat_map(|arg| binding_locations(module, arg.ty, arg.binding.as_ref()))
        .collect()
}

fn binding_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
) -> Vec<u32> {
    match binding {
        Some(naga::Binding::Location { location, .. }) => vec![*location],
        Some(_) => Vec::new(),
        None => match &module.types[ty].inner {
            naga::TypeInner::Struct { members, .. } => members
                .iter()
                .filter_map(|m| match &m.binding {
                    Some(naga::Binding::Location { location, .. }) => Some(*location),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        },
    }
}

fn check_resources(module: &naga::Module) -> Result<(), String> {
    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        let slot = (binding.group, binding.binding);
        if !RESOURCE_SLOTS.contains(&slot) {
            return Err(format!(
                "@group({}) @binding({}) is not provided by the particle pipeline",
                slot.0, slot.1
            ));
        }
        if slot == (0, 0) {
            let size = module.types[var.ty].inner.try_size(module.to_ctx());
            if size.map_or(true, |size| size as usize > UNIFORM_BLOCK_SIZE) {
                return Err(format!("uniform block is larger than {UNIFORM_BLOCK_SIZE} bytes"));
            }
        }
    }
    Ok(())
}

fn create_uniform_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Particle Uniform Buffer"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Particle Uniform Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: NonZeroU64::new(UNIFORM_BLOCK_SIZE as u64),
            }),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{PARTICLE_FRAGMENT_WGSL, PARTICLE_VERTEX_WGSL};

    const FLAT_FRAGMENT: &str = r#"
@fragment
fn fs_main(@location(1) color: vec4<f32>) -> @location(0) vec4<f32> {
    return color;
}
"#;

    fn embedded() -> (naga::Module, naga::Module) {
        (
            validate_stage(ShaderStage::Vertex, PARTICLE_VERTEX_WGSL).unwrap(),
            validate_stage(ShaderStage::Fragment, PARTICLE_FRAGMENT_WGSL).unwrap(),
        )
    }

    #[test]
    fn embedded_stages_validate_and_link() {
        let (vertex, fragment) = embedded();
        check_link(&vertex, &fragment).unwrap();
    }

    #[test]
    fn source_without_matching_entry_point_fails() {
        let err = validate_stage(ShaderStage::Fragment, PARTICLE_VERTEX_WGSL).unwrap_err();
        assert!(err.contains("fragment"));
    }

    #[test]
    fn two_entry_points_for_one_stage_fail() {
        let source = format!("{FLAT_FRAGMENT}\n{}", FLAT_FRAGMENT.replace("fs_main", "fs_other"));
        let err = validate_stage(ShaderStage::Fragment, &source).unwrap_err();
        assert!(err.contains("more than one"));
    }

    #[test]
    fn syntax_errors_are_reported_not_panicked() {
        assert!(validate_stage(ShaderStage::Vertex, "fn vs_main( {").is_err());
    }

    #[test]
    fn geometry_stage_is_unsupported() {
        assert!(validate_stage(ShaderStage::Geometry, "").is_err());
    }

    #[test]
    fn fragment_reading_a_subset_of_vertex_outputs_links() {
        let (vertex, _) = embedded();
        let fragment = validate_stage(ShaderStage::Fragment, FLAT_FRAGMENT).unwrap();
        check_link(&vertex, &fragment).unwrap();
    }

    #[test]
    fn fragment_input_missing_from_vertex_output_fails_to_link() {
        let (vertex, _) = embedded();
        let source = FLAT_FRAGMENT.replace("@location(1)", "@location(2)");
        let fragment = validate_stage(ShaderStage::Fragment, &source).unwrap();

        let err = check_link(&vertex, &fragment).unwrap_err();
        assert!(err.contains("@location(2)"));
    }

    #[test]
    fn oversized_uniform_block_fails_to_link() {
        let (vertex, _) = embedded();
        let source = r#"
struct Big {
    values: array<vec4<f32>, 32>,
};
@group(0) @binding(0) var<uniform> u: Big;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return u.values[0];
}
"#;
        let fragment = validate_stage(ShaderStage::Fragment, source).unwrap();

        let err = check_link(&vertex, &fragment).unwrap_err();
        assert!(err.contains("uniform block"));
    }

    #[test]
    fn unbound_resource_slot_fails_to_link() {
        let (vertex, _) = embedded();
        let source = r#"
@group(2) @binding(0) var<uniform> tint: vec4<f32>;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return tint;
}
"#;
        let fragment = validate_stage(ShaderStage::Fragment, source).unwrap();

        let err = check_link(&vertex, &fragment).unwrap_err();
        assert!(err.contains("@group(2)"));
    }

    #[test]
    fn extra_vertex_input_fails_to_link() {
        let (_, fragment) = embedded();
        let source = r#"
@vertex
fn vs_main(@location(0) v: vec4<f32>, @location(3) extra: f32) -> @builtin(position) vec4<f32> {
    return v * extra;
}
"#;
        let vertex = validate_stage(ShaderStage::Vertex, source).unwrap();

        let err = check_link(&vertex, &fragment).unwrap_err();
        assert!(err.contains("vertex input @location(3)"));
    }

    #[test]
    fn shader_block_matches_uniform_layout() {
        // The WGSL struct and the Rust field table have to agree
        let (vertex, _) = embedded();
        let (_, ty) = vertex
            .types
            .iter()
            .find(|(_, ty)| ty.name.as_deref() == Some("ParticleUniforms"))
            .unwrap();
        let naga::TypeInner::Struct { members, span } = &ty.inner else {
            panic!("ParticleUniforms is not a struct");
        };
        assert_eq!(*span as usize, UNIFORM_BLOCK_SIZE);
        for member in members {
            let name = member.name.as_deref().unwrap();
            let slot = UniformBlock::slot(name).unwrap() as usize;
            let field = uniforms::PARTICLE_UNIFORM_FIELDS[slot];
            assert_eq!(field.offset, member.offset as usize, "{name}");
        }
    }
}
