use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{Mat4, Vec2, Vec3};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::ActiveEventLoop,
    window::{CursorGrabMode, Window, WindowId},
};

use crate::camera::FpsCamera;
use crate::config::{DemoConfig, Dimensions, ParticleConfig};
use crate::device::{GraphicsDevice, ShaderStage};
use crate::error::DemoError;
use crate::gpu::WgpuDevice;
use crate::input::{InputHandler, InputState};
use crate::particles::ParticlePool;
use crate::shader::{ShaderProgram, PARTICLE_FRAGMENT_WGSL, PARTICLE_VERTEX_WGSL};
use crate::texture::load_sprite_image;
use crate::types::{ParticleKind, ParticleVector};

const FPS_INTERVAL: Duration = Duration::from_millis(250);

/// Frames-per-second over short windows, for the title bar.
#[derive(Debug)]
pub struct FpsCounter {
    window_start: Instant,
    frames: u32,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self { window_start: now, frames: 0 }
    }

    /// Counts a frame; yields a rate once at least 250 ms have gone by.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.duration_since(self.window_start);
        if elapsed <= FPS_INTERVAL {
            return None;
        }
        let fps = f64::from(self.frames) / elapsed.as_secs_f64();
        self.window_start = now;
        self.frames = 0;
        Some(fps)
    }
}

/// The particle pool in whichever dimensionality the config asked for.
pub enum Emitter {
    Flat(ParticlePool<Vec2>),
    Volume(ParticlePool<Vec3>),
}

impl Emitter {
    pub fn new<D: GraphicsDevice>(
        device: &mut D,
        program: ShaderProgram,
        particles: &ParticleConfig,
    ) -> Self {
        let settings = particles.spawn_settings();
        let capacity = particles.capacity;
        let mut emitter = match particles.dimensions {
            Dimensions::Flat => Emitter::Flat(ParticlePool::new(program, capacity, settings)),
            Dimensions::Volume => Emitter::Volume(ParticlePool::new(program, capacity, settings)),
        };
        match &mut emitter {
            Emitter::Flat(pool) => pool.initialize(device),
            Emitter::Volume(pool) => pool.initialize(device),
        }
        emitter
    }

    pub fn update(&mut self, dt: f32, particles: &ParticleConfig) {
        fn step<V: ParticleVector>(
            pool: &mut ParticlePool<V>,
            dt: f32,
            particles: &ParticleConfig,
        ) {
            pool.update(dt, particles.spawn_per_frame, V::from_vec3(particles.spread));
        }
        match self {
            Emitter::Flat(pool) => step(pool, dt, particles),
            Emitter::Volume(pool) => step(pool, dt, particles),
        }
    }

    /// A brighter, faster, wider puff from the emitter.
    pub fn burst(&mut self, particles: &ParticleConfig) {
        fn puff<V: ParticleVector>(pool: &mut ParticlePool<V>, particles: &ParticleConfig) {
            pool.spawn(
                ParticleKind::Burst,
                V::from_vec3(particles.emitter_position),
                V::from_vec3(particles.emitter_velocity * 2.0),
                particles.rotation,
                particles.burst_count,
                V::from_vec3(particles.spread * 2.0),
            );
        }
        match self {
            Emitter::Flat(pool) => puff(pool, particles),
            Emitter::Volume(pool) => puff(pool, particles),
        }
    }

    pub fn render<D: GraphicsDevice>(&self, device: &mut D) -> usize {
        match self {
            Emitter::Flat(pool) => pool.render(device),
            Emitter::Volume(pool) => pool.render(device),
        }
    }

    pub fn program(&self) -> &ShaderProgram {
        match self {
            Emitter::Flat(pool) => pool.program(),
            Emitter::Volume(pool) => pool.program(),
        }
    }

    pub fn alive_count(&self) -> usize {
        match self {
            Emitter::Flat(pool) => pool.alive_count(),
            Emitter::Volume(pool) => pool.alive_count(),
        }
    }

    pub fn destroy<D: GraphicsDevice>(self, device: &mut D) {
        match self {
            Emitter::Flat(pool) => pool.destroy(device),
            Emitter::Volume(pool) => pool.destroy(device),
        }
    }
}

/// Builds the particle shader program from the configured stage sources.
pub fn build_program<D: GraphicsDevice>(device: &mut D, config: &DemoConfig) -> ShaderProgram {
    let vertex = config.shaders.vertex_source().load_or(PARTICLE_VERTEX_WGSL);
    let fragment = config.shaders.fragment_source().load_or(PARTICLE_FRAGMENT_WGSL);

    let mut program = ShaderProgram::new();
    program.load_shader(device, &vertex, ShaderStage::Vertex);
    program.load_shader(device, &fragment, ShaderStage::Fragment);
    program.create_program(device);
    if !program.is_linked() {
        log::error!("Particle shader program did not link; nothing will be drawn");
    }

    let sprite: i32 = if config.render.textured { 0 } else { -1 };
    program.use_program(device);
    program.set_uniform(device, "sprite", sprite);
    program.set_uniform(device, "model", Mat4::IDENTITY);
    program
}

/// Pushes the camera matrices for the next draws made with `program`.
pub fn push_camera<D: GraphicsDevice>(
    device: &mut D,
    program: &ShaderProgram,
    camera: &FpsCamera,
    aspect: f32,
) {
    program.use_program(device);
    program.set_uniform(device, "projection", camera.projection_matrix(aspect));
    program.set_uniform(device, "view", camera.view_matrix());
}

struct DemoState {
    window: Arc<Window>,
    device: WgpuDevice,
    emitter: Emitter,
    camera: FpsCamera,
    fps: FpsCounter,
    last_frame: Instant,
}

impl DemoState {
    fn new(window: Arc<Window>, config: &DemoConfig) -> Result<Self, DemoError> {
        let sprite = load_sprite_image(config.render.texture.as_deref());
        let mut device =
            pollster::block_on(WgpuDevice::new(window.clone(), &config.render, &sprite))?;

        let program = build_program(&mut device, config);
        let emitter = Emitter::new(&mut device, program, &config.particles);
        log::info!(
            "Particle pool ready: {} slots, {:?}",
            config.particles.capacity,
            config.particles.dimensions
        );

        let now = Instant::now();
        Ok(Self {
            window,
            device,
            emitter,
            camera: FpsCamera::new(&config.camera),
            fps: FpsCounter::new(now),
            last_frame: now,
        })
    }

    fn redraw(&mut self, input: &mut InputState, config: &DemoConfig) -> Result<(), DemoError> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        if let Some(fps) = self.fps.tick(now) {
            self.window.set_title(&format!(
                "{} - fps: {:.2} - particles: {}",
                config.window.title,
                fps,
                self.emitter.alive_count()
            ));
        }

        self.camera.apply_input(input, dt);
        if input.take_burst() {
            self.emitter.burst(&config.particles);
        }
        self.emitter.update(dt, &config.particles);

        self.device.begin_frame();
        let aspect = self.device.aspect();
        push_camera(&mut self.device, self.emitter.program(), &self.camera, aspect);
        let drawn = self.emitter.render(&mut self.device);
        log::trace!("Drew {drawn} particles in {dt:.4}s frame");
        self.device.end_frame()
    }
}

pub struct App {
    config: DemoConfig,
    input: InputState,
    state: Option<DemoState>,
    fatal: Option<DemoError>,
}

impl App {
    pub fn new(config: DemoConfig) -> Self {
        Self {
            config,
            input: InputState::default(),
            state: None,
            fatal: None,
        }
    }

    /// The error that stopped the event loop, if any.
    pub fn into_result(self) -> Result<(), DemoError> {
        match self.fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: DemoError) {
        log::error!("Fatal: {error}");
        self.fatal = Some(error);
        event_loop.exit();
    }

    fn create_window(&self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>, DemoError> {
        let window_attrs = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        if let Err(e) = window
            .set_cursor_grab(CursorGrabMode::Confined)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
        {
            log::warn!("Could not grab the cursor: {e}");
        }
        window.set_cursor_visible(false);
        Ok(window)
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let state = self
            .create_window(event_loop)
            .and_then(|window| DemoState::new(window, &self.config));
        match state {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if InputHandler::handle_window_event(&event, &mut self.input, event_loop) {
            return;
        }
        let Some(state) = self.state.as_mut() else {
            return;
        };
        match event {
            WindowEvent::Resized(size) => state.device.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                if let Err(e) = state.redraw(&mut self.input, &self.config) {
                    self.fail(event_loop, e);
                    return;
                }
                state.window.request_redraw();
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut state) = self.state.take() {
            state.emitter.destroy(&mut state.device);
            log::info!("Particle pool released");
        }
    }
}
