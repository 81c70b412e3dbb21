use std::ops::Range;

use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::device::{BlendMode, BufferHandle, GraphicsDevice};
use crate::shader::ShaderProgram;
use crate::types::{Particle, ParticleKind, ParticleVector, PARTICLE_QUAD};

// Respawn randomisation
const POSITION_JITTER: Range<f32> = -5.0..5.0;
const VELOCITY_JITTER: Range<f32> = -0.05..0.05;
const BRIGHTNESS: Range<f32> = 0.5..1.5;

/// What to do when a spawn finds every slot alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaturationPolicy {
    /// Overwrite slot 0, keeping new particles flowing at the cost of one live one.
    #[default]
    EvictFirst,
    /// Drop the spawn.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnSettings {
    /// Lifetime in seconds given to every respawned particle.
    pub life: f32,
    pub saturation: SaturationPolicy,
    pub emitter_position: Vec3,
    pub emitter_velocity: Vec3,
    pub rotation: f32,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            life: 1.0,
            saturation: SaturationPolicy::EvictFirst,
            emitter_position: Vec3::ZERO,
            emitter_velocity: Vec3::ZERO,
            rotation: 0.0,
        }
    }
}

/// Fixed-capacity particle pool.
///
/// Slots are allocated once in [`initialize`](Self::initialize) and recycled
/// forever after; a slot is free whenever its particle's life has run out.
pub struct ParticlePool<V> {
    particles: Vec<Particle<V>>,
    capacity: usize,
    // Where the last free-slot search stopped; only a hint
    last_used: usize,
    quad: Option<BufferHandle>,
    program: ShaderProgram,
    settings: SpawnSettings,
    rng: StdRng,
}

impl<V: ParticleVector> ParticlePool<V> {
    pub fn new(program: ShaderProgram, capacity: usize, settings: SpawnSettings) -> Self {
        Self::with_rng(program, capacity, settings, StdRng::from_entropy())
    }

    pub fn with_seed(
        program: ShaderProgram,
        capacity: usize,
        settings: SpawnSettings,
        seed: u64,
    ) -> Self {
        Self::with_rng(program, capacity, settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        program: ShaderProgram,
        capacity: usize,
        settings: SpawnSettings,
        rng: StdRng,
    ) -> Self {
        Self {
            particles: Vec::new(),
            capacity,
            last_used: 0,
            quad: None,
            program,
            settings,
            rng,
        }
    }

    /// Uploads the shared quad and fills the pool with dead particles.
    pub fn initialize<D: GraphicsDevice>(&mut self, device: &mut D) {
        if self.quad.is_some() {
            log::warn!("Particle pool already initialized");
            return;
        }
        let vertices: &[u8] = bytemuck::cast_slice(&PARTICLE_QUAD);
        self.quad = Some(device.create_vertex_buffer("Particle Quad", vertices));
        self.particles = vec![Particle::default(); self.capacity];
        self.last_used = 0;
        log::debug!("Particle pool initialized with {} slots", self.capacity);
    }

    /// Index of a dead slot, searching forward from the last hit and wrapping.
    ///
    /// With every slot alive the saturation policy decides: `EvictFirst`
    /// hands out slot 0, `Reject` hands out nothing.
    pub fn find_recyclable_slot(&mut self) -> Option<usize> {
        if self.particles.is_empty() {
            return None;
        }
        let start = self.last_used.min(self.particles.len());
        let found = (start..self.particles.len())
            .chain(0..start)
            .find(|&i| !self.particles[i].is_alive());

        match (found, self.settings.saturation) {
            (Some(i), _) => {
                self.last_used = i;
                Some(i)
            }
            (None, SaturationPolicy::EvictFirst) => {
                self.last_used = 0;
                Some(0)
            }
            (None, SaturationPolicy::Reject) => None,
        }
    }

    pub fn respawn(
        &mut self,
        slot: usize,
        kind: ParticleKind,
        position: V,
        velocity: V,
        rotation: f32,
        offset: V,
    ) {
        let jitter = V::random_in(&mut self.rng, POSITION_JITTER);
        let drift = V::random_in(&mut self.rng, VELOCITY_JITTER);
        let brightness = self.rng.gen_range(BRIGHTNESS);
        let life = self.settings.life;

        let Some(particle) = self.particles.get_mut(slot) else {
            log::warn!("Respawn of slot {slot} outside pool of {}", self.capacity);
            return;
        };
        particle.position = position + offset * jitter;
        particle.velocity = velocity + drift;
        particle.color = (kind.tint() * brightness).extend(1.0);
        particle.life = life;
        particle.rotation = rotation;
        particle.kind = kind;
    }

    pub fn spawn(
        &mut self,
        kind: ParticleKind,
        position: V,
        velocity: V,
        rotation: f32,
        count: u32,
        offset: V,
    ) {
        for _ in 0..count {
            let Some(slot) = self.find_recyclable_slot() else {
                log::trace!("Pool saturated, dropping remaining spawns");
                break;
            };
            self.respawn(slot, kind, position, velocity, rotation, offset);
        }
    }

    /// Spawns `spawn_count` ambient particles, then ages every slot by `dt`.
    pub fn update(&mut self, dt: f32, spawn_count: u32, offset: V) {
        let position = V::from_vec3(self.settings.emitter_position);
        let velocity = V::from_vec3(self.settings.emitter_velocity);
        let rotation = self.settings.rotation;
        self.spawn(ParticleKind::Ambient, position, velocity, rotation, spawn_count, offset);

        for p in &mut self.particles {
            p.life -= dt;
            if p.life > 0.0 {
                p.position -= p.velocity * dt;
                p.color.w -= dt;
            }
        }
    }

    /// Draws every live particle with additive blending, in slot order.
    ///
    /// Returns the number of draw calls issued.
    pub fn render<D: GraphicsDevice>(&self, device: &mut D) -> usize {
        let Some(quad) = self.quad else {
            return 0;
        };

        device.set_blend_mode(BlendMode::Additive);
        self.program.use_program(device);

        let mut drawn = 0;
        for p in self.particles.iter().filter(|p| p.is_alive()) {
            self.program.set_uniform(device, "offset", p.position.to_uniform());
            // Alpha keeps decaying past zero; never push a negative one
            let color = Vec4::new(p.color.x, p.color.y, p.color.z, p.color.w.max(0.0));
            self.program.set_uniform(device, "color", color);
            device.draw_triangles(quad, 0, PARTICLE_QUAD.len() as u32);
            drawn += 1;
        }

        device.set_blend_mode(BlendMode::Alpha);
        drawn
    }

    /// Releases the quad buffer. The pool is unusable afterwards.
    pub fn destroy<D: GraphicsDevice>(self, device: &mut D) {
        if let Some(quad) = self.quad {
            device.destroy_buffer(quad);
        }
    }

    pub fn alive_count(&self) -> usize {
        self.particles.iter().filter(|p| p.is_alive()).count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn particles(&self) -> &[Particle<V>] {
        &self.particles
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::recording::{Call, RecordingDevice};
    use crate::device::{ShaderStage, UniformValue};
    use crate::shader::{PARTICLE_FRAGMENT_WGSL, PARTICLE_VERTEX_WGSL};
    use glam::Vec2;

    fn program(device: &mut RecordingDevice) -> ShaderProgram {
        let mut program = ShaderProgram::new();
        program.load_shader(device, PARTICLE_VERTEX_WGSL, ShaderStage::Vertex);
        program.load_shader(device, PARTICLE_FRAGMENT_WGSL, ShaderStage::Fragment);
        program.create_program(device);
        program
    }

    fn pool_with(
        device: &mut RecordingDevice,
        capacity: usize,
        settings: SpawnSettings,
    ) -> ParticlePool<Vec2> {
        let program = program(device);
        let mut pool = ParticlePool::with_seed(program, capacity, settings, 42);
        pool.initialize(device);
        pool
    }

    fn pool(device: &mut RecordingDevice, capacity: usize) -> ParticlePool<Vec2> {
        pool_with(device, capacity, SpawnSettings::default())
    }

    fn spawn(pool: &mut ParticlePool<Vec2>, count: u32) {
        pool.spawn(ParticleKind::Ambient, Vec2::ZERO, Vec2::ZERO, 0.0, count, Vec2::ZERO);
    }

    #[test]
    fn initialize_fills_pool_with_dead_particles() {
        let mut device = RecordingDevice::new();
        let pool = pool(&mut device, 7);

        assert_eq!(pool.particles().len(), 7);
        assert!(pool.particles().iter().all(|p| p.life <= 0.0));
        assert_eq!(pool.alive_count(), 0);
        assert!(device
            .calls
            .contains(&Call::CreateBuffer { label: "Particle Quad".into(), len: 96 }));
    }

    #[test]
    fn initialize_twice_is_a_no_op() {
        let mut device = RecordingDevice::new();
        let mut pool = pool(&mut device, 3);
        spawn(&mut pool, 1);

        pool.initialize(&mut device);

        let buffers = device
            .calls
            .iter()
            .filter(|c| matches!(c, Call::CreateBuffer { .. }))
            .count();
        assert_eq!(buffers, 1);
        assert_eq!(pool.alive_count(), 1);
    }

    #[test]
    fn recycling_prefers_dead_slots_and_wraps() {
        let mut device = RecordingDevice::new();
        let mut pool = pool(&mut device, 4);
        for p in &mut pool.particles {
            p.life = 1.0;
        }
        pool.particles[1].life = 0.0;
        pool.last_used = 3;

        assert_eq!(pool.find_recyclable_slot(), Some(1));
        assert_eq!(pool.last_used, 1);
    }

    #[test]
    fn recycling_scans_forward_from_cursor() {
        let mut device = RecordingDevice::new();
        let mut pool = pool(&mut device, 5);
        spawn(&mut pool, 3);

        assert_eq!(pool.find_recyclable_slot(), Some(3));
        assert_eq!(pool.alive_count(), 3);
    }

    #[test]
    fn saturated_pool_evicts_slot_zero() {
        let mut device = RecordingDevice::new();
        let mut pool = pool(&mut device, 3);
        spawn(&mut pool, 3);
        pool.last_used = 2;

        assert_eq!(pool.find_recyclable_slot(), Some(0));
        assert_eq!(pool.last_used, 0);
    }

    #[test]
    fn reject_policy_leaves_saturated_pool_alone() {
        let mut device = RecordingDevice::new();
        let settings = SpawnSettings { saturation: SaturationPolicy::Reject, ..Default::default() };
        let mut pool = pool_with(&mut device, 2, settings);
        spawn(&mut pool, 2);
        pool.update(0.5, 0, Vec2::ZERO);

        spawn(&mut pool, 3);

        assert_eq!(pool.find_recyclable_slot(), None);
        assert!(pool.particles().iter().all(|p| (p.life - 0.5).abs() < 1e-6));
    }

    #[test]
    fn eviction_restarts_slot_zero_lifetime() {
        let mut device = RecordingDevice::new();
        let mut pool = pool(&mut device, 2);
        spawn(&mut pool, 2);
        pool.update(0.5, 0, Vec2::ZERO);

        spawn(&mut pool, 1);

        assert_eq!(pool.particles()[0].life, 1.0);
        assert!((pool.particles()[1].life - 0.5).abs() < 1e-6);
    }

    #[test]
    fn single_slot_pool_survives_oversized_spawn() {
        let mut device = RecordingDevice::new();
        let mut pool = pool(&mut device, 1);

        spawn(&mut pool, 5);

        assert_eq!(pool.alive_count(), 1);
    }

    #[test]
    fn alive_count_never_exceeds_capacity() {
        let mut device = RecordingDevice::new();
        let mut pool = pool(&mut device, 7);
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..200 {
            let dt = rng.gen_range(0.0..0.3);
            let spawn_count = rng.gen_range(0..12);
            pool.update(dt, spawn_count, Vec2::ONE);
            assert!(pool.alive_count() <= pool.capacity());
            assert!(pool.render(&mut device) <= pool.capacity());
        }
    }

    #[test]
    fn update_ages_and_moves_live_particles() {
        let mut device = RecordingDevice::new();
        let mut pool = pool(&mut device, 2);
        pool.spawn(ParticleKind::Ambient, Vec2::ZERO, Vec2::new(1.0, -2.0), 0.0, 1, Vec2::ZERO);
        let before = pool.particles()[0];

        pool.update(0.25, 0, Vec2::ZERO);

        let after = pool.particles()[0];
        assert!((after.life - (before.life - 0.25)).abs() < 1e-6);
        assert!((after.color.w - 0.75).abs() < 1e-6);
        let expected = before.position - before.velocity * 0.25;
        assert!((after.position - expected).length() < 1e-6);
    }

    #[test]
    fn dead_particles_keep_stale_state() {
        let mut device = RecordingDevice::new();
        let mut pool = pool(&mut device, 1);
        pool.spawn(ParticleKind::Ambient, Vec2::ZERO, Vec2::ONE, 0.0, 1, Vec2::ZERO);
        pool.update(0.5, 0, Vec2::ZERO);
        let position = pool.particles()[0].position;

        pool.update(1.0, 0, Vec2::ZERO);
        pool.update(1.0, 0, Vec2::ZERO);

        assert!(!pool.particles()[0].is_alive());
        assert_eq!(pool.particles()[0].position, position);
    }

    #[test]
    fn respawn_uses_fixed_life_and_kind_tint() {
        let mut device = RecordingDevice::new();
        let settings = SpawnSettings { life: 2.5, ..Default::default() };
        let mut pool = pool_with(&mut device, 1, settings);

        pool.respawn(0, ParticleKind::Burst, Vec2::new(3.0, 3.0), Vec2::ZERO, 60.0, Vec2::ZERO);

        let p = pool.particles()[0];
        assert_eq!(p.life, 2.5);
        assert_eq!(p.rotation, 60.0);
        assert_eq!(p.kind, ParticleKind::Burst);
        assert_eq!(p.position, Vec2::new(3.0, 3.0));
        assert_eq!(p.color.w, 1.0);
        assert!(p.color.x > p.color.z);
        assert!(p.velocity.abs().max_element() <= 0.05);
    }

    #[test]
    fn respawn_jitter_scales_with_offset() {
        let mut device = RecordingDevice::new();
        let mut pool = pool(&mut device, 50);

        pool.spawn(ParticleKind::Ambient, Vec2::ZERO, Vec2::ZERO, 0.0, 50, Vec2::new(1.0, 0.0));

        assert!(pool.particles().iter().all(|p| p.position.y == 0.0 && p.position.x.abs() <= 5.0));
        assert!(pool.particles().iter().any(|p| p.position.x != 0.0));
    }

    #[test]
    fn render_draws_only_live_particles() {
        let mut device = RecordingDevice::new();
        let mut pool = pool(&mut device, 5);
        spawn(&mut pool, 2);
        pool.update(0.1, 0, Vec2::ZERO);
        device.calls.clear();

        let drawn = pool.render(&mut device);

        assert_eq!(drawn, 2);
        assert_eq!(device.draw_count(), 2);
        assert_eq!(device.uniforms_named("offset").len(), 2);
        assert_eq!(device.uniforms_named("color").len(), 2);
        assert_eq!(device.calls.first(), Some(&Call::Blend(BlendMode::Additive)));
        assert_eq!(device.calls.last(), Some(&Call::Blend(BlendMode::Alpha)));
        assert!(device.calls.iter().all(|c| match c {
            Call::Draw { first, count, .. } => *first == 0 && *count == 6,
            _ => true,
        }));
    }

    #[test]
    fn spawned_particles_expire_after_their_life() {
        let mut device = RecordingDevice::new();
        let mut pool = pool(&mut device, 3);
        assert_eq!(pool.alive_count(), 0);

        spawn(&mut pool, 2);
        assert_eq!(pool.alive_count(), 2);
        assert_eq!(pool.particles().iter().filter(|p| !p.is_alive()).count(), 1);

        pool.update(10.0, 0, Vec2::ZERO);
        device.calls.clear();

        assert_eq!(pool.alive_count(), 0);
        assert_eq!(pool.render(&mut device), 0);
        assert_eq!(device.draw_count(), 0);
    }

    #[test]
    fn update_spawns_at_emitter() {
        let mut device = RecordingDevice::new();
        let settings = SpawnSettings {
            emitter_position: Vec3::new(2.0, 4.0, 9.0),
            ..Default::default()
        };
        let mut pool = pool_with(&mut device, 4, settings);

        pool.update(0.0, 3, Vec2::ZERO);

        assert_eq!(pool.alive_count(), 3);
        assert!(pool
            .particles()
            .iter()
            .filter(|p| p.is_alive())
            .all(|p| p.position == Vec2::new(2.0, 4.0) && p.kind == ParticleKind::Ambient));
    }

    #[test]
    fn uninitialized_pool_is_inert() {
        let mut device = RecordingDevice::new();
        let program = program(&mut device);
        let mut pool: ParticlePool<Vec2> =
            ParticlePool::with_seed(program, 3, SpawnSettings::default(), 1);
        device.calls.clear();

        spawn(&mut pool, 2);
        pool.update(0.1, 2, Vec2::ZERO);

        assert_eq!(pool.find_recyclable_slot(), None);
        assert_eq!(pool.render(&mut device), 0);
        assert!(device.calls.is_empty());
    }

    #[test]
    fn volume_pool_pushes_vec3_offsets() {
        let mut device = RecordingDevice::new();
        let program = program(&mut device);
        let mut pool: ParticlePool<Vec3> =
            ParticlePool::with_seed(program, 2, SpawnSettings::default(), 9);
        pool.initialize(&mut device);
        let position = Vec3::new(0.0, 0.0, -1.0);
        pool.spawn(ParticleKind::Ambient, position, Vec3::ZERO, 0.0, 1, Vec3::ZERO);

        pool.render(&mut device);

        assert_eq!(device.uniforms_named("offset"), vec![UniformValue::Vec3(position)]);
    }

    #[test]
    fn destroy_releases_quad_buffer() {
        let mut device = RecordingDevice::new();
        let pool = pool(&mut device, 2);
        let quad = pool.quad.unwrap();

        pool.destroy(&mut device);

        assert_eq!(device.calls.last(), Some(&Call::DestroyBuffer(quad)));
    }

    #[test]
    fn faded_out_alpha_is_clamped_for_drawing() {
        let mut device = RecordingDevice::new();
        let settings = SpawnSettings { life: 3.0, ..Default::default() };
        let mut pool = pool_with(&mut device, 1, settings);
        spawn(&mut pool, 1);
        pool.update(1.5, 0, Vec2::ZERO);
        assert!(pool.particles()[0].color.w < 0.0);

        pool.render(&mut device);

        match device.uniforms_named("color").as_slice() {
            [UniformValue::Vec4(color)] => assert_eq!(color.w, 0.0),
            other => panic!("unexpected color uniforms {other:?}"),
        }
    }
}
