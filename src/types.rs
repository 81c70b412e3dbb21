use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Range, Sub, SubAssign};

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};
use rand::Rng;

use crate::device::UniformValue;

// One corner of the shared particle quad: xy position, zw texture coords
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub vertex: [f32; 4],
}

impl QuadVertex {
    pub const ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x4];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Two triangles covering the unit square, shared by every particle.
pub const PARTICLE_QUAD: [QuadVertex; 6] = [
    QuadVertex { vertex: [0.0, 1.0, 0.0, 1.0] },
    QuadVertex { vertex: [1.0, 0.0, 1.0, 0.0] },
    QuadVertex { vertex: [0.0, 0.0, 0.0, 0.0] },
    QuadVertex { vertex: [0.0, 1.0, 0.0, 1.0] },
    QuadVertex { vertex: [1.0, 1.0, 1.0, 1.0] },
    QuadVertex { vertex: [1.0, 0.0, 1.0, 0.0] },
];

/// Position/velocity type a particle pool can be built over.
///
/// Implemented for `Vec2` (flat sprites) and `Vec3` (billboards in world space).
pub trait ParticleVector:
    Copy
    + Debug
    + Default
    + PartialEq
    + Add<Output = Self>
    + AddAssign
    + Sub<Output = Self>
    + SubAssign
    + Mul<Output = Self>
    + Mul<f32, Output = Self>
{
    /// Each component sampled independently from `range`.
    fn random_in<R: Rng + ?Sized>(rng: &mut R, range: Range<f32>) -> Self;

    /// Drops whatever components the type does not have.
    fn from_vec3(v: Vec3) -> Self;

    /// Value pushed to the `offset` uniform when drawing.
    fn to_uniform(self) -> UniformValue;
}

impl ParticleVector for Vec2 {
    fn random_in<R: Rng + ?Sized>(rng: &mut R, range: Range<f32>) -> Self {
        Vec2::new(rng.gen_range(range.clone()), rng.gen_range(range))
    }

    fn from_vec3(v: Vec3) -> Self {
        v.truncate()
    }

    fn to_uniform(self) -> UniformValue {
        UniformValue::Vec2(self)
    }
}

impl ParticleVector for Vec3 {
    fn random_in<R: Rng + ?Sized>(rng: &mut R, range: Range<f32>) -> Self {
        Vec3::new(
            rng.gen_range(range.clone()),
            rng.gen_range(range.clone()),
            rng.gen_range(range),
        )
    }

    fn from_vec3(v: Vec3) -> Self {
        v
    }

    fn to_uniform(self) -> UniformValue {
        UniformValue::Vec3(self)
    }
}

/// What spawned a particle. Only the color tint depends on it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ParticleKind {
    /// Steady per-frame emission from `update`.
    #[default]
    Ambient,
    /// One-off bursts requested by the user.
    Burst,
}

impl ParticleKind {
    pub fn tint(self) -> Vec3 {
        match self {
            ParticleKind::Ambient => Vec3::ONE,
            ParticleKind::Burst => Vec3::new(1.0, 0.6, 0.2),
        }
    }
}

// CPU-side particle state
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Particle<V> {
    pub position: V,
    pub velocity: V,
    pub color: Vec4,
    pub life: f32,
    pub rotation: f32,
    pub kind: ParticleKind,
}

impl<V: ParticleVector> Particle<V> {
    pub fn is_alive(&self) -> bool {
        self.life > 0.0
    }
}

impl<V: ParticleVector> Default for Particle<V> {
    fn default() -> Self {
        Self {
            position: V::default(),
            velocity: V::default(),
            color: Vec4::ONE,
            life: 0.0,
            rotation: 0.0,
            kind: ParticleKind::Ambient,
        }
    }
}
