//! Sparkfield: a fixed-capacity pool of glowing, camera-facing particles
//! drawn with additive blending on top of wgpu.
//!
//! The pool and shader program only talk to a [`device::GraphicsDevice`],
//! so the simulation runs the same against the wgpu backend and the
//! in-memory recording device used by the tests.

pub mod app;
pub mod camera;
pub mod config;
pub mod device;
pub mod error;
pub mod gpu;
pub mod input;
pub mod particles;
pub mod shader;
pub mod texture;
pub mod types;

pub use app::App;
pub use config::DemoConfig;
pub use error::DemoError;
pub use particles::{ParticlePool, SaturationPolicy, SpawnSettings};
