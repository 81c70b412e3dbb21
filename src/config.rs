//! Demo configuration.
//!
//! Every section has defaults, so a config file only needs the fields it
//! wants to change. The file is JSON and is picked from the first command
//! line argument or `SPARKFIELD_CONFIG`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::Deserialize;

use crate::camera::CameraSettings;
use crate::error::ConfigError;
use crate::particles::{SaturationPolicy, SpawnSettings};
use crate::shader::{ShaderSource, PARTICLE_FRAGMENT_WGSL, PARTICLE_VERTEX_WGSL};

pub const CONFIG_ENV: &str = "SPARKFIELD_CONFIG";

/// Largest pool accepted. Every live particle stages one aligned uniform
/// slot per frame, and this keeps a full frame at or under 64 MiB.
pub const MAX_CAPACITY: usize = 1 << 18;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub window: WindowConfig,
    pub camera: CameraSettings,
    pub particles: ParticleConfig,
    pub render: RenderConfig,
    pub shaders: ShaderConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "sparkfield".to_string(),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimensions {
    /// Particles live on the z = 0 plane.
    #[default]
    Flat,
    /// Particles scatter through world space.
    Volume,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    pub dimensions: Dimensions,
    pub capacity: usize,
    pub spawn_per_frame: u32,
    pub burst_count: u32,
    pub life: f32,
    pub saturation: SaturationPolicy,
    pub emitter_position: Vec3,
    pub emitter_velocity: Vec3,
    /// Scales the per-particle random jitter around the emitter.
    pub spread: Vec3,
    pub rotation: f32,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            dimensions: Dimensions::Flat,
            capacity: 2000,
            spawn_per_frame: 20,
            burst_count: 200,
            life: 1.0,
            saturation: SaturationPolicy::EvictFirst,
            emitter_position: Vec3::ZERO,
            emitter_velocity: Vec3::new(0.0, -1.5, 0.0),
            spread: Vec3::new(0.3, 0.1, 0.3),
            rotation: 0.0,
        }
    }
}

impl ParticleConfig {
    pub fn spawn_settings(&self) -> SpawnSettings {
        SpawnSettings {
            life: self.life,
            saturation: self.saturation,
            emitter_position: self.emitter_position,
            emitter_velocity: self.emitter_velocity,
            rotation: self.rotation,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub clear_color: [f64; 4],
    pub vsync: bool,
    /// Sprite image; a generated soft disc is used when unset or unreadable.
    pub texture: Option<PathBuf>,
    /// Sample the sprite texture (`true`) or draw flat colored quads.
    pub textured: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.2, 0.5, 0.7, 0.6],
            vsync: true,
            texture: None,
            textured: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: Option<PathBuf>,
    pub fragment: Option<PathBuf>,
}

impl ShaderConfig {
    pub fn vertex_source(&self) -> ShaderSource {
        match &self.vertex {
            Some(path) => ShaderSource::File(path.clone()),
            None => ShaderSource::Embedded(PARTICLE_VERTEX_WGSL),
        }
    }

    pub fn fragment_source(&self) -> ShaderSource {
        match &self.fragment {
            Some(path) => ShaderSource::File(path.clone()),
            None => ShaderSource::Embedded(PARTICLE_FRAGMENT_WGSL),
        }
    }
}

impl DemoConfig {
    /// Resolves the config from the command line, the environment and defaults.
    pub fn load(mut args: impl Iterator<Item = String>) -> Result<Self, ConfigError> {
        let path = args.nth(1).or_else(|| env::var(CONFIG_ENV).ok());
        let mut config = match path {
            Some(path) => {
                log::info!("Loading config from {path}");
                Self::from_json_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("SPARKFIELD_CAPACITY") {
            match val.parse() {
                Ok(capacity) => self.particles.capacity = capacity,
                Err(_) => log::warn!("Ignoring SPARKFIELD_CAPACITY={val}: not a number"),
            }
        }
        if let Ok(val) = env::var("SPARKFIELD_SPAWN_RATE") {
            match val.parse() {
                Ok(rate) => self.particles.spawn_per_frame = rate,
                Err(_) => log::warn!("Ignoring SPARKFIELD_SPAWN_RATE={val}: not a number"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_CAPACITY).contains(&self.particles.capacity) {
            return Err(ConfigError::Invalid(format!(
                "particles.capacity must be within 1..={MAX_CAPACITY}"
            )));
        }
        if !(self.particles.life > 0.0) {
            return Err(ConfigError::Invalid("particles.life must be positive".into()));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid("window size must be non-zero".into()));
        }
        if !(1.0..=45.0).contains(&self.camera.fov) {
            return Err(ConfigError::Invalid("camera.fov must be within 1..=45 degrees".into()));
        }
        Ok(())
    }
}
