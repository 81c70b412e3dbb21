use std::path::PathBuf;

use thiserror::Error;

/// Fatal startup and runtime failures. Anything here ends the process.
#[derive(Error, Debug)]
pub enum DemoError {
    #[error("Failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("Failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("Failed to create GPU surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("No compatible GPU adapter found: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),
    #[error("Failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("Surface does not support any texture format")]
    NoSurfaceFormat,
    #[error("GPU ran out of memory")]
    OutOfMemory,
    #[error(transparent)]
    Texture(#[from] TextureError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file error ({path}): {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Config validation error: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),
    #[error("Texture is empty ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("Texture is {width}x{height}, larger than the device limit of {max}")]
    TooLarge { width: u32, height: u32, max: u32 },
}

#[derive(Error, Debug)]
pub enum ShaderSourceError {
    #[error("Cannot open shader file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
