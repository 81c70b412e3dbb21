use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::error::TextureError;

const FALLBACK_SPRITE_SIZE: u32 = 64;

/// Decodes the sprite image, or generates a soft disc when there is none.
pub fn load_sprite_image(path: Option<&Path>) -> RgbaImage {
    let Some(path) = path else {
        return soft_disc(FALLBACK_SPRITE_SIZE);
    };
    match image::open(path) {
        Ok(img) => {
            log::info!("Loaded texture {}", path.display());
            img.to_rgba8()
        }
        Err(e) => {
            log::error!(
                "Failed to load texture {}: {e}; using a generated sprite",
                path.display()
            );
            soft_disc(FALLBACK_SPRITE_SIZE)
        }
    }
}

/// White disc whose alpha falls off smoothly towards the edge.
pub fn soft_disc(size: u32) -> RgbaImage {
    let radius = size as f32 / 2.0;
    RgbaImage::from_fn(size, size, |x, y| {
        let dx = (x as f32 + 0.5 - radius) / radius;
        let dy = (y as f32 + 0.5 - radius) / radius;
        let falloff = (1.0 - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0);
        let alpha = (falloff * falloff * 255.0).round() as u8;
        Rgba([255, 255, 255, alpha])
    })
}

pub struct SpriteTexture {
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

/// Rejects images the device cannot hold in a single 2D texture.
pub fn check_dimensions(width: u32, height: u32, max_dimension: u32) -> Result<(), TextureError> {
    if width == 0 || height == 0 {
        return Err(TextureError::Empty { width, height });
    }
    if width > max_dimension || height > max_dimension {
        return Err(TextureError::TooLarge {
            width,
            height,
            max: max_dimension,
        });
    }
    Ok(())
}

impl SpriteTexture {
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &RgbaImage,
    ) -> Result<Self, TextureError> {
        let (width, height) = image.dimensions();
        check_dimensions(width, height, device.limits().max_texture_dimension_2d)?;
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Particle Sprite"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Particle Sprite Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self { view, sampler })
    }
}
