//! CPU copy of the `ParticleUniforms` block declared in the particle shaders.

use glam::{Mat4, Vec4};

use crate::device::UniformValue;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Vec3,
    Vec4,
    Mat4,
}

impl FieldKind {
    pub fn size(self) -> usize {
        match self {
            FieldKind::Int => 4,
            FieldKind::Vec3 => 12,
            FieldKind::Vec4 => 16,
            FieldKind::Mat4 => 64,
        }
    }

    /// A vec3 slot also takes vec2 values; the missing z is zeroed.
    pub fn accepts(self, value: &UniformValue) -> bool {
        matches!(
            (self, value),
            (FieldKind::Int, UniformValue::Int(_))
                | (FieldKind::Vec3, UniformValue::Vec2(_) | UniformValue::Vec3(_))
                | (FieldKind::Vec4, UniformValue::Vec4(_))
                | (FieldKind::Mat4, UniformValue::Mat4(_))
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UniformField {
    pub name: &'static str,
    pub offset: usize,
    pub kind: FieldKind,
}

// Must match `struct ParticleUniforms` in shaders/*.wgsl
pub const PARTICLE_UNIFORM_FIELDS: [UniformField; 6] = [
    UniformField { name: "projection", offset: 0, kind: FieldKind::Mat4 },
    UniformField { name: "view", offset: 64, kind: FieldKind::Mat4 },
    UniformField { name: "model", offset: 128, kind: FieldKind::Mat4 },
    UniformField { name: "offset", offset: 192, kind: FieldKind::Vec3 },
    UniformField { name: "sprite", offset: 204, kind: FieldKind::Int },
    UniformField { name: "color", offset: 208, kind: FieldKind::Vec4 },
];

pub const UNIFORM_BLOCK_SIZE: usize = 224;

#[derive(Clone, Debug, PartialEq)]
pub struct UniformBlock {
    bytes: Vec<u8>,
}

impl UniformBlock {
    pub fn new() -> Self {
        let mut block = Self {
            bytes: vec![0; UNIFORM_BLOCK_SIZE],
        };
        for name in ["projection", "view", "model"] {
            block.write_named(name, &UniformValue::Mat4(Mat4::IDENTITY));
        }
        block.write_named("color", &UniformValue::Vec4(Vec4::ONE));
        block
    }

    pub fn slot(name: &str) -> Option<u32> {
        PARTICLE_UNIFORM_FIELDS
            .iter()
            .position(|f| f.name == name)
            .map(|i| i as u32)
    }

    /// Returns false, leaving the block untouched, on a type mismatch.
    pub fn write(&mut self, slot: u32, value: &UniformValue) -> bool {
        let Some(field) = PARTICLE_UNIFORM_FIELDS.get(slot as usize) else {
            return false;
        };
        if !field.kind.accepts(value) {
            return false;
        }
        let bytes = value.to_bytes();
        let dst = &mut self.bytes[field.offset..field.offset + field.kind.size()];
        dst.fill(0);
        dst[..bytes.len()].copy_from_slice(&bytes);
        true
    }

    fn write_named(&mut self, name: &str, value: &UniformValue) -> bool {
        Self::slot(name).is_some_and(|slot| self.write(slot, value))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for UniformBlock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    fn f32_at(block: &UniformBlock, offset: usize) -> f32 {
        f32::from_le_bytes(block.as_bytes()[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn fields_fit_inside_the_block_without_overlap() {
        let mut end = 0;
        for field in PARTICLE_UNIFORM_FIELDS {
            assert!(field.offset >= end, "{} overlaps its predecessor", field.name);
            end = field.offset + field.kind.size();
        }
        assert!(end <= UNIFORM_BLOCK_SIZE);
        assert_eq!(UNIFORM_BLOCK_SIZE % 16, 0);
    }

    #[test]
    fn new_block_has_identity_matrices() {
        let block = UniformBlock::new();
        assert_eq!(f32_at(&block, 0), 1.0);
        assert_eq!(f32_at(&block, 4), 0.0);
        assert_eq!(f32_at(&block, 64 + 20), 1.0);
        assert_eq!(f32_at(&block, 208 + 12), 1.0);
    }

    #[test]
    fn vec2_offset_zeroes_depth() {
        let mut block = UniformBlock::new();
        let slot = UniformBlock::slot("offset").unwrap();
        assert!(block.write(slot, &UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0))));
        assert!(block.write(slot, &UniformValue::Vec2(Vec2::new(4.0, 5.0))));

        assert_eq!(f32_at(&block, 192), 4.0);
        assert_eq!(f32_at(&block, 196), 5.0);
        assert_eq!(f32_at(&block, 200), 0.0);
    }

    #[test]
    fn mismatched_types_are_refused() {
        let mut block = UniformBlock::new();
        let before = block.clone();
        let color = UniformBlock::slot("color").unwrap();
        let sprite = UniformBlock::slot("sprite").unwrap();

        assert!(!block.write(color, &UniformValue::Int(3)));
        assert!(!block.write(sprite, &UniformValue::Vec4(Vec4::ONE)));
        assert!(!block.write(99, &UniformValue::Int(3)));
        assert_eq!(block, before);
    }

    #[test]
    fn unknown_names_have_no_slot() {
        assert_eq!(UniformBlock::slot("rotation"), None);
        assert_eq!(UniformBlock::slot("sprite"), Some(4));
    }
}
