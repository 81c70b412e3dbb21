use crate::device::BlendMode;

/// One recorded draw, replayed when the frame is submitted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub program: u32,
    pub blend: BlendMode,
    pub buffer: u32,
    pub first: u32,
    pub count: u32,
    pub uniform_offset: u32,
}

/// Draws issued since `begin_frame`, each with a snapshot of the uniforms
/// that were current when it was issued.
#[derive(Debug)]
pub struct FrameRecorder {
    stride: usize,
    max_draws: usize,
    staging: Vec<u8>,
    draws: Vec<DrawCall>,
}

impl FrameRecorder {
    /// `stride` must be a multiple of the device's uniform offset alignment.
    /// `max_bytes` caps the staging area; offsets always fit in a `u32`.
    pub fn new(stride: usize, max_bytes: u64) -> Self {
        let max_bytes = max_bytes.min(u64::from(u32::MAX));
        Self {
            stride,
            max_draws: (max_bytes / stride as u64) as usize,
            staging: Vec::new(),
            draws: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.staging.clear();
        self.draws.clear();
    }

    /// Returns false, recording nothing, once the frame is full.
    pub fn push(&mut self, uniforms: &[u8], blend: BlendMode, draw: DrawCall) -> bool {
        debug_assert!(uniforms.len() <= self.stride);
        if self.draws.len() >= self.max_draws {
            return false;
        }
        let uniform_offset = self.staging.len();
        self.staging.extend_from_slice(uniforms);
        self.staging.resize(uniform_offset + self.stride, 0);
        self.draws.push(DrawCall {
            blend,
            uniform_offset: uniform_offset as u32,
            ..draw
        });
        true
    }

    pub fn staging(&self) -> &[u8] {
        &self.staging
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn max_draws(&self) -> usize {
        self.max_draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(program: u32, buffer: u32, count: u32) -> DrawCall {
        DrawCall {
            program,
            blend: BlendMode::Alpha,
            buffer,
            first: 0,
            count,
            uniform_offset: 0,
        }
    }

    #[test]
    fn snapshots_land_on_stride_boundaries() {
        let mut frame = FrameRecorder::new(256, 1 << 20);
        assert!(frame.push(&[1; 224], BlendMode::Additive, draw(0, 0, 6)));
        assert!(frame.push(&[2; 224], BlendMode::Additive, draw(0, 0, 6)));

        assert_eq!(frame.staging().len(), 512);
        let offsets: Vec<u32> = frame.draws().iter().map(|d| d.uniform_offset).collect();
        assert_eq!(offsets, vec![0, 256]);
        assert_eq!(frame.staging()[256], 2);
        assert_eq!(frame.staging()[230], 0);
        assert!(frame.draws().iter().all(|d| d.blend == BlendMode::Additive));
    }

    #[test]
    fn clear_drops_recorded_draws() {
        let mut frame = FrameRecorder::new(256, 1 << 20);
        frame.push(&[0; 16], BlendMode::Alpha, draw(1, 2, 3));
        frame.clear();

        assert!(frame.draws().is_empty());
        assert!(frame.staging().is_empty());
    }

    #[test]
    fn draws_past_the_buffer_limit_are_refused() {
        let mut frame = FrameRecorder::new(256, 256 * 3);
        assert_eq!(frame.max_draws(), 3);

        for _ in 0..3 {
            assert!(frame.push(&[7; 224], BlendMode::Additive, draw(0, 0, 6)));
        }
        assert!(!frame.push(&[7; 224], BlendMode::Additive, draw(0, 0, 6)));

        assert_eq!(frame.draws().len(), 3);
        assert_eq!(frame.staging().len(), 256 * 3);
    }

    #[test]
    fn offsets_stay_within_u32() {
        let frame = FrameRecorder::new(256, u64::MAX);
        assert_eq!(frame.max_draws() as u64, u64::from(u32::MAX) / 256);
    }
}
