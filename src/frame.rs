//! Decoded media frames as they move through the raw → paced → presentable
//! queues. Video and audio share the same `pts_ms` pacing contract even
//! though their payloads differ.

/// One decoded picture in I420 (planar YUV 4:2:0), plus the presentation
/// timestamp the pacer schedules it against.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub pts_ms: u64,
    pub width: u32,
    pub height: u32,
    /// `[Y, U, V]`, each a tightly-packed row-major plane of `strides[i] * height_of(i)` bytes.
    pub planes: [Vec<u8>; 3],
    /// Row stride in bytes for each plane; `strides[0]` is the luma stride, `strides[1..]` chroma.
    pub strides: [usize; 3],
}

impl VideoFrame {
    pub fn chroma_height(&self) -> u32 {
        self.height.div_ceil(2)
    }

    pub fn chroma_width(&self) -> u32 {
        self.width.div_ceil(2)
    }
}

/// One decoded AAC frame: interleaved signed 16-bit PCM at the stream's native rate.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub pts_ms: u64,
    pub sample_rate: u32,
    pub channels: u32,
    pub frame_size: u32,
    pub pcm: Vec<i16>,
}
