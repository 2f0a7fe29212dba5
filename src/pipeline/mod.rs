//! The six long-running pipeline workers (`spec.md` §5): reader+decoder,
//! pacer and presenter, once each for video and audio, plus the shared
//! length-prefixed-NAL → Annex-B conversion and the saturating volume scale.

pub mod audio;
pub mod video;

use std::time::Duration;

/// Pacer sleep quantum: the bound on A/V drift and the granularity at which
/// pacers re-check pause/seek state while a frame is held (`spec.md` §5).
pub const PACER_SLEEP_QUANTUM: Duration = Duration::from_millis(5);

/// Converts a sample's length-prefixed NAL units (each preceded by a 4-byte
/// big-endian length) into Annex-B form (each NAL preceded by the start code
/// `00 00 00 01`). Stops at the first truncated length-prefix, matching the
/// source's tolerant `pos + 4 <= data.size()` loop.
pub fn length_prefixed_to_annexb(data: &[u8]) -> Vec<u8> {
    const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

    let mut out = Vec::with_capacity(data.len() + 16);
    let mut pos = 0usize;
    while pos + 4 <= data.len() {
        let nal_len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        pos += 4;
        if pos + nal_len > data.len() {
            break;
        }
        out.extend_from_slice(&START_CODE);
        out.extend_from_slice(&data[pos..pos + nal_len]);
        pos += nal_len;
    }
    out
}

/// Builds the concatenated Annex-B VPS/SPS/PPS init blob from the ordered NAL
/// unit arrays `hvcC` yields.
pub fn build_hevc_init_blob(nal_arrays: &[Vec<Vec<u8>>]) -> Vec<u8> {
    const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];
    let mut out = Vec::new();
    for array in nal_arrays {
        for nal in array {
            out.extend_from_slice(&START_CODE);
            out.extend_from_slice(nal);
        }
    }
    out
}

/// Scales each sample of interleaved PCM by `volume`, saturating to
/// `i16::MIN..=i16::MAX`. Processed in chunks of 16 samples (the SIMD batch
/// width `spec.md` §4.6 recommends); the tail runs scalar. On stable Rust
/// without a SIMD crate dependency this chunking is expressed as a plain
/// unrolled loop — the scalar path is the correctness baseline either way.
pub fn scale_volume_saturating(pcm: &mut [i16], volume: f32) {
    if volume == 1.0 {
        return;
    }

    let mut chunks = pcm.chunks_exact_mut(16);
    for chunk in &mut chunks {
        for s in chunk.iter_mut() {
            *s = saturating_scale_one(*s, volume);
        }
    }
    for s in chunks.into_remainder() {
        *s = saturating_scale_one(*s, volume);
    }
}

#[inline]
fn saturating_scale_one(sample: i16, volume: f32) -> i16 {
    let scaled = (sample as f32 * volume).round();
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
