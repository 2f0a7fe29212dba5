//! Opaque HEVC/AAC decoder boundary: the traits the pipeline drives, plus an
//! `extern "C"` implementation bound to the system `libde265`/`fdk-aac`
//! shared libraries (the same `extern "C"` + `build.rs`/`pkg-config` shape
//! `moonfire-ffmpeg` uses to bind `libavcodec`).
//!
//! The concrete FFI bindings only compile under the `system-codecs` feature,
//! keeping the decoders genuinely external collaborators: this crate does not
//! vendor or reimplement HEVC/AAC decoding.

use crate::error::{PlayerError, Result};
use crate::frame::VideoFrame;

/// Drives one HEVC decode session. A session spans one playback epoch: it is
/// opened, fed the VPS/SPS/PPS init blob once, and fed one sample's Annex-B
/// payload per `push_data` call thereafter.
pub trait HevcDecoder: Send {
    /// Feeds one Annex-B NAL bytestream tagged with the sample's presentation
    /// timestamp, in milliseconds.
    fn push_data(&mut self, annex_b: &[u8], pts_ms: u64) -> Result<()>;

    /// Feeds the concatenated VPS/SPS/PPS init blob and flushes it through the
    /// decoder so the next `push_data` call can produce pictures.
    fn push_init_data(&mut self, annex_b: &[u8]) -> Result<()>;

    /// Runs one decode step. Returns `false` once the decoder has no more
    /// pending work for the data fed so far; an HEVC error that is not `OK`
    /// is surfaced as `Err` and terminates just the current step, per the
    /// error-handling design (per-sample codec errors are recoverable).
    fn decode_step(&mut self) -> Result<bool>;

    /// Drains one decoded picture, if the last `decode_step` produced one.
    fn next_picture(&mut self) -> Option<VideoFrame>;

    /// Resets internal reorder state. Used on seek; the init blob must be
    /// re-fed afterward before further pictures are produced.
    fn reset(&mut self);
}

/// One decoded AAC frame, as reported by `get_stream_info`.
pub struct AacDecoded {
    pub pcm: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u32,
    pub frame_size: u32,
}

/// Drives one AAC (`TT_MP4_RAW`, single-layer) decode session.
pub trait AacDecoder: Send {
    /// Configures the decoder from the AudioSpecificConfig bytes recovered
    /// from `esds`. Called once per epoch.
    fn config_raw(&mut self, asc: &[u8]) -> Result<()>;

    /// Fills the decoder's internal bit reservoir with one sample's raw AAC
    /// payload.
    fn fill(&mut self, data: &[u8]) -> Result<()>;

    /// Decodes one frame from the filled payload. `Ok(None)` means the fill
    /// did not yield a complete frame (recoverable; caller moves to the next
    /// sample).
    fn decode_frame(&mut self) -> Result<Option<AacDecoded>>;
}

#[cfg(feature = "system-codecs")]
pub mod ffi {
    //! `extern "C"` bindings to `libde265` and `fdk-aac`. Only the handful of
    //! operations `spec.md` §6.2 enumerates are declared; anything else in
    //! either library is out of scope.

    use super::*;
    use libc::{c_int, c_void};

    #[allow(non_camel_case_types)]
    type de265_decoder_context = c_void;
    #[allow(non_camel_case_types)]
    type de265_image = c_void;

    extern "C" {
        fn de265_new_decoder() -> *mut de265_decoder_context;
        fn de265_free_decoder(ctx: *mut de265_decoder_context) -> c_int;
        fn de265_push_data(
            ctx: *mut de265_decoder_context,
            data: *const u8,
            length: c_int,
            pts: i64,
            user_data: *mut c_void,
        ) -> c_int;
        fn de265_flush_data(ctx: *mut de265_decoder_context) -> c_int;
        fn de265_decode(ctx: *mut de265_decoder_context, more: *mut c_int) -> c_int;
        fn de265_isOK(err: c_int) -> c_int;
        fn de265_get_next_picture(ctx: *mut de265_decoder_context) -> *mut de265_image;
        fn de265_get_image_PTS(img: *const de265_image) -> i64;
        fn de265_get_image_width(img: *const de265_image, channel: c_int) -> c_int;
        fn de265_get_image_height(img: *const de265_image, channel: c_int) -> c_int;
        fn de265_get_image_plane(
            img: *const de265_image,
            channel: c_int,
            out_stride: *mut c_int,
        ) -> *const u8;
        fn de265_reset(ctx: *mut de265_decoder_context);
    }

    pub struct Libde265Decoder {
        ctx: *mut de265_decoder_context,
        pending: Option<VideoFrame>,
    }

    // SAFETY: `de265_decoder_context` is used from exactly one worker thread
    // at a time (owned per §5 "Shared-resource policy"); we only need `Send`
    // so the owning thread can be spawned with `move`.
    unsafe impl Send for Libde265Decoder {}

    impl Libde265Decoder {
        pub fn new() -> Result<Self> {
            let ctx = unsafe { de265_new_decoder() };
            if ctx.is_null() {
                return Err(PlayerError::Codec("de265_new_decoder returned null".into()));
            }
            Ok(Self { ctx, pending: None })
        }

        fn drain_pictures_into(&mut self, pts_hint: u64) -> Option<VideoFrame> {
            unsafe {
                let img = de265_get_next_picture(self.ctx);
                if img.is_null() {
                    return None;
                }
                let pts = de265_get_image_PTS(img);
                let pts_ms = if pts >= 0 { pts as u64 } else { pts_hint };
                let width = de265_get_image_width(img, 0).max(0) as u32;
                let height = de265_get_image_height(img, 0).max(0) as u32;

                let mut planes: [Vec<u8>; 3] = [Vec::new(), Vec::new(), Vec::new()];
                let mut strides = [0usize; 3];
                for c in 0..3 {
                    let mut stride: c_int = 0;
                    let plane = de265_get_image_plane(img, c as c_int, &mut stride);
                    let plane_h = de265_get_image_height(img, c as c_int).max(0) as usize;
                    if !plane.is_null() && stride > 0 {
                        let len = stride as usize * plane_h;
                        planes[c] = std::slice::from_raw_parts(plane, len).to_vec();
                        strides[c] = stride as usize;
                    }
                }

                Some(VideoFrame {
                    pts_ms,
                    width,
                    height,
                    planes,
                    strides,
                })
            }
        }
    }

    impl Drop for Libde265Decoder {
        fn drop(&mut self) {
            unsafe {
                de265_free_decoder(self.ctx);
            }
        }
    }

    impl HevcDecoder for Libde265Decoder {
        fn push_data(&mut self, annex_b: &[u8], pts_ms: u64) -> Result<()> {
            let rc = unsafe {
                de265_push_data(
                    self.ctx,
                    annex_b.as_ptr(),
                    annex_b.len() as c_int,
                    pts_ms as i64,
                    std::ptr::null_mut(),
                )
            };
            if unsafe { de265_isOK(rc) } == 0 {
                return Err(PlayerError::Codec(format!("de265_push_data failed: {rc}")));
            }
            Ok(())
        }

        fn push_init_data(&mut self, annex_b: &[u8]) -> Result<()> {
            self.push_data(annex_b, 0)?;
            unsafe {
                de265_flush_data(self.ctx);
            }
            Ok(())
        }

        fn decode_step(&mut self) -> Result<bool> {
            let mut more: c_int = 0;
            let err = unsafe { de265_decode(self.ctx, &mut more) };
            if unsafe { de265_isOK(err) } == 0 {
                return Err(PlayerError::Codec(format!("de265_decode error: {err}")));
            }
            self.pending = self.drain_pictures_into(0);
            Ok(more != 0)
        }

        fn next_picture(&mut self) -> Option<VideoFrame> {
            self.pending.take()
        }

        fn reset(&mut self) {
            unsafe {
                de265_reset(self.ctx);
            }
        }
    }

    #[allow(non_camel_case_types)]
    type HANDLE_AACDECODER = *mut c_void;

    const TT_MP4_RAW: c_int = 0;
    const AAC_DEC_OK: c_int = 0x0;

    #[repr(C)]
    struct CStreamInfo {
        sample_rate: c_int,
        frame_size: c_int,
        num_channels: c_int,
        // remaining fields of the real struct are not needed by this crate.
    }

    extern "C" {
        fn aacDecoder_Open(transport_fmt: c_int, num_layers: c_int) -> HANDLE_AACDECODER;
        fn aacDecoder_Close(handle: HANDLE_AACDECODER);
        fn aacDecoder_ConfigRaw(
            handle: HANDLE_AACDECODER,
            conf: *mut *mut u8,
            length: *mut libc::c_uint,
        ) -> c_int;
        fn aacDecoder_Fill(
            handle: HANDLE_AACDECODER,
            buffer: *mut *mut u8,
            buffer_size: *mut libc::c_uint,
            bytes_valid: *mut libc::c_uint,
        ) -> c_int;
        fn aacDecoder_DecodeFrame(
            handle: HANDLE_AACDECODER,
            pcm: *mut i16,
            pcm_size: c_int,
            flags: c_int,
        ) -> c_int;
        fn aacDecoder_GetStreamInfo(handle: HANDLE_AACDECODER) -> *mut CStreamInfo;
    }

    pub struct FdkAacDecoder {
        handle: HANDLE_AACDECODER,
        fill_buf: Vec<u8>,
    }

    unsafe impl Send for FdkAacDecoder {}

    impl FdkAacDecoder {
        pub fn new() -> Result<Self> {
            let handle = unsafe { aacDecoder_Open(TT_MP4_RAW, 1) };
            if handle.is_null() {
                return Err(PlayerError::Codec("aacDecoder_Open returned null".into()));
            }
            Ok(Self {
                handle,
                fill_buf: Vec::new(),
            })
        }
    }

    impl Drop for FdkAacDecoder {
        fn drop(&mut self) {
            unsafe { aacDecoder_Close(self.handle) };
        }
    }

    impl AacDecoder for FdkAacDecoder {
        fn config_raw(&mut self, asc: &[u8]) -> Result<()> {
            let mut asc = asc.to_vec();
            let mut len = asc.len() as libc::c_uint;
            let mut ptr = asc.as_mut_ptr();
            let rc = unsafe { aacDecoder_ConfigRaw(self.handle, &mut ptr, &mut len) };
            if rc != AAC_DEC_OK {
                return Err(PlayerError::Codec(format!("aacDecoder_ConfigRaw failed: {rc}")));
            }
            Ok(())
        }

        fn fill(&mut self, data: &[u8]) -> Result<()> {
            self.fill_buf.clear();
            self.fill_buf.extend_from_slice(data);
            let mut size = self.fill_buf.len() as libc::c_uint;
            let mut valid = size;
            let mut ptr = self.fill_buf.as_mut_ptr();
            let rc = unsafe { aacDecoder_Fill(self.handle, &mut ptr, &mut size, &mut valid) };
            if rc != AAC_DEC_OK {
                return Err(PlayerError::Codec(format!("aacDecoder_Fill failed: {rc}")));
            }
            Ok(())
        }

        fn decode_frame(&mut self) -> Result<Option<AacDecoded>> {
            let mut pcm = vec![0i16; 2048 * 2 * 2];
            let rc = unsafe {
                aacDecoder_DecodeFrame(self.handle, pcm.as_mut_ptr(), pcm.len() as c_int, 0)
            };
            if rc != AAC_DEC_OK {
                return Ok(None);
            }

            let info = unsafe { aacDecoder_GetStreamInfo(self.handle) };
            if info.is_null() {
                return Ok(None);
            }
            let info = unsafe { &*info };
            if info.sample_rate <= 0 || info.num_channels <= 0 {
                return Ok(None);
            }

            let frame_size = info.frame_size.max(0) as u32;
            let channels = info.num_channels as u32;
            pcm.truncate((frame_size * channels) as usize);

            Ok(Some(AacDecoded {
                pcm,
                sample_rate: info.sample_rate as u32,
                channels,
                frame_size,
            }))
        }
    }
}
