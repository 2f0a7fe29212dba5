//! Presentation-surface boundary (`spec.md` §6): a window/renderer/texture and
//! an audio output stream, described only by the operations the pipeline
//! needs. Concrete implementations (winit/wgpu, cpal) live in the desktop
//! binary; this crate only depends on these traits so the pipeline stays
//! testable without a display or audio device.

use crate::error::Result;
use crate::frame::VideoFrame;

/// Accepts decoded I420 pictures and presents them. One texture upload plus
/// one present per frame, matching `SDL_UpdateYUVTexture` + `SDL_RenderClear`
/// + `SDL_RenderTexture` + `SDL_RenderPresent` in the source.
pub trait VideoSink: Send {
    fn present(&mut self, frame: &VideoFrame) -> Result<()>;
}

/// Accepts interleaved signed-16-bit PCM for playback.
pub trait AudioSink: Send {
    fn submit(&mut self, pcm: &[i16]) -> Result<()>;
    fn pause(&mut self) {}
    fn resume(&mut self) {}
}

/// A `VideoSink`/`AudioSink` that does nothing; used by tests and by any
/// caller that wants to drive the pipeline without a real display/audio
/// device (e.g. to validate timing or decode throughput headlessly).
pub struct NullSink;

impl VideoSink for NullSink {
    fn present(&mut self, _frame: &VideoFrame) -> Result<()> {
        Ok(())
    }
}

impl AudioSink for NullSink {
    fn submit(&mut self, _pcm: &[i16]) -> Result<()> {
        Ok(())
    }
}
