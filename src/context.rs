//! Shared state owned by the pipeline: the state machine, the monotonic
//! playback clock, the four frame queues, per-track cursors and the seek
//! fences the pacers consult. Modelled as a single `Arc`-shared value whose
//! mutable fields are either atomics or internally synchronized (`SafeQueue`,
//! `Mutex`) — no field needs `unsafe` for cross-thread mutation.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::frame::{AudioFrame, VideoFrame};
use crate::memstream::MemStream;
use crate::mp4::sample_table::Track;
use crate::queue::SafeQueue;

/// Raw-frame queue capacity: the reader+decoder blocks once this many
/// undisplayed frames have piled up, which naturally paces decoding to the
/// pacer (`spec.md` §5 "Backpressure").
pub const RAW_QUEUE_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
    Seeking,
}

fn state_to_u8(s: PlaybackState) -> u8 {
    match s {
        PlaybackState::Stopped => 0,
        PlaybackState::Playing => 1,
        PlaybackState::Paused => 2,
        PlaybackState::Seeking => 3,
    }
}

fn u8_to_state(v: u8) -> PlaybackState {
    match v {
        1 => PlaybackState::Playing,
        2 => PlaybackState::Paused,
        3 => PlaybackState::Seeking,
        _ => PlaybackState::Stopped,
    }
}

/// Atomic wrapper around `PlaybackState` so every worker can poll it without
/// a lock.
pub struct AtomicState(std::sync::atomic::AtomicU8);

impl AtomicState {
    pub fn new(initial: PlaybackState) -> Self {
        Self(std::sync::atomic::AtomicU8::new(state_to_u8(initial)))
    }

    pub fn load(&self) -> PlaybackState {
        u8_to_state(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, s: PlaybackState) {
        self.0.store(state_to_u8(s), Ordering::Release);
    }
}

/// The clock backing `playback_time_ms`. `base_clock` is the instant at which
/// playback-time-zero occurred; pause/resume/seek adjust it per the
/// invariant in `spec.md` §3.
pub struct Clock {
    base: Mutex<Instant>,
    pause_time: Mutex<Option<Instant>>,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            base: Mutex::new(Instant::now()),
            pause_time: Mutex::new(None),
        }
    }

    /// `playback_time_ms = now - base_clock`.
    pub fn playback_time_ms(&self) -> u64 {
        let base = *self.base.lock().unwrap();
        Instant::now().saturating_duration_since(base).as_millis() as u64
    }

    pub fn mark_paused(&self) {
        *self.pause_time.lock().unwrap() = Some(Instant::now());
    }

    /// `base_clock += (resume - pause_time)`.
    pub fn resume(&self) {
        let mut pause_time = self.pause_time.lock().unwrap();
        if let Some(pt) = pause_time.take() {
            let elapsed = Instant::now().saturating_duration_since(pt);
            *self.base.lock().unwrap() += elapsed;
        }
    }

    /// `base_clock = now - target`.
    pub fn seek_to(&self, target_ms: u64) {
        *self.base.lock().unwrap() =
            Instant::now() - std::time::Duration::from_millis(target_ms);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// One track's worth of queues and cursor: the raw-decoded queue the
/// reader+decoder fills, the presentable queue the pacer fills, the sample
/// cursor the controller/reader share, and the seek-reset fence the pacer
/// consults.
pub struct TrackPipelineState<F> {
    pub raw_queue: SafeQueue<F>,
    pub ready_queue: SafeQueue<F>,
    pub cursor: AtomicUsize,
    pub seek_fence: AtomicBool,
    pub decode_done: AtomicBool,
}

impl<F> TrackPipelineState<F> {
    fn new() -> Self {
        Self {
            raw_queue: SafeQueue::new(RAW_QUEUE_CAPACITY),
            ready_queue: SafeQueue::new(0),
            cursor: AtomicUsize::new(0),
            seek_fence: AtomicBool::new(false),
            decode_done: AtomicBool::new(false),
        }
    }

    fn drain_all(&self) {
        self.raw_queue.drain();
        self.ready_queue.drain();
    }
}

/// Shared state owned by the pipeline, distributed to worker threads via
/// `Arc<PlaybackContext>`.
pub struct PlaybackContext {
    pub state: AtomicState,
    pub clock: Clock,
    pub stream: Mutex<MemStream>,
    pub video_track: Track,
    pub audio_track: Track,
    pub video: TrackPipelineState<VideoFrame>,
    pub audio: TrackPipelineState<AudioFrame>,
    pub volume: AtomicU64, // f32 bits, see `volume()`/`set_volume()`
    pub shutdown: AtomicBool,
}

impl PlaybackContext {
    pub fn new(stream: MemStream, video_track: Track, audio_track: Track) -> Self {
        Self {
            state: AtomicState::new(PlaybackState::Stopped),
            clock: Clock::new(),
            stream: Mutex::new(stream),
            video_track,
            audio_track,
            video: TrackPipelineState::new(),
            audio: TrackPipelineState::new(),
            volume: AtomicU64::new((1.0f32).to_bits() as u64),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed) as u32)
    }

    pub fn set_volume(&self, v: f32) {
        let clamped = v.clamp(0.0, 3.0);
        self.volume.store(clamped.to_bits() as u64, Ordering::Relaxed);
    }

    /// Drains all four frame queues under the stream lock, per `spec.md`
    /// §4.7 ("Drain all four queues under the stream lock").
    pub fn drain_all_queues(&self) {
        let _guard = self.stream.lock().unwrap();
        self.video.drain_all();
        self.audio.drain_all();
    }

    /// Shuts every queue down so blocked workers wake and exit. Idempotent.
    pub fn shutdown_all(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.video.raw_queue.shutdown();
        self.video.ready_queue.shutdown();
        self.audio.raw_queue.shutdown();
        self.audio.ready_queue.shutdown();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.load() == PlaybackState::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn clock_pause_resume_preserves_playback_time() {
        let clock = Clock::new();
        thread::sleep(Duration::from_millis(30));
        let before_pause = clock.playback_time_ms();
        clock.mark_paused();
        thread::sleep(Duration::from_millis(50));
        clock.resume();
        let after_resume = clock.playback_time_ms();
        assert!(
            after_resume >= before_pause && after_resume < before_pause + 20,
            "before={before_pause} after={after_resume}"
        );
    }

    #[test]
    fn clock_seek_sets_playback_time_to_target() {
        let clock = Clock::new();
        clock.seek_to(5_000);
        let t = clock.playback_time_ms();
        assert!((5_000..5_020).contains(&t), "t={t}");
    }

    #[test]
    fn volume_round_trips_through_bit_storage() {
        let ctx_volume = AtomicU64::new((1.0f32).to_bits() as u64);
        assert_eq!(f32::from_bits(ctx_volume.load(Ordering::Relaxed) as u32), 1.0);
    }
}
