//! Playback controller: the state-machine transitions `spec.md` §3/§4.7
//! assigns to something other than the six workers — `play`, `pause`,
//! `resume`, `seek` and `stop` — grounded on `main_v4.cpp`'s `handle_seek`
//! and its SPACE-key pause/resume handling.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::context::{PlaybackContext, PlaybackState};

/// How long a seek holds the SEEKING state before handing playback back,
/// giving the readers time to observe the repositioned cursor and the
/// pacers time to drop whatever they were holding. `main_v4.cpp` uses a
/// flat 1000ms; kept as-is since nothing in the corrected design narrows it.
const SEEK_SETTLE: Duration = Duration::from_millis(1000);

/// Moves STOPPED to PLAYING. The caller is responsible for having already
/// spawned the six workers against this context.
pub fn play(ctx: &PlaybackContext) {
    ctx.clock.seek_to(0);
    ctx.state.store(PlaybackState::Playing);
}

/// PLAYING -> PAUSED. No-op from any other state.
pub fn pause(ctx: &PlaybackContext) {
    if ctx.state.load() == PlaybackState::Playing {
        ctx.clock.mark_paused();
        ctx.state.store(PlaybackState::Paused);
    }
}

/// PAUSED -> PLAYING, restoring `playback_time_ms` across the pause.
pub fn resume(ctx: &PlaybackContext) {
    if ctx.state.load() == PlaybackState::Paused {
        ctx.clock.resume();
        ctx.state.store(PlaybackState::Playing);
    }
}

/// PLAYING/PAUSED -> SEEKING -> PLAYING. Blocks the calling thread for the
/// settle window; call from a dedicated control thread, not a presenter.
///
/// `delta_ms` may be negative (rewind); the target clamps to zero and to the
/// longer of the two track durations. Repositions both track cursors to the
/// last sample whose presentation time is at or before the target, using the
/// same "scan from the end" rule as the source, then raises both pacers' seek
/// fences so any frame they are mid-holding is dropped rather than presented
/// against the old clock.
pub fn seek(ctx: &PlaybackContext, delta_ms: i64) {
    ctx.state.store(PlaybackState::Seeking);

    let current = ctx.clock.playback_time_ms() as i64;
    let max_ms = track_duration_ms(&ctx.video_track).max(track_duration_ms(&ctx.audio_track));
    let target_ms = (current + delta_ms).max(0).min(max_ms as i64) as u64;

    ctx.drain_all_queues();

    let video_idx = find_sample_idx(&ctx.video_track.samples, target_ms, ctx.video_track.timescale);
    let audio_idx = find_sample_idx(&ctx.audio_track.samples, target_ms, ctx.audio_track.timescale);
    ctx.video.cursor.store(video_idx, Ordering::Release);
    ctx.audio.cursor.store(audio_idx, Ordering::Release);
    ctx.video.seek_fence.store(true, Ordering::Release);
    ctx.audio.seek_fence.store(true, Ordering::Release);

    thread::sleep(SEEK_SETTLE);

    ctx.clock.seek_to(target_ms);
    ctx.state.store(PlaybackState::Playing);
}

/// Track duration in milliseconds, per `mdhd.duration`/`mdhd.timescale`.
fn track_duration_ms(track: &crate::mp4::sample_table::Track) -> u64 {
    track.duration * 1000 / track.timescale.max(1) as u64
}

/// Finds the largest sample index whose `presentation_time` (converted to
/// milliseconds) is at or before `target_ms`, scanning from the end as the
/// source does. Returns 0 for an empty table.
fn find_sample_idx(samples: &[crate::mp4::sample_table::Sample], target_ms: u64, timescale: u32) -> usize {
    if samples.is_empty() {
        return 0;
    }
    let target_pts = (target_ms as f64 / 1000.0 * timescale.max(1) as f64) as u64;
    for i in (0..samples.len()).rev() {
        if samples[i].presentation_time <= target_pts {
            return i;
        }
    }
    0
}

/// STOPPED from any state: flips the flag, unblocks every queue so workers
/// waiting in `pop`/`pop_timeout` wake and see `is_stopped()`.
pub fn stop(ctx: &Arc<PlaybackContext>) {
    ctx.state.store(PlaybackState::Stopped);
    ctx.shutdown_all();
}
