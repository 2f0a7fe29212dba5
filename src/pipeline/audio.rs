//! Audio pipeline: reader+decoder (A1), pacer (A2), presenter (A3).

use std::sync::atomic::Ordering;
use std::thread;

use crate::codec::AacDecoder;
use crate::context::{PlaybackContext, PlaybackState};
use crate::frame::AudioFrame;
use crate::mp4::sample_table::CodecInfo;
use crate::presentation::AudioSink;

use super::{scale_volume_saturating, PACER_SLEEP_QUANTUM};

/// Stage A1. Configures the decoder from the AudioSpecificConfig once per
/// epoch, then walks the sample table from the shared cursor, re-configuring
/// whenever a seek interrupts the walk — symmetric with the video reader.
pub fn reader_decoder_loop(ctx: &PlaybackContext, decoder: &mut dyn AacDecoder) {
    let CodecInfo::Aac {
        sample_rate,
        channels,
        asc_bytes,
        ..
    } = &ctx.audio_track.codec
    else {
        log::error!("audio reader started against a non-AAC track");
        return;
    };
    let (sample_rate, channels) = (*sample_rate, *channels);
    let samples = &ctx.audio_track.samples;

    loop {
        if ctx.is_stopped() {
            return;
        }
        if matches!(ctx.state.load(), PlaybackState::Paused | PlaybackState::Seeking) {
            thread::sleep(PACER_SLEEP_QUANTUM.mul_f32(2.0));
            continue;
        }

        if let Err(e) = decoder.config_raw(asc_bytes) {
            log::error!("aac config_raw rejected: {e}");
            return;
        }

        let mut idx = ctx.audio.cursor.load(Ordering::Acquire);
        while idx < samples.len() {
            let state = ctx.state.load();
            if state == PlaybackState::Stopped {
                return;
            }
            if state == PlaybackState::Seeking {
                break;
            }

            let sample = samples[idx];
            let mut data = vec![0u8; sample.size as usize];
            {
                let mut stream = ctx.stream.lock().unwrap();
                if !stream.read_at(sample.file_offset as usize, &mut data) {
                    log::warn!("audio sample {idx} read failed at offset {}", sample.file_offset);
                    idx += 1;
                    ctx.audio.cursor.store(idx, Ordering::Release);
                    continue;
                }
            }

            if let Err(e) = decoder.fill(&data) {
                log::warn!("aac fill failed at sample {idx}: {e}");
                idx += 1;
                ctx.audio.cursor.store(idx, Ordering::Release);
                continue;
            }

            if ctx.state.load() == PlaybackState::Stopped {
                return;
            }

            match decoder.decode_frame() {
                Ok(Some(decoded)) => {
                    let pts_ms = ctx.audio_track.pts_ms(&sample);
                    ctx.audio.raw_queue.push(AudioFrame {
                        pts_ms,
                        sample_rate,
                        channels,
                        frame_size: decoded.frame_size,
                        pcm: decoded.pcm,
                    });
                }
                Ok(None) => {}
                Err(e) => log::warn!("aac decode error at sample {idx}: {e}"),
            }

            idx += 1;
            ctx.audio.cursor.store(idx, Ordering::Release);
        }

        if idx >= samples.len() {
            ctx.audio.decode_done.store(true, Ordering::Release);
        }

        while !ctx.is_stopped() {
            let state = ctx.state.load();
            if state == PlaybackState::Seeking {
                ctx.audio.decode_done.store(false, Ordering::Release);
                break;
            }
            if idx < samples.len() {
                break;
            }
            thread::sleep(PACER_SLEEP_QUANTUM.mul_f32(2.0));
        }
        if ctx.is_stopped() {
            return;
        }
        while ctx.state.load() == PlaybackState::Seeking && !ctx.is_stopped() {
            thread::sleep(PACER_SLEEP_QUANTUM);
        }
    }
}

/// Stage A2: single-slot pacer, identical policy to the video pacer.
pub fn pacer_loop(ctx: &PlaybackContext) {
    let mut pending: Option<AudioFrame> = None;

    loop {
        if ctx.is_stopped() {
            return;
        }

        if matches!(ctx.state.load(), PlaybackState::Paused | PlaybackState::Seeking)
            || ctx.audio.seek_fence.swap(false, Ordering::AcqRel)
        {
            pending = None;
            ctx.audio.raw_queue.pop_front_discard();
            thread::sleep(PACER_SLEEP_QUANTUM.mul_f32(2.0));
            continue;
        }

        match pending.take() {
            Some(frame) => {
                let now = ctx.clock.playback_time_ms();
                if now >= frame.pts_ms {
                    ctx.audio.ready_queue.push(frame);
                } else {
                    let wait = (frame.pts_ms - now).min(PACER_SLEEP_QUANTUM.as_millis() as u64);
                    pending = Some(frame);
                    thread::sleep(std::time::Duration::from_millis(wait));
                }
            }
            None => match ctx.audio.raw_queue.pop_timeout(PACER_SLEEP_QUANTUM) {
                Some(frame) => pending = Some(frame),
                None => continue,
            },
        }
    }
}

/// Stage A3: applies the current volume and submits PCM to the sink.
pub fn presenter_loop(ctx: &PlaybackContext, sink: &mut dyn AudioSink) {
    loop {
        if ctx.is_stopped() {
            return;
        }
        if matches!(ctx.state.load(), PlaybackState::Paused | PlaybackState::Seeking) {
            thread::sleep(PACER_SLEEP_QUANTUM.mul_f32(2.0));
            continue;
        }

        match ctx.audio.ready_queue.pop_timeout(PACER_SLEEP_QUANTUM) {
            Some(mut frame) => {
                scale_volume_saturating(&mut frame.pcm, ctx.volume());
                if let Err(e) = sink.submit(&frame.pcm) {
                    log::warn!("audio submit failed: {e}");
                }
            }
            None => continue,
        }
    }
}
