//! Video pipeline: reader+decoder (V1), pacer (V2), presenter (V3).

use std::sync::atomic::Ordering;
use std::thread;

use crate::codec::HevcDecoder;
use crate::context::{PlaybackContext, PlaybackState};
use crate::frame::VideoFrame;
use crate::mp4::sample_table::CodecInfo;
use crate::presentation::VideoSink;

use super::{build_hevc_init_blob, length_prefixed_to_annexb, PACER_SLEEP_QUANTUM};

/// Stage V1. Feeds the VPS/SPS/PPS init blob once, then walks the sample
/// table from `cursor_idx` forward, re-feeding the init blob (and resetting
/// the decoder) each time a seek interrupts the walk — the "reset, don't
/// recreate" epoch policy `spec.md` §9 accepts.
pub fn reader_decoder_loop(ctx: &PlaybackContext, decoder: &mut dyn HevcDecoder) {
    let CodecInfo::Hevc { nal_units, .. } = &ctx.video_track.codec else {
        log::error!("video reader started against a non-HEVC track");
        return;
    };
    let init_blob = build_hevc_init_blob(nal_units);
    let samples = &ctx.video_track.samples;
    let timescale = ctx.video_track.timescale.max(1) as u64;

    loop {
        if ctx.is_stopped() {
            return;
        }
        if matches!(ctx.state.load(), PlaybackState::Paused | PlaybackState::Seeking) {
            thread::sleep(PACER_SLEEP_QUANTUM.mul_f32(2.0));
            continue;
        }

        if let Err(e) = decoder.push_init_data(&init_blob) {
            log::error!("hevc init blob rejected: {e}");
            return;
        }

        let mut idx = ctx.video.cursor.load(Ordering::Acquire);
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
                    log::warn!("video sample {idx} read failed at offset {}", sample.file_offset);
                    idx += 1;
                    ctx.video.cursor.store(idx, Ordering::Release);
                    continue;
                }
            }

            let annexb = length_prefixed_to_annexb(&data);
            let pts_ms = ctx.video_track.pts_ms(&sample);
            let _ = timescale;

            if let Err(e) = decoder.push_data(&annexb, pts_ms) {
                log::warn!("hevc push_data failed at sample {idx}: {e}");
                idx += 1;
                ctx.video.cursor.store(idx, Ordering::Release);
                continue;
            }

            loop {
                if ctx.state.load() == PlaybackState::Stopped {
                    return;
                }
                match decoder.decode_step() {
                    Ok(more) => {
                        while let Some(frame) = decoder.next_picture() {
                            ctx.video.raw_queue.push(frame);
                        }
                        if !more {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("hevc decode error at sample {idx}: {e}");
                        break;
                    }
                }
            }

            idx += 1;
            ctx.video.cursor.store(idx, Ordering::Release);
        }

        if idx >= samples.len() {
            ctx.video.decode_done.store(true, Ordering::Release);
        }

        // Either ran off the end of the table or observed SEEKING: wait for
        // the controller to reposition (or for shutdown) before looping.
        while !ctx.is_stopped() {
            let state = ctx.state.load();
            if state == PlaybackState::Seeking {
                decoder.reset();
                ctx.video.decode_done.store(false, Ordering::Release);
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
        // Wait out the SEEKING window itself so we resume against the
        // post-seek cursor, not mid-reposition.
        while ctx.state.load() == PlaybackState::Seeking && !ctx.is_stopped() {
            thread::sleep(PACER_SLEEP_QUANTUM);
        }
    }
}

/// Stage V2: single-slot pacer. Holds at most one decoded frame; forwards it
/// to the ready queue once `playback_time_ms >= frame.pts_ms`.
pub fn pacer_loop(ctx: &PlaybackContext) {
    let mut pending: Option<VideoFrame> = None;

    loop {
        if ctx.is_stopped() {
            return;
        }

        if matches!(ctx.state.load(), PlaybackState::Paused | PlaybackState::Seeking)
            || ctx.video.seek_fence.swap(false, Ordering::AcqRel)
        {
            pending = None;
            ctx.video.raw_queue.pop_front_discard();
            thread::sleep(PACER_SLEEP_QUANTUM.mul_f32(2.0));
            continue;
        }

        match pending.take() {
            Some(frame) => {
                let now = ctx.clock.playback_time_ms();
                if now >= frame.pts_ms {
                    ctx.video.ready_queue.push(frame);
                } else {
                    let wait = (frame.pts_ms - now).min(PACER_SLEEP_QUANTUM.as_millis() as u64);
                    pending = Some(frame);
                    thread::sleep(std::time::Duration::from_millis(wait));
                }
            }
            None => match ctx.video.raw_queue.pop_timeout(PACER_SLEEP_QUANTUM) {
                Some(frame) => pending = Some(frame),
                None => continue,
            },
        }
    }
}

/// Stage V3: uploads and presents each ready frame in turn.
pub fn presenter_loop(ctx: &PlaybackContext, sink: &mut dyn VideoSink) {
    loop {
        if ctx.is_stopped() {
            return;
        }
        if matches!(ctx.state.load(), PlaybackState::Paused | PlaybackState::Seeking) {
            thread::sleep(PACER_SLEEP_QUANTUM.mul_f32(2.0));
            continue;
        }

        match ctx.video.ready_queue.pop_timeout(PACER_SLEEP_QUANTUM) {
            Some(frame) => {
                if let Err(e) = sink.present(&frame) {
                    log::warn!("video present failed: {e}");
                }
            }
            None => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::mock::MockHevcDecoder;
    use crate::memstream::MemStream;
    use crate::mp4::sample_table::{Sample, Track, TrackKind};
    use std::sync::Arc;

    fn make_ctx(video_samples: Vec<Sample>) -> Arc<PlaybackContext> {
        let video_track = Track {
            kind: TrackKind::Video,
            timescale: 1000,
            duration: 1000,
            codec: CodecInfo::Hevc {
                width: 64,
                height: 64,
                nal_units: vec![vec![vec![0u8; 4]]],
            },
            samples: video_samples,
        };
        let audio_track = Track {
            kind: TrackKind::Audio,
            timescale: 48000,
            duration: 0,
            codec: CodecInfo::Aac {
                channels: 2,
                sample_rate: 48000,
                sample_size: 16,
                asc_bytes: vec![0x11, 0x90],
            },
            samples: vec![],
        };
        let stream = MemStream::from_plaintext_for_tests(vec![0u8; 4096]);
        Arc::new(PlaybackContext::new(stream, video_track, audio_track))
    }

    #[test]
    fn reader_decoder_pushes_every_sample_and_advances_cursor() {
        let samples = vec![
            Sample {
                file_offset: 0,
                size: 8,
                decode_time: 0,
                composition_offset: 0,
                presentation_time: 0,
                duration: 33,
                is_keyframe: true,
            },
            Sample {
                file_offset: 8,
                size: 8,
                decode_time: 33,
                composition_offset: 0,
                presentation_time: 33,
                duration: 33,
                is_keyframe: false,
            },
        ];
        let ctx = make_ctx(samples);
        ctx.state.store(PlaybackState::Playing);

        // Each 8-byte sample is one length-prefixed NAL of 4 payload bytes.
        {
            let mut stream = ctx.stream.lock().unwrap();
            let mut buf = vec![0u8; 4096];
            buf[0..4].copy_from_slice(&4u32.to_be_bytes());
            buf[4..8].copy_from_slice(&[1, 2, 3, 4]);
            buf[8..12].copy_from_slice(&4u32.to_be_bytes());
            buf[12..16].copy_from_slice(&[5, 6, 7, 8]);
            *stream = MemStream::from_plaintext_for_tests(buf);
        }

        let mut decoder = MockHevcDecoder::default();
        let ctx_stop = ctx.clone();
        let handle = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(20));
            ctx_stop.state.store(PlaybackState::Stopped);
        });

        reader_decoder_loop(&ctx, &mut decoder);
        handle.join().unwrap();

        assert_eq!(ctx.video.cursor.load(Ordering::Acquire), 2);
        assert_eq!(decoder.pushed.len(), 2);
        assert_eq!(decoder.pushed[0].1, 0);
        assert_eq!(decoder.pushed[1].1, 33);
    }

    #[test]
    fn pacer_forwards_frame_once_clock_reaches_pts() {
        let ctx = make_ctx(vec![]);
        ctx.state.store(PlaybackState::Playing);
        ctx.clock.seek_to(0);

        ctx.video.raw_queue.push(VideoFrame {
            pts_ms: 0,
            width: 2,
            height: 2,
            planes: [vec![0; 4], vec![0; 1], vec![0; 1]],
            strides: [2, 1, 1],
        });

        let ctx2 = ctx.clone();
        let handle = thread::spawn(move || pacer_loop(&ctx2));
        thread::sleep(std::time::Duration::from_millis(30));
        ctx.state.store(PlaybackState::Stopped);
        handle.join().unwrap();

        assert_eq!(ctx.video.ready_queue.len(), 1);
    }
}
