//! `vaultplay_core`: decrypting, parsing and playing back the encrypted
//! HEVC/AAC container format the CLI front-end in `src/bin/player.rs` drives.
//!
//! Module layout mirrors the pipeline stages described in `SPEC_FULL.md`:
//! [`crypto`]/[`memstream`] cover opening the container, [`mp4`] covers
//! parsing it into track sample tables, [`codec`]/[`frame`] describe decoded
//! media, [`context`]/[`pipeline`]/[`controller`] are the concurrent playback
//! engine, and [`presentation`] is the boundary the desktop binary implements.

pub mod codec;
pub mod context;
pub mod controller;
pub mod crypto;
pub mod error;
pub mod frame;
pub mod memstream;
pub mod mp4;
pub mod pipeline;
pub mod presentation;
pub mod queue;

use std::path::Path;
use std::sync::Arc;

use context::PlaybackContext;
use error::{PlayerError, Result};
use memstream::MemStream;

/// Opens, decrypts and parses the container at `path`, returning a fully
/// built [`PlaybackContext`] ready for its six workers to be spawned against.
/// `password` is zeroized by [`MemStream::open`] regardless of outcome.
///
/// Requires at least one HEVC video track and one AAC audio track; a
/// container missing either is rejected with [`PlayerError::MissingTrack`],
/// matching the source's requirement of exactly one of each.
pub fn open(path: &Path, password: &mut Vec<u8>) -> Result<Arc<PlaybackContext>> {
    if password.is_empty() {
        crypto::secure_clear(password);
        return Err(PlayerError::EmptyPassword);
    }
    if !path.is_file() {
        crypto::secure_clear(password);
        return Err(PlayerError::FileNotFound(path.to_path_buf()));
    }

    let mut stream = MemStream::open(path, password)?;
    if !stream.is_valid() {
        return Err(PlayerError::Decrypt("wrong password or corrupt container".into()));
    }

    let mut tracks = mp4::parse(&mut stream)?.tracks;
    let video_idx = tracks
        .iter()
        .position(|t| t.kind == mp4::sample_table::TrackKind::Video)
        .ok_or(PlayerError::MissingTrack)?;
    let video_track = tracks.remove(video_idx);
    let audio_idx = tracks
        .iter()
        .position(|t| t.kind == mp4::sample_table::TrackKind::Audio)
        .ok_or(PlayerError::MissingTrack)?;
    let audio_track = tracks.remove(audio_idx);

    Ok(Arc::new(PlaybackContext::new(stream, video_track, audio_track)))
}
