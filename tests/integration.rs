//! End-to-end tests against the public API: encrypt a synthetic container,
//! write it to disk, and drive it through `vaultplay_core::open` exactly as
//! the CLI binary does. Covers `spec.md` §8 scenarios 1 ("encrypt-and-decrypt
//! a known container") and 2 ("parse a minimal MP4 with one HEVC and one AAC
//! track"), plus the startup-error paths `spec.md` §7 calls fatal.

use std::io::Write;

use vaultplay_core::crypto;
use vaultplay_core::error::PlayerError;
use vaultplay_core::memstream::MemStream;

fn be32(v: u32) -> [u8; 4] {
    v.to_be_bytes()
}
fn be16(v: u16) -> [u8; 2] {
    v.to_be_bytes()
}

/// Wraps `body` in an atom header: `[size:u32][kind:4 bytes][body]`.
fn atom(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + body.len());
    out.extend_from_slice(&be32((8 + body.len()) as u32));
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out
}

fn mdhd(timescale: u32, duration: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0, 0, 0, 0]); // version + flags
    body.extend_from_slice(&be32(0)); // creation_time
    body.extend_from_slice(&be32(0)); // modification_time
    body.extend_from_slice(&be32(timescale));
    body.extend_from_slice(&be32(duration));
    atom(b"mdhd", &body)
}

fn hdlr(handler: &[u8; 4]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0, 0, 0, 0]); // version + flags
    body.extend_from_slice(&be32(0)); // pre_defined
    body.extend_from_slice(handler);
    atom(b"hdlr", &body)
}

/// `stsd` with a single `hev1`+`hvcC` entry. Byte layout mirrors exactly what
/// `mp4::boxes::parse_stsd`/`parse_hvcc` consume (see `DESIGN.md`'s MP4 parser
/// entry for why the `ignore` counts land where they do).
fn stsd_video(width: u16, height: u16, vps_nal: &[u8]) -> Vec<u8> {
    let mut hvcc_body = Vec::new();
    hvcc_body.extend_from_slice(&[0u8; 21]); // fixed hvcC prefix
    hvcc_body.push(0); // general_profile_space_etc
    hvcc_body.push(1); // numOfArrays
    hvcc_body.push(0); // array_type (ignored)
    hvcc_body.extend_from_slice(&be16(1)); // numNalus
    hvcc_body.extend_from_slice(&be16(vps_nal.len() as u16));
    hvcc_body.extend_from_slice(vps_nal);

    let mut entry = Vec::new();
    entry.extend_from_slice(&be32(0)); // sample entry size (unchecked by parser)
    entry.extend_from_slice(b"hev1");
    entry.extend_from_slice(&[0u8; 24]); // reserved + data_reference_index + reserved
    entry.extend_from_slice(&be16(width));
    entry.extend_from_slice(&be16(height));
    entry.extend_from_slice(&[0u8; 50]); // visual sample entry tail
    entry.extend_from_slice(&be32((8 + hvcc_body.len()) as u32)); // hvcC box size (unchecked)
    entry.extend_from_slice(b"hvcC");
    entry.extend_from_slice(&hvcc_body);

    let mut body = Vec::new();
    body.extend_from_slice(&[0, 0, 0, 0]); // version + flags
    body.extend_from_slice(&be32(1)); // entry_count
    body.extend_from_slice(&entry);
    atom(b"stsd", &body)
}

/// `stsd` with a single `mp4a`+`esds` entry, `asc_bytes` embedded as the
/// DecoderSpecificInfo payload.
fn stsd_audio(channels: u16, sample_size: u16, sample_rate: u32, asc: &[u8]) -> Vec<u8> {
    let mut esds_body = Vec::new();
    esds_body.extend_from_slice(&[0, 0, 0, 0]); // FullBox version + flags
    esds_body.push(0x03); // ES_DescrTag
    esds_body.push(0x20); // descriptor length (single byte, no continuation)
    esds_body.extend_from_slice(&[0u8; 3]); // ES_ID + flags
    esds_body.push(0x04); // DecoderConfigDescrTag
    esds_body.push(0x12); // descriptor length
    esds_body.extend_from_slice(&[0u8; 13]); // object type, buffer sizes, bit rates
    esds_body.push(0x05); // DecSpecificInfoTag
    esds_body.push(asc.len() as u8); // descriptor length = ASC byte count
    esds_body.extend_from_slice(asc);

    let mut entry = Vec::new();
    entry.extend_from_slice(&be32(0)); // sample entry size (unchecked)
    entry.extend_from_slice(b"mp4a");
    entry.extend_from_slice(&[0u8; 16]); // reserved
    entry.extend_from_slice(&be16(channels));
    entry.extend_from_slice(&be16(sample_size));
    entry.extend_from_slice(&[0u8; 4]); // reserved
    entry.extend_from_slice(&be32(sample_rate << 16)); // 16.16 fixed point
    entry.extend_from_slice(&be32((8 + esds_body.len()) as u32)); // esds box size (unchecked)
    entry.extend_from_slice(b"esds");
    entry.extend_from_slice(&esds_body);

    let mut body = Vec::new();
    body.extend_from_slice(&[0, 0, 0, 0]);
    body.extend_from_slice(&be32(1));
    body.extend_from_slice(&entry);
    atom(b"stsd", &body)
}

fn stts(entries: &[(u32, u32)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0, 0, 0, 0]);
    body.extend_from_slice(&be32(entries.len() as u32));
    for &(count, delta) in entries {
        body.extend_from_slice(&be32(count));
        body.extend_from_slice(&be32(delta));
    }
    atom(b"stts", &body)
}

fn stsc(entries: &[(u32, u32, u32)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0, 0, 0, 0]);
    body.extend_from_slice(&be32(entries.len() as u32));
    for &(first_chunk, per_chunk, desc_idx) in entries {
        body.extend_from_slice(&be32(first_chunk));
        body.extend_from_slice(&be32(per_chunk));
        body.extend_from_slice(&be32(desc_idx));
    }
    atom(b"stsc", &body)
}

fn stsz(sizes: &[u32]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0, 0, 0, 0]);
    body.extend_from_slice(&be32(0)); // sample_size = 0 (per-sample form)
    body.extend_from_slice(&be32(sizes.len() as u32));
    for &s in sizes {
        body.extend_from_slice(&be32(s));
    }
    atom(b"stsz", &body)
}

fn stco(offsets: &[u32]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0, 0, 0, 0]);
    body.extend_from_slice(&be32(offsets.len() as u32));
    for &o in offsets {
        body.extend_from_slice(&be32(o));
    }
    atom(b"stco", &body)
}

fn container(kind: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    let mut body = Vec::new();
    for c in children {
        body.extend_from_slice(c);
    }
    atom(kind, &body)
}

/// One `trak` with the handful of leaf boxes `mp4::mod::build_track` requires,
/// nested exactly as the parser's container-descent list expects
/// (`trak > mdia > {hdlr, mdhd, minf > stbl > {stsd, stts, stsc, stsz, stco}}`).
struct TrakBoxes {
    mdhd: Vec<u8>,
    hdlr: Vec<u8>,
    stsd: Vec<u8>,
    stts: Vec<u8>,
    stsc: Vec<u8>,
    stsz: Vec<u8>,
    stco: Vec<u8>,
}

fn trak(b: TrakBoxes) -> Vec<u8> {
    let stbl = container(b"stbl", &[b.stsd, b.stts, b.stsc, b.stsz, b.stco]);
    let minf = container(b"minf", &[stbl]);
    let mdia = container(b"mdia", &[b.hdlr, b.mdhd, minf]);
    container(b"trak", &[mdia])
}

/// Builds a minimal non-fragmented MP4: one HEVC video track (3 samples) and
/// one AAC audio track (4 samples), with real-looking (if tiny) sample tables.
/// The chunk offsets point past the `moov` atom into a zero-padded tail large
/// enough to satisfy `file_offset + size <= stream.size()`.
fn build_minimal_mp4() -> Vec<u8> {
    let video_trak = trak(TrakBoxes {
        mdhd: mdhd(30_000, 3 * 1001),
        hdlr: hdlr(b"vide"),
        stsd: stsd_video(64, 48, &[0xAA, 0xBB, 0xCC, 0xDD]),
        stts: stts(&[(3, 1001)]),
        stsc: stsc(&[(1, 3, 1)]),
        stsz: stsz(&[10, 20, 30]),
        stco: stco(&[2_000]),
    });

    let audio_trak = trak(TrakBoxes {
        mdhd: mdhd(48_000, 4 * 1024),
        hdlr: hdlr(b"soun"),
        stsd: stsd_audio(2, 16, 48_000, &[0x11, 0x90]),
        stts: stts(&[(4, 1024)]),
        stsc: stsc(&[(1, 4, 1)]),
        stsz: stsz(&[100, 100, 100, 100]),
        stco: stco(&[5_000]),
    });

    let moov = container(b"moov", &[video_trak, audio_trak]);

    let mut plain = moov;
    plain.resize(8192, 0); // pad so every sample's [offset, offset+size) stays in bounds
    plain
}

fn write_encrypted(dir: &tempfile::TempDir, password: &str, plain: &[u8]) -> std::path::PathBuf {
    let key = crypto::sha256(password.as_bytes());
    let encrypted = crypto::encrypt(plain, &key).unwrap();
    let path = dir.path().join("container.bin");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(&encrypted).unwrap();
    path
}

#[test]
fn encrypt_and_decrypt_a_known_payload() {
    let dir = tempfile::tempdir().unwrap();
    let plain = vec![7u8; 1 << 20];
    let path = write_encrypted(&dir, "pw", &plain);

    let mut password = b"pw".to_vec();
    let stream = MemStream::open(&path, &mut password).unwrap();
    assert!(stream.is_valid());
    assert_eq!(stream.size(), plain.len());
}

#[test]
fn opens_and_parses_minimal_hevc_aac_container() {
    let dir = tempfile::tempdir().unwrap();
    let plain = build_minimal_mp4();
    let path = write_encrypted(&dir, "pw", &plain);

    let mut password = b"pw".to_vec();
    let ctx = vaultplay_core::open(&path, &mut password).expect("container should parse");

    assert_eq!(ctx.video_track.samples.len(), 3);
    assert_eq!(ctx.audio_track.samples.len(), 4);

    assert_eq!(ctx.video_track.samples[0].file_offset, 2_000);
    assert_eq!(ctx.audio_track.samples[0].file_offset, 5_000);

    // No `stss`: every video sample is a keyframe.
    assert!(ctx.video_track.samples.iter().all(|s| s.is_keyframe));

    // decode_time is monotonic and sums to (within one tick of) mdhd.duration.
    let total_duration: u64 = ctx.video_track.samples.iter().map(|s| s.duration as u64).sum();
    assert_eq!(total_duration, ctx.video_track.duration);

    match &ctx.video_track.codec {
        vaultplay_core::mp4::sample_table::CodecInfo::Hevc { width, height, nal_units } => {
            assert_eq!(*width, 64);
            assert_eq!(*height, 48);
            assert_eq!(nal_units.len(), 1);
            assert_eq!(nal_units[0][0], vec![0xAA, 0xBB, 0xCC, 0xDD]);
        }
        _ => panic!("expected HEVC codec info"),
    }

    match &ctx.audio_track.codec {
        vaultplay_core::mp4::sample_table::CodecInfo::Aac { channels, sample_rate, asc_bytes, .. } => {
            assert_eq!(*channels, 2);
            assert_eq!(*sample_rate, 48_000);
            assert_eq!(asc_bytes, &vec![0x11, 0x90]);
        }
        _ => panic!("expected AAC codec info"),
    }
}

#[test]
fn wrong_password_is_rejected_as_decrypt_error() {
    let dir = tempfile::tempdir().unwrap();
    let plain = build_minimal_mp4();
    let path = write_encrypted(&dir, "correct horse", &plain);

    let mut password = b"wrong".to_vec();
    let err = vaultplay_core::open(&path, &mut password).unwrap_err();
    assert!(matches!(err, PlayerError::Decrypt(_)));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn empty_password_is_rejected_before_touching_disk() {
    let dir = tempfile::tempdir().unwrap();
    let plain = build_minimal_mp4();
    let path = write_encrypted(&dir, "pw", &plain);

    let mut password = Vec::new();
    let err = vaultplay_core::open(&path, &mut password).unwrap_err();
    assert!(matches!(err, PlayerError::EmptyPassword));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn missing_audio_track_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let video_trak = trak(TrakBoxes {
        mdhd: mdhd(30_000, 1001),
        hdlr: hdlr(b"vide"),
        stsd: stsd_video(64, 48, &[0xAA]),
        stts: stts(&[(1, 1001)]),
        stsc: stsc(&[(1, 1, 1)]),
        stsz: stsz(&[10]),
        stco: stco(&[2_000]),
    });
    let mut plain = container(b"moov", &[video_trak]);
    plain.resize(4096, 0);

    let path = write_encrypted(&dir, "pw", &plain);
    let mut password = b"pw".to_vec();
    let err = vaultplay_core::open(&path, &mut password).unwrap_err();
    assert!(matches!(err, PlayerError::MissingTrack));
    assert_eq!(err.exit_code(), 6);
}
