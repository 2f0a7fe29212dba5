//! Typed parsers for the leaf boxes this player understands.

use crate::error::{PlayerError, Result};
use crate::memstream::MemStream;

fn read_u32(stream: &mut MemStream) -> Result<u32> {
    let mut b = [0u8; 4];
    if !stream.read(&mut b) {
        return Err(PlayerError::Format("unexpected end of box while reading u32".into()));
    }
    Ok(u32::from_be_bytes(b))
}

fn read_u16(stream: &mut MemStream) -> Result<u16> {
    let mut b = [0u8; 2];
    if !stream.read(&mut b) {
        return Err(PlayerError::Format("unexpected end of box while reading u16".into()));
    }
    Ok(u16::from_be_bytes(b))
}

fn read_u8(stream: &mut MemStream) -> Result<u8> {
    let mut b = [0u8; 1];
    if !stream.read(&mut b) {
        return Err(PlayerError::Format("unexpected end of box while reading u8".into()));
    }
    Ok(b[0])
}

#[derive(Debug, Default)]
pub struct Mdhd {
    pub timescale: u32,
    pub duration: u32,
}

pub fn parse_mdhd(stream: &mut MemStream, offset: u64) -> Result<Mdhd> {
    stream.seek_abs(offset as usize + 12);
    stream.ignore(8);
    Ok(Mdhd {
        timescale: read_u32(stream)?,
        duration: read_u32(stream)?,
    })
}

pub fn parse_hdlr(stream: &mut MemStream, offset: u64) -> Result<u32> {
    stream.seek_abs(offset as usize + 12);
    stream.ignore(4);
    read_u32(stream)
}

#[derive(Debug, Default, Clone)]
pub struct StszTable {
    pub entries: Vec<u32>,
}

/// Parses `stsz`, synthesizing `entries` from `(sample_size, sample_count)`
/// when the box uses the uniform-sample-size form (`sample_size != 0`).
pub fn parse_stsz(stream: &mut MemStream, offset: u64) -> Result<StszTable> {
    stream.seek_abs(offset as usize + 12);
    let sample_size = read_u32(stream)?;
    let sample_count = read_u32(stream)?;

    let entries = if sample_size == 0 {
        let mut entries = Vec::with_capacity(sample_count as usize);
        for _ in 0..sample_count {
            entries.push(read_u32(stream)?);
        }
        entries
    } else {
        vec![sample_size; sample_count as usize]
    };

    Ok(StszTable { entries })
}

#[derive(Debug, Clone, Copy)]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

#[derive(Debug, Default)]
pub struct StscTable {
    pub entries: Vec<StscEntry>,
}

pub fn parse_stsc(stream: &mut MemStream, offset: u64) -> Result<StscTable> {
    stream.seek_abs(offset as usize + 12);
    let entry_count = read_u32(stream)?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(StscEntry {
            first_chunk: read_u32(stream)?,
            samples_per_chunk: read_u32(stream)?,
            sample_description_index: read_u32(stream)?,
        });
    }
    Ok(StscTable { entries })
}

#[derive(Debug, Default)]
pub struct StcoTable {
    pub entries: Vec<u32>,
}

pub fn parse_stco(stream: &mut MemStream, offset: u64) -> Result<StcoTable> {
    stream.seek_abs(offset as usize + 12);
    let entry_count = read_u32(stream)?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(read_u32(stream)?);
    }
    Ok(StcoTable { entries })
}

#[derive(Debug, Clone, Copy)]
pub struct SttsEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

#[derive(Debug, Default)]
pub struct SttsTable {
    pub entries: Vec<SttsEntry>,
}

pub fn parse_stts(stream: &mut MemStream, offset: u64) -> Result<SttsTable> {
    stream.seek_abs(offset as usize + 12);
    let entry_count = read_u32(stream)?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(SttsEntry {
            sample_count: read_u32(stream)?,
            sample_delta: read_u32(stream)?,
        });
    }
    Ok(SttsTable { entries })
}

#[derive(Debug, Clone, Copy)]
pub struct CttsEntry {
    pub sample_count: u32,
    pub sample_offset: u32,
}

#[derive(Debug, Default)]
pub struct CttsTable {
    pub entries: Vec<CttsEntry>,
}

pub fn parse_ctts(stream: &mut MemStream, offset: u64) -> Result<CttsTable> {
    stream.seek_abs(offset as usize + 12);
    let entry_count = read_u32(stream)?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(CttsEntry {
            sample_count: read_u32(stream)?,
            sample_offset: read_u32(stream)?,
        });
    }
    Ok(CttsTable { entries })
}

#[derive(Debug, Default)]
pub struct StssTable {
    pub entries: Vec<u32>,
}

pub fn parse_stss(stream: &mut MemStream, offset: u64) -> Result<StssTable> {
    stream.seek_abs(offset as usize + 12);
    let entry_count = read_u32(stream)?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(read_u32(stream)?);
    }
    Ok(StssTable { entries })
}

/// HEVC parameter-set NAL arrays recovered from `hvcC`, in document order. Each
/// inner vector is one `(array_type, NALs)` group; only the NAL payload bytes
/// are kept since the array type itself isn't needed downstream.
pub type HevcParameterSets = Vec<Vec<Vec<u8>>>;

#[derive(Debug, Default)]
pub struct StsdVideo {
    pub width: u16,
    pub height: u16,
    pub nal_units: HevcParameterSets,
}

#[derive(Debug, Default)]
pub struct StsdAudio {
    pub channel_count: u16,
    pub sample_size: u16,
    pub sample_rate: f32,
    pub asc_bytes: Vec<u8>,
}

pub enum Stsd {
    Video(StsdVideo),
    Audio(StsdAudio),
}

const HANDLER_VIDE: u32 = 0x76_69_64_65;
const HANDLER_SOUN: u32 = 0x73_6f_75_6e;

pub fn parse_stsd(stream: &mut MemStream, offset: u64, handler_type: u32) -> Result<Stsd> {
    stream.seek_abs(offset as usize + 12);
    let entry_count = read_u32(stream)?;

    if handler_type == HANDLER_VIDE {
        let mut video = StsdVideo::default();
        for _ in 0..entry_count {
            stream.ignore(4);
            let atom_name = read_u32(stream)?;
            if atom_name != u32::from_be_bytes(*b"hev1") {
                continue;
            }
            stream.ignore(24);
            video.width = read_u16(stream)?;
            video.height = read_u16(stream)?;
            stream.ignore(54);
            let inner_name = read_u32(stream)?;
            if inner_name != u32::from_be_bytes(*b"hvcC") {
                continue;
            }
            video.nal_units = parse_hvcc(stream)?;
        }
        return Ok(Stsd::Video(video));
    }

    if handler_type == HANDLER_SOUN {
        let mut audio = StsdAudio::default();
        for _ in 0..entry_count {
            let _mp4a_size = read_u32(stream)?;
            let atom_name = read_u32(stream)?;
            if atom_name != u32::from_be_bytes(*b"mp4a") {
                continue;
            }
            stream.ignore(16);
            audio.channel_count = read_u16(stream)?;
            audio.sample_size = read_u16(stream)?;
            stream.ignore(4);
            let sample_rate_fixed = read_u32(stream)?;
            audio.sample_rate = sample_rate_fixed as f32 / 65536.0;
            stream.ignore(4);
            let inner_name = read_u32(stream)?;
            if inner_name != u32::from_be_bytes(*b"esds") {
                continue;
            }
            audio.asc_bytes = parse_esds_asc(stream)?;
        }
        return Ok(Stsd::Audio(audio));
    }

    Err(PlayerError::Format("stsd parent has neither vide nor soun handler".into()))
}

fn parse_hvcc(stream: &mut MemStream) -> Result<HevcParameterSets> {
    stream.ignore(21);
    let _general_profile_space_etc = read_u8(stream)?;
    let num_of_arrays = read_u8(stream)?;

    let mut arrays = Vec::with_capacity(num_of_arrays as usize);
    for _ in 0..num_of_arrays {
        stream.ignore(1);
        let num_nalus = read_u16(stream)?;
        let mut nalus = Vec::with_capacity(num_nalus as usize);
        for _ in 0..num_nalus {
            let nal_size = read_u16(stream)?;
            let nalu = stream
                .read_vec(nal_size as usize)
                .ok_or_else(|| PlayerError::Format("hvcC NAL unit truncated".into()))?;
            nalus.push(nalu);
        }
        arrays.push(nalus);
    }
    Ok(arrays)
}

/// Walks the `esds` ES_Descriptor → DecoderConfigDescriptor → DecoderSpecificInfo
/// chain, tolerating the long-form continuation length encoding (a length byte
/// with the 0x80 bit set means "more length bytes follow").
fn parse_esds_asc(stream: &mut MemStream) -> Result<Vec<u8>> {
    stream.ignore(4);

    let tag = read_u8(stream)?;
    if tag != 0x03 {
        return Ok(Vec::new());
    }
    skip_descriptor_length(stream)?;
    stream.ignore(3);

    let _dec_config_tag = read_u8(stream)?;
    skip_descriptor_length(stream)?;
    stream.ignore(13);

    let _dec_specific_tag = read_u8(stream)?;
    let asc_size = skip_descriptor_length(stream)?;

    stream
        .read_vec(asc_size as usize)
        .ok_or_else(|| PlayerError::Format("AudioSpecificConfig bytes truncated".into()))
}

/// Reads the long-form ISO/IEC 14496-1 descriptor length and returns the final
/// byte's value, matching the source's "keep reading while continuation bit is
/// set, use the last byte as the length" behavior.
fn skip_descriptor_length(stream: &mut MemStream) -> Result<u8> {
    let mut b = read_u8(stream)?;
    while b == 0x80 {
        b = read_u8(stream)?;
    }
    Ok(b)
}
