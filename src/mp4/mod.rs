//! ISO-BMFF container parsing: atom tree, typed boxes, and the linearized
//! per-track sample tables the playback pipeline reads from.

pub mod atom;
pub mod boxes;
pub mod sample_table;

use crate::error::{PlayerError, Result};
use crate::memstream::MemStream;

use atom::Atom;
use boxes::{CttsTable, Stsd, StscTable, StcoTable, StssTable, SttsTable, StszTable};
use sample_table::{build_samples, CodecInfo, Track, TrackKind};

pub use sample_table::Sample;

const HANDLER_VIDE: u32 = u32::from_be_bytes(*b"vide");
const HANDLER_SOUN: u32 = u32::from_be_bytes(*b"soun");

pub struct Mp4 {
    pub tracks: Vec<Track>,
}

impl Mp4 {
    pub fn video_track(&self) -> Option<&Track> {
        self.tracks.iter().find(|t| t.kind == TrackKind::Video)
    }

    pub fn audio_track(&self) -> Option<&Track> {
        self.tracks.iter().find(|t| t.kind == TrackKind::Audio)
    }
}

#[derive(Default)]
struct TrakBoxes {
    handler_type: u32,
    mdhd: Option<boxes::Mdhd>,
    stsd_offset: Option<u64>,
    stts: Option<SttsTable>,
    ctts: Option<CttsTable>,
    stsc: Option<StscTable>,
    stsz: Option<StszTable>,
    stco: Option<StcoTable>,
    stss: Option<StssTable>,
}

/// Parses the atom tree, then walks every `trak` gathering the boxes needed to
/// build a track. A `trak` missing any required box, or whose handler is
/// neither `vide` nor `soun`, is silently dropped.
pub fn parse(stream: &mut MemStream) -> Result<Mp4> {
    let atoms = atom::parse_atoms(stream);

    let mut tracks = Vec::new();
    for top in &atoms {
        collect_traks(stream, top, &mut tracks)?;
    }

    if tracks.is_empty() {
        return Err(PlayerError::Format("no moov/trak atoms produced a usable track".into()));
    }

    Ok(Mp4 { tracks })
}

fn collect_traks(stream: &mut MemStream, node: &Atom, out: &mut Vec<Track>) -> Result<()> {
    if node.kind_str() == "trak" {
        if let Some(track) = build_track(stream, node)? {
            out.push(track);
        }
    }
    for child in &node.children {
        collect_traks(stream, child, out)?;
    }
    Ok(())
}

fn build_track(stream: &mut MemStream, trak: &Atom) -> Result<Option<Track>> {
    let mut boxes = TrakBoxes::default();
    gather_boxes(stream, trak, &mut boxes)?;

    let (Some(mdhd), Some(stsd_offset), Some(stts), Some(stsc), Some(stsz), Some(stco)) = (
        &boxes.mdhd,
        boxes.stsd_offset,
        &boxes.stts,
        &boxes.stsc,
        &boxes.stsz,
        &boxes.stco,
    ) else {
        return Ok(None);
    };

    if boxes.handler_type != HANDLER_VIDE && boxes.handler_type != HANDLER_SOUN {
        return Ok(None);
    }

    let stsd = boxes::parse_stsd(stream, stsd_offset, boxes.handler_type)?;
    let (kind, codec) = match stsd {
        Stsd::Video(v) => (
            TrackKind::Video,
            CodecInfo::Hevc {
                width: v.width as u32,
                height: v.height as u32,
                nal_units: v.nal_units,
            },
        ),
        Stsd::Audio(a) => (
            TrackKind::Audio,
            CodecInfo::Aac {
                channels: a.channel_count as u32,
                sample_rate: a.sample_rate as u32,
                sample_size: a.sample_size as u32,
                asc_bytes: a.asc_bytes,
            },
        ),
    };

    let samples = build_samples(
        stsc,
        stco,
        stsz,
        stts,
        boxes.ctts.as_ref(),
        boxes.stss.as_ref(),
    );

    Ok(Some(Track {
        kind,
        timescale: mdhd.timescale,
        duration: mdhd.duration as u64,
        codec,
        samples,
    }))
}

fn gather_boxes(stream: &mut MemStream, node: &Atom, out: &mut TrakBoxes) -> Result<()> {
    match node.kind_str() {
        "hdlr" => out.handler_type = boxes::parse_hdlr(stream, node.offset)?,
        "mdhd" => out.mdhd = Some(boxes::parse_mdhd(stream, node.offset)?),
        "stsd" => out.stsd_offset = Some(node.offset),
        "stts" => out.stts = Some(boxes::parse_stts(stream, node.offset)?),
        "ctts" => out.ctts = Some(boxes::parse_ctts(stream, node.offset)?),
        "stsc" => out.stsc = Some(boxes::parse_stsc(stream, node.offset)?),
        "stsz" => out.stsz = Some(boxes::parse_stsz(stream, node.offset)?),
        "stco" => out.stco = Some(boxes::parse_stco(stream, node.offset)?),
        "stss" => out.stss = Some(boxes::parse_stss(stream, node.offset)?),
        _ => {}
    }
    for child in &node.children {
        gather_boxes(stream, child, out)?;
    }
    Ok(())
}
