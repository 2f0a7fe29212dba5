//! Sample-table linearization: flattens `stsc`+`stco`+`stsz`+`stts`+`ctts`+`stss`
//! into one ordered, timestamped sequence of samples per track.

use super::boxes::{CttsTable, StcoTable, StscTable, StssTable, SttsTable, StszTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub file_offset: u64,
    pub size: u32,
    pub decode_time: u32,
    pub composition_offset: u32,
    /// `decode_time + composition_offset`, in track timescale ticks. Convert to
    /// milliseconds with `timescale` via `Track::pts_ms`.
    pub presentation_time: u64,
    pub duration: u32,
    pub is_keyframe: bool,
}

pub enum CodecInfo {
    Hevc {
        width: u32,
        height: u32,
        nal_units: super::boxes::HevcParameterSets,
    },
    Aac {
        channels: u32,
        sample_rate: u32,
        sample_size: u32,
        asc_bytes: Vec<u8>,
    },
}

pub struct Track {
    pub kind: TrackKind,
    pub timescale: u32,
    pub duration: u64,
    pub codec: CodecInfo,
    pub samples: Vec<Sample>,
}

impl Track {
    pub fn pts_ms(&self, sample: &Sample) -> u64 {
        sample.presentation_time * 1000 / self.timescale.max(1) as u64
    }
}

/// Builds the flat sample sequence for one track from its raw box tables.
/// Tie-break and truncation behavior follows the algorithm verbatim: a chunk id
/// referencing past the end of `stco` stops emission for that `stsc` entry, and
/// an exhausted `stsz` stops the current chunk early.
pub fn build_samples(
    stsc: &StscTable,
    stco: &StcoTable,
    stsz: &StszTable,
    stts: &SttsTable,
    ctts: Option<&CttsTable>,
    stss: Option<&StssTable>,
) -> Vec<Sample> {
    let mut samples = Vec::with_capacity(stsz.entries.len());

    let mut sample_index: usize = 0;
    let mut decode_time: u64 = 0;
    let mut stts_index = 0usize;
    let mut stts_pos = 0u32;
    let mut ctts_index = 0usize;
    let mut ctts_pos = 0u32;
    let mut sample_id: u32 = 1;

    for (i, entry) in stsc.entries.iter().enumerate() {
        let next_first_chunk = stsc
            .entries
            .get(i + 1)
            .map(|e| e.first_chunk)
            .unwrap_or(stco.entries.len() as u32 + 1);

        for chunk_id in entry.first_chunk..next_first_chunk {
            let Some(&chunk_offset) = stco.entries.get(chunk_id as usize - 1) else {
                break;
            };
            let mut offset = chunk_offset as u64;

            for _ in 0..entry.samples_per_chunk {
                if sample_index >= stsz.entries.len() {
                    break;
                }
                let size = stsz.entries[sample_index];

                let composition_offset = match ctts {
                    Some(ctts) if ctts_index < ctts.entries.len() => {
                        let e = ctts.entries[ctts_index];
                        ctts_pos += 1;
                        if ctts_pos >= e.sample_count {
                            ctts_pos = 0;
                            ctts_index += 1;
                        }
                        e.sample_offset
                    }
                    _ => 0,
                };

                let duration = if stts_index < stts.entries.len() {
                    let e = stts.entries[stts_index];
                    stts_pos += 1;
                    if stts_pos >= e.sample_count {
                        stts_pos = 0;
                        stts_index += 1;
                    }
                    e.sample_delta
                } else {
                    0
                };

                let is_keyframe = match stss {
                    None => true,
                    Some(stss) => stss.entries.binary_search(&sample_id).is_ok(),
                };

                samples.push(Sample {
                    file_offset: offset,
                    size,
                    decode_time: decode_time as u32,
                    composition_offset,
                    presentation_time: decode_time + composition_offset as u64,
                    duration,
                    is_keyframe,
                });

                offset += size as u64;
                decode_time += duration as u64;
                sample_index += 1;
                sample_id += 1;
            }
        }
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mp4::boxes::{CttsEntry, SttsEntry, StscEntry};

    fn simple_tables() -> (StscTable, StcoTable, StszTable, SttsTable) {
        let stsc = StscTable {
            entries: vec![StscEntry {
                first_chunk: 1,
                samples_per_chunk: 2,
                sample_description_index: 1,
            }],
        };
        let stco = StcoTable {
            entries: vec![1000, 2000],
        };
        let stsz = StszTable {
            entries: vec![10, 20, 30, 40],
        };
        let stts = SttsTable {
            entries: vec![SttsEntry {
                sample_count: 4,
                sample_delta: 33,
            }],
        };
        (stsc, stco, stsz, stts)
    }

    #[test]
    fn linearizes_across_chunks() {
        let (stsc, stco, stsz, stts) = simple_tables();
        let samples = build_samples(&stsc, &stco, &stsz, &stts, None, None);
        assert_eq!(samples.len(), 4);

        assert_eq!(samples[0].file_offset, 1000);
        assert_eq!(samples[1].file_offset, 1010);
        assert_eq!(samples[2].file_offset, 2000);
        assert_eq!(samples[3].file_offset, 2030);

        assert_eq!(samples[0].decode_time, 0);
        assert_eq!(samples[1].decode_time, 33);
        assert_eq!(samples[2].decode_time, 66);
        assert_eq!(samples[3].decode_time, 99);

        assert!(samples.iter().all(|s| s.is_keyframe));
    }

    #[test]
    fn composition_offset_from_ctts_feeds_presentation_time() {
        let (stsc, stco, stsz, stts) = simple_tables();
        let ctts = CttsTable {
            entries: vec![
                CttsEntry {
                    sample_count: 1,
                    sample_offset: 100,
                },
                CttsEntry {
                    sample_count: 3,
                    sample_offset: 0,
                },
            ],
        };
        let samples = build_samples(&stsc, &stco, &stsz, &stts, Some(&ctts), None);
        assert_eq!(samples[0].composition_offset, 100);
        assert_eq!(samples[0].presentation_time, 100);
        assert_eq!(samples[1].composition_offset, 0);
    }

    #[test]
    fn stss_marks_only_listed_keyframes() {
        let (stsc, stco, stsz, stts) = simple_tables();
        let stss = StssTable { entries: vec![1, 3] };
        let samples = build_samples(&stsc, &stco, &stsz, &stts, None, Some(&stss));
        assert!(samples[0].is_keyframe);
        assert!(!samples[1].is_keyframe);
        assert!(samples[2].is_keyframe);
        assert!(!samples[3].is_keyframe);
    }

    #[test]
    fn stops_chunk_when_stsz_exhausted() {
        let stsc = StscTable {
            entries: vec![StscEntry {
                first_chunk: 1,
                samples_per_chunk: 5,
                sample_description_index: 1,
            }],
        };
        let stco = StcoTable { entries: vec![0] };
        let stsz = StszTable { entries: vec![10, 20] };
        let stts = SttsTable {
            entries: vec![SttsEntry {
                sample_count: 2,
                sample_delta: 10,
            }],
        };
        let samples = build_samples(&stsc, &stco, &stsz, &stts, None, None);
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn stops_when_chunk_id_beyond_stco() {
        let stsc = StscTable {
            entries: vec![StscEntry {
                first_chunk: 1,
                samples_per_chunk: 2,
                sample_description_index: 1,
            }],
        };
        let stco = StcoTable { entries: vec![] };
        let stsz = StszTable {
            entries: vec![10, 20],
        };
        let stts = SttsTable {
            entries: vec![SttsEntry {
                sample_count: 2,
                sample_delta: 10,
            }],
        };
        let samples = build_samples(&stsc, &stco, &stsz, &stts, None, None);
        assert!(samples.is_empty());
    }
}
