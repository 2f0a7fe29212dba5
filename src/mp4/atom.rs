//! Phase A: recursive ISO-BMFF atom tree walker.

use crate::memstream::MemStream;

/// Container box types the walker descends into. Anything else is kept as an
/// opaque leaf node with its children left unparsed, even if it happens to
/// contain further length-type records.
const CONTAINER_TYPES: &[&str] = &["moov", "trak", "mdia", "minf", "stbl", "dinf", "edts", "udta"];

#[derive(Debug, Clone)]
pub struct Atom {
    pub offset: u64,
    pub size: u64,
    pub kind: [u8; 4],
    pub children: Vec<Atom>,
}

impl Atom {
    pub fn kind_str(&self) -> &str {
        std::str::from_utf8(&self.kind).unwrap_or("????")
    }

    /// First direct child of the given 4-character type code.
    pub fn child(&self, kind: &str) -> Option<&Atom> {
        self.children.iter().find(|c| c.kind_str() == kind)
    }

    /// Depth-first iterator over this node and all descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Atom)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

fn is_valid_atom_type(type_buf: &[u8; 4]) -> bool {
    type_buf.iter().all(|&c| (32..=126).contains(&c))
}

/// Parses the flat list of top-level atoms, descending into recognized
/// container types. Malformed headers (bad type bytes, a size too small to
/// hold the 8-byte header, or a child that would run past its parent's end)
/// stop descent at that point rather than aborting the whole parse.
pub fn parse_atoms(stream: &mut MemStream) -> Vec<Atom> {
    parse_range(stream, 0, stream.size() as u64)
}

fn parse_range(stream: &mut MemStream, start: u64, end: u64) -> Vec<Atom> {
    let mut atoms = Vec::new();
    let mut offset = start;

    while offset + 8 <= end {
        if !stream.seek_abs(offset as usize) {
            break;
        }
        let mut header = [0u8; 8];
        if !stream.read(&mut header) {
            break;
        }
        let size32 = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let type_buf: [u8; 4] = [header[4], header[5], header[6], header[7]];

        if !is_valid_atom_type(&type_buf) {
            break;
        }

        let child_size = size32 as u64;
        let body_start = offset + 8;

        if child_size < 8 || body_start + (child_size - 8) > end {
            break;
        }

        let child_end = offset + child_size;
        let kind_str = std::str::from_utf8(&type_buf).unwrap_or("");
        let children = if CONTAINER_TYPES.contains(&kind_str) {
            parse_range(stream, body_start, child_end)
        } else {
            Vec::new()
        };

        atoms.push(Atom {
            offset,
            size: child_size,
            kind: type_buf,
            children,
        });

        offset = child_end;
    }

    atoms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_atom(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let size = (8 + body.len()) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(&size.to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out
    }

    fn raw_stream(bytes: Vec<u8>) -> MemStream {
        crate::memstream::MemStream::from_plaintext_for_tests(bytes)
    }

    #[test]
    fn flat_list_of_leaf_atoms() {
        let free = encode_atom(b"free", &[0u8; 4]);
        let skip = encode_atom(b"skip", &[0u8; 2]);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&free);
        bytes.extend_from_slice(&skip);
        let mut stream = raw_stream(bytes);

        let atoms = parse_atoms(&mut stream);
        assert_eq!(atoms.len(), 2);
        assert_eq!(atoms[0].kind_str(), "free");
        assert_eq!(atoms[1].kind_str(), "skip");
        assert!(atoms[0].children.is_empty());
    }

    #[test]
    fn descends_into_container_types_only() {
        let inner = encode_atom(b"mdhd", &[0u8; 4]);
        let moov = encode_atom(b"moov", &inner);
        let opaque_with_lookalike = encode_atom(b"udta", &inner);
        let non_container = encode_atom(b"skip", &inner);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&moov);
        bytes.extend_from_slice(&opaque_with_lookalike);
        bytes.extend_from_slice(&non_container);
        let mut stream = raw_stream(bytes);

        let atoms = parse_atoms(&mut stream);
        assert_eq!(atoms.len(), 3);
        assert_eq!(atoms[0].children.len(), 1);
        assert_eq!(atoms[1].children.len(), 1);
        assert!(atoms[2].children.is_empty(), "non-container types must not be descended");
    }

    #[test]
    fn stops_on_truncated_header() {
        let mut bytes = encode_atom(b"free", &[0u8; 4]);
        bytes.truncate(bytes.len() - 2);
        let mut stream = raw_stream(bytes);
        let atoms = parse_atoms(&mut stream);
        assert!(atoms.is_empty());
    }

    #[test]
    fn stops_on_size_too_small() {
        let mut bytes = vec![0, 0, 0, 4];
        bytes.extend_from_slice(b"free");
        let mut stream = raw_stream(bytes);
        let atoms = parse_atoms(&mut stream);
        assert!(atoms.is_empty());
    }

    #[test]
    fn stops_on_invalid_type_bytes() {
        let mut bytes = vec![0, 0, 0, 8];
        bytes.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);
        let mut stream = raw_stream(bytes);
        let atoms = parse_atoms(&mut stream);
        assert!(atoms.is_empty());
    }
}
