use std::ops::Range;

use crate::atom::FourCC;

pub const MDAT: FourCC = FourCC::new(b"mdat");

/// Media data left in the stream it was parsed from.
///
/// Only the location of the payload is kept; the bytes are copied from the source stream when the
/// atom is written (see [`crate::writer::Mp4Writer::write_atom_from`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDataAtom {
    /// Payload byte range in the source stream
    pub source_range: Range<u64>,
}

impl MediaDataAtom {
    pub fn new(source_range: Range<u64>) -> Self {
        Self { source_range }
    }

    pub fn len(&self) -> u64 {
        self.source_range.end - self.source_range.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
