use derive_more::{Deref, DerefMut};
use std::fmt;

use crate::{
    atom::{
        util::{parser::assert_atom_type, serializer::be_u32, DebugList},
        FourCC,
    },
    parser::ParseAtomData,
    writer::SerializeAtom,
    ParseError,
};

pub const CTTS: FourCC = FourCC::new(b"ctts");

#[derive(Default, Clone, PartialEq, Deref, DerefMut)]
pub struct CompositionOffsetEntries(Vec<CompositionOffsetEntry>);

impl fmt::Debug for CompositionOffsetEntries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&DebugList::new(self.0.iter(), 10), f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionOffsetEntry {
    pub sample_count: u32,
    /// Signed in version 1 atoms
    pub sample_offset: i64,
}

/// Composition Time to Sample (ctts) atom
#[derive(Default, Debug, Clone, PartialEq)]
pub struct CompositionOffsetAtom {
    pub version: u8,
    pub flags: [u8; 3],
    pub entries: CompositionOffsetEntries,
}

impl CompositionOffsetAtom {
    /// Run-length encodes per-sample composition offsets.
    pub fn from_offsets(offsets: impl IntoIterator<Item = u32>) -> Self {
        let mut entries: Vec<CompositionOffsetEntry> = Vec::new();
        for offset in offsets {
            let offset = i64::from(offset);
            match entries.last_mut() {
                Some(entry) if entry.sample_offset == offset => entry.sample_count += 1,
                _ => entries.push(CompositionOffsetEntry {
                    sample_count: 1,
                    sample_offset: offset,
                }),
            }
        }
        Self {
            version: 0,
            flags: [0u8; 3],
            entries: CompositionOffsetEntries(entries),
        }
    }

    /// Per-sample offsets, with negative offsets clamped to zero.
    pub fn sample_offsets(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().flat_map(|entry| {
            let offset = u32::try_from(entry.sample_offset.max(0)).unwrap_or(u32::MAX);
            std::iter::repeat_n(offset, entry.sample_count as usize)
        })
    }
}

impl ParseAtomData for CompositionOffsetAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        assert_atom_type!(atom_type, CTTS);
        parser::parse_ctts_data(input)
    }
}

impl SerializeAtom for CompositionOffsetAtom {
    fn atom_type(&self) -> FourCC {
        CTTS
    }

    fn into_body_bytes(self) -> Vec<u8> {
        let mut data = Vec::with_capacity(8 + self.entries.len() * 8);
        data.push(self.version);
        data.extend(self.flags);
        data.extend(be_u32(self.entries.len() as u32));
        for entry in self.entries.iter() {
            data.extend(be_u32(entry.sample_count));
            match self.version {
                0 => data.extend((entry.sample_offset.max(0) as u32).to_be_bytes()),
                _ => data.extend((entry.sample_offset as i32).to_be_bytes()),
            }
        }
        data
    }
}

mod parser {
    use winnow::{
        binary::{be_i32, be_u32, length_repeat},
        combinator::{seq, trace},
        error::StrContext,
        ModalResult, Parser,
    };

    use super::{CompositionOffsetAtom, CompositionOffsetEntries, CompositionOffsetEntry};
    use crate::atom::util::parser::{flags3, stream, version_0_or_1, Stream};

    pub fn parse_ctts_data(input: &[u8]) -> Result<CompositionOffsetAtom, crate::ParseError> {
        parse_ctts_data_inner
            .parse(stream(input))
            .map_err(crate::ParseError::from_winnow)
    }

    fn parse_ctts_data_inner(input: &mut Stream<'_>) -> ModalResult<CompositionOffsetAtom> {
        trace(
            "ctts",
            seq!(CompositionOffsetAtom {
                version: version_0_or_1,
                flags: flags3,
                entries: length_repeat(be_u32, entry(version))
                    .map(CompositionOffsetEntries)
                    .context(StrContext::Label("entries")),
            })
            .context(StrContext::Label("ctts")),
        )
        .parse_next(input)
    }

    fn entry(version: u8) -> impl FnMut(&mut Stream<'_>) -> ModalResult<CompositionOffsetEntry> {
        move |input: &mut Stream<'_>| {
            seq!(CompositionOffsetEntry {
                sample_count: be_u32.context(StrContext::Label("sample_count")),
                sample_offset: sample_offset(version).context(StrContext::Label("sample_offset")),
            })
            .parse_next(input)
        }
    }

    fn sample_offset(version: u8) -> impl FnMut(&mut Stream<'_>) -> ModalResult<i64> {
        move |input: &mut Stream<'_>| match version {
            0 => be_u32.map(i64::from).parse_next(input),
            _ => be_i32.map(i64::from).parse_next(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctts_v1_negative_offsets_clamp() {
        let ctts = CompositionOffsetAtom {
            version: 1,
            flags: [0u8; 3],
            entries: CompositionOffsetEntries(vec![
                CompositionOffsetEntry {
                    sample_count: 2,
                    sample_offset: -1000,
                },
                CompositionOffsetEntry {
                    sample_count: 1,
                    sample_offset: 2000,
                },
            ]),
        };
        let parsed =
            CompositionOffsetAtom::parse_atom_data(CTTS, &ctts.clone().into_body_bytes()).unwrap();
        assert_eq!(parsed, ctts);
        assert_eq!(parsed.sample_offsets().collect::<Vec<_>>(), vec![0, 0, 2000]);
    }

    #[test]
    fn test_from_offsets() {
        let ctts = CompositionOffsetAtom::from_offsets([0, 0, 1000, 0]);
        assert_eq!(ctts.entries.len(), 3);
        assert_eq!(ctts.sample_offsets().collect::<Vec<_>>(), vec![0, 0, 1000, 0]);
    }
}
