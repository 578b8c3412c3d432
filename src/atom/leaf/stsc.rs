use bon::{bon, Builder};
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

pub const STSC: FourCC = FourCC::new(b"stsc");

#[derive(Default, Clone, PartialEq, Deref, DerefMut)]
pub struct SampleToChunkEntries(Vec<SampleToChunkEntry>);

impl From<Vec<SampleToChunkEntry>> for SampleToChunkEntries {
    fn from(inner: Vec<SampleToChunkEntry>) -> Self {
        Self(inner)
    }
}

impl fmt::Debug for SampleToChunkEntries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&DebugList::new(self.0.iter(), 10), f)
    }
}

/// Sample-to-Chunk entry - maps samples to chunks
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct SampleToChunkEntry {
    /// First chunk number (1-based) that uses this entry
    pub first_chunk: u32,
    /// Number of samples in each chunk
    pub samples_per_chunk: u32,
    /// Sample description index (1-based, references stsd atom)
    pub sample_description_index: u32,
}

/// Layout of a single chunk, as described by a [`SampleToChunkAtom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// Sample-to-Chunk Atom - contains sample-to-chunk mapping table
#[derive(Default, Debug, Clone, PartialEq)]
pub struct SampleToChunkAtom {
    pub version: u8,
    pub flags: [u8; 3],
    pub entries: SampleToChunkEntries,
}

#[bon]
impl SampleToChunkAtom {
    #[builder]
    pub fn new(
        #[builder(default = 0)] version: u8,
        #[builder(default = [0u8; 3])] flags: [u8; 3],
        #[builder(with = FromIterator::from_iter)] entries: Vec<SampleToChunkEntry>,
    ) -> Self {
        Self {
            version,
            flags,
            entries: entries.into(),
        }
    }
}

impl SampleToChunkAtom {
    /// Builds the table from per-chunk layouts, merging runs of identical chunks.
    pub fn from_chunk_layouts(chunks: impl IntoIterator<Item = ChunkLayout>) -> Self {
        let mut entries: Vec<SampleToChunkEntry> = Vec::new();
        for (chunk, chunk_number) in chunks.into_iter().zip(1u32..) {
            let same_as_previous = entries.last().is_some_and(|entry| {
                entry.samples_per_chunk == chunk.samples_per_chunk
                    && entry.sample_description_index == chunk.sample_description_index
            });
            if !same_as_previous {
                entries.push(SampleToChunkEntry {
                    first_chunk: chunk_number,
                    samples_per_chunk: chunk.samples_per_chunk,
                    sample_description_index: chunk.sample_description_index,
                });
            }
        }
        Self::builder().entries(entries).build()
    }

    /// Expands the table into one layout per chunk, given the number of chunks in the track.
    ///
    /// Returns `None` when the entries skip or overlap chunks, or stop short of `chunk_count`.
    pub fn chunk_layouts(&self, chunk_count: usize) -> Option<Vec<ChunkLayout>> {
        let mut layouts = Vec::with_capacity(chunk_count);
        for (i, entry) in self.entries.iter().enumerate() {
            let first = (entry.first_chunk as usize).checked_sub(1)?;
            if first >= chunk_count {
                break;
            }
            if first != layouts.len() {
                return None;
            }
            let end = match self.entries.get(i + 1) {
                Some(next) => (next.first_chunk.saturating_sub(1) as usize).min(chunk_count),
                None => chunk_count,
            };
            layouts.extend((first..end).map(|_| ChunkLayout {
                samples_per_chunk: entry.samples_per_chunk,
                sample_description_index: entry.sample_description_index,
            }));
        }
        (layouts.len() == chunk_count).then_some(layouts)
    }
}

impl ParseAtomData for SampleToChunkAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        assert_atom_type!(atom_type, STSC);
        parser::parse_stsc_data(input)
    }
}

impl SerializeAtom for SampleToChunkAtom {
    fn atom_type(&self) -> FourCC {
        STSC
    }

    fn into_body_bytes(self) -> Vec<u8> {
        let mut data = Vec::with_capacity(8 + self.entries.len() * 12);
        data.push(self.version);
        data.extend(self.flags);
        data.extend(be_u32(self.entries.len() as u32));
        for entry in self.entries.iter() {
            data.extend(be_u32(entry.first_chunk));
            data.extend(be_u32(entry.samples_per_chunk));
            data.extend(be_u32(entry.sample_description_index));
        }
        data
    }
}

mod parser {
    use winnow::{
        binary::{be_u32, length_repeat},
        combinator::{seq, trace},
        error::{StrContext, StrContextValue},
        ModalResult, Parser,
    };

    use super::{SampleToChunkAtom, SampleToChunkEntries, SampleToChunkEntry};
    use crate::atom::util::parser::{flags3, stream, version, Stream};

    pub fn parse_stsc_data(input: &[u8]) -> Result<SampleToChunkAtom, crate::ParseError> {
        parse_stsc_data_inner
            .parse(stream(input))
            .map_err(crate::ParseError::from_winnow)
    }

    fn parse_stsc_data_inner(input: &mut Stream<'_>) -> ModalResult<SampleToChunkAtom> {
        trace(
            "stsc",
            seq!(SampleToChunkAtom {
                version: version,
                flags: flags3,
                entries: length_repeat(be_u32, entry)
                    .map(SampleToChunkEntries)
                    .context(StrContext::Label("entries")),
            })
            .context(StrContext::Label("stsc")),
        )
        .parse_next(input)
    }

    fn entry(input: &mut Stream<'_>) -> ModalResult<SampleToChunkEntry> {
        trace(
            "entry",
            seq!(SampleToChunkEntry {
                first_chunk: be_u32
                    .verify(|v| *v > 0)
                    .context(StrContext::Label("first_chunk"))
                    .context(StrContext::Expected(StrContextValue::Description("1-based index"))),
                samples_per_chunk: be_u32.context(StrContext::Label("samples_per_chunk")),
                sample_description_index: be_u32
                    .verify(|v| *v > 0)
                    .context(StrContext::Label("sample_description_index"))
                    .context(StrContext::Expected(StrContextValue::Description("1-based index"))),
            }),
        )
        .parse_next(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(samples_per_chunk: u32) -> ChunkLayout {
        ChunkLayout {
            samples_per_chunk,
            sample_description_index: 1,
        }
    }

    #[test]
    fn test_from_chunk_layouts_merges_runs() {
        let stsc = SampleToChunkAtom::from_chunk_layouts([layout(10), layout(10), layout(3)]);
        assert_eq!(stsc.entries.len(), 2);
        assert_eq!(stsc.entries[0].first_chunk, 1);
        assert_eq!(stsc.entries[1].first_chunk, 3);
        assert_eq!(stsc.entries[1].samples_per_chunk, 3);
        assert_eq!(
            stsc.chunk_layouts(3),
            Some(vec![layout(10), layout(10), layout(3)])
        );
    }

    fn entries(first_chunks: &[u32]) -> SampleToChunkAtom {
        SampleToChunkAtom::builder()
            .entries(first_chunks.iter().map(|first_chunk| SampleToChunkEntry {
                first_chunk: *first_chunk,
                samples_per_chunk: *first_chunk,
                sample_description_index: 1,
            }))
            .build()
    }

    #[test]
    fn test_chunk_layouts_must_cover_every_chunk() {
        assert_eq!(
            entries(&[1, 3]).chunk_layouts(4),
            Some(vec![layout(1), layout(1), layout(3), layout(3)])
        );
        // entries past the last chunk are ignored
        assert_eq!(entries(&[1, 3]).chunk_layouts(2), Some(vec![layout(1), layout(1)]));
        assert_eq!(entries(&[]).chunk_layouts(0), Some(vec![]));

        assert_eq!(entries(&[2]).chunk_layouts(3), None);
        assert_eq!(entries(&[1, 3, 2]).chunk_layouts(4), None);
        assert_eq!(entries(&[]).chunk_layouts(1), None);
    }

    #[test]
    fn test_stsc_roundtrip() {
        let stsc = SampleToChunkAtom::from_chunk_layouts([layout(2), layout(5)]);
        let parsed = SampleToChunkAtom::parse_atom_data(STSC, &stsc.clone().into_body_bytes()).unwrap();
        assert_eq!(parsed, stsc);
    }

    #[test]
    fn test_stsc_rejects_zero_first_chunk() {
        let mut data = vec![0u8; 4];
        data.extend(1u32.to_be_bytes());
        data.extend([0u32, 1, 1].iter().flat_map(|v| v.to_be_bytes()));
        assert!(SampleToChunkAtom::parse_atom_data(STSC, &data).is_err());
    }
}
