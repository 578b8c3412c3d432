use bon::bon;
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

pub const STCO: FourCC = FourCC::new(b"stco");
pub const CO64: FourCC = FourCC::new(b"co64");

#[derive(Default, Clone, PartialEq, Deref, DerefMut)]
pub struct ChunkOffsets(Vec<u64>);

impl From<Vec<u64>> for ChunkOffsets {
    fn from(value: Vec<u64>) -> Self {
        Self(value)
    }
}

impl FromIterator<u64> for ChunkOffsets {
    fn from_iter<T: IntoIterator<Item = u64>>(iter: T) -> Self {
        Self(Vec::from_iter(iter))
    }
}

impl fmt::Debug for ChunkOffsets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&DebugList::new(self.0.iter(), 10), f)
    }
}

/// Chunk Offset Atom (stco / co64) - absolute file offsets of chunks
#[derive(Default, Debug, Clone, PartialEq)]
pub struct ChunkOffsetAtom {
    pub version: u8,
    pub flags: [u8; 3],
    pub chunk_offsets: ChunkOffsets,
    /// Whether this is serialized as `co64` rather than `stco`
    pub is_64bit: bool,
}

#[bon]
impl ChunkOffsetAtom {
    #[builder]
    pub fn new(
        #[builder(default = 0)] version: u8,
        #[builder(default = [0u8; 3])] flags: [u8; 3],
        #[builder(with = FromIterator::from_iter)] chunk_offsets: Vec<u64>,
        #[builder(default = false)] is_64bit: bool,
    ) -> Self {
        Self {
            version,
            flags,
            chunk_offsets: chunk_offsets.into(),
            is_64bit,
        }
    }
}

impl ChunkOffsetAtom {
    pub fn chunk_count(&self) -> usize {
        self.chunk_offsets.len()
    }

    /// Whether the offsets can only be represented by `co64`.
    pub fn needs_64bit(&self) -> bool {
        self.is_64bit || self.chunk_offsets.iter().any(|o| *o > u64::from(u32::MAX))
    }
}

impl ParseAtomData for ChunkOffsetAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        assert_atom_type!(atom_type, STCO, CO64);
        parser::parse_stco_co64_data(input, atom_type == CO64)
    }
}

impl SerializeAtom for ChunkOffsetAtom {
    fn atom_type(&self) -> FourCC {
        if self.needs_64bit() {
            CO64
        } else {
            STCO
        }
    }

    fn into_body_bytes(self) -> Vec<u8> {
        let is_64bit = self.needs_64bit();
        let mut data = Vec::with_capacity(8 + self.chunk_offsets.len() * 8);
        data.push(self.version);
        data.extend(self.flags);
        data.extend(be_u32(self.chunk_offsets.len() as u32));
        for offset in self.chunk_offsets.iter().copied() {
            match u32::try_from(offset) {
                Ok(offset) if !is_64bit => data.extend(be_u32(offset)),
                _ => data.extend(offset.to_be_bytes()),
            }
        }
        data
    }
}

mod parser {
    use winnow::{
        binary::{be_u32, be_u64, length_repeat},
        combinator::{empty, seq, trace},
        error::StrContext,
        ModalResult, Parser,
    };

    use super::{ChunkOffsetAtom, ChunkOffsets};
    use crate::atom::util::parser::{be_u32_as_u64, flags3, stream, version, Stream};

    pub fn parse_stco_co64_data(
        input: &[u8],
        is_64bit: bool,
    ) -> Result<ChunkOffsetAtom, crate::ParseError> {
        parse_stco_co64_data_inner(is_64bit)
            .parse(stream(input))
            .map_err(crate::ParseError::from_winnow)
    }

    fn parse_stco_co64_data_inner(
        is_64bit: bool,
    ) -> impl FnMut(&mut Stream<'_>) -> ModalResult<ChunkOffsetAtom> {
        move |input: &mut Stream<'_>| {
            trace(
                if is_64bit { "co64" } else { "stco" },
                seq!(ChunkOffsetAtom {
                    version: version,
                    flags: flags3,
                    chunk_offsets: length_repeat(be_u32, chunk_offset(is_64bit))
                        .map(ChunkOffsets)
                        .context(StrContext::Label("chunk_offsets")),
                    is_64bit: empty.value(is_64bit),
                }),
            )
            .parse_next(input)
        }
    }

    fn chunk_offset(is_64bit: bool) -> impl FnMut(&mut Stream<'_>) -> ModalResult<u64> {
        move |input: &mut Stream<'_>| {
            if is_64bit {
                be_u64.parse_next(input)
            } else {
                be_u32_as_u64.parse_next(input)
            }
        }
    }
}
