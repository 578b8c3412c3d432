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

pub const STSS: FourCC = FourCC::new(b"stss");

/// 1-based sample numbers of sync samples
#[derive(Default, Clone, PartialEq, Deref, DerefMut)]
pub struct SyncSampleNumbers(Vec<u32>);

impl fmt::Debug for SyncSampleNumbers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&DebugList::new(self.0.iter(), 10), f)
    }
}

/// Sync Sample (stss) atom
#[derive(Default, Debug, Clone, PartialEq)]
pub struct SyncSampleAtom {
    pub version: u8,
    pub flags: [u8; 3],
    pub sample_numbers: SyncSampleNumbers,
}

impl SyncSampleAtom {
    pub fn from_sync_flags(flags: impl IntoIterator<Item = bool>) -> Self {
        let sample_numbers = flags
            .into_iter()
            .zip(1u32..)
            .filter_map(|(is_sync, n)| is_sync.then_some(n))
            .collect();
        Self {
            version: 0,
            flags: [0u8; 3],
            sample_numbers: SyncSampleNumbers(sample_numbers),
        }
    }

    /// Whether the 0-based sample `index` is a sync sample.
    pub fn is_sync(&self, index: usize) -> bool {
        u32::try_from(index + 1).is_ok_and(|n| self.sample_numbers.binary_search(&n).is_ok())
    }
}

impl ParseAtomData for SyncSampleAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        assert_atom_type!(atom_type, STSS);
        parser::parse_stss_data(input)
    }
}

impl SerializeAtom for SyncSampleAtom {
    fn atom_type(&self) -> FourCC {
        STSS
    }

    fn into_body_bytes(self) -> Vec<u8> {
        let mut data = Vec::with_capacity(8 + self.sample_numbers.len() * 4);
        data.push(self.version);
        data.extend(self.flags);
        data.extend(be_u32(self.sample_numbers.len() as u32));
        for n in self.sample_numbers.iter() {
            data.extend(be_u32(*n));
        }
        data
    }
}

mod parser {
    use winnow::{
        binary::{be_u32, length_repeat},
        combinator::{seq, trace},
        error::StrContext,
        ModalResult, Parser,
    };

    use super::{SyncSampleAtom, SyncSampleNumbers};
    use crate::atom::util::parser::{flags3, stream, version, Stream};

    pub fn parse_stss_data(input: &[u8]) -> Result<SyncSampleAtom, crate::ParseError> {
        parse_stss_data_inner
            .parse(stream(input))
            .map_err(crate::ParseError::from_winnow)
    }

    fn parse_stss_data_inner(input: &mut Stream<'_>) -> ModalResult<SyncSampleAtom> {
        trace(
            "stss",
            seq!(SyncSampleAtom {
                version: version,
                flags: flags3,
                sample_numbers: length_repeat(be_u32, be_u32)
                    .map(|mut numbers: Vec<u32>| {
                        numbers.sort_unstable();
                        SyncSampleNumbers(numbers)
                    })
                    .context(StrContext::Label("sample_numbers")),
            })
            .context(StrContext::Label("stss")),
        )
        .parse_next(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stss_from_flags() {
        let stss = SyncSampleAtom::from_sync_flags([true, false, false, true]);
        assert_eq!(stss.sample_numbers.as_slice(), &[1, 4]);
        assert!(stss.is_sync(0));
        assert!(!stss.is_sync(1));
        assert!(stss.is_sync(3));

        let parsed = SyncSampleAtom::parse_atom_data(STSS, &stss.clone().into_body_bytes()).unwrap();
        assert_eq!(parsed, stss);
    }
}
