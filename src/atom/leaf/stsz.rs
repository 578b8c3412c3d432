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

pub const STSZ: FourCC = FourCC::new(b"stsz");

#[derive(Default, Clone, PartialEq, Deref, DerefMut)]
pub struct SampleEntrySizes(Vec<u32>);

impl From<Vec<u32>> for SampleEntrySizes {
    fn from(value: Vec<u32>) -> Self {
        Self(value)
    }
}

impl fmt::Debug for SampleEntrySizes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&DebugList::new(self.0.iter(), 10), f)
    }
}

/// Sample Size Atom (stsz)
#[derive(Default, Debug, Clone, PartialEq)]
pub struct SampleSizeAtom {
    pub version: u8,
    pub flags: [u8; 3],
    /// Size shared by every sample, or 0 when sizes are listed in `entry_sizes`
    pub sample_size: u32,
    pub sample_count: u32,
    pub entry_sizes: SampleEntrySizes,
}

impl SampleSizeAtom {
    pub fn from_sizes(sizes: impl IntoIterator<Item = u32>) -> Self {
        let entry_sizes: Vec<u32> = sizes.into_iter().collect();
        Self {
            version: 0,
            flags: [0u8; 3],
            sample_size: 0,
            sample_count: entry_sizes.len() as u32,
            entry_sizes: entry_sizes.into(),
        }
    }

    pub fn sample_count(&self) -> usize {
        if self.sample_size != 0 {
            self.sample_count as usize
        } else {
            self.entry_sizes.len()
        }
    }

    /// Returns an iterator over _all_ sample sizes.
    pub fn sample_sizes(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.sample_count()).map(move |i| match self.sample_size {
            0 => self.entry_sizes[i],
            size => size,
        })
    }
}

impl fmt::Display for SampleSizeAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SampleSize(count: {}, ", self.sample_count)?;
        if self.sample_size != 0 {
            write!(f, "constant_size: {})", self.sample_size)
        } else {
            write!(f, "variable_sizes: {} entries)", self.entry_sizes.len())
        }
    }
}

impl ParseAtomData for SampleSizeAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        assert_atom_type!(atom_type, STSZ);
        parser::parse_stsz_data(input)
    }
}

impl SerializeAtom for SampleSizeAtom {
    fn atom_type(&self) -> FourCC {
        STSZ
    }

    fn into_body_bytes(self) -> Vec<u8> {
        let mut data = Vec::with_capacity(12 + self.entry_sizes.len() * 4);
        data.push(self.version);
        data.extend(self.flags);
        data.extend(be_u32(self.sample_size));
        data.extend(be_u32(self.sample_count));
        if self.sample_size == 0 {
            for size in self.entry_sizes.iter() {
                data.extend(be_u32(*size));
            }
        }
        data
    }
}

mod parser {
    use winnow::{
        binary::be_u32,
        combinator::{repeat, seq, trace},
        error::StrContext,
        ModalResult, Parser,
    };

    use super::{SampleEntrySizes, SampleSizeAtom};
    use crate::atom::util::parser::{flags3, stream, version, Stream};

    pub fn parse_stsz_data(input: &[u8]) -> Result<SampleSizeAtom, crate::ParseError> {
        parse_stsz_data_inner
            .parse(stream(input))
            .map_err(crate::ParseError::from_winnow)
    }

    fn parse_stsz_data_inner(input: &mut Stream<'_>) -> ModalResult<SampleSizeAtom> {
        trace(
            "stsz",
            seq!(SampleSizeAtom {
                version: version,
                flags: flags3,
                sample_size: be_u32.context(StrContext::Label("sample_size")),
                sample_count: be_u32.context(StrContext::Label("sample_count")),
                entry_sizes: repeat(0.., be_u32.context(StrContext::Label("entry_size")))
                    .map(SampleEntrySizes)
                    .context(StrContext::Label("entry_sizes")),
            })
            .context(StrContext::Label("stsz")),
        )
        .parse_next(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stsz_roundtrip() {
        let stsz = SampleSizeAtom::from_sizes([100, 200, 150]);
        let bytes = stsz.clone().into_body_bytes();
        assert_eq!(bytes.len(), 12 + 3 * 4);
        let parsed = SampleSizeAtom::parse_atom_data(STSZ, &bytes).unwrap();
        assert_eq!(parsed, stsz);
        assert_eq!(parsed.sample_sizes().collect::<Vec<_>>(), vec![100, 200, 150]);
    }

    #[test]
    fn test_constant_sample_size() {
        let stsz = SampleSizeAtom {
            version: 0,
            flags: [0u8; 3],
            sample_size: 512,
            sample_count: 3,
            entry_sizes: SampleEntrySizes::default(),
        };
        let parsed = SampleSizeAtom::parse_atom_data(STSZ, &stsz.clone().into_body_bytes()).unwrap();
        assert_eq!(parsed.sample_count(), 3);
        assert_eq!(parsed.sample_sizes().collect::<Vec<_>>(), vec![512, 512, 512]);
    }
}
