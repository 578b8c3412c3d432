use bon::Builder;

use crate::{
    atom::{util::parser::assert_atom_type, util::serializer::be_u32, FourCC},
    parser::ParseAtomData,
    writer::SerializeAtom,
    ParseError,
};

pub const DREF: FourCC = FourCC::new(b"dref");

pub const DATA_ENTRY_URL: FourCC = FourCC::new(b"url ");
pub const DATA_ENTRY_URN: FourCC = FourCC::new(b"urn ");

/// Media data is in the same file as the movie atom
pub const SELF_CONTAINED: [u8; 3] = [0, 0, 1];

/// A single data reference entry
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct DataReferenceEntry {
    #[builder(default = DATA_ENTRY_URL)]
    pub entry_type: FourCC,
    #[builder(default)]
    pub version: u8,
    #[builder(default = SELF_CONTAINED)]
    pub flags: [u8; 3],
    /// Location (URL / URN), empty for self-contained entries
    #[builder(default)]
    pub data: Vec<u8>,
}

impl DataReferenceEntry {
    pub fn self_contained() -> Self {
        Self::builder().build()
    }
}

/// Data Reference Atom (dref)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataReferenceAtom {
    pub version: u8,
    pub flags: [u8; 3],
    pub entries: Vec<DataReferenceEntry>,
}

impl DataReferenceAtom {
    pub fn self_contained() -> Self {
        Self {
            version: 0,
            flags: [0u8; 3],
            entries: vec![DataReferenceEntry::self_contained()],
        }
    }
}

impl ParseAtomData for DataReferenceAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        assert_atom_type!(atom_type, DREF);
        parser::parse_dref_data(input)
    }
}

impl SerializeAtom for DataReferenceAtom {
    fn atom_type(&self) -> FourCC {
        DREF
    }

    fn into_body_bytes(self) -> Vec<u8> {
        let mut data = Vec::new();
        data.push(self.version);
        data.extend(self.flags);
        data.extend(be_u32(self.entries.len() as u32));
        for entry in self.entries {
            data.extend(be_u32(12 + entry.data.len() as u32));
            data.extend(entry.entry_type.into_bytes());
            data.push(entry.version);
            data.extend(entry.flags);
            data.extend(entry.data);
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

    use super::{DataReferenceAtom, DataReferenceEntry};
    use crate::atom::util::parser::{
        combinators::inclusive_length_and_then, flags3, fourcc, rest_vec, stream, version, Stream,
    };

    pub fn parse_dref_data(input: &[u8]) -> Result<DataReferenceAtom, crate::ParseError> {
        parse_dref_data_inner
            .parse(stream(input))
            .map_err(crate::ParseError::from_winnow)
    }

    fn parse_dref_data_inner(input: &mut Stream<'_>) -> ModalResult<DataReferenceAtom> {
        trace(
            "dref",
            seq!(DataReferenceAtom {
                version: version,
                flags: flags3,
                entries: length_repeat(be_u32, entry).context(StrContext::Label("entries")),
            })
            .context(StrContext::Label("dref")),
        )
        .parse_next(input)
    }

    fn entry(input: &mut Stream<'_>) -> ModalResult<DataReferenceEntry> {
        trace(
            "entry",
            inclusive_length_and_then(
                be_u32,
                seq!(DataReferenceEntry {
                    entry_type: fourcc,
                    version: version,
                    flags: flags3,
                    data: rest_vec,
                }),
            ),
        )
        .parse_next(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_contained_dref() {
        let dref = DataReferenceAtom::self_contained();
        let bytes = dref.clone().into_body_bytes();
        assert_eq!(
            bytes,
            vec![0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 12, b'u', b'r', b'l', b' ', 0, 0, 0, 1]
        );
        assert_eq!(DataReferenceAtom::parse_atom_data(DREF, &bytes).unwrap(), dref);
    }
}
