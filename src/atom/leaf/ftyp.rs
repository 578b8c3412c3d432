use bon::Builder;

use crate::{
    atom::{util::parser::assert_atom_type, FourCC},
    parser::ParseAtomData,
    writer::SerializeAtom,
    ParseError,
};

pub const FTYP: FourCC = FourCC::new(b"ftyp");

pub const BRAND_ISOM: FourCC = FourCC::new(b"isom");
pub const BRAND_ISO2: FourCC = FourCC::new(b"iso2");
pub const BRAND_AVC1: FourCC = FourCC::new(b"avc1");

/// File Type Atom (ftyp) - ISO/IEC 14496-12
/// This atom identifies the specifications to which this file complies.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct FileTypeAtom {
    /// Major brand - identifies the 'best use' of the file
    #[builder(into)]
    pub major_brand: FourCC,
    /// Minor version - an informative integer for the minor version of the major brand
    #[builder(default)]
    pub minor_version: u32,
    /// Compatible brands - a list of brands compatible with this file
    #[builder(default = vec![major_brand], into)]
    pub compatible_brands: Vec<FourCC>,
}

impl Default for FileTypeAtom {
    fn default() -> Self {
        Self {
            major_brand: BRAND_ISOM,
            minor_version: 512,
            compatible_brands: vec![BRAND_ISOM],
        }
    }
}

impl ParseAtomData for FileTypeAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        assert_atom_type!(atom_type, FTYP);
        parser::parse_ftyp_data(input)
    }
}

impl SerializeAtom for FileTypeAtom {
    fn atom_type(&self) -> FourCC {
        FTYP
    }

    fn into_body_bytes(self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&self.major_brand.0);
        data.extend_from_slice(&self.minor_version.to_be_bytes());
        for brand in self.compatible_brands {
            data.extend_from_slice(&brand.0);
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

    use super::FileTypeAtom;
    use crate::atom::util::parser::{fourcc, stream, Stream};

    pub fn parse_ftyp_data(input: &[u8]) -> Result<FileTypeAtom, crate::ParseError> {
        parse_ftyp_data_inner
            .parse(stream(input))
            .map_err(crate::ParseError::from_winnow)
    }

    fn parse_ftyp_data_inner(input: &mut Stream<'_>) -> ModalResult<FileTypeAtom> {
        trace(
            "ftyp",
            seq!(FileTypeAtom {
                major_brand: fourcc.context(StrContext::Label("major_brand")),
                minor_version: be_u32.context(StrContext::Label("minor_version")),
                compatible_brands: repeat(0.., fourcc)
                    .context(StrContext::Label("compatible_brands")),
            })
            .context(StrContext::Label("ftyp")),
        )
        .parse_next(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ftyp_roundtrip() {
        let ftyp = FileTypeAtom::builder()
            .major_brand(BRAND_ISOM)
            .compatible_brands(vec![BRAND_ISOM, BRAND_ISO2, BRAND_AVC1])
            .build();
        let bytes = ftyp.clone().into_body_bytes();
        assert_eq!(bytes.len(), 8 + 3 * 4);
        let parsed = FileTypeAtom::parse_atom_data(FTYP, &bytes).unwrap();
        assert_eq!(parsed, ftyp);
    }

    #[test]
    fn test_ftyp_rejects_truncated_brand() {
        let mut bytes = FileTypeAtom::default().into_body_bytes();
        bytes.extend_from_slice(b"is");
        assert!(FileTypeAtom::parse_atom_data(FTYP, &bytes).is_err());
    }
}
