use crate::{atom::FourCC, parser::ParseAtomData, writer::SerializeAtom, ParseError};

pub const SMHD: FourCC = FourCC::new(b"smhd");

/// Sound Media Header (smhd), present in the `minf` of audio tracks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoundMediaHeaderAtom {
    pub version: u8,
    pub flags: [u8; 3],
    /// Stereo balance, 8.8 fixed point (0.0 = center)
    pub balance: f32,
}

impl ParseAtomData for SoundMediaHeaderAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        crate::atom::util::parser::assert_atom_type!(atom_type, SMHD);
        use crate::atom::util::parser::stream;
        use winnow::Parser;
        Ok(parser::parse_smhd_data.parse(stream(input))?)
    }
}

impl SerializeAtom for SoundMediaHeaderAtom {
    fn atom_type(&self) -> FourCC {
        SMHD
    }

    fn into_body_bytes(self) -> Vec<u8> {
        let mut data = Vec::with_capacity(8);
        data.push(self.version);
        data.extend(self.flags);
        data.extend(((self.balance * 256.0) as i16).to_be_bytes());
        data.extend([0u8; 2]);
        data
    }
}

mod parser {
    use winnow::{
        binary::be_i16,
        combinator::{seq, trace},
        error::StrContext,
        ModalResult, Parser,
    };

    use super::SoundMediaHeaderAtom;
    use crate::atom::util::parser::{byte_array, flags3, version, Stream};

    pub fn parse_smhd_data(input: &mut Stream<'_>) -> ModalResult<SoundMediaHeaderAtom> {
        trace(
            "smhd",
            seq!(SoundMediaHeaderAtom {
                version: version,
                flags: flags3,
                balance: be_i16
                    .map(|v| f32::from(v) / 256.0)
                    .context(StrContext::Label("balance")),
                _: byte_array::<2>.context(StrContext::Label("reserved")),
            })
            .context(StrContext::Label("smhd")),
        )
        .parse_next(input)
    }
}
