use crate::{atom::FourCC, parser::ParseAtomData, writer::SerializeAtom, ParseError};

pub const VMHD: FourCC = FourCC::new(b"vmhd");

/// Video Media Header (vmhd), present in the `minf` of video tracks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMediaHeaderAtom {
    pub version: u8,
    /// Always `[0, 0, 1]` in ISO files
    pub flags: [u8; 3],
    pub graphics_mode: u16,
    pub opcolor: [u16; 3],
}

impl Default for VideoMediaHeaderAtom {
    fn default() -> Self {
        Self {
            version: 0,
            flags: [0, 0, 1],
            graphics_mode: 0,
            opcolor: [0; 3],
        }
    }
}

impl ParseAtomData for VideoMediaHeaderAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        crate::atom::util::parser::assert_atom_type!(atom_type, VMHD);
        use crate::atom::util::parser::stream;
        use winnow::Parser;
        Ok(parser::parse_vmhd_data.parse(stream(input))?)
    }
}

impl SerializeAtom for VideoMediaHeaderAtom {
    fn atom_type(&self) -> FourCC {
        VMHD
    }

    fn into_body_bytes(self) -> Vec<u8> {
        let mut data = Vec::with_capacity(12);
        data.push(self.version);
        data.extend(self.flags);
        data.extend(self.graphics_mode.to_be_bytes());
        for c in self.opcolor {
            data.extend(c.to_be_bytes());
        }
        data
    }
}

mod parser {
    use winnow::{
        binary::be_u16,
        combinator::{seq, trace},
        error::StrContext,
        ModalResult, Parser,
    };

    use super::VideoMediaHeaderAtom;
    use crate::atom::util::parser::{fixed_array, flags3, version, Stream};

    pub fn parse_vmhd_data(input: &mut Stream<'_>) -> ModalResult<VideoMediaHeaderAtom> {
        trace(
            "vmhd",
            seq!(VideoMediaHeaderAtom {
                version: version,
                flags: flags3,
                graphics_mode: be_u16.context(StrContext::Label("graphics_mode")),
                opcolor: fixed_array(be_u16).context(StrContext::Label("opcolor")),
            })
            .context(StrContext::Label("vmhd")),
        )
        .parse_next(input)
    }
}
