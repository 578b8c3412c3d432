use bon::Builder;

use crate::{
    atom::{util::parser::assert_atom_type, FourCC},
    parser::ParseAtomData,
    writer::SerializeAtom,
    ParseError,
};

pub const HDLR: FourCC = FourCC::new(b"hdlr");

pub const HANDLER_VIDEO: FourCC = FourCC::new(b"vide");
pub const HANDLER_AUDIO: FourCC = FourCC::new(b"soun");
pub const HANDLER_HINT: FourCC = FourCC::new(b"hint");
pub const HANDLER_META: FourCC = FourCC::new(b"meta");
pub const HANDLER_TEXT: FourCC = FourCC::new(b"text");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerType {
    Video,
    Audio,
    Hint,
    Meta,
    Text,
    Unknown(FourCC),
}

impl Default for HandlerType {
    fn default() -> Self {
        Self::Unknown(FourCC([0u8; 4]))
    }
}

impl From<FourCC> for HandlerType {
    fn from(value: FourCC) -> Self {
        match value {
            HANDLER_VIDEO => HandlerType::Video,
            HANDLER_AUDIO => HandlerType::Audio,
            HANDLER_HINT => HandlerType::Hint,
            HANDLER_META => HandlerType::Meta,
            HANDLER_TEXT => HandlerType::Text,
            other => HandlerType::Unknown(other),
        }
    }
}

impl HandlerType {
    pub fn to_fourcc(self) -> FourCC {
        match self {
            HandlerType::Video => HANDLER_VIDEO,
            HandlerType::Audio => HANDLER_AUDIO,
            HandlerType::Hint => HANDLER_HINT,
            HandlerType::Meta => HANDLER_META,
            HandlerType::Text => HANDLER_TEXT,
            HandlerType::Unknown(fourcc) => fourcc,
        }
    }
}

/// Handler Reference Atom (hdlr) - declares the media type of a track
#[derive(Default, Debug, Clone, Builder)]
pub struct HandlerReferenceAtom {
    #[builder(default = 0)]
    pub version: u8,
    #[builder(default = [0u8; 3])]
    pub flags: [u8; 3],
    /// Component type (QuickTime), zero in ISO files
    #[builder(default = [0u8; 4])]
    pub component_type: [u8; 4],
    pub handler_type: HandlerType,
    /// Reserved in ISO files, component manufacturer/flags/mask in QuickTime
    #[builder(default = [0u8; 12])]
    pub reserved: [u8; 12],
    /// Human-readable name of the handler, written null terminated
    #[builder(into, default)]
    pub name: String,
}

impl ParseAtomData for HandlerReferenceAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        assert_atom_type!(atom_type, HDLR);
        parser::parse_hdlr_data(input)
    }
}

impl SerializeAtom for HandlerReferenceAtom {
    fn atom_type(&self) -> FourCC {
        HDLR
    }

    fn into_body_bytes(self) -> Vec<u8> {
        let mut data = Vec::new();
        data.push(self.version);
        data.extend(self.flags);
        data.extend(self.component_type);
        data.extend(self.handler_type.to_fourcc().0);
        data.extend(self.reserved);
        data.extend(self.name.as_bytes());
        data.push(0);
        data
    }
}

mod parser {
    use winnow::{
        combinator::{seq, trace},
        error::StrContext,
        token::rest,
        ModalResult, Parser,
    };

    use super::{HandlerReferenceAtom, HandlerType};
    use crate::atom::util::parser::{byte_array, flags3, fourcc, stream, version, Stream};

    pub fn parse_hdlr_data(input: &[u8]) -> Result<HandlerReferenceAtom, crate::ParseError> {
        parse_hdlr_data_inner
            .parse(stream(input))
            .map_err(crate::ParseError::from_winnow)
    }

    fn parse_hdlr_data_inner(input: &mut Stream<'_>) -> ModalResult<HandlerReferenceAtom> {
        trace(
            "hdlr",
            seq!(HandlerReferenceAtom {
                version: version,
                flags: flags3,
                component_type: byte_array.context(StrContext::Label("component_type")),
                handler_type: fourcc
                    .map(HandlerType::from)
                    .context(StrContext::Label("handler_type")),
                reserved: byte_array.context(StrContext::Label("reserved")),
                name: name.context(StrContext::Label("name")),
            })
            .context(StrContext::Label("hdlr")),
        )
        .parse_next(input)
    }

    /// Accepts null terminated names, QuickTime pascal strings and unterminated names.
    fn name(input: &mut Stream<'_>) -> ModalResult<String> {
        trace(
            "name",
            rest.map(|data: &[u8]| {
                let data = match data.first() {
                    Some(len) if usize::from(*len) == data.len() - 1 && *len > 0 => &data[1..],
                    _ => data,
                };
                let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
                String::from_utf8_lossy(&data[..end]).into_owned()
            }),
        )
        .parse_next(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hdlr_roundtrip() {
        let hdlr = HandlerReferenceAtom::builder()
            .handler_type(HandlerType::Video)
            .name("VideoHandler")
            .build();
        let bytes = hdlr.into_body_bytes();
        assert_eq!(bytes.len(), 24 + "VideoHandler".len() + 1);
        let parsed = HandlerReferenceAtom::parse_atom_data(HDLR, &bytes).unwrap();
        assert_eq!(parsed.handler_type, HandlerType::Video);
        assert_eq!(parsed.name, "VideoHandler");
    }

    #[test]
    fn test_hdlr_pascal_name() {
        let mut bytes = HandlerReferenceAtom::builder()
            .handler_type(HandlerType::Audio)
            .build()
            .into_body_bytes();
        bytes.truncate(24);
        bytes.push(5);
        bytes.extend(b"Sound");
        let parsed = HandlerReferenceAtom::parse_atom_data(HDLR, &bytes).unwrap();
        assert_eq!(parsed.handler_type, HandlerType::Audio);
        assert_eq!(parsed.name, "Sound");
    }

    #[test]
    fn test_handler_type_unknown() {
        let tmcd = FourCC::new(b"tmcd");
        assert_eq!(HandlerType::from(tmcd), HandlerType::Unknown(tmcd));
        assert_eq!(HandlerType::from(tmcd).to_fourcc(), tmcd);
    }
}
