use bon::Builder;
use std::fmt;

use crate::{
    atom::{util::mp4_timestamp_now, FourCC},
    parser::ParseAtomData,
    writer::SerializeAtom,
    ParseError,
};

pub const MDHD: FourCC = FourCC::new(b"mdhd");

macro_rules! define_language_code_enum {
    ($( #[$meta:meta] )* $name:ident { $( $( #[$tag:meta] )* $variant:ident => $chars:literal ),+ $(,)? }) => {
        $(#[$meta])*
        pub enum $name {
            $( $( #[$tag] )* $variant ),+,
            Other([char; 3]),
        }

        impl From<[u8; 2]> for $name {
            fn from(value: [u8; 2]) -> Self {
                let packed = u16::from_be_bytes([value[0], value[1]]);
                let char1 = (((packed >> 10) & 0x1F) + 0x60) as u8;
                let char2 = (((packed >> 5) & 0x1F) + 0x60) as u8;
                let char3 = ((packed & 0x1F) + 0x60) as u8;

                Self::from_chars([char1, char2, char3])
            }
        }

        impl $name {
            /// Looks up an ISO 639-2/T code given as three lowercase ASCII letters.
            pub fn from_chars(lang: [u8; 3]) -> Self {
                match &lang {
                    $( $chars => Self::$variant ),+,
                    _ => Self::Other([lang[0] as char, lang[1] as char, lang[2] as char]),
                }
            }

            /// Packs the language code into 3 x 5-bit values
            pub fn to_bytes(&self) -> [u8; 2] {
                let chars = match self {
                    $( Self::$variant => $chars ),+,
                    Self::Other(chars) => &[chars[0] as u8, chars[1] as u8, chars[2] as u8],
                };

                let char1_bits = (chars[0] - 0x60) & 0x1F;
                let char2_bits = (chars[1] - 0x60) & 0x1F;
                let char3_bits = (chars[2] - 0x60) & 0x1F;

                let packed =
                    (u16::from(char1_bits) << 10) | (u16::from(char2_bits) << 5) | u16::from(char3_bits);
                packed.to_be_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let chars = match self {
                    $( Self::$variant => $chars ),+,
                    Self::Other(chars) => &[chars[0] as u8, chars[1] as u8, chars[2] as u8],
                };
                write!(f, "{}{}{}", chars[0] as char, chars[1] as char, chars[2] as char)
            }
        }
    };
}

define_language_code_enum!(
    /// Language code (ISO 639-2/T language code)
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
    LanguageCode {
        English => b"eng",
        Spanish => b"spa",
        French => b"fra",
        German => b"deu",
        Italian => b"ita",
        Japanese => b"jpn",
        Korean => b"kor",
        Chinese => b"chi",
        Russian => b"rus",
        Arabic => b"ara",
        Portuguese => b"por",
        #[default]
        Undetermined => b"und",
    }
);

impl std::str::FromStr for LanguageCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [a, b, c] if [a, b, c].iter().all(|c| c.is_ascii_lowercase()) => {
                Ok(Self::from_chars([*a, *b, *c]))
            }
            _ => Err(format!("invalid ISO 639-2/T language code: {s:?}")),
        }
    }
}

#[derive(Default, Debug, Clone, Builder)]
pub struct MediaHeaderAtom {
    /// Version of the mdhd atom format (0 or 1)
    #[builder(default = 0)]
    pub version: u8,
    /// Flags for the mdhd atom (usually all zeros)
    #[builder(default = [0u8; 3])]
    pub flags: [u8; 3],
    /// Creation time (seconds since midnight, Jan. 1, 1904, UTC)
    #[builder(default = mp4_timestamp_now())]
    pub creation_time: u64,
    /// Modification time (seconds since midnight, Jan. 1, 1904, UTC)
    #[builder(default = mp4_timestamp_now())]
    pub modification_time: u64,
    /// Media timescale (number of time units per second)
    pub timescale: u32,
    /// Duration of media (in timescale units)
    pub duration: u64,
    /// Language code (ISO 639-2/T language code)
    #[builder(default = LanguageCode::Undetermined)]
    pub language: LanguageCode,
    /// Pre-defined value (should be 0)
    #[builder(default = 0)]
    pub pre_defined: u16,
}

impl ParseAtomData for MediaHeaderAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        crate::atom::util::parser::assert_atom_type!(atom_type, MDHD);
        parser::parse_mdhd_data(input)
    }
}

impl SerializeAtom for MediaHeaderAtom {
    fn atom_type(&self) -> FourCC {
        MDHD
    }

    fn into_body_bytes(self) -> Vec<u8> {
        serializer::serialize_mdhd_data(self)
    }
}

mod serializer {
    use crate::atom::util::serializer::be_u32_or_u64;

    use super::MediaHeaderAtom;

    pub fn serialize_mdhd_data(mdhd: MediaHeaderAtom) -> Vec<u8> {
        let mut data = Vec::new();

        let version = u8::from(
            mdhd.version == 1
                || mdhd.creation_time > u64::from(u32::MAX)
                || mdhd.modification_time > u64::from(u32::MAX)
                || mdhd.duration > u64::from(u32::MAX),
        );

        data.push(version);
        data.extend(mdhd.flags);
        data.extend(be_u32_or_u64(version, mdhd.creation_time));
        data.extend(be_u32_or_u64(version, mdhd.modification_time));
        data.extend(mdhd.timescale.to_be_bytes());
        data.extend(be_u32_or_u64(version, mdhd.duration));
        data.extend(mdhd.language.to_bytes());
        data.extend(mdhd.pre_defined.to_be_bytes());

        data
    }
}

mod parser {
    use winnow::{
        binary::{be_u16, be_u32},
        combinator::{seq, trace},
        error::{StrContext, StrContextValue},
        ModalResult, Parser,
    };

    use super::{LanguageCode, MediaHeaderAtom};
    use crate::atom::util::parser::{
        be_u32_or_u64, byte_array, flags3, stream, version_0_or_1, Stream,
    };

    pub fn parse_mdhd_data(input: &[u8]) -> Result<MediaHeaderAtom, crate::ParseError> {
        parse_mdhd_data_inner
            .parse(stream(input))
            .map_err(crate::ParseError::from_winnow)
    }

    fn parse_mdhd_data_inner(input: &mut Stream<'_>) -> ModalResult<MediaHeaderAtom> {
        trace(
            "mdhd",
            seq!(MediaHeaderAtom {
                version: version_0_or_1,
                flags: flags3,
                creation_time: be_u32_or_u64(version).context(StrContext::Label("creation_time")),
                modification_time: be_u32_or_u64(version)
                    .context(StrContext::Label("modification_time")),
                timescale: be_u32
                    .verify(|timescale| *timescale > 0)
                    .context(StrContext::Label("timescale"))
                    .context(StrContext::Expected(StrContextValue::Description(
                        "non-zero timescale"
                    ))),
                duration: be_u32_or_u64(version).context(StrContext::Label("duration")),
                language: byte_array::<2>
                    .map(LanguageCode::from)
                    .context(StrContext::Label("language")),
                pre_defined: be_u16.context(StrContext::Label("pre_defined")),
            })
            .context(StrContext::Label("mdhd")),
        )
        .parse_next(input)
    }
}
