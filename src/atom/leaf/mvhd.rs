use bon::Builder;

use crate::{
    atom::{util::mp4_timestamp_now, FourCC},
    parser::ParseAtomData,
    writer::SerializeAtom,
    ParseError,
};

pub const MVHD: FourCC = FourCC::new(b"mvhd");

pub(crate) const IDENTITY_MATRIX: [i32; 9] = [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000];

#[derive(Debug, Clone, Builder)]
pub struct MovieHeaderAtom {
    /// Version of the mvhd atom format (0 or 1)
    #[builder(default = 0)]
    pub version: u8,
    /// Flags for the mvhd atom (usually all zeros)
    #[builder(default = [0u8; 3])]
    pub flags: [u8; 3],
    /// When the movie was created (seconds since Jan 1, 1904 UTC)
    #[builder(default = mp4_timestamp_now())]
    pub creation_time: u64,
    /// When the movie was last modified (seconds since Jan 1, 1904 UTC)
    #[builder(default = mp4_timestamp_now())]
    pub modification_time: u64,
    /// Number of time units per second
    pub timescale: u32,
    /// Duration of the movie in timescale units
    pub duration: u64,
    /// Playback rate (1.0 = normal speed)
    #[builder(default = 1.0)]
    pub rate: f32,
    /// Audio volume level (1.0 = full volume)
    #[builder(default = 1.0)]
    pub volume: f32,
    /// 3x3 transformation matrix
    #[builder(default = IDENTITY_MATRIX)]
    pub matrix: [i32; 9],
    /// Pre-defined (preview, poster and selection times), usually zero
    #[builder(default)]
    pub pre_defined: [u8; 24],
    /// ID to use for the next track added to this movie
    pub next_track_id: u32,
}

impl ParseAtomData for MovieHeaderAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        crate::atom::util::parser::assert_atom_type!(atom_type, MVHD);
        use crate::atom::util::parser::stream;
        use winnow::Parser;
        Ok(parser::parse_mvhd_data.parse(stream(input))?)
    }
}

impl SerializeAtom for MovieHeaderAtom {
    fn atom_type(&self) -> FourCC {
        MVHD
    }

    fn into_body_bytes(self) -> Vec<u8> {
        serializer::serialize_mvhd_data(self)
    }
}

mod serializer {
    use crate::atom::util::serializer::{be_u32_or_u64, fixed_point_16x16, fixed_point_8x8};

    use super::MovieHeaderAtom;

    pub fn serialize_mvhd_data(mvhd: MovieHeaderAtom) -> Vec<u8> {
        let mut data = Vec::new();

        let version = u8::from(
            mvhd.version == 1
                || mvhd.creation_time > u64::from(u32::MAX)
                || mvhd.modification_time > u64::from(u32::MAX)
                || mvhd.duration > u64::from(u32::MAX),
        );

        data.push(version);
        data.extend(mvhd.flags);
        data.extend(be_u32_or_u64(version, mvhd.creation_time));
        data.extend(be_u32_or_u64(version, mvhd.modification_time));
        data.extend(mvhd.timescale.to_be_bytes());
        data.extend(be_u32_or_u64(version, mvhd.duration));
        data.extend(fixed_point_16x16(mvhd.rate));
        data.extend(fixed_point_8x8(mvhd.volume));
        data.extend([0u8; 10]); // reserved
        data.extend(mvhd.matrix.into_iter().flat_map(|v| v.to_be_bytes()));
        data.extend(mvhd.pre_defined);
        data.extend(mvhd.next_track_id.to_be_bytes());

        data
    }
}

mod parser {
    use winnow::{
        binary::{be_i32, be_u32},
        combinator::{seq, trace},
        error::StrContext,
        ModalResult, Parser,
    };

    use super::MovieHeaderAtom;
    use crate::atom::util::parser::{
        be_u32_or_u64, byte_array, fixed_array, fixed_point_16x16, fixed_point_8x8, flags3,
        version_0_or_1, Stream,
    };

    pub fn parse_mvhd_data(input: &mut Stream<'_>) -> ModalResult<MovieHeaderAtom> {
        trace(
            "mvhd",
            seq!(MovieHeaderAtom {
                version: version_0_or_1,
                flags: flags3,
                creation_time: be_u32_or_u64(version).context(StrContext::Label("creation_time")),
                modification_time: be_u32_or_u64(version)
                    .context(StrContext::Label("modification_time")),
                timescale: be_u32.context(StrContext::Label("timescale")),
                duration: be_u32_or_u64(version).context(StrContext::Label("duration")),
                rate: fixed_point_16x16.context(StrContext::Label("rate")),
                volume: fixed_point_8x8.context(StrContext::Label("volume")),
                _: byte_array::<10>.context(StrContext::Label("reserved")),
                matrix: fixed_array(be_i32).context(StrContext::Label("matrix")),
                pre_defined: byte_array.context(StrContext::Label("pre_defined")),
                next_track_id: be_u32.context(StrContext::Label("next_track_id")),
            })
            .context(StrContext::Label("mvhd")),
        )
        .parse_next(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mvhd_roundtrip() {
        let mvhd = MovieHeaderAtom::builder()
            .creation_time(3_000_000_000)
            .modification_time(3_000_000_000)
            .timescale(1000)
            .duration(5000)
            .next_track_id(3)
            .build();
        let bytes = mvhd.into_body_bytes();
        assert_eq!(bytes.len(), 100);
        let parsed = MovieHeaderAtom::parse_atom_data(MVHD, &bytes).unwrap();
        assert_eq!(parsed.version, 0);
        assert_eq!(parsed.timescale, 1000);
        assert_eq!(parsed.duration, 5000);
        assert_eq!(parsed.matrix, IDENTITY_MATRIX);
        assert_eq!(parsed.next_track_id, 3);
        assert_eq!(parsed.rate, 1.0);
    }

    #[test]
    fn test_mvhd_upgrades_to_version_1() {
        let mvhd = MovieHeaderAtom::builder()
            .timescale(90000)
            .duration(u64::from(u32::MAX) + 1)
            .next_track_id(2)
            .build();
        let bytes = mvhd.into_body_bytes();
        assert_eq!(bytes.len(), 112);
        let parsed = MovieHeaderAtom::parse_atom_data(MVHD, &bytes).unwrap();
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.duration, u64::from(u32::MAX) + 1);
    }
}
