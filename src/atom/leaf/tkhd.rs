use bon::Builder;

use crate::{
    atom::{util::mp4_timestamp_now, FourCC},
    parser::ParseAtomData,
    writer::SerializeAtom,
    ParseError,
};

pub const TKHD: FourCC = FourCC::new(b"tkhd");

/// Track is enabled, used in the presentation and used when previewing.
pub const TRACK_ENABLED_IN_MOVIE_AND_PREVIEW: [u8; 3] = [0, 0, 7];

#[derive(Default, Debug, Clone, Builder)]
pub struct TrackHeaderAtom {
    /// Version of the tkhd atom format (0 or 1)
    #[builder(default = 0)]
    pub version: u8,
    /// Flags for the tkhd atom (bit flags for track properties)
    #[builder(default = TRACK_ENABLED_IN_MOVIE_AND_PREVIEW)]
    pub flags: [u8; 3],
    /// When the track was created (seconds since Jan 1, 1904 UTC)
    #[builder(default = mp4_timestamp_now())]
    pub creation_time: u64,
    /// When the track was last modified (seconds since Jan 1, 1904 UTC)
    #[builder(default = mp4_timestamp_now())]
    pub modification_time: u64,
    /// Unique identifier for this track within the movie
    pub track_id: u32,
    /// Duration of the track in movie timescale units
    pub duration: u64,
    /// Playback layer (lower numbers are closer to viewer)
    #[builder(default = 0)]
    pub layer: i16,
    #[builder(default = 0)]
    pub alternate_group: i16,
    /// Audio volume level (1.0 for audio tracks, 0.0 otherwise)
    #[builder(default = 0.0)]
    pub volume: f32,
    /// 3x3 transformation matrix for video display positioning/rotation
    ///
    /// `None` if matrix is empty or is the identity matrix
    pub matrix: Option<[i32; 9]>,
    /// Track width as raw 16.16 fixed point
    #[builder(default = 0)]
    pub width: u32,
    /// Track height as raw 16.16 fixed point
    #[builder(default = 0)]
    pub height: u32,
}

impl ParseAtomData for TrackHeaderAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        crate::atom::util::parser::assert_atom_type!(atom_type, TKHD);
        use crate::atom::util::parser::stream;
        use winnow::Parser;
        Ok(parser::parse_tkhd_data.parse(stream(input))?)
    }
}

impl SerializeAtom for TrackHeaderAtom {
    fn atom_type(&self) -> FourCC {
        TKHD
    }

    fn into_body_bytes(self) -> Vec<u8> {
        serializer::serialize_tkhd_data(self)
    }
}

mod serializer {
    use crate::atom::{
        mvhd::IDENTITY_MATRIX,
        util::serializer::{be_u32_or_u64, fixed_point_8x8},
    };

    use super::TrackHeaderAtom;

    pub fn serialize_tkhd_data(tkhd: TrackHeaderAtom) -> Vec<u8> {
        let mut data = Vec::new();

        let version = u8::from(
            tkhd.version == 1
                || tkhd.creation_time > u64::from(u32::MAX)
                || tkhd.modification_time > u64::from(u32::MAX)
                || tkhd.duration > u64::from(u32::MAX),
        );

        data.push(version);
        data.extend(tkhd.flags);
        data.extend(be_u32_or_u64(version, tkhd.creation_time));
        data.extend(be_u32_or_u64(version, tkhd.modification_time));
        data.extend(tkhd.track_id.to_be_bytes());
        data.extend([0u8; 4]); // reserved
        data.extend(be_u32_or_u64(version, tkhd.duration));
        data.extend([0u8; 8]); // reserved
        data.extend(tkhd.layer.to_be_bytes());
        data.extend(tkhd.alternate_group.to_be_bytes());
        data.extend(fixed_point_8x8(tkhd.volume));
        data.extend([0u8; 2]); // reserved
        data.extend(
            tkhd.matrix
                .unwrap_or(IDENTITY_MATRIX)
                .into_iter()
                .flat_map(|v| v.to_be_bytes()),
        );
        data.extend(tkhd.width.to_be_bytes());
        data.extend(tkhd.height.to_be_bytes());

        data
    }
}

mod parser {
    use winnow::{
        binary::{be_i16, be_i32, be_u32},
        combinator::{seq, trace},
        error::StrContext,
        ModalResult, Parser,
    };

    use super::TrackHeaderAtom;
    use crate::atom::{
        mvhd::IDENTITY_MATRIX,
        util::parser::{
            be_u32_or_u64, byte_array, fixed_array, fixed_point_8x8, flags3, version_0_or_1,
            Stream,
        },
    };

    pub fn parse_tkhd_data(input: &mut Stream<'_>) -> ModalResult<TrackHeaderAtom> {
        trace(
            "tkhd",
            seq!(TrackHeaderAtom {
                version: version_0_or_1,
                flags: flags3,
                creation_time: be_u32_or_u64(version).context(StrContext::Label("creation_time")),
                modification_time: be_u32_or_u64(version).context(StrContext::Label("modification_time")),
                track_id: be_u32.context(StrContext::Label("track_id")),
                _: byte_array::<4>.context(StrContext::Label("reserved_1")),
                duration: be_u32_or_u64(version).context(StrContext::Label("duration")),
                _: byte_array::<8>.context(StrContext::Label("reserved_2")),
                layer: be_i16.context(StrContext::Label("layer")),
                alternate_group: be_i16.context(StrContext::Label("alternate_group")),
                volume: fixed_point_8x8.context(StrContext::Label("volume")),
                _: byte_array::<2>.context(StrContext::Label("reserved_3")),
                matrix: matrix.context(StrContext::Label("matrix")),
                width: be_u32.context(StrContext::Label("width")),
                height: be_u32.context(StrContext::Label("height")),
            })
            .context(StrContext::Label("tkhd")),
        )
        .parse_next(input)
    }

    fn matrix(input: &mut Stream<'_>) -> ModalResult<Option<[i32; 9]>> {
        trace(
            "matrix",
            fixed_array(be_i32).map(|matrix: [i32; 9]| {
                if matrix == [0; 9] || matrix == IDENTITY_MATRIX {
                    None
                } else {
                    Some(matrix)
                }
            }),
        )
        .parse_next(input)
    }
}
