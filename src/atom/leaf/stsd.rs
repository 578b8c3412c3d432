use derive_more::{Deref, DerefMut};

use crate::{
    atom::{
        util::{
            parser::assert_atom_type,
            serializer::{be_u32, fixed_point_16x16, pascal_string},
        },
        FourCC,
    },
    parser::ParseAtomData,
    writer::SerializeAtom,
    ParseError,
};

pub const STSD: FourCC = FourCC::new(b"stsd");

pub const SAMPLE_ENTRY_AVC1: FourCC = FourCC::new(b"avc1");
pub const SAMPLE_ENTRY_AVC3: FourCC = FourCC::new(b"avc3");
pub const SAMPLE_ENTRY_HVC1: FourCC = FourCC::new(b"hvc1");
pub const SAMPLE_ENTRY_HEV1: FourCC = FourCC::new(b"hev1");
pub const SAMPLE_ENTRY_MP4V: FourCC = FourCC::new(b"mp4v");
pub const SAMPLE_ENTRY_MP4A: FourCC = FourCC::new(b"mp4a");

pub const AVCC: FourCC = FourCC::new(b"avcC");

/// Width of the `compressorname` field in a visual sample entry.
const COMPRESSOR_NAME_SIZE: usize = 32;

pub fn is_visual_sample_entry(entry_type: FourCC) -> bool {
    matches!(
        entry_type,
        SAMPLE_ENTRY_AVC1 | SAMPLE_ENTRY_AVC3 | SAMPLE_ENTRY_HVC1 | SAMPLE_ENTRY_HEV1 | SAMPLE_ENTRY_MP4V
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleEntry {
    pub entry_type: FourCC,
    pub data_reference_index: u16,
    pub data: SampleEntryData,
}

impl SampleEntry {
    /// Serialized entry, including its size and type header.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend([0u8; 6]);
        body.extend(self.data_reference_index.to_be_bytes());
        match &self.data {
            SampleEntryData::Visual(visual) => body.extend(serializer::visual_sample_entry(visual)),
            SampleEntryData::Other(data) => body.extend(data),
        }

        let mut data = Vec::with_capacity(body.len() + 8);
        data.extend(be_u32(body.len() as u32 + 8));
        data.extend(self.entry_type.into_bytes());
        data.extend(body);
        data
    }

    pub fn avc_config(&self) -> Option<&AvcDecoderConfiguration> {
        match &self.data {
            SampleEntryData::Visual(visual) => visual.avc_config(),
            SampleEntryData::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SampleEntryData {
    Visual(VisualSampleEntry),
    Other(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct VisualSampleEntry {
    #[builder(default)]
    pub version: u16,
    #[builder(default)]
    pub revision_level: u16,
    #[builder(default)]
    pub vendor: [u8; 4],
    #[builder(default)]
    pub temporal_quality: u32,
    #[builder(default)]
    pub spatial_quality: u32,
    pub width: u16,
    pub height: u16,
    /// Pixels per inch, 16.16 fixed point
    #[builder(default = 72.0)]
    pub horizontal_resolution: f32,
    #[builder(default = 72.0)]
    pub vertical_resolution: f32,
    #[builder(default)]
    pub data_size: u32,
    #[builder(default = 1)]
    pub frame_count: u16,
    #[builder(into, default)]
    pub compressor_name: String,
    #[builder(default = 24)]
    pub depth: u16,
    #[builder(default = -1)]
    pub color_table_id: i16,
    #[builder(default)]
    pub extensions: Vec<VisualExtension>,
}

impl VisualSampleEntry {
    pub fn avc_config(&self) -> Option<&AvcDecoderConfiguration> {
        self.extensions.iter().find_map(|ext| match ext {
            VisualExtension::Avcc(avcc) => Some(avcc),
            VisualExtension::Unknown { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VisualExtension {
    Avcc(AvcDecoderConfiguration),
    Unknown { ext_type: FourCC, data: Vec<u8> },
}

impl VisualExtension {
    pub fn ext_type(&self) -> FourCC {
        match self {
            VisualExtension::Avcc(_) => AVCC,
            VisualExtension::Unknown { ext_type, .. } => *ext_type,
        }
    }
}

/// AVCDecoderConfigurationRecord (ISO/IEC 14496-15 5.3.3.1)
#[derive(Debug, Clone, PartialEq, bon::Builder)]
pub struct AvcDecoderConfiguration {
    #[builder(default = 1)]
    pub configuration_version: u8,
    pub profile_indication: u8,
    pub profile_compatibility: u8,
    pub level_indication: u8,
    /// Size of the NAL unit length prefix in samples
    #[builder(default = 4)]
    pub length_size: u8,
    #[builder(default)]
    pub sequence_parameter_sets: Vec<Vec<u8>>,
    #[builder(default)]
    pub picture_parameter_sets: Vec<Vec<u8>>,
    /// High profile chroma / bit depth extension, kept as read
    #[builder(default)]
    pub trailing_data: Vec<u8>,
}

#[derive(Default, Debug, Clone, PartialEq, Deref, DerefMut)]
pub struct SampleEntries(Vec<SampleEntry>);

impl From<Vec<SampleEntry>> for SampleEntries {
    fn from(entries: Vec<SampleEntry>) -> Self {
        Self(entries)
    }
}

/// Sample Description Atom (stsd)
#[derive(Default, Debug, Clone, PartialEq)]
pub struct SampleDescriptionTableAtom {
    pub version: u8,
    pub flags: [u8; 3],
    pub entries: SampleEntries,
}

impl From<Vec<SampleEntry>> for SampleDescriptionTableAtom {
    fn from(entries: Vec<SampleEntry>) -> Self {
        SampleDescriptionTableAtom {
            version: 0,
            flags: [0u8; 3],
            entries: entries.into(),
        }
    }
}

impl ParseAtomData for SampleDescriptionTableAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        assert_atom_type!(atom_type, STSD);
        parser::parse_stsd_data(input)
    }
}

impl SerializeAtom for SampleDescriptionTableAtom {
    fn atom_type(&self) -> FourCC {
        STSD
    }

    fn into_body_bytes(self) -> Vec<u8> {
        let mut data = Vec::new();
        data.push(self.version);
        data.extend(self.flags);
        data.extend(be_u32(self.entries.len() as u32));
        for entry in self.entries.iter() {
            data.extend(entry.to_bytes());
        }
        data
    }
}

mod serializer {
    use super::*;

    pub fn visual_sample_entry(visual: &VisualSampleEntry) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend(visual.version.to_be_bytes());
        data.extend(visual.revision_level.to_be_bytes());
        data.extend(visual.vendor);
        data.extend(visual.temporal_quality.to_be_bytes());
        data.extend(visual.spatial_quality.to_be_bytes());
        data.extend(visual.width.to_be_bytes());
        data.extend(visual.height.to_be_bytes());
        data.extend(fixed_point_16x16(visual.horizontal_resolution));
        data.extend(fixed_point_16x16(visual.vertical_resolution));
        data.extend(visual.data_size.to_be_bytes());
        data.extend(visual.frame_count.to_be_bytes());
        data.extend(pascal_string(&visual.compressor_name, COMPRESSOR_NAME_SIZE));
        data.extend(visual.depth.to_be_bytes());
        data.extend(visual.color_table_id.to_be_bytes());
        for ext in &visual.extensions {
            let body = match ext {
                VisualExtension::Avcc(avcc) => avc_decoder_configuration(avcc),
                VisualExtension::Unknown { data, .. } => data.clone(),
            };
            data.extend(be_u32(body.len() as u32 + 8));
            data.extend(ext.ext_type().into_bytes());
            data.extend(body);
        }
        data
    }

    pub fn avc_decoder_configuration(avcc: &AvcDecoderConfiguration) -> Vec<u8> {
        let mut data = vec![
            avcc.configuration_version,
            avcc.profile_indication,
            avcc.profile_compatibility,
            avcc.level_indication,
            0b1111_1100 | (avcc.length_size.saturating_sub(1) & 0b11),
            0b1110_0000 | (avcc.sequence_parameter_sets.len() as u8 & 0b1_1111),
        ];
        for sps in &avcc.sequence_parameter_sets {
            data.extend((sps.len() as u16).to_be_bytes());
            data.extend(sps);
        }
        data.push(avcc.picture_parameter_sets.len() as u8);
        for pps in &avcc.picture_parameter_sets {
            data.extend((pps.len() as u16).to_be_bytes());
            data.extend(pps);
        }
        data.extend(&avcc.trailing_data);
        data
    }
}

mod parser {
    use winnow::{
        binary::{be_i16, be_u16, be_u32, length_and_then, length_repeat, u8},
        combinator::{repeat, seq, trace},
        error::StrContext,
        ModalResult, Parser,
    };

    use super::*;
    use crate::atom::util::parser::{
        byte_array, combinators::inclusive_length_and_then, fixed_point_16x16, flags3, fourcc,
        rest_vec, stream, version, Stream,
    };

    pub fn parse_stsd_data(input: &[u8]) -> Result<SampleDescriptionTableAtom, crate::ParseError> {
        parse_stsd_data_inner
            .parse(stream(input))
            .map_err(crate::ParseError::from_winnow)
    }

    fn parse_stsd_data_inner(input: &mut Stream<'_>) -> ModalResult<SampleDescriptionTableAtom> {
        trace(
            "stsd",
            seq!(SampleDescriptionTableAtom {
                version: version.verify(|v| *v == 0),
                flags: flags3,
                entries: length_repeat(be_u32, sample_entry)
                    .map(SampleEntries)
                    .context(StrContext::Label("entries")),
            })
            .context(StrContext::Label("stsd")),
        )
        .parse_next(input)
    }

    fn sample_entry(input: &mut Stream<'_>) -> ModalResult<SampleEntry> {
        trace(
            "sample_entry",
            inclusive_length_and_then(
                be_u32,
                seq!(SampleEntry {
                    entry_type: fourcc.context(StrContext::Label("entry_type")),
                    _: byte_array::<6>.context(StrContext::Label("reserved")),
                    data_reference_index: be_u16.context(StrContext::Label("data_reference_index")),
                    data: sample_entry_data(entry_type).context(StrContext::Label("data")),
                }),
            ),
        )
        .parse_next(input)
    }

    fn sample_entry_data(
        entry_type: FourCC,
    ) -> impl FnMut(&mut Stream<'_>) -> ModalResult<SampleEntryData> {
        move |input: &mut Stream<'_>| {
            if is_visual_sample_entry(entry_type) {
                visual_sample_entry
                    .map(SampleEntryData::Visual)
                    .parse_next(input)
            } else {
                rest_vec.map(SampleEntryData::Other).parse_next(input)
            }
        }
    }

    fn visual_sample_entry(input: &mut Stream<'_>) -> ModalResult<VisualSampleEntry> {
        trace(
            "visual_sample_entry",
            seq!(VisualSampleEntry {
                version: be_u16.context(StrContext::Label("version")),
                revision_level: be_u16.context(StrContext::Label("revision_level")),
                vendor: byte_array.context(StrContext::Label("vendor")),
                temporal_quality: be_u32.context(StrContext::Label("temporal_quality")),
                spatial_quality: be_u32.context(StrContext::Label("spatial_quality")),
                width: be_u16.context(StrContext::Label("width")),
                height: be_u16.context(StrContext::Label("height")),
                horizontal_resolution: fixed_point_16x16
                    .context(StrContext::Label("horizontal_resolution")),
                vertical_resolution: fixed_point_16x16
                    .context(StrContext::Label("vertical_resolution")),
                data_size: be_u32.context(StrContext::Label("data_size")),
                frame_count: be_u16.context(StrContext::Label("frame_count")),
                compressor_name: compressor_name.context(StrContext::Label("compressor_name")),
                depth: be_u16.context(StrContext::Label("depth")),
                color_table_id: be_i16.context(StrContext::Label("color_table_id")),
                extensions: repeat(0.., visual_extension).context(StrContext::Label("extensions")),
            }),
        )
        .parse_next(input)
    }

    fn compressor_name(input: &mut Stream<'_>) -> ModalResult<String> {
        byte_array::<COMPRESSOR_NAME_SIZE>
            .map(|data| {
                let len = usize::from(data[0]).min(COMPRESSOR_NAME_SIZE - 1);
                String::from_utf8_lossy(&data[1..=len]).into_owned()
            })
            .parse_next(input)
    }

    fn visual_extension(input: &mut Stream<'_>) -> ModalResult<VisualExtension> {
        trace(
            "visual_extension",
            inclusive_length_and_then(be_u32, (fourcc, rest_vec)).map(|(ext_type, data)| {
                if ext_type == AVCC {
                    if let Ok(avcc) = avc_decoder_configuration.parse(stream(&data)) {
                        return VisualExtension::Avcc(avcc);
                    }
                }
                VisualExtension::Unknown { ext_type, data }
            }),
        )
        .parse_next(input)
    }

    fn parameter_set(input: &mut Stream<'_>) -> ModalResult<Vec<u8>> {
        length_and_then(be_u16, rest_vec).parse_next(input)
    }

    fn avc_decoder_configuration(input: &mut Stream<'_>) -> ModalResult<AvcDecoderConfiguration> {
        trace(
            "avcC",
            seq!(AvcDecoderConfiguration {
                configuration_version: u8.verify(|v| *v == 1),
                profile_indication: u8,
                profile_compatibility: u8,
                level_indication: u8,
                length_size: u8.map(|v| (v & 0b11) + 1),
                sequence_parameter_sets: length_repeat(u8.map(|v| v & 0b1_1111), parameter_set)
                    .context(StrContext::Label("sequence_parameter_sets")),
                picture_parameter_sets: length_repeat(u8, parameter_set)
                    .context(StrContext::Label("picture_parameter_sets")),
                trailing_data: rest_vec,
            }),
        )
        .parse_next(input)
    }
}
