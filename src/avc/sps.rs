/*!
 * Sequence and picture parameter sets, and the slice header fields needed to order pictures.
 */

use super::{
    bitstream::{remove_emulation_prevention, BitReader},
    nal::NalHeader,
    AvcError, AvcErrorKind,
};
use crate::access_unit::SequenceParameterSet;

/// Profiles whose SPS carries chroma format, bit depth and scaling matrices.
const HIGH_PROFILES: [u8; 12] = [100, 110, 122, 244, 44, 83, 86, 118, 128, 138, 139, 134];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sps {
    pub id: u8,
    pub profile_idc: u8,
    pub constraint_flags: u8,
    pub level_idc: u8,
    pub chroma_format_idc: u32,
    pub separate_colour_plane: bool,
    pub bit_depth_luma: u8,
    pub bit_depth_chroma: u8,
    pub log2_max_frame_num: u8,
    pub pic_order_cnt_type: u32,
    pub log2_max_pic_order_cnt_lsb: u8,
    pub frame_mbs_only: bool,
    pub width: u32,
    pub height: u32,
}

impl Sps {
    /// Parses an SPS NAL unit, header byte included.
    pub fn parse(nal: &[u8]) -> Result<Self, AvcError> {
        let rbsp = rbsp(nal)?;
        let mut reader = BitReader::new(&rbsp);

        let profile_idc = reader.read_bits(8)? as u8;
        let constraint_flags = reader.read_bits(8)? as u8;
        let level_idc = reader.read_bits(8)? as u8;
        let id = parameter_set_id(reader.read_ue()?, 31, "seq_parameter_set_id")?;

        let mut chroma_format_idc = 1;
        let mut separate_colour_plane = false;
        let mut bit_depth_luma = 8;
        let mut bit_depth_chroma = 8;
        if HIGH_PROFILES.contains(&profile_idc) {
            chroma_format_idc = reader.read_ue()?;
            if chroma_format_idc == 3 {
                separate_colour_plane = reader.read_flag()?;
            }
            bit_depth_luma = 8 + small(reader.read_ue()?, "bit_depth_luma_minus8")?;
            bit_depth_chroma = 8 + small(reader.read_ue()?, "bit_depth_chroma_minus8")?;
            // qpprime_y_zero_transform_bypass_flag
            reader.skip_bits(1)?;
            if reader.read_flag()? {
                let count = if chroma_format_idc == 3 { 12 } else { 8 };
                for i in 0..count {
                    if reader.read_flag()? {
                        skip_scaling_list(&mut reader, if i < 6 { 16 } else { 64 })?;
                    }
                }
            }
        }

        let log2_max_frame_num = 4 + small(reader.read_ue()?, "log2_max_frame_num_minus4")?;
        let pic_order_cnt_type = reader.read_ue()?;
        let mut log2_max_pic_order_cnt_lsb = 0;
        match pic_order_cnt_type {
            0 => {
                log2_max_pic_order_cnt_lsb =
                    4 + small(reader.read_ue()?, "log2_max_pic_order_cnt_lsb_minus4")?;
            }
            1 => {
                // delta_pic_order_always_zero_flag
                reader.skip_bits(1)?;
                reader.read_se()?;
                reader.read_se()?;
                let cycle = reader.read_ue()?;
                for _ in 0..cycle.min(255) {
                    reader.read_se()?;
                }
            }
            2 => {}
            other => {
                return Err(AvcError::new(
                    AvcErrorKind::InvalidValue,
                    format!("pic_order_cnt_type {other}"),
                ))
            }
        }

        // max_num_ref_frames
        reader.read_ue()?;
        // gaps_in_frame_num_value_allowed_flag
        reader.skip_bits(1)?;
        let width_in_mbs = reader.read_ue()? + 1;
        let height_in_map_units = reader.read_ue()? + 1;
        let frame_mbs_only = reader.read_flag()?;
        if !frame_mbs_only {
            // mb_adaptive_frame_field_flag
            reader.skip_bits(1)?;
        }
        // direct_8x8_inference_flag
        reader.skip_bits(1)?;
        let (crop_left, crop_right, crop_top, crop_bottom) = if reader.read_flag()? {
            (
                reader.read_ue()?,
                reader.read_ue()?,
                reader.read_ue()?,
                reader.read_ue()?,
            )
        } else {
            (0, 0, 0, 0)
        };

        let frame_height_factor = if frame_mbs_only { 1 } else { 2 };
        let width = (width_in_mbs * 16).saturating_sub((crop_left + crop_right) * 2);
        let height = (frame_height_factor * height_in_map_units * 16)
            .saturating_sub((crop_top + crop_bottom) * 2);

        Ok(Self {
            id,
            profile_idc,
            constraint_flags,
            level_idc,
            chroma_format_idc,
            separate_colour_plane,
            bit_depth_luma,
            bit_depth_chroma,
            log2_max_frame_num,
            pic_order_cnt_type,
            log2_max_pic_order_cnt_lsb,
            frame_mbs_only,
            width,
            height,
        })
    }

    pub fn to_parameter_set(&self, raw: &[u8]) -> SequenceParameterSet {
        SequenceParameterSet {
            id: self.id,
            profile_idc: self.profile_idc,
            constraint_flags: self.constraint_flags,
            level_idc: self.level_idc,
            width: self.width,
            height: self.height,
            raw: raw.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pps {
    pub id: u8,
    pub sps_id: u8,
    pub bottom_field_pic_order_in_frame_present: bool,
}

impl Pps {
    pub fn parse(nal: &[u8]) -> Result<Self, AvcError> {
        let rbsp = rbsp(nal)?;
        let mut reader = BitReader::new(&rbsp);
        let id = parameter_set_id(reader.read_ue()?, 255, "pic_parameter_set_id")?;
        let sps_id = parameter_set_id(reader.read_ue()?, 31, "seq_parameter_set_id")?;
        // entropy_coding_mode_flag
        reader.skip_bits(1)?;
        let bottom_field_pic_order_in_frame_present = reader.read_flag()?;
        Ok(Self {
            id,
            sps_id,
            bottom_field_pic_order_in_frame_present,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceHeader {
    pub first_mb_in_slice: u32,
    pub slice_type: u32,
    pub pps_id: u8,
    pub frame_num: u32,
    pub field_pic: bool,
    pub idr_pic_id: Option<u32>,
    pub pic_order_cnt_lsb: Option<u32>,
    pub delta_pic_order_cnt_bottom: i32,
}

impl SliceHeader {
    /// Parses the leading slice header fields, up to the picture order count.
    ///
    /// `lookup` resolves a PPS id to the PPS and the SPS it refers to.
    pub fn parse<'a>(
        nal: &[u8],
        lookup: impl FnOnce(u8) -> Option<(&'a Pps, &'a Sps)>,
    ) -> Result<Self, AvcError> {
        let header = NalHeader::parse(nal)
            .ok_or_else(|| AvcError::new(AvcErrorKind::Truncated, "empty NAL unit"))?;
        let rbsp = rbsp(nal)?;
        let mut reader = BitReader::new(&rbsp);

        let first_mb_in_slice = reader.read_ue()?;
        let slice_type = reader.read_ue()?;
        let pps_id = parameter_set_id(reader.read_ue()?, 255, "pic_parameter_set_id")?;
        let (pps, sps) = lookup(pps_id).ok_or_else(|| {
            AvcError::new(
                AvcErrorKind::MissingParameterSet,
                format!("slice refers to PPS {pps_id}"),
            )
        })?;

        if sps.separate_colour_plane {
            // colour_plane_id
            reader.skip_bits(2)?;
        }
        let frame_num = reader.read_bits(sps.log2_max_frame_num)?;
        let mut field_pic = false;
        if !sps.frame_mbs_only {
            field_pic = reader.read_flag()?;
            if field_pic {
                // bottom_field_flag
                reader.skip_bits(1)?;
            }
        }
        let idr_pic_id = header.is_idr().then(|| reader.read_ue()).transpose()?;

        let mut pic_order_cnt_lsb = None;
        let mut delta_pic_order_cnt_bottom = 0;
        if sps.pic_order_cnt_type == 0 {
            pic_order_cnt_lsb = Some(reader.read_bits(sps.log2_max_pic_order_cnt_lsb)?);
            if pps.bottom_field_pic_order_in_frame_present && !field_pic {
                delta_pic_order_cnt_bottom = reader.read_se()?;
            }
        }

        Ok(Self {
            first_mb_in_slice,
            slice_type,
            pps_id,
            frame_num,
            field_pic,
            idr_pic_id,
            pic_order_cnt_lsb,
            delta_pic_order_cnt_bottom,
        })
    }
}

/// The RBSP following the NAL header byte.
fn rbsp(nal: &[u8]) -> Result<Vec<u8>, AvcError> {
    match nal.get(1..) {
        Some(payload) if !payload.is_empty() => Ok(remove_emulation_prevention(payload)),
        _ => Err(AvcError::new(AvcErrorKind::Truncated, "NAL unit has no payload")),
    }
}

fn parameter_set_id(value: u32, max: u32, name: &str) -> Result<u8, AvcError> {
    if value > max {
        return Err(AvcError::new(
            AvcErrorKind::InvalidValue,
            format!("{name} {value} out of range"),
        ));
    }
    Ok(value as u8)
}

fn small(value: u32, name: &str) -> Result<u8, AvcError> {
    if value > 12 {
        return Err(AvcError::new(
            AvcErrorKind::InvalidValue,
            format!("{name} {value} out of range"),
        ));
    }
    Ok(value as u8)
}

fn skip_scaling_list(reader: &mut BitReader<'_>, size: usize) -> Result<(), AvcError> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = reader.read_se()?;
            next_scale = (last_scale + delta_scale + 256) % 256;
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::avc::bitstream::tests::BitWriter;

    /// Baseline SPS with POC type 0 for a `width` x `height` picture (multiples of 16).
    pub(crate) fn baseline_sps(width: u32, height: u32, poc_type: u32) -> Vec<u8> {
        let mut writer = BitWriter::default();
        writer
            .bits(66, 8) // profile_idc
            .bits(0xc0, 8) // constraint flags
            .bits(30, 8) // level_idc
            .ue(0) // seq_parameter_set_id
            .ue(0) // log2_max_frame_num_minus4
            .ue(poc_type);
        if poc_type == 0 {
            writer.ue(0); // log2_max_pic_order_cnt_lsb_minus4
        }
        writer
            .ue(1) // max_num_ref_frames
            .bit(false)
            .ue(width / 16 - 1)
            .ue(height / 16 - 1)
            .bit(true) // frame_mbs_only_flag
            .bit(true) // direct_8x8_inference_flag
            .bit(false) // frame_cropping_flag
            .bit(false); // vui_parameters_present_flag
        let mut nal = vec![0x67];
        nal.extend(writer.finish());
        nal
    }

    pub(crate) fn baseline_pps() -> Vec<u8> {
        let mut writer = BitWriter::default();
        writer.ue(0).ue(0).bit(false).bit(false);
        let mut nal = vec![0x68];
        nal.extend(writer.finish());
        nal
    }

    #[test]
    fn test_parse_baseline_sps() {
        let sps = Sps::parse(&baseline_sps(320, 240, 0)).unwrap();
        assert_eq!(sps.profile_idc, 66);
        assert_eq!(sps.constraint_flags, 0xc0);
        assert_eq!(sps.level_idc, 30);
        assert_eq!((sps.width, sps.height), (320, 240));
        assert_eq!(sps.pic_order_cnt_type, 0);
        assert_eq!(sps.log2_max_pic_order_cnt_lsb, 4);
        assert_eq!(sps.log2_max_frame_num, 4);
    }

    #[test]
    fn test_parse_high_profile_sps_with_cropping() {
        let mut writer = BitWriter::default();
        writer
            .bits(100, 8)
            .bits(0, 8)
            .bits(40, 8)
            .ue(1) // seq_parameter_set_id
            .ue(1) // chroma_format_idc
            .ue(0)
            .ue(0)
            .bit(false)
            .bit(false) // seq_scaling_matrix_present_flag
            .ue(0)
            .ue(2) // pic_order_cnt_type
            .ue(4)
            .bit(false)
            .ue(119) // 1920
            .ue(67) // 1088
            .bit(true)
            .bit(true)
            .bit(true) // frame_cropping_flag
            .ue(0)
            .ue(0)
            .ue(0)
            .ue(4)
            .bit(false);
        let mut nal = vec![0x67];
        nal.extend(writer.finish());

        let sps = Sps::parse(&nal).unwrap();
        assert_eq!(sps.id, 1);
        assert_eq!((sps.width, sps.height), (1920, 1080));
        assert_eq!(sps.pic_order_cnt_type, 2);
        assert_eq!(sps.bit_depth_luma, 8);
    }

    #[test]
    fn test_slice_header_requires_pps() {
        let sps = Sps::parse(&baseline_sps(16, 16, 0)).unwrap();
        let pps = Pps::parse(&baseline_pps()).unwrap();

        let mut writer = BitWriter::default();
        writer.ue(0).ue(7).ue(0).bits(3, 4).ue(0).bits(6, 4);
        let mut nal = vec![0x65];
        nal.extend(writer.finish());

        let slice = SliceHeader::parse(&nal, |id| (id == 0).then_some((&pps, &sps))).unwrap();
        assert_eq!(slice.first_mb_in_slice, 0);
        assert_eq!(slice.frame_num, 3);
        assert_eq!(slice.idr_pic_id, Some(0));
        assert_eq!(slice.pic_order_cnt_lsb, Some(6));

        let err = SliceHeader::parse(&nal, |_| None).unwrap_err();
        assert_eq!(err.kind(), AvcErrorKind::MissingParameterSet);
    }
}
