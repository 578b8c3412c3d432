use crate::atom::util::parser::{FIXED_POINT_16X16_SCALE, FIXED_POINT_8X8_SCALE};

pub fn be_u32(value: u32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Serializes `value` as 32 bits for version 0 atoms and 64 bits for version 1 atoms.
pub fn be_u32_or_u64(version: u8, value: u64) -> Vec<u8> {
    match version {
        0 => u32::try_from(value)
            .expect("value must fit in u32 for version 0")
            .to_be_bytes()
            .to_vec(),
        _ => value.to_be_bytes().to_vec(),
    }
}

pub fn fixed_point_16x16(val: f32) -> Vec<u8> {
    let fixed = (val * FIXED_POINT_16X16_SCALE) as u32;
    fixed.to_be_bytes().to_vec()
}

pub fn fixed_point_8x8(val: f32) -> Vec<u8> {
    let fixed = (val * FIXED_POINT_8X8_SCALE) as u16;
    fixed.to_be_bytes().to_vec()
}

pub fn pascal_string(value: &str, width: usize) -> Vec<u8> {
    let bytes = value.as_bytes();
    let len = bytes.len().min(width - 1);
    let mut out = Vec::with_capacity(width);
    out.push(len as u8);
    out.extend_from_slice(&bytes[..len]);
    out.resize(width, 0);
    out
}
