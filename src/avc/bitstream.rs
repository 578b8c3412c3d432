use super::{AvcError, AvcErrorKind};

/// Strips the `0x03` bytes inserted after every `00 00` pair, turning a NAL payload into its RBSP.
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut zeros = 0;
    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
        rbsp.push(byte);
    }
    rbsp
}

/// MSB-first reader over an RBSP.
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_offset: usize,
    bit_offset: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    pub fn read_bit(&mut self) -> Result<u8, AvcError> {
        let byte = self
            .data
            .get(self.byte_offset)
            .ok_or_else(|| AvcError::new(AvcErrorKind::Truncated, "read past the end of the RBSP"))?;
        let bit = (byte >> (7 - self.bit_offset)) & 1;
        self.bit_offset += 1;
        if self.bit_offset == 8 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }
        Ok(bit)
    }

    pub fn read_flag(&mut self) -> Result<bool, AvcError> {
        Ok(self.read_bit()? == 1)
    }

    /// Reads `n` bits, `n <= 32`.
    pub fn read_bits(&mut self, n: u8) -> Result<u32, AvcError> {
        debug_assert!(n <= 32);
        let mut value = 0u64;
        for _ in 0..n {
            value = (value << 1) | u64::from(self.read_bit()?);
        }
        Ok(value as u32)
    }

    pub fn skip_bits(&mut self, n: usize) -> Result<(), AvcError> {
        for _ in 0..n {
            self.read_bit()?;
        }
        Ok(())
    }

    /// Unsigned Exp-Golomb `ue(v)`.
    pub fn read_ue(&mut self) -> Result<u32, AvcError> {
        let mut leading_zeros = 0u8;
        while self.read_bit()? == 0 {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(AvcError::new(
                    AvcErrorKind::InvalidValue,
                    "Exp-Golomb code longer than 32 bits",
                ));
            }
        }
        if leading_zeros == 0 {
            return Ok(0);
        }
        let suffix = u64::from(self.read_bits(leading_zeros)?);
        let value = (1u64 << leading_zeros) - 1 + suffix;
        u32::try_from(value)
            .map_err(|_| AvcError::new(AvcErrorKind::InvalidValue, "Exp-Golomb value overflows"))
    }

    /// Signed Exp-Golomb `se(v)`.
    pub fn read_se(&mut self) -> Result<i32, AvcError> {
        let ue = i64::from(self.read_ue()?);
        let value = (ue + 1) / 2;
        Ok(if ue % 2 == 0 { -value } else { value } as i32)
    }
}
