/*!
 * NAL unit headers and Annex-B start code splitting.
 */

pub const NAL_SLICE: u8 = 1;
pub const NAL_SLICE_IDR: u8 = 5;
pub const NAL_SEI: u8 = 6;
pub const NAL_SPS: u8 = 7;
pub const NAL_PPS: u8 = 8;
pub const NAL_AUD: u8 = 9;
pub const NAL_END_OF_SEQUENCE: u8 = 10;
pub const NAL_END_OF_STREAM: u8 = 11;
pub const NAL_FILLER: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalHeader {
    pub nal_ref_idc: u8,
    pub nal_unit_type: u8,
}

impl NalHeader {
    pub fn parse(nal: &[u8]) -> Option<Self> {
        let byte = *nal.first()?;
        Some(Self {
            nal_ref_idc: (byte >> 5) & 0x3,
            nal_unit_type: byte & 0x1f,
        })
    }

    /// Coded slice of a picture (types 1 to 5).
    pub fn is_vcl(&self) -> bool {
        (NAL_SLICE..=NAL_SLICE_IDR).contains(&self.nal_unit_type)
    }

    pub fn is_idr(&self) -> bool {
        self.nal_unit_type == NAL_SLICE_IDR
    }
}

/// Finds the next `00 00 01` at or after `from`, returning its position.
pub fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(3)
        .position(|window| window == [0, 0, 1])
        .map(|position| from + position)
}

/// Drops the `trailing_zero_8bits` a 4 byte start code leaves at the end of the previous unit.
pub fn trim_trailing_zeros(nal: &[u8]) -> &[u8] {
    let end = nal
        .iter()
        .rposition(|byte| *byte != 0)
        .map_or(0, |position| position + 1);
    &nal[..end]
}

/// Incremental Annex-B splitter.
#[derive(Debug, Default)]
pub struct AnnexBSplitter {
    buffer: Vec<u8>,
    /// Start of the payload of the unit being accumulated, once a start code was seen.
    unit_start: Option<usize>,
    scan_from: usize,
}

impl AnnexBSplitter {
    /// Appends `data` and returns the NAL units it completed.
    ///
    /// At `end_of_stream` the unit still being accumulated is returned too.
    pub fn push(&mut self, data: &[u8], end_of_stream: bool) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(data);
        let mut units = Vec::new();

        while let Some(position) = find_start_code(&self.buffer, self.scan_from) {
            if let Some(start) = self.unit_start {
                let unit = trim_trailing_zeros(&self.buffer[start..position]);
                if !unit.is_empty() {
                    units.push(unit.to_vec());
                }
            }
            self.unit_start = Some(position + 3);
            self.scan_from = position + 3;
        }

        if end_of_stream {
            if let Some(start) = self.unit_start.take() {
                let unit = trim_trailing_zeros(&self.buffer[start..]);
                if !unit.is_empty() {
                    units.push(unit.to_vec());
                }
            }
            self.buffer.clear();
            self.scan_from = 0;
            return units;
        }

        // keep the unfinished unit and the bytes that may begin a start code
        let keep_from = match self.unit_start {
            Some(start) => start,
            None => self.buffer.len().saturating_sub(2),
        };
        self.buffer.drain(..keep_from);
        self.unit_start = self.unit_start.map(|start| start - keep_from);
        self.scan_from = self.buffer.len().saturating_sub(2).max(self.unit_start.unwrap_or(0));
        units
    }
}
