/*!
 * The interface between the track builder and an elementary-stream parser.
 */

use std::collections::BTreeMap;

/// One coded frame as produced by an [`AccessUnitParser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    /// Sub-units (NAL units) making up the frame, without start codes.
    pub units: Vec<Vec<u8>>,
    pub decode_order: u32,
    /// Position in presentation order within the group of pictures, 0 at each key frame.
    pub display_order: u32,
    pub is_key_frame: bool,
}

impl AccessUnit {
    /// Total payload size once every sub-unit gets a 4 byte length prefix.
    pub fn length_prefixed_size(&self) -> usize {
        self.units.iter().map(|unit| 4 + unit.len()).sum()
    }

    /// Sub-units in the length-prefixed framing used inside MP4 samples.
    pub fn to_length_prefixed(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.length_prefixed_size());
        for unit in &self.units {
            data.extend_from_slice(&(unit.len() as u32).to_be_bytes());
            data.extend_from_slice(unit);
        }
        data
    }
}

#[derive(Debug, Default)]
pub struct FeedResult {
    pub bytes_consumed: usize,
    pub access_units: Vec<AccessUnit>,
}

/// A parser that turns raw elementary-stream bytes into access units.
pub trait AccessUnitParser {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Feeds `data` to the parser. `end_of_stream` flushes whatever is buffered.
    ///
    /// Bytes that weren't consumed must be fed again.
    fn feed(&mut self, data: &[u8], end_of_stream: bool) -> Result<FeedResult, Self::Error>;

    fn parameter_sets(&self) -> &ParameterSets;
}

/// Decoded sequence parameter set fields the track builder needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceParameterSet {
    pub id: u8,
    pub profile_idc: u8,
    pub constraint_flags: u8,
    pub level_idc: u8,
    pub width: u32,
    pub height: u32,
    /// The NAL unit as it appeared in the stream (with emulation prevention bytes).
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureParameterSet {
    pub id: u8,
    pub sps_id: u8,
    pub raw: Vec<u8>,
}

/// Parameter sets seen so far, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ParameterSets {
    pub sps: BTreeMap<u8, SequenceParameterSet>,
    pub pps: BTreeMap<u8, PictureParameterSet>,
}

impl ParameterSets {
    /// The sequence parameter set with the lowest id.
    pub fn first_sps(&self) -> Option<&SequenceParameterSet> {
        self.sps.values().next()
    }

    pub fn is_empty(&self) -> bool {
        self.sps.is_empty() && self.pps.is_empty()
    }

    pub fn raw_sps(&self) -> impl Iterator<Item = &[u8]> {
        self.sps.values().map(|sps| sps.raw.as_slice())
    }

    pub fn raw_pps(&self) -> impl Iterator<Item = &[u8]> {
        self.pps.values().map(|pps| pps.raw.as_slice())
    }
}
