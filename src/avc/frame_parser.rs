use std::collections::BTreeMap;
use tracing::{trace, warn};

use super::{
    nal::{AnnexBSplitter, NalHeader, NAL_AUD, NAL_FILLER, NAL_PPS, NAL_SEI, NAL_SPS},
    sps::{Pps, SliceHeader, Sps},
    AvcError,
};
use crate::access_unit::{
    AccessUnit, AccessUnitParser, FeedResult, ParameterSets, PictureParameterSet,
};

/// Groups the NAL units of an Annex-B stream into access units.
///
/// Parameter sets and access unit delimiters are kept out of the access units; they are available
/// through [`AccessUnitParser::parameter_sets`].
#[derive(Debug, Default)]
pub struct AvcFrameParser {
    splitter: AnnexBSplitter,
    sps: BTreeMap<u8, Sps>,
    pps: BTreeMap<u8, Pps>,
    parameter_sets: ParameterSets,
    pending: PendingAccessUnit,
    next_decode_order: u32,
    poc: PocState,
    warned_poc_type_1: bool,
}

#[derive(Debug, Default)]
struct PendingAccessUnit {
    units: Vec<Vec<u8>>,
    first_slice: Option<FirstSlice>,
    is_key_frame: bool,
}

/// What the first slice of an access unit says about its picture order.
#[derive(Debug, Clone, Copy)]
struct FirstSlice {
    nal_ref_idc: u8,
    is_idr: bool,
    pic_order_cnt_type: u32,
    log2_max_pic_order_cnt_lsb: u8,
    pic_order_cnt_lsb: Option<u32>,
}

#[derive(Debug, Default)]
struct PocState {
    prev_msb: i64,
    prev_lsb: i64,
    idr_poc: i64,
    pictures_since_idr: u32,
}

impl AvcFrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn process_nal(&mut self, nal: Vec<u8>, out: &mut Vec<AccessUnit>) -> Result<(), AvcError> {
        let Some(header) = NalHeader::parse(&nal) else {
            return Ok(());
        };

        match header.nal_unit_type {
            NAL_SPS => {
                self.end_access_unit(out);
                let sps = Sps::parse(&nal)?;
                if sps.pic_order_cnt_type == 1 && !self.warned_poc_type_1 {
                    warn!(sps_id = sps.id, "POC type 1 not supported, using decode order as display order");
                    self.warned_poc_type_1 = true;
                }
                trace!(sps_id = sps.id, width = sps.width, height = sps.height, "SPS");
                self.parameter_sets
                    .sps
                    .insert(sps.id, sps.to_parameter_set(&nal));
                self.sps.insert(sps.id, sps);
            }
            NAL_PPS => {
                self.end_access_unit(out);
                let pps = Pps::parse(&nal)?;
                trace!(pps_id = pps.id, sps_id = pps.sps_id, "PPS");
                self.parameter_sets.pps.insert(
                    pps.id,
                    PictureParameterSet {
                        id: pps.id,
                        sps_id: pps.sps_id,
                        raw: nal,
                    },
                );
                self.pps.insert(pps.id, pps);
            }
            NAL_AUD => self.end_access_unit(out),
            NAL_SEI => {
                self.end_access_unit(out);
                self.pending.units.push(nal);
            }
            NAL_FILLER => {}
            _ if header.is_vcl() => {
                let slice = SliceHeader::parse(&nal, |pps_id| {
                    let pps = self.pps.get(&pps_id)?;
                    let sps = self.sps.get(&pps.sps_id)?;
                    Some((pps, sps))
                })?;
                if slice.first_mb_in_slice == 0 && self.pending.first_slice.is_some() {
                    self.end_access_unit(out);
                }
                if self.pending.first_slice.is_none() {
                    let sps = self
                        .pps
                        .get(&slice.pps_id)
                        .and_then(|pps| self.sps.get(&pps.sps_id));
                    if let Some(sps) = sps {
                        self.pending.first_slice = Some(FirstSlice {
                            nal_ref_idc: header.nal_ref_idc,
                            is_idr: header.is_idr(),
                            pic_order_cnt_type: sps.pic_order_cnt_type,
                            log2_max_pic_order_cnt_lsb: sps.log2_max_pic_order_cnt_lsb,
                            pic_order_cnt_lsb: slice.pic_order_cnt_lsb,
                        });
                    }
                }
                self.pending.is_key_frame |= header.is_idr();
                self.pending.units.push(nal);
            }
            _ => self.pending.units.push(nal),
        }
        Ok(())
    }

    /// Completes the pending access unit if it holds a picture.
    fn end_access_unit(&mut self, out: &mut Vec<AccessUnit>) {
        let Some(first_slice) = self.pending.first_slice else {
            return;
        };
        let pending = std::mem::take(&mut self.pending);
        let poc = self.picture_order_count(&first_slice);
        let display_order = u32::try_from((poc - self.poc.idr_poc).max(0)).unwrap_or(u32::MAX);

        let access_unit = AccessUnit {
            units: pending.units,
            decode_order: self.next_decode_order,
            display_order,
            is_key_frame: pending.is_key_frame,
        };
        trace!(
            decode_order = access_unit.decode_order,
            display_order,
            key = access_unit.is_key_frame,
            nal_units = access_unit.units.len(),
            "access unit"
        );
        self.next_decode_order += 1;
        out.push(access_unit);
    }

    /// Picture order count as in H.264 8.2.1, top field only.
    fn picture_order_count(&mut self, slice: &FirstSlice) -> i64 {
        let state = &mut self.poc;
        if slice.is_idr {
            state.prev_msb = 0;
            state.prev_lsb = 0;
            state.pictures_since_idr = 0;
        }

        let poc = match (slice.pic_order_cnt_type, slice.pic_order_cnt_lsb) {
            (0, Some(lsb)) => {
                let max_lsb = 1i64 << slice.log2_max_pic_order_cnt_lsb;
                let lsb = i64::from(lsb);
                let msb = if lsb < state.prev_lsb && state.prev_lsb - lsb >= max_lsb / 2 {
                    state.prev_msb + max_lsb
                } else if lsb > state.prev_lsb && lsb - state.prev_lsb > max_lsb / 2 {
                    state.prev_msb - max_lsb
                } else {
                    state.prev_msb
                };
                if slice.nal_ref_idc != 0 {
                    state.prev_msb = msb;
                    state.prev_lsb = lsb;
                }
                msb + lsb
            }
            // output order follows decode order
            _ => i64::from(state.pictures_since_idr),
        };

        state.pictures_since_idr += 1;
        if slice.is_idr {
            state.idr_poc = poc;
        }
        poc
    }
}

impl AccessUnitParser for AvcFrameParser {
    type Error = AvcError;

    fn feed(&mut self, data: &[u8], end_of_stream: bool) -> Result<FeedResult, AvcError> {
        let mut access_units = Vec::new();
        for nal in self.splitter.push(data, end_of_stream) {
            self.process_nal(nal, &mut access_units)?;
        }
        if end_of_stream {
            self.end_access_unit(&mut access_units);
        }
        Ok(FeedResult {
            bytes_consumed: data.len(),
            access_units,
        })
    }

    fn parameter_sets(&self) -> &ParameterSets {
        &self.parameter_sets
    }
}
