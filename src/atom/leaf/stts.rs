use bon::{bon, Builder};
use derive_more::{Deref, DerefMut};
use std::fmt;

use crate::{
    atom::{
        util::{parser::assert_atom_type, serializer::be_u32, DebugList},
        FourCC,
    },
    parser::ParseAtomData,
    writer::SerializeAtom,
    ParseError,
};

pub const STTS: FourCC = FourCC::new(b"stts");

#[derive(Default, Clone, PartialEq, Deref, DerefMut)]
pub struct TimeToSampleEntries(Vec<TimeToSampleEntry>);

impl From<Vec<TimeToSampleEntry>> for TimeToSampleEntries {
    fn from(entries: Vec<TimeToSampleEntry>) -> Self {
        Self(entries)
    }
}

impl fmt::Debug for TimeToSampleEntries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&DebugList::new(self.0.iter(), 10), f)
    }
}

/// Defines duration for a consecutive group of samples
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct TimeToSampleEntry {
    /// Number of consecutive samples with the same duration
    pub sample_count: u32,
    /// Duration of each sample in media timescale units
    pub sample_duration: u32,
}

/// Time-to-Sample (stts) atom
#[derive(Default, Debug, Clone, PartialEq)]
pub struct TimeToSampleAtom {
    pub version: u8,
    pub flags: [u8; 3],
    pub entries: TimeToSampleEntries,
}

#[bon]
impl TimeToSampleAtom {
    #[builder]
    pub fn new(
        #[builder(default = 0)] version: u8,
        #[builder(default = [0u8; 3])] flags: [u8; 3],
        #[builder(with = FromIterator::from_iter)] entries: Vec<TimeToSampleEntry>,
    ) -> Self {
        Self {
            version,
            flags,
            entries: entries.into(),
        }
    }
}

impl TimeToSampleAtom {
    /// Run-length encodes per-sample durations.
    pub fn from_durations(durations: impl IntoIterator<Item = u32>) -> Self {
        let mut entries: Vec<TimeToSampleEntry> = Vec::new();
        for duration in durations {
            match entries.last_mut() {
                Some(entry) if entry.sample_duration == duration => entry.sample_count += 1,
                _ => entries.push(TimeToSampleEntry {
                    sample_count: 1,
                    sample_duration: duration,
                }),
            }
        }
        Self::builder().entries(entries).build()
    }

    /// Per-sample durations, in sample order.
    pub fn sample_durations(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries
            .iter()
            .flat_map(|entry| std::iter::repeat_n(entry.sample_duration, entry.sample_count as usize))
    }

    pub fn sample_count(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.sample_count)).sum()
    }

    pub fn total_duration(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| u64::from(e.sample_count) * u64::from(e.sample_duration))
            .sum()
    }
}

impl ParseAtomData for TimeToSampleAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        assert_atom_type!(atom_type, STTS);
        parser::parse_stts_data(input)
    }
}

impl SerializeAtom for TimeToSampleAtom {
    fn atom_type(&self) -> FourCC {
        STTS
    }

    fn into_body_bytes(self) -> Vec<u8> {
        let mut data = Vec::with_capacity(8 + self.entries.len() * 8);
        data.push(self.version);
        data.extend(self.flags);
        data.extend(be_u32(self.entries.len() as u32));
        for entry in self.entries.iter() {
            data.extend(be_u32(entry.sample_count));
            data.extend(be_u32(entry.sample_duration));
        }
        data
    }
}

mod parser {
    use winnow::{
        binary::{be_u32, length_repeat},
        combinator::{seq, trace},
        error::StrContext,
        ModalResult, Parser,
    };

    use super::{TimeToSampleAtom, TimeToSampleEntries, TimeToSampleEntry};
    use crate::atom::util::parser::{flags3, stream, version, Stream};

    pub fn parse_stts_data(input: &[u8]) -> Result<TimeToSampleAtom, crate::ParseError> {
        parse_stts_data_inner
            .parse(stream(input))
            .map_err(crate::ParseError::from_winnow)
    }

    fn parse_stts_data_inner(input: &mut Stream<'_>) -> ModalResult<TimeToSampleAtom> {
        trace(
            "stts",
            seq!(TimeToSampleAtom {
                version: version,
                flags: flags3,
                entries: length_repeat(be_u32, entry)
                    .map(TimeToSampleEntries)
                    .context(StrContext::Label("entries")),
            })
            .context(StrContext::Label("stts")),
        )
        .parse_next(input)
    }

    fn entry(input: &mut Stream<'_>) -> ModalResult<TimeToSampleEntry> {
        trace(
            "entry",
            seq!(TimeToSampleEntry {
                sample_count: be_u32.context(StrContext::Label("sample_count")),
                sample_duration: be_u32.context(StrContext::Label("sample_duration")),
            }),
        )
        .parse_next(input)
    }
}
