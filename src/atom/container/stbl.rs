use crate::{
    atom::{
        atom_ref::AtomRef,
        ctts::{CompositionOffsetAtom, CTTS},
        stco_co64::{ChunkOffsetAtom, CO64, STCO},
        stsc::{SampleToChunkAtom, STSC},
        stsd::{SampleDescriptionTableAtom, STSD},
        stss::{SyncSampleAtom, STSS},
        stsz::{SampleSizeAtom, STSZ},
        stts::{TimeToSampleAtom, STTS},
    },
    AtomData, FourCC,
};

pub const STBL: FourCC = FourCC::new(b"stbl");

#[derive(Debug, Clone, Copy)]
pub struct StblAtomRef<'a>(pub(crate) AtomRef<'a>);

impl<'a> StblAtomRef<'a> {
    /// Finds the STSD atom
    pub fn sample_description(&self) -> Option<&'a SampleDescriptionTableAtom> {
        let atom = self.0.find_child(STSD)?;
        match atom.data.as_ref()? {
            AtomData::SampleDescriptionTable(data) => Some(data),
            _ => None,
        }
    }

    /// Finds the STTS atom
    pub fn time_to_sample(&self) -> Option<&'a TimeToSampleAtom> {
        let atom = self.0.find_child(STTS)?;
        match atom.data.as_ref()? {
            AtomData::TimeToSample(data) => Some(data),
            _ => None,
        }
    }

    /// Finds the CTTS atom
    pub fn composition_offset(&self) -> Option<&'a CompositionOffsetAtom> {
        let atom = self.0.find_child(CTTS)?;
        match atom.data.as_ref()? {
            AtomData::CompositionOffset(data) => Some(data),
            _ => None,
        }
    }

    /// Finds the STSS atom
    pub fn sync_sample(&self) -> Option<&'a SyncSampleAtom> {
        let atom = self.0.find_child(STSS)?;
        match atom.data.as_ref()? {
            AtomData::SyncSample(data) => Some(data),
            _ => None,
        }
    }

    /// Finds the STSC atom
    pub fn sample_to_chunk(&self) -> Option<&'a SampleToChunkAtom> {
        let atom = self.0.find_child(STSC)?;
        match atom.data.as_ref()? {
            AtomData::SampleToChunk(data) => Some(data),
            _ => None,
        }
    }

    /// Finds the STSZ atom
    pub fn sample_size(&self) -> Option<&'a SampleSizeAtom> {
        let atom = self.0.find_child(STSZ)?;
        match atom.data.as_ref()? {
            AtomData::SampleSize(data) => Some(data),
            _ => None,
        }
    }

    /// Finds the STCO or CO64 atom
    pub fn chunk_offset(&self) -> Option<&'a ChunkOffsetAtom> {
        let atom = self
            .0
            .find_child(STCO)
            .or_else(|| self.0.find_child(CO64))?;
        match atom.data.as_ref()? {
            AtomData::ChunkOffset(data) => Some(data),
            _ => None,
        }
    }
}
