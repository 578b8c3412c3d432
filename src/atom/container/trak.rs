use crate::{
    atom::{atom_ref::AtomRef, tkhd::TKHD, MdiaAtomRef, TrackHeaderAtom, MDIA},
    Atom, AtomData, FourCC,
};

pub const TRAK: FourCC = FourCC::new(b"trak");

#[derive(Debug, Clone, Copy)]
pub struct TrakAtomRef<'a>(AtomRef<'a>);

impl<'a> TrakAtomRef<'a> {
    pub(crate) fn new(atom: &'a Atom) -> Self {
        Self(AtomRef(Some(atom)))
    }

    /// Finds the TKHD atom
    pub fn header(&self) -> Option<&'a TrackHeaderAtom> {
        let atom = self.0.find_child(TKHD)?;
        match atom.data.as_ref()? {
            AtomData::TrackHeader(data) => Some(data),
            _ => None,
        }
    }

    /// Finds the MDIA atom
    pub fn media(&self) -> MdiaAtomRef<'a> {
        MdiaAtomRef(AtomRef(self.0.find_child(MDIA)))
    }

    pub fn track_id(&self) -> Option<u32> {
        Some(self.header()?.track_id)
    }
}
