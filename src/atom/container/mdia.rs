use crate::{
    atom::{
        atom_ref::AtomRef, hdlr::HDLR, mdhd::MDHD, HandlerReferenceAtom, MediaHeaderAtom,
        StblAtomRef, MINF, STBL,
    },
    AtomData, FourCC,
};

pub const MDIA: FourCC = FourCC::new(b"mdia");

#[derive(Debug, Clone, Copy)]
pub struct MdiaAtomRef<'a>(pub(crate) AtomRef<'a>);

impl<'a> MdiaAtomRef<'a> {
    /// Finds the MDHD atom
    pub fn header(&self) -> Option<&'a MediaHeaderAtom> {
        let atom = self.0.find_child(MDHD)?;
        match atom.data.as_ref()? {
            AtomData::MediaHeader(data) => Some(data),
            _ => None,
        }
    }

    /// Finds the HDLR atom
    pub fn handler_reference(&self) -> Option<&'a HandlerReferenceAtom> {
        let atom = self.0.find_child(HDLR)?;
        match atom.data.as_ref()? {
            AtomData::HandlerReference(data) => Some(data),
            _ => None,
        }
    }

    /// Finds the STBL atom inside MINF
    pub fn sample_table(&self) -> StblAtomRef<'a> {
        let minf = AtomRef(self.0.find_child(MINF));
        StblAtomRef(AtomRef(minf.find_child(STBL)))
    }
}
