use crate::{
    atom::{atom_ref::AtomRef, mvhd::MVHD, MovieHeaderAtom, TrakAtomRef, TRAK},
    Atom, AtomData, FourCC,
};

pub const MOOV: FourCC = FourCC::new(b"moov");

#[derive(Debug, Clone, Copy)]
pub struct MoovAtomRef<'a>(pub(crate) AtomRef<'a>);

impl<'a> MoovAtomRef<'a> {
    pub fn new(atom: &'a Atom) -> Self {
        Self(AtomRef(Some(atom)))
    }

    /// Finds the MVHD atom
    pub fn header(&self) -> Option<&'a MovieHeaderAtom> {
        let atom = self.0.find_child(MVHD)?;
        match atom.data.as_ref()? {
            AtomData::MovieHeader(data) => Some(data),
            _ => None,
        }
    }

    pub fn tracks(&self) -> impl Iterator<Item = TrakAtomRef<'a>> + 'a {
        self.0
            .children()
            .filter(|atom| atom.header.atom_type == TRAK)
            .map(TrakAtomRef::new)
    }
}
