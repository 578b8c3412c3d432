use crate::atom::Atom;

pub struct AtomIter<'a> {
    pub(crate) iter: Option<std::slice::Iter<'a, Atom>>,
}

impl<'a> AtomIter<'a> {
    pub fn from_atom(atom_opt: Option<&'a Atom>) -> Self {
        Self {
            iter: atom_opt.map(|atom| atom.children.iter()),
        }
    }
}

impl<'a> Iterator for AtomIter<'a> {
    type Item = &'a Atom;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.as_mut().and_then(std::iter::Iterator::next)
    }
}

impl DoubleEndedIterator for AtomIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.iter
            .as_mut()
            .and_then(std::iter::DoubleEndedIterator::next_back)
    }
}

impl ExactSizeIterator for AtomIter<'_> {
    fn len(&self) -> usize {
        self.iter
            .as_ref()
            .map(ExactSizeIterator::len)
            .unwrap_or_default()
    }
}
