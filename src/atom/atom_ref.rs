/*!
* [`AtomRef`] and [`AtomRefMut`] provide utilities for working with shared and mutable references to [`Atom`]s that have children.
*
* See [`crate::atom::container`] for typed wrappers around these.
*/

use crate::{atom::Atom, FourCC};

#[derive(Debug, Clone, Copy)]
/// Wraps a shared [`Atom`] reference in an [`Option`] and provides methods for traversing it.
pub struct AtomRef<'a>(pub Option<&'a Atom>);

impl<'a> AtomRef<'a> {
    pub fn find_child(&self, typ: FourCC) -> Option<&'a Atom> {
        self.children().find(|atom| atom.header.atom_type == typ)
    }

    pub fn children(&self) -> crate::atom::iter::AtomIter<'a> {
        crate::atom::iter::AtomIter::from_atom(self.0)
    }
}

#[derive(Debug)]
/// Wraps a mutable reference to an [`Atom`] and provides methods for manipulating and traversing it.
pub struct AtomRefMut<'a>(pub &'a mut Atom);

impl<'a> AtomRefMut<'a> {
    /// Inserts `child` at `index`, or appends it when `index` is `None`.
    ///
    /// Returns the position the child ended up at, or `None` (dropping `child`) when `index` is
    /// past the end.
    pub fn insert_child(&mut self, index: Option<usize>, child: Atom) -> Option<usize> {
        let children = &mut self.0.children;
        let index = match index {
            Some(index) if index > children.len() => return None,
            Some(index) => index,
            None => children.len(),
        };
        children.insert(index, child);
        Some(index)
    }

    /// Detaches and returns the child at `index`, handing ownership to the caller.
    pub fn detach_child(&mut self, index: usize) -> Option<Atom> {
        (index < self.0.children.len()).then(|| self.0.children.remove(index))
    }
}
