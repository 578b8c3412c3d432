/*!
 * Box paths such as `moov/trak[1]/mdia`.
 *
 * Each segment names an atom type, optionally followed by a 0-based index among the siblings of
 * that type. A segment without an index selects the first matching child. The empty path denotes
 * the top level of the tree.
 */

use std::{fmt, str::FromStr};

use crate::{
    atom::{Atom, FourCC},
    error::{Error, ErrorKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSegment {
    pub atom_type: FourCC,
    pub index: usize,
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            0 => write!(f, "{}", self.atom_type),
            index => write!(f, "{}[{index}]", self.atom_type),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomPath {
    segments: Vec<PathSegment>,
}

impl AtomPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Positions of the addressed atom and each of its ancestors within their parent's children.
    ///
    /// Returns `None` if any segment doesn't match.
    pub fn locate(&self, atoms: &[Atom]) -> Option<Vec<usize>> {
        let mut positions = Vec::with_capacity(self.segments.len());
        let mut children = atoms;
        for segment in &self.segments {
            let position = children
                .iter()
                .enumerate()
                .filter(|(_, atom)| atom.atom_type() == segment.atom_type)
                .nth(segment.index)
                .map(|(position, _)| position)?;
            positions.push(position);
            children = &children[position].children;
        }
        Some(positions)
    }

    pub fn resolve<'a>(&self, atoms: &'a [Atom]) -> Option<&'a Atom> {
        let positions = self.locate(atoms)?;
        let (last, ancestors) = positions.split_last()?;
        let mut children = atoms;
        for position in ancestors {
            children = &children[*position].children;
        }
        children.get(*last)
    }
}

/// The children list at `positions`, where an empty `positions` is the top level itself.
pub(crate) fn children_at_mut<'a>(
    atoms: &'a mut Vec<Atom>,
    positions: &[usize],
) -> Option<&'a mut Vec<Atom>> {
    let mut children = atoms;
    for position in positions {
        children = &mut children.get_mut(*position)?.children;
    }
    Some(children)
}

impl FromStr for AtomPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| Error::new(ErrorKind::InvalidCommand, format!("{reason} in atom path {s:?}"));

        let trimmed = s.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let segments = trimmed
            .split('/')
            .map(|segment| {
                let (name, index) = match segment.split_once('[') {
                    Some((name, rest)) => {
                        let index = rest
                            .strip_suffix(']')
                            .and_then(|index| index.parse::<usize>().ok())
                            .ok_or_else(|| invalid("malformed index"))?;
                        (name, index)
                    }
                    None => (segment, 0),
                };
                let atom_type =
                    FourCC::from_latin1(name).ok_or_else(|| invalid("atom types have 4 characters"))?;
                Ok(PathSegment { atom_type, index })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self { segments })
    }
}

impl fmt::Display for AtomPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{container_atom, leaf_atom, FreeAtom, FREE, MDIA, MOOV, TRAK};

    fn movie() -> Vec<Atom> {
        vec![
            leaf_atom(FreeAtom::new(FREE, 0)),
            container_atom(
                MOOV,
                vec![
                    container_atom(TRAK, vec![]),
                    leaf_atom(FreeAtom::new(FREE, 1)),
                    container_atom(TRAK, vec![container_atom(MDIA, vec![])]),
                ],
            ),
        ]
    }

    #[test]
    fn test_parse_path() {
        let path: AtomPath = "moov/trak[1]/mdia".parse().unwrap();
        assert_eq!(path.segments().len(), 3);
        assert_eq!(path.segments()[1].atom_type, TRAK);
        assert_eq!(path.segments()[1].index, 1);
        assert_eq!(path.to_string(), "moov/trak[1]/mdia");

        let path: AtomPath = "/dinf/url /".parse().unwrap();
        assert_eq!(path.segments()[1].atom_type, FourCC::new(b"url "));

        assert!("".parse::<AtomPath>().unwrap().is_root());
    }

    #[test]
    fn test_parse_path_errors() {
        for path in ["moov/tr", "moov/trak[x]", "moov/trak[1", "moov//trak"] {
            let err = path.parse::<AtomPath>().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidCommand, "{path}");
        }
    }

    #[test]
    fn test_locate_indexes_siblings_of_same_type() {
        let atoms = movie();
        let path: AtomPath = "moov/trak[1]/mdia".parse().unwrap();
        assert_eq!(path.locate(&atoms), Some(vec![1, 2, 0]));
        assert_eq!(path.resolve(&atoms).map(Atom::atom_type), Some(MDIA));

        let first: AtomPath = "moov/trak".parse().unwrap();
        assert_eq!(first.locate(&atoms), Some(vec![1, 0]));

        let missing: AtomPath = "moov/trak[2]".parse().unwrap();
        assert_eq!(missing.locate(&atoms), None);
    }
}
