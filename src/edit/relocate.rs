/*!
 * Keeps chunk offsets pointing at their samples after the atoms ahead of `mdat` change size.
 */

use std::ops::Range;
use tracing::{debug, warn};

use crate::{
    atom::MDAT,
    writer::{atom_header_size, body_size, SerializeAtom},
    Atom, AtomData,
};

/// Payload ranges of the top-level `mdat` atoms as they were in the source file.
#[derive(Debug, Clone, Default)]
pub struct MediaDataLayout {
    ranges: Vec<Range<u64>>,
}

impl MediaDataLayout {
    pub fn snapshot(atoms: &[Atom]) -> Self {
        let ranges = atoms
            .iter()
            .filter(|atom| atom.atom_type() == MDAT)
            .filter_map(|atom| {
                let start = atom.header.data_offset()?;
                Some(start..start + atom.header.data_size)
            })
            .collect();
        Self { ranges }
    }

    /// Payload ranges of the top-level `mdat` atoms once `atoms` are written out.
    fn current(atoms: &[Atom]) -> Vec<Range<u64>> {
        let mut offset = 0u64;
        let mut ranges = Vec::new();
        for atom in atoms {
            if atom.atom_type() == MDAT {
                let body = body_size(atom);
                let start = offset + atom_header_size(body) as u64;
                ranges.push(start..start + body);
            }
            offset += atom.encoded_size();
        }
        ranges
    }

    /// Shifts the entries of every `stco`/`co64` that came from the source file.
    ///
    /// Entries pointing outside of any original `mdat` are left alone. Returns whether anything moved.
    pub fn relocate(&mut self, atoms: &mut [Atom]) -> bool {
        if self.ranges.is_empty() {
            return false;
        }
        let mut moved = false;
        loop {
            let current = Self::current(atoms);
            if current.len() != self.ranges.len() {
                warn!(
                    before = self.ranges.len(),
                    after = current.len(),
                    "number of mdat atoms changed, leaving chunk offsets as they are"
                );
                return moved;
            }
            let deltas: Vec<i128> = self
                .ranges
                .iter()
                .zip(&current)
                .map(|(before, after)| i128::from(after.start) - i128::from(before.start))
                .collect();
            if deltas.iter().all(|delta| *delta == 0) {
                return moved;
            }

            debug!(?deltas, "relocating chunk offsets");
            for atom in atoms.iter_mut() {
                shift_chunk_offsets(atom, &self.ranges, &deltas);
            }
            self.ranges = current;
            moved = true;
        }
    }
}

fn shift_chunk_offsets(atom: &mut Atom, ranges: &[Range<u64>], deltas: &[i128]) {
    // atoms inserted by an edit describe some other file's layout
    if atom.header.offset.is_none() {
        return;
    }
    if let Some(AtomData::ChunkOffset(stco)) = atom.data.as_mut() {
        for offset in stco.chunk_offsets.iter_mut() {
            if let Some(i) = ranges.iter().position(|range| range.contains(offset)) {
                *offset = (i128::from(*offset) + deltas[i]).clamp(0, i128::from(u64::MAX)) as u64;
            }
        }
        let atom_type = stco.atom_type();
        if atom.header.atom_type != atom_type {
            debug!("promoting stco to co64");
            atom.header.atom_type = atom_type;
        }
    }
    for child in atom.children.iter_mut() {
        shift_chunk_offsets(child, ranges, deltas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{
        container_atom, leaf_atom, AtomHeader, ChunkOffsetAtom, FreeAtom, MediaDataAtom, CO64,
        FREE, MOOV, STBL,
    };

    fn stco(offsets: Vec<u64>) -> Atom {
        let data = ChunkOffsetAtom::builder().chunk_offsets(offsets).build();
        Atom::builder()
            .header(AtomHeader::new(data.atom_type()))
            .data(data.into())
            .build()
    }

    fn mdat(len: u64) -> Atom {
        Atom::builder()
            .header(AtomHeader::new(MDAT))
            .data(MediaDataAtom::new(0..len).into())
            .build()
    }

    /// Assigns the offsets the atoms would have been parsed at.
    fn as_parsed(atoms: &mut [Atom], mut offset: u64) {
        for atom in atoms {
            let body = body_size(atom);
            let header_size = atom_header_size(body);
            atom.header.offset = Some(offset);
            atom.header.header_size = header_size;
            atom.header.data_size = body;
            let data_start = offset + header_size as u64;
            let data_size = match atom.data.as_mut() {
                Some(AtomData::MediaData(mdat)) => {
                    let len = mdat.len();
                    mdat.source_range = data_start..data_start + len;
                    len
                }
                Some(data) => data.encoded_size(),
                None => 0,
            };
            as_parsed(&mut atom.children, data_start + data_size);
            offset += atom.encoded_size();
        }
    }

    fn stco_atom(atoms: &mut [Atom]) -> &mut Atom {
        let moov = atoms
            .iter_mut()
            .find(|atom| atom.atom_type() == MOOV)
            .unwrap();
        &mut moov.children[0].children[0]
    }

    fn chunk_offsets(atoms: &mut [Atom]) -> Vec<u64> {
        match stco_atom(atoms).data.as_ref() {
            Some(AtomData::ChunkOffset(stco)) => stco.chunk_offsets.to_vec(),
            other => panic!("expected chunk offsets, got {other:?}"),
        }
    }

    /// `leading` atoms, then moov(stbl(stco)) and a 100 byte mdat, with chunk offsets computed from
    /// the mdat payload start.
    fn movie(leading: Vec<Atom>, offsets: impl Fn(u64) -> Vec<u64>) -> Vec<Atom> {
        let mut atoms = leading;
        atoms.push(container_atom(
            MOOV,
            vec![container_atom(STBL, vec![stco(offsets(0))])],
        ));
        atoms.push(mdat(100));
        as_parsed(&mut atoms, 0);

        let mdat_start = atoms.last().and_then(|atom| atom.header.data_offset()).unwrap();
        if let Some(AtomData::ChunkOffset(stco)) = stco_atom(&mut atoms).data.as_mut() {
            stco.chunk_offsets = offsets(mdat_start).into_iter().collect();
        }
        atoms
    }

    fn mdat_start(atoms: &[Atom]) -> u64 {
        atoms.last().and_then(|atom| atom.header.data_offset()).unwrap()
    }

    #[test]
    fn test_relocate_after_growth() {
        let mut atoms = movie(vec![], |start| vec![start, start + 40]);
        let start = mdat_start(&atoms);
        let mut layout = MediaDataLayout::snapshot(&atoms);

        atoms.insert(0, leaf_atom(FreeAtom::new(FREE, 12)));
        assert!(layout.relocate(&mut atoms));
        assert_eq!(chunk_offsets(&mut atoms), vec![start + 20, start + 60]);
    }

    #[test]
    fn test_offsets_outside_mdat_untouched() {
        let mut atoms = movie(vec![], |start| vec![4, start]);
        let start = mdat_start(&atoms);
        let mut layout = MediaDataLayout::snapshot(&atoms);

        atoms.insert(0, leaf_atom(FreeAtom::new(FREE, 0)));
        layout.relocate(&mut atoms);
        assert_eq!(chunk_offsets(&mut atoms), vec![4, start + 8]);
    }

    #[test]
    fn test_unchanged_layout_is_left_alone() {
        let mut atoms = movie(vec![], |start| vec![start]);
        let start = mdat_start(&atoms);
        let mut layout = MediaDataLayout::snapshot(&atoms);

        assert!(!layout.relocate(&mut atoms));
        assert_eq!(chunk_offsets(&mut atoms), vec![start]);
    }

    #[test]
    fn test_promotes_to_co64() {
        // a large leading mdat puts the second one just below 4 GiB
        let leading = mdat(u64::from(u32::MAX) - 1000);
        let mut atoms = movie(vec![leading], |start| vec![start]);
        let start = mdat_start(&atoms);
        assert!(start < u64::from(u32::MAX));
        let mut layout = MediaDataLayout::snapshot(&atoms);

        atoms.insert(0, leaf_atom(FreeAtom::new(FREE, 2000)));
        assert!(layout.relocate(&mut atoms));

        assert_eq!(stco_atom(&mut atoms).atom_type(), CO64);
        let expected = MediaDataLayout::current(&atoms)[1].start;
        assert!(expected > u64::from(u32::MAX));
        assert_eq!(chunk_offsets(&mut atoms), vec![expected]);
    }

    #[test]
    fn test_changed_mdat_count_skips() {
        let mut atoms = movie(vec![], |start| vec![start]);
        let start = mdat_start(&atoms);
        let mut layout = MediaDataLayout::snapshot(&atoms);

        atoms.pop();
        atoms.insert(0, leaf_atom(FreeAtom::new(FREE, 0)));
        assert!(!layout.relocate(&mut atoms));
        assert_eq!(chunk_offsets(&mut atoms), vec![start]);
    }
}
