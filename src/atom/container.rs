/*!
 * Atoms with children.
 */

pub mod mdia;
pub mod moov;
pub mod stbl;
pub mod trak;

pub use mdia::*;
pub use moov::*;
pub use stbl::*;
pub use trak::*;

use crate::FourCC;

pub const MINF: FourCC = FourCC::new(b"minf");
pub const DINF: FourCC = FourCC::new(b"dinf");
pub const EDTS: FourCC = FourCC::new(b"edts");
pub const UDTA: FourCC = FourCC::new(b"udta");
pub const MVEX: FourCC = FourCC::new(b"mvex");
pub const MFRA: FourCC = FourCC::new(b"mfra");
pub const MOOF: FourCC = FourCC::new(b"moof");
pub const TRAF: FourCC = FourCC::new(b"traf");
pub const SINF: FourCC = FourCC::new(b"sinf");
pub const SCHI: FourCC = FourCC::new(b"schi");
pub const GMHD: FourCC = FourCC::new(b"gmhd");
pub const META: FourCC = FourCC::new(b"meta");

/// `meta` carries version and flags ahead of its children.
pub const META_VERSION_FLAGS_SIZE: usize = 4;

/// Determines whether a given atom type (fourcc) should be treated as a container for other atoms.
pub fn is_container_atom(atom_type: FourCC) -> bool {
    matches!(
        atom_type,
        MOOV | MFRA
            | UDTA
            | TRAK
            | EDTS
            | MDIA
            | MINF
            | GMHD
            | DINF
            | STBL
            | MVEX
            | MOOF
            | TRAF
            | SINF
            | SCHI
            | META
    )
}
