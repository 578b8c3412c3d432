use std::fmt;

use crate::{
    atom::{
        util::{parser::assert_atom_type, DebugEllipsis},
        FourCC,
    },
    parser::ParseAtomData,
    writer::SerializeAtom,
    ParseError,
};

pub const FREE: FourCC = FourCC::new(b"free");
pub const SKIP: FourCC = FourCC::new(b"skip");

#[derive(Clone, PartialEq)]
pub struct FreeAtom {
    /// Either `free` or `skip`
    pub atom_type: FourCC,
    pub data: Vec<u8>,
}

impl FreeAtom {
    /// Zero-filled padding of `data_size` bytes.
    pub fn new(atom_type: FourCC, data_size: usize) -> Self {
        Self {
            atom_type,
            data: vec![0u8; data_size],
        }
    }
}

impl fmt::Debug for FreeAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeAtom")
            .field("atom_type", &self.atom_type)
            .field("data", &DebugEllipsis(Some(self.data.len())))
            .finish()
    }
}

impl ParseAtomData for FreeAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        assert_atom_type!(atom_type, FREE, SKIP);
        Ok(FreeAtom {
            atom_type,
            data: input.to_vec(),
        })
    }
}

impl SerializeAtom for FreeAtom {
    fn atom_type(&self) -> FourCC {
        self.atom_type
    }

    fn into_body_bytes(self) -> Vec<u8> {
        self.data
    }
}
