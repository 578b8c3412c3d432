pub mod access_unit;
pub mod api;
pub mod atom;
pub mod avc;
pub mod chunk_offset_builder;
pub mod concat;
pub mod edit;
pub mod error;
pub mod movie;
pub mod parser;
pub mod reorder;
pub mod sample_storage;
pub mod sample_table;
pub mod track_builder;
pub mod writer;

pub use atom::{Atom, AtomData, AtomPath, FourCC};
pub use edit::{EditCommand, EditOptions};
pub use error::{Error, ErrorKind};
pub use movie::{Movie, Track, TrackKind};
pub use parser::{ParseError, Parser};
pub use writer::Mp4Writer;
