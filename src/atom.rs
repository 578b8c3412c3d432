pub mod atom_ref;
pub mod container;
pub mod iter;
pub mod leaf;
pub mod path;
pub mod util;

use bon::Builder;

pub use self::{container::*, leaf::*, path::AtomPath, util::FourCC};

use crate::writer::{atom_header_size, SerializeAtom};

#[derive(Clone, PartialEq, Eq)]
pub struct RawData(pub Vec<u8>);

impl RawData {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for RawData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[u8; {}]", self.0.len())
    }
}

/// Size and location of an atom as it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomHeader {
    pub atom_type: FourCC,
    /// Offset of the atom's first header byte in the stream it was parsed from.
    ///
    /// `None` for atoms constructed in memory or detached from their source.
    pub offset: Option<u64>,
    pub header_size: usize,
    pub data_size: u64,
}

impl AtomHeader {
    pub fn new(atom_type: impl Into<FourCC>) -> Self {
        Self {
            atom_type: atom_type.into(),
            offset: None,
            header_size: 8,
            data_size: 0,
        }
    }

    /// Offset of the first body byte in the source stream.
    pub fn data_offset(&self) -> Option<u64> {
        self.offset.map(|offset| offset + self.header_size as u64)
    }

    pub fn size(&self) -> u64 {
        self.header_size as u64 + self.data_size
    }
}

#[derive(Debug, Clone, Builder)]
pub struct Atom {
    pub header: AtomHeader,
    /// Leaf payload, or the bytes preceding the children of a container (e.g. `meta` version and flags).
    pub data: Option<AtomData>,
    #[builder(default)]
    pub children: Vec<Atom>,
}

impl Atom {
    pub fn atom_type(&self) -> FourCC {
        self.header.atom_type
    }

    pub fn is_container(&self) -> bool {
        is_container_atom(self.header.atom_type)
    }

    /// Number of bytes this atom occupies once serialized.
    pub fn encoded_size(&self) -> u64 {
        let data_size = self.data.as_ref().map_or(0, AtomData::encoded_size);
        let body_size = data_size
            + self
                .children
                .iter()
                .map(Atom::encoded_size)
                .sum::<u64>();
        atom_header_size(body_size) as u64 + body_size
    }

    /// Whether this atom, or any of its descendants, references payload still stored in the source stream.
    pub fn has_deferred_data(&self) -> bool {
        matches!(self.data, Some(AtomData::MediaData(_)))
            || self.children.iter().any(Atom::has_deferred_data)
    }

    /// Detaches this atom and its descendants from the stream they were parsed from.
    pub fn forget_offsets(&mut self) {
        self.header.offset = None;
        self.children.iter_mut().for_each(Atom::forget_offsets);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        SerializeAtom::into_bytes(self)
    }
}

#[derive(Debug, Clone)]
pub enum AtomData {
    FileType(FileTypeAtom),
    MovieHeader(MovieHeaderAtom),
    TrackHeader(TrackHeaderAtom),
    MediaHeader(MediaHeaderAtom),
    HandlerReference(HandlerReferenceAtom),
    VideoMediaHeader(VideoMediaHeaderAtom),
    SoundMediaHeader(SoundMediaHeaderAtom),
    DataReference(DataReferenceAtom),
    SampleDescriptionTable(SampleDescriptionTableAtom),
    TimeToSample(TimeToSampleAtom),
    CompositionOffset(CompositionOffsetAtom),
    SyncSample(SyncSampleAtom),
    SampleToChunk(SampleToChunkAtom),
    SampleSize(SampleSizeAtom),
    ChunkOffset(ChunkOffsetAtom),
    Free(FreeAtom),
    MediaData(MediaDataAtom),
    RawData(RawData),
}

impl AtomData {
    pub fn encoded_size(&self) -> u64 {
        match self {
            AtomData::MediaData(mdat) => mdat.len(),
            AtomData::RawData(data) => data.0.len() as u64,
            other => other.clone().into_body_bytes().len() as u64,
        }
    }

    pub fn into_body_bytes(self) -> Vec<u8> {
        match self {
            AtomData::FileType(atom) => atom.into_body_bytes(),
            AtomData::MovieHeader(atom) => atom.into_body_bytes(),
            AtomData::TrackHeader(atom) => atom.into_body_bytes(),
            AtomData::MediaHeader(atom) => atom.into_body_bytes(),
            AtomData::HandlerReference(atom) => atom.into_body_bytes(),
            AtomData::VideoMediaHeader(atom) => atom.into_body_bytes(),
            AtomData::SoundMediaHeader(atom) => atom.into_body_bytes(),
            AtomData::DataReference(atom) => atom.into_body_bytes(),
            AtomData::SampleDescriptionTable(atom) => atom.into_body_bytes(),
            AtomData::TimeToSample(atom) => atom.into_body_bytes(),
            AtomData::CompositionOffset(atom) => atom.into_body_bytes(),
            AtomData::SyncSample(atom) => atom.into_body_bytes(),
            AtomData::SampleToChunk(atom) => atom.into_body_bytes(),
            AtomData::SampleSize(atom) => atom.into_body_bytes(),
            AtomData::ChunkOffset(atom) => atom.into_body_bytes(),
            AtomData::Free(atom) => atom.into_body_bytes(),
            // payload is copied from the source stream by `Mp4Writer::write_atom_from`
            AtomData::MediaData(_) => Vec::new(),
            AtomData::RawData(data) => data.0,
        }
    }
}

macro_rules! impl_from_atom_data {
    ($($atom:ident => $variant:ident),+ $(,)?) => {
        $(
            impl From<$atom> for AtomData {
                fn from(atom: $atom) -> Self {
                    AtomData::$variant(atom)
                }
            }
        )+
    };
}

impl_from_atom_data!(
    FileTypeAtom => FileType,
    MovieHeaderAtom => MovieHeader,
    TrackHeaderAtom => TrackHeader,
    MediaHeaderAtom => MediaHeader,
    HandlerReferenceAtom => HandlerReference,
    VideoMediaHeaderAtom => VideoMediaHeader,
    SoundMediaHeaderAtom => SoundMediaHeader,
    DataReferenceAtom => DataReference,
    SampleDescriptionTableAtom => SampleDescriptionTable,
    TimeToSampleAtom => TimeToSample,
    CompositionOffsetAtom => CompositionOffset,
    SyncSampleAtom => SyncSample,
    SampleToChunkAtom => SampleToChunk,
    SampleSizeAtom => SampleSize,
    ChunkOffsetAtom => ChunkOffset,
    FreeAtom => Free,
    MediaDataAtom => MediaData,
    RawData => RawData,
);

/// Builds a leaf atom from typed data.
pub fn leaf_atom<T>(data: T) -> Atom
where
    T: SerializeAtom + Into<AtomData>,
{
    Atom::builder()
        .header(AtomHeader::new(data.atom_type()))
        .data(data.into())
        .build()
}

/// Builds a container atom from its children.
pub fn container_atom(atom_type: FourCC, children: Vec<Atom>) -> Atom {
    Atom::builder()
        .header(AtomHeader::new(atom_type))
        .children(children)
        .build()
}
