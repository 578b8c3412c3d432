/*!
 * Reads atom trees from a byte stream.
 *
 * Top-level atoms are read from an [`AsyncRead`] one at a time. Their bodies are buffered and
 * decoded into an [`Atom`] tree, except for top-level `mdat` atoms which can be left in the source
 * stream (see [`Parser::defer_media_data`]).
 */

use derive_more::Display;
use futures_io::AsyncRead;
use futures_util::io::{self, AsyncReadExt};
use thiserror::Error;
use tracing::{trace, warn};

use crate::{
    atom::{
        container::{is_container_atom, META, META_VERSION_FLAGS_SIZE},
        ctts::{CompositionOffsetAtom, CTTS},
        dref::{DataReferenceAtom, DREF},
        free::{FreeAtom, FREE, SKIP},
        ftyp::{FileTypeAtom, FTYP},
        hdlr::{HandlerReferenceAtom, HDLR},
        mdat::{MediaDataAtom, MDAT},
        mdhd::{MediaHeaderAtom, MDHD},
        mvhd::{MovieHeaderAtom, MVHD},
        smhd::{SoundMediaHeaderAtom, SMHD},
        stco_co64::{ChunkOffsetAtom, CO64, STCO},
        stsc::{SampleToChunkAtom, STSC},
        stsd::{SampleDescriptionTableAtom, STSD},
        stss::{SyncSampleAtom, STSS},
        stsz::{SampleSizeAtom, STSZ},
        stts::{TimeToSampleAtom, STTS},
        tkhd::{TrackHeaderAtom, TKHD},
        util::parser::Stream,
        vmhd::{VideoMediaHeaderAtom, VMHD},
        AtomHeader, FourCC, RawData,
    },
    Atom, AtomData,
};

/// Decodes the body of a leaf atom.
pub trait ParseAtomData: Sized {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError>;
}

#[derive(Debug, Error)]
#[error(
    "{kind}{}",
    self.location.map(|(offset, length)|
        format!(" at offset {offset} with length {length}")).unwrap_or_default()
)]
pub struct ParseError {
    /// The kind of error that occurred during parsing.
    pub(crate) kind: ParseErrorKind,
    /// location is the (offset, length) of the input data related to the error
    pub(crate) location: Option<(usize, usize)>,
    /// The source error that caused this error.
    #[source]
    pub(crate) source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[display("I/O error")]
    Io,
    #[display("EOF error")]
    Eof,
    #[display("Invalid atom header")]
    InvalidHeader,
    #[display("Invalid atom size")]
    InvalidSize,
    #[display("Unexpected atom type")]
    UnexpectedAtom,
    #[display("Atom parsing failed")]
    AtomParsing,
    #[display("Insufficient data")]
    InsufficientData,
}

impl ParseError {
    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    pub(crate) fn new(kind: ParseErrorKind, location: Option<(usize, usize)>) -> Self {
        Self {
            kind,
            location,
            source: None,
        }
    }

    pub(crate) fn new_unexpected_atom(atom_type: FourCC, expected: FourCC) -> Self {
        Self {
            kind: ParseErrorKind::UnexpectedAtom,
            location: None,
            source: Some(format!("expected {expected}, got {atom_type}").into()),
        }
    }

    fn from_io(err: std::io::Error, offset: u64, length: usize) -> Self {
        let kind = if err.kind() == std::io::ErrorKind::UnexpectedEof {
            ParseErrorKind::Eof
        } else {
            ParseErrorKind::Io
        };
        Self {
            kind,
            location: Some((offset as usize, length)),
            source: Some(Box::new(err)),
        }
    }

    pub(crate) fn from_winnow(
        error: winnow::error::ParseError<Stream<'_>, winnow::error::ContextError>,
    ) -> Self {
        use winnow::error::StrContext;
        let mut ctx_tree = error
            .inner()
            .context()
            .filter_map(|ctx| match ctx {
                StrContext::Label(label) => Some(label.to_string()),
                _ => None,
            })
            .collect::<Vec<_>>();
        ctx_tree.reverse();
        let message = match ctx_tree.is_empty() {
            true => error.inner().to_string(),
            false => format!("{} ({})", ctx_tree.join("."), error.inner()),
        };
        Self {
            kind: ParseErrorKind::AtomParsing,
            location: Some((error.offset(), 0)),
            source: Some(message.into()),
        }
    }
}

impl From<winnow::error::ParseError<Stream<'_>, winnow::error::ContextError>> for ParseError {
    fn from(value: winnow::error::ParseError<Stream<'_>, winnow::error::ContextError>) -> Self {
        Self::from_winnow(value)
    }
}

/// Atom size as declared in its header.
#[derive(Debug, Clone, Copy)]
enum DeclaredSize {
    Known(u64),
    /// Size 0: the atom extends to the end of the stream
    ToEnd,
}

pub struct Parser<R> {
    reader: R,
    offset: u64,
    defer_media_data: bool,
}

impl<R: AsyncRead + Unpin> Parser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            defer_media_data: false,
        }
    }

    /// Leaves the payload of top-level `mdat` atoms in the stream, recording only its location.
    pub fn defer_media_data(mut self, defer: bool) -> Self {
        self.defer_media_data = defer;
        self
    }

    /// Parses every top-level atom up to the end of the stream.
    pub async fn parse_atoms(mut self) -> Result<Vec<Atom>, ParseError> {
        let mut atoms = Vec::new();
        while let Some((header, size)) = self.read_header().await? {
            trace!(atom_type = %header.atom_type, offset = ?header.offset, "top-level atom");
            atoms.push(self.read_atom(header, size).await?);
        }
        Ok(atoms)
    }

    /// Parses a stream holding exactly one serialized atom.
    pub async fn parse_single_atom(mut self) -> Result<Atom, ParseError> {
        let (header, size) = self
            .read_header()
            .await?
            .ok_or_else(|| ParseError::new(ParseErrorKind::Eof, Some((0, 8))))?;
        let atom = self.read_atom(header, size).await?;

        let mut trailing = [0u8; 1];
        let n = self
            .reader
            .read(&mut trailing)
            .await
            .map_err(|e| ParseError::from_io(e, self.offset, 1))?;
        if n > 0 {
            return Err(ParseError {
                kind: ParseErrorKind::InvalidSize,
                location: Some((self.offset as usize, 0)),
                source: Some("unexpected data after the atom".into()),
            });
        }
        Ok(atom)
    }

    /// Reads the next atom header, or `None` at the end of the stream.
    async fn read_header(&mut self) -> Result<Option<(AtomHeader, DeclaredSize)>, ParseError> {
        let atom_offset = self.offset;
        let mut header = [0u8; 8];
        let mut filled = 0;
        while filled < header.len() {
            let n = self
                .reader
                .read(&mut header[filled..])
                .await
                .map_err(|e| ParseError::from_io(e, atom_offset, 8))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        match filled {
            0 => return Ok(None),
            8 => {}
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::Eof,
                    Some((atom_offset as usize, 8)),
                ))
            }
        }
        self.offset += 8;

        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let extended_size = if size == 1 {
            let mut extended = [0u8; 8];
            self.read_exact(&mut extended).await?;
            Some(u64::from_be_bytes(extended))
        } else {
            None
        };

        let atom_type = FourCC([header[4], header[5], header[6], header[7]]);
        let (header, size) = decode_header(atom_type, size, extended_size, atom_offset)?;
        Ok(Some((header, size)))
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ParseError> {
        self.reader
            .read_exact(buf)
            .await
            .map_err(|e| ParseError::from_io(e, self.offset, buf.len()))?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    async fn read_atom(
        &mut self,
        mut header: AtomHeader,
        size: DeclaredSize,
    ) -> Result<Atom, ParseError> {
        if header.atom_type == MDAT && self.defer_media_data {
            let start = self.offset;
            let len = self.skip(size).await?;
            header.data_size = len;
            return Ok(Atom::builder()
                .header(header)
                .data(MediaDataAtom::new(start..start + len).into())
                .build());
        }

        let body = self.read_body(size).await?;
        header.data_size = body.len() as u64;
        parse_atom_body(header, &body)
    }

    async fn read_body(&mut self, size: DeclaredSize) -> Result<Vec<u8>, ParseError> {
        match size {
            DeclaredSize::Known(len) => {
                let len = usize::try_from(len).map_err(|_| {
                    ParseError::new(ParseErrorKind::InvalidSize, Some((self.offset as usize, 0)))
                })?;
                let mut body = vec![0u8; len];
                self.read_exact(&mut body).await?;
                Ok(body)
            }
            DeclaredSize::ToEnd => {
                let mut body = Vec::new();
                self.reader
                    .read_to_end(&mut body)
                    .await
                    .map_err(|e| ParseError::from_io(e, self.offset, 0))?;
                self.offset += body.len() as u64;
                Ok(body)
            }
        }
    }

    /// Skips over an atom body without buffering it, returning its length.
    async fn skip(&mut self, size: DeclaredSize) -> Result<u64, ParseError> {
        let limit = match size {
            DeclaredSize::Known(len) => len,
            DeclaredSize::ToEnd => u64::MAX,
        };
        let skipped = io::copy((&mut self.reader).take(limit), &mut io::sink())
            .await
            .map_err(|e| ParseError::from_io(e, self.offset, 0))?;
        if matches!(size, DeclaredSize::Known(len) if len != skipped) {
            return Err(ParseError::new(
                ParseErrorKind::Eof,
                Some((self.offset as usize, limit as usize)),
            ));
        }
        self.offset += skipped;
        Ok(skipped)
    }
}

/// Parses all atoms in `input`, an in-memory copy of the stream starting at `base_offset`.
pub fn parse_atoms_from_slice(input: &[u8], base_offset: u64) -> Result<Vec<Atom>, ParseError> {
    let mut atoms = Vec::new();
    let mut pos = 0usize;
    while pos < input.len() {
        let remaining = &input[pos..];
        let atom_offset = base_offset + pos as u64;
        if remaining.len() < 8 {
            // e.g. the 32-bit terminator some writers put at the end of udta
            if remaining.iter().all(|b| *b == 0) {
                break;
            }
            return Err(ParseError::new(
                ParseErrorKind::InsufficientData,
                Some((atom_offset as usize, remaining.len())),
            ));
        }

        let size = u32::from_be_bytes([remaining[0], remaining[1], remaining[2], remaining[3]]);
        let atom_type = FourCC([remaining[4], remaining[5], remaining[6], remaining[7]]);
        let extended_size = match size {
            1 => {
                let bytes: [u8; 8] = remaining
                    .get(8..16)
                    .and_then(|b| b.try_into().ok())
                    .ok_or_else(|| {
                        ParseError::new(
                            ParseErrorKind::InsufficientData,
                            Some((atom_offset as usize, remaining.len())),
                        )
                    })?;
                Some(u64::from_be_bytes(bytes))
            }
            _ => None,
        };

        let (mut header, size) = decode_header(atom_type, size, extended_size, atom_offset)?;
        let available = (remaining.len() - header.header_size) as u64;
        let data_size = match size {
            DeclaredSize::Known(len) if len <= available => len,
            DeclaredSize::Known(len) => {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidSize,
                    Some((atom_offset as usize, (len + header.header_size as u64) as usize)),
                ))
            }
            DeclaredSize::ToEnd => available,
        };
        header.data_size = data_size;

        let body_start = header.header_size;
        let body_end = body_start + data_size as usize;
        atoms.push(parse_atom_body(header, &remaining[body_start..body_end])?);
        pos += body_end;
    }
    Ok(atoms)
}

fn decode_header(
    atom_type: FourCC,
    size: u32,
    extended_size: Option<u64>,
    atom_offset: u64,
) -> Result<(AtomHeader, DeclaredSize), ParseError> {
    let (header_size, declared) = match (size, extended_size) {
        (1, Some(full_size)) if full_size >= 16 => (16, DeclaredSize::Known(full_size - 16)),
        (1, _) => {
            return Err(ParseError::new(
                ParseErrorKind::InvalidSize,
                Some((atom_offset as usize, 16)),
            ))
        }
        (0, _) => (8, DeclaredSize::ToEnd),
        (size, _) if size < 8 => {
            return Err(ParseError::new(
                ParseErrorKind::InvalidSize,
                Some((atom_offset as usize, 8)),
            ))
        }
        (size, _) => (8, DeclaredSize::Known(u64::from(size) - 8)),
    };
    if atom_type.iter().all(|b| *b == 0) {
        return Err(ParseError::new(
            ParseErrorKind::InvalidHeader,
            Some((atom_offset as usize, header_size)),
        ));
    }
    let header = AtomHeader {
        atom_type,
        offset: Some(atom_offset),
        header_size,
        data_size: 0,
    };
    Ok((header, declared))
}

fn parse_atom_body(header: AtomHeader, body: &[u8]) -> Result<Atom, ParseError> {
    let data_offset = header.data_offset().unwrap_or_default();

    if !is_container_atom(header.atom_type) {
        let data = parse_leaf_data(&header, body);
        return Ok(Atom::builder().header(header).data(data).build());
    }

    // ISO `meta` carries version and flags ahead of its children, QuickTime `meta` does not
    let prefix_size = match header.atom_type {
        META if body.len() >= 8 && !is_plausible_child(&body[..8]) => META_VERSION_FLAGS_SIZE,
        _ => 0,
    };
    let data = (prefix_size > 0).then(|| AtomData::RawData(RawData(body[..prefix_size].to_vec())));
    let children = parse_atoms_from_slice(&body[prefix_size..], data_offset + prefix_size as u64)?;
    Ok(Atom::builder()
        .header(header)
        .maybe_data(data)
        .children(children)
        .build())
}

fn is_plausible_child(header: &[u8]) -> bool {
    let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    size >= 8 && header[4..8].iter().all(|b| b.is_ascii_graphic() || *b == b' ')
}

/// Decodes a leaf body into typed data, keeping the raw bytes when the atom isn't understood.
fn parse_leaf_data(header: &AtomHeader, body: &[u8]) -> AtomData {
    let atom_type = header.atom_type;
    let parsed = match atom_type {
        FTYP => FileTypeAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        MVHD => MovieHeaderAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        TKHD => TrackHeaderAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        MDHD => MediaHeaderAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        HDLR => HandlerReferenceAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        VMHD => VideoMediaHeaderAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        SMHD => SoundMediaHeaderAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        DREF => DataReferenceAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        STSD => SampleDescriptionTableAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        STTS => TimeToSampleAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        CTTS => CompositionOffsetAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        STSS => SyncSampleAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        STSC => SampleToChunkAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        STSZ => SampleSizeAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        STCO | CO64 => ChunkOffsetAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        FREE | SKIP => FreeAtom::parse_atom_data(atom_type, body).map(AtomData::from),
        _ => Ok(RawData(body.to_vec()).into()),
    };

    parsed.unwrap_or_else(|err| {
        warn!(
            %atom_type,
            offset = ?header.offset,
            error = %err,
            "unable to decode atom, keeping it as raw data"
        );
        RawData(body.to_vec()).into()
    })
}
