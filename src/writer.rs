use derive_more::Display;
use futures_io::{AsyncRead, AsyncSeek, AsyncWrite};
use futures_util::{
    io::{self, AsyncReadExt, AsyncSeekExt},
    AsyncWriteExt,
};
use std::{io::SeekFrom, ops::Range};
use thiserror::Error;

use crate::{atom::FourCC, Atom, AtomData};

#[derive(Debug, Error)]
#[error("{kind}{}", self.source.as_ref().map(|e| format!(" ({e})")).unwrap_or_default())]
pub struct WriteError {
    /// The kind of error that occurred during writing.
    pub(crate) kind: WriteErrorKind,
    /// The source error that caused this error.
    #[source]
    pub(crate) source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum WriteErrorKind {
    #[display("I/O error")]
    Io,
    #[display("Atom references media data in its source stream")]
    DeferredData,
    #[display("Source stream ended before the expected data")]
    SourceTooShort,
}

impl WriteError {
    pub fn kind(&self) -> WriteErrorKind {
        self.kind
    }

    fn io(err: std::io::Error) -> Self {
        Self {
            kind: WriteErrorKind::Io,
            source: Some(Box::new(err)),
        }
    }
}

pub trait SerializeAtom: Sized {
    /// [FourCC] representing atom type
    fn atom_type(&self) -> FourCC;

    /// Serialize an atom's body
    fn into_body_bytes(self) -> Vec<u8>;

    /// Serialize an atom into bytes
    fn into_bytes(self) -> Vec<u8> {
        let atom_type = self.atom_type();
        let mut body = self.into_body_bytes();
        let mut header = serialize_atom_header(atom_type, body.len() as u64);
        header.append(&mut body);
        header
    }
}

impl SerializeAtom for Atom {
    fn atom_type(&self) -> FourCC {
        self.header.atom_type
    }

    /// Container data (e.g. `meta` version and flags) followed by the serialized children.
    fn into_body_bytes(self) -> Vec<u8> {
        let mut body = self.data.map(AtomData::into_body_bytes).unwrap_or_default();
        for child in self.children {
            body.extend(child.into_bytes());
        }
        body
    }
}

/// Size of the header written in front of a body of `body_size` bytes.
pub fn atom_header_size(body_size: u64) -> usize {
    if 8u64 + body_size > u64::from(u32::MAX) {
        16
    } else {
        8
    }
}

pub struct Mp4Writer<W> {
    writer: W,
    offset: u64,
}

impl<W: AsyncWrite + Unpin> Mp4Writer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, offset: 0 }
    }

    pub fn current_offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub async fn flush(&mut self) -> Result<(), WriteError> {
        self.writer.flush().await.map_err(WriteError::io)
    }

    pub async fn write_atom_header(
        &mut self,
        atom_type: FourCC,
        data_size: u64,
    ) -> Result<(), WriteError> {
        let header_bytes = serialize_atom_header(atom_type, data_size);
        self.write_raw(&header_bytes).await
    }

    /// Writes a fully in-memory atom tree.
    pub async fn write_atom(&mut self, atom: Atom) -> Result<(), WriteError> {
        if atom.has_deferred_data() {
            return Err(WriteError {
                kind: WriteErrorKind::DeferredData,
                source: Some(format!("{} needs its source stream", atom.atom_type()).into()),
            });
        }
        let bytes = atom.into_bytes();
        self.write_raw(&bytes).await
    }

    /// Writes an atom tree, copying deferred media data from `source`.
    pub async fn write_atom_from<S>(&mut self, atom: Atom, source: &mut S) -> Result<(), WriteError>
    where
        S: AsyncRead + AsyncSeek + Unpin,
    {
        if !atom.has_deferred_data() {
            return self.write_atom(atom).await;
        }

        let body_size = body_size(&atom);
        self.write_atom_header(atom.atom_type(), body_size).await?;
        match atom.data {
            Some(AtomData::MediaData(mdat)) => {
                self.copy_range(source, mdat.source_range).await?;
            }
            Some(data) => self.write_raw(&data.into_body_bytes()).await?,
            None => {}
        }
        for child in atom.children {
            Box::pin(self.write_atom_from(child, source)).await?;
        }
        Ok(())
    }

    /// Copies `range` of `source` to the output.
    pub async fn copy_range<S>(&mut self, source: &mut S, range: Range<u64>) -> Result<(), WriteError>
    where
        S: AsyncRead + AsyncSeek + Unpin,
    {
        let len = range.end - range.start;
        source
            .seek(SeekFrom::Start(range.start))
            .await
            .map_err(WriteError::io)?;
        let copied = io::copy((&mut *source).take(len), &mut self.writer)
            .await
            .map_err(WriteError::io)?;
        self.offset += copied;
        if copied != len {
            return Err(WriteError {
                kind: WriteErrorKind::SourceTooShort,
                source: Some(format!("copied {copied} of {len} bytes").into()),
            });
        }
        Ok(())
    }

    pub async fn write_raw(&mut self, data: &[u8]) -> Result<(), WriteError> {
        self.writer.write_all(data).await.map_err(WriteError::io)?;
        self.offset += data.len() as u64;
        Ok(())
    }
}

pub(crate) fn body_size(atom: &Atom) -> u64 {
    let data_size = atom.data.as_ref().map_or(0, AtomData::encoded_size);
    data_size + atom.children.iter().map(Atom::encoded_size).sum::<u64>()
}

fn serialize_atom_header(atom_type: FourCC, data_size: u64) -> Vec<u8> {
    let mut result = Vec::with_capacity(16);
    match atom_header_size(data_size) {
        16 => {
            // size=1 signals the 64-bit size following the type
            result.extend_from_slice(&1u32.to_be_bytes());
            result.extend_from_slice(&atom_type.0);
            result.extend_from_slice(&(16u64 + data_size).to_be_bytes());
        }
        _ => {
            result.extend_from_slice(&((8u64 + data_size) as u32).to_be_bytes());
            result.extend_from_slice(&atom_type.0);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use futures_util::io::Cursor;

    use super::*;
    use crate::atom::{
        container_atom, leaf_atom, AtomHeader, FreeAtom, MediaDataAtom, FREE, MDAT, MOOV,
    };

    #[test]
    fn test_header_sizes() {
        assert_eq!(serialize_atom_header(FREE, 0), vec![0, 0, 0, 8, b'f', b'r', b'e', b'e']);
        let large = u64::from(u32::MAX);
        let header = serialize_atom_header(MDAT, large);
        assert_eq!(header.len(), 16);
        assert_eq!(&header[0..4], &1u32.to_be_bytes());
        assert_eq!(&header[8..16], &(large + 16).to_be_bytes());
    }

    #[tokio::test]
    async fn test_write_atom_tracks_offset() {
        let atom = container_atom(MOOV, vec![leaf_atom(FreeAtom::new(FREE, 4))]);
        let mut writer = Mp4Writer::new(Cursor::new(Vec::new()));
        writer.write_atom(atom).await.unwrap();
        assert_eq!(writer.current_offset(), 20);
        let bytes = writer.into_inner().into_inner();
        assert_eq!(&bytes[4..8], b"moov");
        assert_eq!(&bytes[12..16], b"free");
    }

    #[tokio::test]
    async fn test_write_deferred_media_data() {
        let source_bytes = b"xxxxpayload".to_vec();
        let mut source = Cursor::new(source_bytes);
        let mdat = Atom::builder()
            .header(AtomHeader::new(MDAT))
            .data(MediaDataAtom::new(4..11).into())
            .build();

        let mut writer = Mp4Writer::new(Cursor::new(Vec::new()));
        let err = writer.write_atom(mdat.clone()).await.unwrap_err();
        assert_eq!(err.kind(), WriteErrorKind::DeferredData);

        writer.write_atom_from(mdat, &mut source).await.unwrap();
        let bytes = writer.into_inner().into_inner();
        assert_eq!(&bytes[0..4], &15u32.to_be_bytes());
        assert_eq!(&bytes[8..], b"payload");
    }
}
