/*!
 * Append-only temporary file for sample payloads.
 */

use futures_util::{io::BufWriter, AsyncWriteExt};
use std::path::Path;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::{error::Result, sample_table::SampleSource};

/// Sample payloads written while building a track.
///
/// The file is removed once neither the storage nor any sample referencing its [`SampleSource`]
/// is alive, whether or not the build finished.
pub struct SampleStorage {
    writer: BufWriter<Compat<tokio::fs::File>>,
    source: SampleSource,
    offset: u64,
}

impl SampleStorage {
    /// Creates the backing file in `dir`.
    pub fn create_in(dir: &Path) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(".mp4splice-samples-")
            .tempfile_in(dir)?;
        let (file, path) = file.into_parts();
        debug!(path = %path.display(), "created sample storage");
        Ok(Self {
            writer: BufWriter::new(tokio::fs::File::from_std(file).compat_write()),
            source: SampleSource::from_temp_path(path),
            offset: 0,
        })
    }

    /// Appends `data`, returning the offset it was written at.
    pub async fn append(&mut self, data: &[u8]) -> Result<u64> {
        let offset = self.offset;
        self.writer.write_all(data).await?;
        self.offset += data.len() as u64;
        Ok(offset)
    }

    /// Source to give samples appended to this storage.
    pub fn source(&self) -> &SampleSource {
        &self.source
    }

    pub fn len(&self) -> u64 {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    /// Flushes and closes the file. Samples can be read back only after this.
    pub async fn finish(mut self) -> Result<SampleSource> {
        self.writer.flush().await?;
        self.writer.close().await?;
        Ok(self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_finish() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = SampleStorage::create_in(dir.path()).unwrap();
        assert_eq!(storage.append(b"abc").await.unwrap(), 0);
        assert_eq!(storage.append(b"defg").await.unwrap(), 3);
        assert_eq!(storage.len(), 7);

        let source = storage.finish().await.unwrap();
        assert_eq!(std::fs::read(source.path()).unwrap(), b"abcdefg");
        let path = source.path().to_path_buf();
        drop(source);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_dropped_storage_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = SampleStorage::create_in(dir.path()).unwrap();
        storage.append(b"abc").await.unwrap();
        drop(storage);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
