/*!
 * Samples of one track, held in decode order, and the descriptions they conform to.
 */

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::TempPath;

use crate::atom::SampleEntry;

/// The file a sample's payload is stored in.
///
/// Temporary files are deleted once the last sample referring to them is dropped.
#[derive(Clone)]
pub struct SampleSource(Arc<SourceFile>);

enum SourceFile {
    Path(PathBuf),
    Temp(TempPath),
}

impl SampleSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self(Arc::new(SourceFile::Path(path.into())))
    }

    pub(crate) fn from_temp_path(path: TempPath) -> Self {
        Self(Arc::new(SourceFile::Temp(path)))
    }

    pub fn path(&self) -> &Path {
        match self.0.as_ref() {
            SourceFile::Path(path) => path.as_path(),
            SourceFile::Temp(path) => &**path,
        }
    }

    pub fn same_source(&self, other: &SampleSource) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SampleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SampleSource").field(&self.path()).finish()
    }
}

#[derive(Debug, Clone, bon::Builder)]
pub struct Sample {
    pub source: SampleSource,
    pub offset: u64,
    pub size: u32,
    pub duration: u32,
    /// Index into [`SampleTable::descriptions`]
    #[builder(default)]
    pub description_index: usize,
    /// Decode time in media timescale units. See [`SampleTable::add_sample`].
    #[builder(default)]
    pub dts: u64,
    /// Presentation time minus decode time
    #[builder(default)]
    pub cts_delta: u32,
    #[builder(default = true)]
    pub is_sync: bool,
}

impl Sample {
    pub fn cts(&self) -> u64 {
        self.dts + u64::from(self.cts_delta)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    samples: Vec<Sample>,
    descriptions: Vec<SampleEntry>,
}

impl SampleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sample description, returning its index.
    pub fn add_description(&mut self, description: SampleEntry) -> usize {
        self.descriptions.push(description);
        self.descriptions.len() - 1
    }

    pub fn descriptions(&self) -> &[SampleEntry] {
        &self.descriptions
    }

    /// Appends a sample.
    ///
    /// A sample with a DTS of 0 added after other samples is placed right after the last one
    /// (`dts = last.dts + last.duration`), so samples can be appended without tracking time.
    pub fn add_sample(&mut self, mut sample: Sample) {
        if sample.dts == 0 {
            if let Some(last) = self.samples.last() {
                sample.dts = last.dts + u64::from(last.duration);
            }
        }
        self.samples.push(sample);
    }

    pub fn sample(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sets the presentation time of a sample, clamped to its decode time.
    pub fn set_presentation_time(&mut self, index: usize, cts: u64) {
        if let Some(sample) = self.samples.get_mut(index) {
            sample.cts_delta = u32::try_from(cts.saturating_sub(sample.dts)).unwrap_or(u32::MAX);
        }
    }

    /// Sum of the sample durations, in media timescale units.
    pub fn total_duration(&self) -> u64 {
        self.samples.iter().map(|s| u64::from(s.duration)).sum()
    }
}
