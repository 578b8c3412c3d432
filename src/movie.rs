/*!
 * Movies as a list of tracks and their sample tables, independent of the atom tree they were read
 * from or will be written to.
 */

pub mod reader;
pub mod writer;

use bon::Builder;
use derive_more::Display;

pub use self::{
    reader::read_movie,
    writer::{write_movie, WriteOptions},
};

use crate::{
    atom::{util::convert_timescale, FileTypeAtom, HandlerType, LanguageCode},
    sample_table::SampleTable,
    FourCC,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TrackKind {
    #[display("video")]
    Video,
    #[display("audio")]
    Audio,
    #[display("{_0}")]
    Other(FourCC),
}

impl From<HandlerType> for TrackKind {
    fn from(handler: HandlerType) -> Self {
        match handler {
            HandlerType::Video => TrackKind::Video,
            HandlerType::Audio => TrackKind::Audio,
            other => TrackKind::Other(other.to_fourcc()),
        }
    }
}

impl TrackKind {
    pub fn handler_type(self) -> HandlerType {
        match self {
            TrackKind::Video => HandlerType::Video,
            TrackKind::Audio => HandlerType::Audio,
            TrackKind::Other(fourcc) => HandlerType::from(fourcc),
        }
    }

    fn default_handler_name(self) -> &'static str {
        match self {
            TrackKind::Video => "VideoHandler",
            TrackKind::Audio => "SoundHandler",
            TrackKind::Other(_) => "",
        }
    }
}

#[derive(Debug, Clone, Builder)]
pub struct Track {
    pub kind: TrackKind,
    /// Assigned when the movie is written if 0
    #[builder(default)]
    pub track_id: u32,
    pub movie_timescale: u32,
    pub media_timescale: u32,
    /// Duration in movie timescale units
    pub duration: u64,
    /// Duration in media timescale units
    pub media_duration: u64,
    #[builder(default)]
    pub language: LanguageCode,
    /// Width in pixels, 16.16 fixed point
    #[builder(default)]
    pub width: u32,
    /// Height in pixels, 16.16 fixed point
    #[builder(default)]
    pub height: u32,
    #[builder(default = if kind == TrackKind::Audio { 1.0 } else { 0.0 })]
    pub volume: f32,
    #[builder(into, default = kind.default_handler_name())]
    pub handler_name: String,
    pub samples: SampleTable,
}

impl Track {
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Duration converted to `timescale`.
    pub fn duration_in(&self, timescale: u32) -> u64 {
        convert_timescale(self.duration, self.movie_timescale, timescale)
    }
}

#[derive(Debug, Clone)]
pub struct Movie {
    pub timescale: u32,
    /// `ftyp` of the file the movie was read from
    pub file_type: Option<FileTypeAtom>,
    pub tracks: Vec<Track>,
}

impl Movie {
    pub fn new(timescale: u32) -> Self {
        Self {
            timescale,
            file_type: None,
            tracks: Vec::new(),
        }
    }

    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// First track of `kind`.
    pub fn track(&self, kind: TrackKind) -> Option<&Track> {
        self.tracks.iter().find(|track| track.kind == kind)
    }

    /// Duration of the longest track, in the movie timescale.
    pub fn duration(&self) -> u64 {
        self.tracks
            .iter()
            .map(|track| track.duration_in(self.timescale))
            .max()
            .unwrap_or_default()
    }
}
