use bon::Builder;
use futures_io::AsyncWrite;
use futures_util::io::BufReader;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, trace};

use super::{Movie, Track, TrackKind};
use crate::{
    atom::{
        container_atom,
        ftyp::{BRAND_AVC1, BRAND_ISO2, BRAND_ISOM},
        leaf_atom,
        stsc::ChunkLayout,
        ChunkOffsetAtom, CompositionOffsetAtom, DataReferenceAtom, FileTypeAtom,
        HandlerReferenceAtom, MediaHeaderAtom, MovieHeaderAtom, SampleDescriptionTableAtom,
        SampleSizeAtom, SampleToChunkAtom, SoundMediaHeaderAtom, SyncSampleAtom,
        TimeToSampleAtom, TrackHeaderAtom, VideoMediaHeaderAtom, DINF, MDAT, MDIA, MINF, MOOV,
        STBL, TRAK,
    },
    chunk_offset_builder::{chunk_offsets, ChunkInfo, ChunkOffsetBuilder},
    error::{Error, ErrorKind, Result, ResultExt},
    sample_table::SampleSource,
    writer::atom_header_size,
    Atom, FourCC, Mp4Writer,
};

/// File-level settings of a written movie.
#[derive(Debug, Clone, Builder)]
pub struct WriteOptions {
    #[builder(default = BRAND_ISOM)]
    pub major_brand: FourCC,
    #[builder(default)]
    pub minor_version: u32,
    #[builder(default = vec![BRAND_ISOM, BRAND_ISO2, BRAND_AVC1])]
    pub compatible_brands: Vec<FourCC>,
    #[builder(default = 10)]
    pub samples_per_chunk: u32,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::append()
    }
}

impl WriteOptions {
    /// Brands written by the append entry point.
    pub fn append() -> Self {
        Self::builder().build()
    }

    /// Brands written by the mux entry point.
    pub fn mux() -> Self {
        Self::builder().minor_version(0x200).build()
    }

    fn file_type(&self) -> FileTypeAtom {
        FileTypeAtom::builder()
            .major_brand(self.major_brand)
            .minor_version(self.minor_version)
            .compatible_brands(self.compatible_brands.clone())
            .build()
    }
}

/// Writes `movie` as `ftyp`, `moov` and a single `mdat` holding every sample.
///
/// Sample payloads are copied from each sample's [`SampleSource`].
pub async fn write_movie<W>(movie: &Movie, output: W, options: &WriteOptions) -> Result<W>
where
    W: AsyncWrite + Unpin,
{
    let track_ids = assign_track_ids(&movie.tracks);

    let mut builder = ChunkOffsetBuilder::new(options.samples_per_chunk);
    for track in &movie.tracks {
        builder.add_track(track.samples.samples());
    }
    let chunks: Vec<ChunkInfo> = builder.build_chunk_info().collect();
    let media_size: u64 = chunks.iter().map(|chunk| chunk.chunk_size).sum();

    let ftyp = leaf_atom(options.file_type());
    let ftyp_size = ftyp.encoded_size();
    let mdat_header_size = atom_header_size(media_size) as u64;

    // chunk offsets depend on the size of moov, which grows if they need co64
    let mut moov_size = 0;
    let moov = loop {
        let data_start = ftyp_size + moov_size + mdat_header_size;
        let offsets = chunk_offsets(&chunks, movie.tracks.len(), data_start);
        let moov = moov_atom(movie, &track_ids, &chunks, offsets);
        let size = moov.encoded_size();
        if size == moov_size {
            break moov;
        }
        moov_size = size;
    };
    debug!(
        tracks = movie.tracks.len(),
        chunks = chunks.len(),
        moov_size,
        media_size,
        "writing movie"
    );

    let mut writer = Mp4Writer::new(output);
    writer.write_atom(ftyp).await?;
    writer.write_atom(moov).await?;
    writer.write_atom_header(MDAT, media_size).await?;

    let mut sources = SourceFiles::default();
    for chunk in &chunks {
        let track = &movie.tracks[chunk.track_index];
        trace!(
            track_id = track_ids[chunk.track_index],
            chunk = chunk.chunk_number,
            offset = writer.current_offset(),
            "chunk"
        );
        for sample in &track.samples.samples()[chunk.sample_indices.clone()] {
            let source = sources.open(&sample.source).await?;
            writer
                .copy_range(source, sample.offset..sample.offset + u64::from(sample.size))
                .await
                .context_for(sample.source.path().display())?;
        }
    }

    let expected_size = ftyp_size + moov_size + mdat_header_size + media_size;
    if writer.current_offset() != expected_size {
        return Err(Error::new(
            ErrorKind::InvalidMovie,
            format!(
                "wrote {} bytes, expected {expected_size}",
                writer.current_offset()
            ),
        ));
    }
    writer.flush().await?;
    Ok(writer.into_inner())
}

/// Keeps the track ids already set and numbers the others after the highest one.
fn assign_track_ids(tracks: &[Track]) -> Vec<u32> {
    let mut next_id = tracks.iter().map(|track| track.track_id).max().unwrap_or(0) + 1;
    let mut ids = Vec::with_capacity(tracks.len());
    for track in tracks {
        if track.track_id != 0 && !ids.contains(&track.track_id) {
            ids.push(track.track_id);
        } else {
            ids.push(next_id);
            next_id += 1;
        }
    }
    ids
}

fn moov_atom(
    movie: &Movie,
    track_ids: &[u32],
    chunks: &[ChunkInfo],
    offsets: Vec<Vec<u64>>,
) -> Atom {
    let mvhd = MovieHeaderAtom::builder()
        .timescale(movie.timescale)
        .duration(movie.duration())
        .next_track_id(track_ids.iter().max().map_or(1, |id| id + 1))
        .build();

    let mut children = vec![leaf_atom(mvhd)];
    for ((track_index, track), chunk_offsets) in movie.tracks.iter().enumerate().zip(offsets) {
        let layouts = chunks
            .iter()
            .filter(|chunk| chunk.track_index == track_index)
            .map(ChunkInfo::layout);
        let stbl = sample_table_atom(track, layouts, chunk_offsets);
        children.push(trak_atom(movie, track, track_ids[track_index], stbl));
    }
    container_atom(MOOV, children)
}

fn trak_atom(movie: &Movie, track: &Track, track_id: u32, stbl: Atom) -> Atom {
    let tkhd = TrackHeaderAtom::builder()
        .track_id(track_id)
        .duration(track.duration_in(movie.timescale))
        .volume(track.volume)
        .width(track.width)
        .height(track.height)
        .build();
    let mdhd = MediaHeaderAtom::builder()
        .timescale(track.media_timescale)
        .duration(track.media_duration)
        .language(track.language)
        .build();
    let hdlr = HandlerReferenceAtom::builder()
        .handler_type(track.kind.handler_type())
        .name(track.handler_name.as_str())
        .build();

    let mut minf = Vec::with_capacity(3);
    match track.kind {
        TrackKind::Video => minf.push(leaf_atom(VideoMediaHeaderAtom::default())),
        TrackKind::Audio => minf.push(leaf_atom(SoundMediaHeaderAtom::default())),
        TrackKind::Other(_) => {}
    }
    minf.push(container_atom(
        DINF,
        vec![leaf_atom(DataReferenceAtom::self_contained())],
    ));
    minf.push(stbl);

    container_atom(
        TRAK,
        vec![
            leaf_atom(tkhd),
            container_atom(
                MDIA,
                vec![
                    leaf_atom(mdhd),
                    leaf_atom(hdlr),
                    container_atom(MINF, minf),
                ],
            ),
        ],
    )
}

fn sample_table_atom(
    track: &Track,
    layouts: impl Iterator<Item = ChunkLayout>,
    chunk_offsets: Vec<u64>,
) -> Atom {
    let samples = track.samples.samples();
    let mut children = vec![
        leaf_atom(SampleDescriptionTableAtom::from(
            track.samples.descriptions().to_vec(),
        )),
        leaf_atom(TimeToSampleAtom::from_durations(
            samples.iter().map(|sample| sample.duration),
        )),
    ];
    if samples.iter().any(|sample| sample.cts_delta != 0) {
        children.push(leaf_atom(CompositionOffsetAtom::from_offsets(
            samples.iter().map(|sample| sample.cts_delta),
        )));
    }
    if samples.iter().any(|sample| !sample.is_sync) {
        children.push(leaf_atom(SyncSampleAtom::from_sync_flags(
            samples.iter().map(|sample| sample.is_sync),
        )));
    }
    let mut stco = ChunkOffsetAtom::builder()
        .chunk_offsets(chunk_offsets)
        .build();
    stco.is_64bit = stco.needs_64bit();
    children.extend([
        leaf_atom(SampleToChunkAtom::from_chunk_layouts(layouts)),
        leaf_atom(SampleSizeAtom::from_sizes(
            samples.iter().map(|sample| sample.size),
        )),
        leaf_atom(stco),
    ]);
    container_atom(STBL, children)
}

/// Open handles to the files samples are copied from.
#[derive(Default)]
struct SourceFiles {
    files: Vec<(SampleSource, BufReader<Compat<tokio::fs::File>>)>,
}

impl SourceFiles {
    async fn open(
        &mut self,
        source: &SampleSource,
    ) -> Result<&mut BufReader<Compat<tokio::fs::File>>> {
        let index = match self
            .files
            .iter()
            .position(|(open, _)| open.same_source(source) || open.path() == source.path())
        {
            Some(index) => index,
            None => {
                let file = tokio::fs::File::open(source.path())
                    .await
                    .context_for(source.path().display())?;
                self.files
                    .push((source.clone(), BufReader::new(file.compat())));
                self.files.len() - 1
            }
        };
        Ok(&mut self.files[index].1)
    }
}
