use futures_util::io::BufReader;
use std::path::Path;
use tokio_util::compat::TokioAsyncReadCompatExt;
use tracing::{debug, trace};

use super::{Movie, Track, TrackKind};
use crate::{
    atom::{util::convert_timescale, MoovAtomRef, TrakAtomRef, FTYP, MOOV},
    error::{Error, ErrorKind, Result, ResultExt},
    sample_table::{Sample, SampleSource, SampleTable},
    Atom, AtomData, Parser,
};

/// Reads the tracks of the movie stored at `path`.
///
/// Media data stays in the file; samples reference it by offset.
pub async fn read_movie(path: &Path) -> Result<Movie> {
    let file = tokio::fs::File::open(path)
        .await
        .context_for(path.display())?;
    let atoms = Parser::new(BufReader::new(file.compat()))
        .defer_media_data(true)
        .parse_atoms()
        .await
        .context_for(path.display())?;
    Movie::from_atoms(&atoms, SampleSource::from_path(path)).context_for(path.display())
}

impl Movie {
    /// Builds a movie from a parsed atom tree whose sample offsets point into `source`.
    pub fn from_atoms(atoms: &[Atom], source: SampleSource) -> Result<Movie> {
        let file_type = atoms.iter().find_map(|atom| match &atom.data {
            Some(AtomData::FileType(ftyp)) if atom.atom_type() == FTYP => Some(ftyp.clone()),
            _ => None,
        });
        let moov = atoms
            .iter()
            .find(|atom| atom.atom_type() == MOOV)
            .ok_or_else(|| Error::new(ErrorKind::InvalidMovie, "no moov atom"))?;
        let moov = MoovAtomRef::new(moov);
        let timescale = moov
            .header()
            .map(|mvhd| mvhd.timescale)
            .ok_or_else(|| Error::new(ErrorKind::InvalidMovie, "no mvhd atom"))?;

        let mut movie = Movie::new(timescale);
        movie.file_type = file_type;
        for (index, trak) in moov.tracks().enumerate() {
            let track = read_track(trak, timescale, &source)
                .map_err(|err| err.context_for(format_args!("moov/trak[{index}]")))?;
            debug!(
                track_id = track.track_id,
                kind = %track.kind,
                samples = track.sample_count(),
                "read track"
            );
            movie.add_track(track);
        }
        Ok(movie)
    }
}

fn invalid(message: &str) -> Error {
    Error::new(ErrorKind::InvalidMovie, message)
}

fn read_track(trak: TrakAtomRef<'_>, movie_timescale: u32, source: &SampleSource) -> Result<Track> {
    let tkhd = trak.header().ok_or_else(|| invalid("no tkhd atom"))?;
    let mdia = trak.media();
    let mdhd = mdia.header().ok_or_else(|| invalid("no mdhd atom"))?;
    let kind = mdia
        .handler_reference()
        .map(|hdlr| TrackKind::from(hdlr.handler_type))
        .ok_or_else(|| invalid("no hdlr atom"))?;
    let handler_name = mdia
        .handler_reference()
        .map(|hdlr| hdlr.name.clone())
        .unwrap_or_default();

    let stbl = mdia.sample_table();
    let stsd = stbl
        .sample_description()
        .ok_or_else(|| invalid("no stsd atom"))?;
    let stts = stbl
        .time_to_sample()
        .ok_or_else(|| invalid("no stts atom"))?;
    let stsc = stbl
        .sample_to_chunk()
        .ok_or_else(|| invalid("no stsc atom"))?;
    let stsz = stbl.sample_size().ok_or_else(|| invalid("no stsz atom"))?;
    let stco = stbl
        .chunk_offset()
        .ok_or_else(|| invalid("no stco or co64 atom"))?;
    let stss = stbl.sync_sample();
    let ctts = stbl.composition_offset();

    let sample_count = stsz.sample_count();
    if stts.sample_count() != sample_count as u64 {
        return Err(invalid(&format!(
            "stts describes {} samples, stsz {sample_count}",
            stts.sample_count()
        )));
    }
    let cts_deltas = ctts
        .into_iter()
        .flat_map(|ctts| ctts.sample_offsets())
        .chain(std::iter::repeat(0))
        .take(sample_count);
    let mut sample_entries = stsz
        .sample_sizes()
        .zip(stts.sample_durations())
        .zip(cts_deltas);

    let mut samples = SampleTable::new();
    for entry in stsd.entries.iter() {
        samples.add_description(entry.clone());
    }

    let layouts = stsc
        .chunk_layouts(stco.chunk_count())
        .ok_or_else(|| invalid("stsc doesn't map every chunk"))?;
    let mut index = 0;
    let mut dts = 0u64;
    for (layout, chunk_offset) in layouts.iter().zip(stco.chunk_offsets.iter()) {
        let description_index = layout.sample_description_index.saturating_sub(1) as usize;
        if description_index >= samples.descriptions().len() {
            return Err(invalid("stsc references a missing sample description"));
        }
        let mut offset = *chunk_offset;
        for _ in 0..layout.samples_per_chunk {
            let Some(((size, duration), cts_delta)) = sample_entries.next() else {
                break;
            };
            let sample = Sample::builder()
                .source(source.clone())
                .offset(offset)
                .size(size)
                .duration(duration)
                .description_index(description_index)
                .dts(dts)
                .cts_delta(cts_delta)
                .is_sync(stss.is_none_or(|stss| stss.is_sync(index)))
                .build();
            trace!(index, offset, size, dts, "sample");
            samples.add_sample(sample);
            offset += u64::from(size);
            dts += u64::from(duration);
            index += 1;
        }
    }
    if index != sample_count {
        return Err(invalid(&format!(
            "chunks hold {index} of {sample_count} samples"
        )));
    }

    let media_duration = samples.total_duration();
    let duration = match tkhd.duration {
        0 => convert_timescale(media_duration, mdhd.timescale, movie_timescale),
        duration => duration,
    };

    Ok(Track::builder()
        .kind(kind)
        .track_id(tkhd.track_id)
        .movie_timescale(movie_timescale)
        .media_timescale(mdhd.timescale)
        .duration(duration)
        .media_duration(match mdhd.duration {
            0 => media_duration,
            duration => duration,
        })
        .language(mdhd.language)
        .width(tkhd.width)
        .height(tkhd.height)
        .volume(tkhd.volume)
        .handler_name(handler_name)
        .samples(samples)
        .build())
}
