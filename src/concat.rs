/*!
 * Joins two tracks of the same kind end to end.
 *
 * Samples of the second track play right after those of the first. Their decode times are
 * rebuilt from the sample durations, so any gap or offset in either input is dropped.
 */

use tracing::debug;

use crate::{
    atom::SampleEntry,
    error::{Error, ErrorKind, Result},
    movie::Track,
    sample_table::{Sample, SampleTable},
};

/// Concatenates `second` after `first`.
///
/// The result takes its timescales, language and dimensions from `first`. Sample descriptions
/// that are byte-for-byte identical in both tracks are shared; others are kept side by side.
pub fn concat_tracks(first: &Track, second: &Track) -> Result<Track> {
    if first.kind != second.kind {
        return Err(Error::new(
            ErrorKind::MissingTrack,
            format!("cannot join a {} track to a {} track", second.kind, first.kind),
        ));
    }

    let mut samples = SampleTable::new();
    let first_descriptions = add_descriptions(&mut samples, first.samples.descriptions());
    let second_descriptions = add_descriptions(&mut samples, second.samples.descriptions());
    append_samples(&mut samples, &first.samples, &first_descriptions);
    append_samples(&mut samples, &second.samples, &second_descriptions);

    debug!(
        kind = %first.kind,
        first = first.sample_count(),
        second = second.sample_count(),
        descriptions = samples.descriptions().len(),
        "joined tracks"
    );

    Ok(Track::builder()
        .kind(first.kind)
        .track_id(first.track_id)
        .movie_timescale(first.movie_timescale)
        .media_timescale(first.media_timescale)
        .duration(first.duration + second.duration_in(first.movie_timescale))
        .media_duration(first.media_duration + second.media_duration)
        .language(first.language)
        .width(first.width)
        .height(first.height)
        .volume(first.volume)
        .handler_name(first.handler_name.clone())
        .samples(samples)
        .build())
}

/// Adds `descriptions` to `table`, reusing identical entries, and returns where each one landed.
fn add_descriptions(table: &mut SampleTable, descriptions: &[SampleEntry]) -> Vec<usize> {
    descriptions
        .iter()
        .map(|description| {
            let bytes = description.to_bytes();
            table
                .descriptions()
                .iter()
                .position(|existing| existing.to_bytes() == bytes)
                .unwrap_or_else(|| table.add_description(description.clone()))
        })
        .collect()
}

fn append_samples(table: &mut SampleTable, from: &SampleTable, description_map: &[usize]) {
    for sample in from.samples() {
        table.add_sample(Sample {
            dts: 0,
            description_index: description_map
                .get(sample.description_index)
                .copied()
                .unwrap_or_default(),
            ..sample.clone()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        atom::stsd::SampleEntryData,
        movie::TrackKind,
        sample_table::SampleSource,
        FourCC,
    };

    fn entry(config: u8) -> SampleEntry {
        SampleEntry {
            entry_type: FourCC::new(b"mp4a"),
            data_reference_index: 1,
            data: SampleEntryData::Other(vec![config; 4]),
        }
    }

    fn track(
        kind: TrackKind,
        source: &SampleSource,
        descriptions: &[SampleEntry],
        samples: &[(u32, usize)],
        media_timescale: u32,
    ) -> Track {
        let mut table = SampleTable::new();
        for description in descriptions {
            table.add_description(description.clone());
        }
        for (i, (duration, description_index)) in samples.iter().enumerate() {
            table.add_sample(
                Sample::builder()
                    .source(source.clone())
                    .offset(i as u64 * 10)
                    .size(10)
                    .duration(*duration)
                    .description_index(*description_index)
                    .build(),
            );
        }
        let media_duration = table.total_duration();
        Track::builder()
            .kind(kind)
            .track_id(1)
            .movie_timescale(1000)
            .media_timescale(media_timescale)
            .duration(media_duration * 1000 / u64::from(media_timescale))
            .media_duration(media_duration)
            .samples(table)
            .build()
    }

    #[test]
    fn test_concat_rebases_timing() {
        let a = SampleSource::from_path("a.mp4");
        let b = SampleSource::from_path("b.mp4");
        let first = track(TrackKind::Video, &a, &[entry(1)], &[(1000, 0); 3], 24000);
        let second = track(TrackKind::Video, &b, &[entry(1)], &[(1000, 0); 2], 24000);

        let joined = concat_tracks(&first, &second).unwrap();
        assert_eq!(joined.sample_count(), 5);
        assert_eq!(joined.duration, first.duration + second.duration);
        assert_eq!(joined.media_duration, 5000);
        assert_eq!(joined.samples.descriptions().len(), 1);

        let samples = joined.samples.samples();
        assert_eq!(
            samples.iter().map(|s| s.dts).collect::<Vec<_>>(),
            vec![0, 1000, 2000, 3000, 4000]
        );
        // first track's samples, then the second's
        assert!(samples[..3].iter().all(|s| s.source.same_source(&a)));
        assert!(samples[3..].iter().all(|s| s.source.same_source(&b)));
        assert_eq!(samples[3].offset, 0);
    }

    #[test]
    fn test_concat_keeps_distinct_descriptions() {
        let a = SampleSource::from_path("a.mp4");
        let b = SampleSource::from_path("b.mp4");
        let first = track(TrackKind::Audio, &a, &[entry(1)], &[(1024, 0); 2], 48000);
        let second = track(
            TrackKind::Audio,
            &b,
            &[entry(2), entry(1)],
            &[(1024, 0), (1024, 1)],
            48000,
        );

        let joined = concat_tracks(&first, &second).unwrap();
        assert_eq!(joined.samples.descriptions(), &[entry(1), entry(2)]);
        assert_eq!(
            joined
                .samples
                .samples()
                .iter()
                .map(|s| s.description_index)
                .collect::<Vec<_>>(),
            vec![0, 0, 1, 0]
        );
    }

    #[test]
    fn test_concat_converts_second_duration() {
        let a = SampleSource::from_path("a.mp4");
        let first = track(TrackKind::Video, &a, &[entry(1)], &[(1000, 0)], 24000);
        let mut second = track(TrackKind::Video, &a, &[entry(1)], &[(1000, 0)], 24000);
        second.movie_timescale = 600;
        second.duration = 600;
        let joined = concat_tracks(&first, &second).unwrap();
        assert_eq!(joined.duration, first.duration + 1000);
    }

    #[test]
    fn test_concat_rejects_different_kinds() {
        let a = SampleSource::from_path("a.mp4");
        let video = track(TrackKind::Video, &a, &[entry(1)], &[], 24000);
        let audio = track(TrackKind::Audio, &a, &[entry(1)], &[], 48000);
        let err = concat_tracks(&video, &audio).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingTrack);
    }
}
