/*!
 * Builds a video [`Track`] from a raw elementary stream.
 *
 * Access units are stored length-prefixed in a [`SampleStorage`] as they come out of the parser.
 * Once the stream ends, their presentation times are derived from the display order the parser
 * reported (see [`crate::reorder`]) and the sample description is synthesized from the parameter
 * sets seen in the stream.
 */

use bon::Builder;
use futures_io::AsyncRead;
use futures_util::AsyncReadExt;
use tracing::{debug, trace, warn};

use crate::{
    access_unit::{AccessUnit, AccessUnitParser, ParameterSets},
    atom::{
        stsd::{
            AvcDecoderConfiguration, SampleEntryData, VisualExtension, VisualSampleEntry,
            SAMPLE_ENTRY_AVC1,
        },
        util::convert_timescale,
        LanguageCode, SampleEntry,
    },
    error::{Error, ErrorKind, Result, ResultExt},
    movie::{Track, TrackKind},
    reorder::{reorder, FrameOrder},
    sample_storage::SampleStorage,
    sample_table::{Sample, SampleTable},
};

const READ_SIZE: usize = 4096;

/// Timing and metadata of a track built from an elementary stream.
#[derive(Debug, Clone, Copy, Builder)]
pub struct MuxOptions {
    #[builder(default = 24)]
    pub frame_rate: u32,
    #[builder(default = 1000)]
    pub movie_timescale: u32,
    /// Duration of every sample, in media timescale units
    #[builder(default = 1000)]
    pub sample_duration: u32,
    #[builder(default)]
    pub language: LanguageCode,
}

impl Default for MuxOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MuxOptions {
    /// Ticks per second such that each sample lasts one frame.
    pub fn media_timescale(&self) -> u32 {
        self.frame_rate.max(1).saturating_mul(self.sample_duration)
    }
}

pub struct TrackBuilder<P> {
    parser: P,
    options: MuxOptions,
    samples: SampleTable,
    frames: Vec<FrameOrder>,
}

impl<P: AccessUnitParser> TrackBuilder<P> {
    pub fn new(parser: P, options: MuxOptions) -> Self {
        Self {
            parser,
            options,
            samples: SampleTable::new(),
            frames: Vec::new(),
        }
    }

    /// Reads `source` to the end and builds the track, storing sample payloads in `storage`.
    ///
    /// A read failure aborts the build. A parse failure ends reading but keeps the samples
    /// registered before it.
    pub async fn build<R>(mut self, mut source: R, mut storage: SampleStorage) -> Result<Track>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; READ_SIZE];
        let mut pending: Vec<u8> = Vec::new();
        loop {
            let n = source
                .read(&mut buf)
                .await
                .context_for("elementary stream")?;
            let end_of_stream = n == 0;
            pending.extend_from_slice(&buf[..n]);

            let result = match self.parser.feed(&pending, end_of_stream) {
                Ok(result) => result,
                Err(err) => {
                    warn!(
                        error = %err,
                        samples = self.samples.len(),
                        "failed to parse elementary stream, ignoring the rest of it"
                    );
                    break;
                }
            };
            pending.drain(..result.bytes_consumed.min(pending.len()));
            for access_unit in result.access_units {
                self.add_access_unit(&access_unit, &mut storage).await?;
            }
            if end_of_stream {
                break;
            }
        }

        let description = sample_description(self.parser.parameter_sets())?;
        let source = storage.finish().await?;
        debug!(
            samples = self.samples.len(),
            path = %source.path().display(),
            "elementary stream read"
        );
        self.finish(description)
    }

    async fn add_access_unit(
        &mut self,
        access_unit: &AccessUnit,
        storage: &mut SampleStorage,
    ) -> Result<()> {
        let data = access_unit.to_length_prefixed();
        let offset = storage.append(&data).await?;
        trace!(
            decode_order = access_unit.decode_order,
            display_order = access_unit.display_order,
            offset,
            size = data.len(),
            "sample"
        );
        self.samples.add_sample(
            Sample::builder()
                .source(storage.source().clone())
                .offset(offset)
                .size(data.len() as u32)
                .duration(self.options.sample_duration)
                .is_sync(access_unit.is_key_frame)
                .build(),
        );
        self.frames.push(FrameOrder::new(
            access_unit.decode_order,
            access_unit.display_order,
        ));
        Ok(())
    }

    fn finish(mut self, description: SampleEntry) -> Result<Track> {
        let reordered = reorder(&self.frames, u64::from(self.options.sample_duration));
        for (index, cts) in reordered.presentation_times.iter().enumerate() {
            self.samples.set_presentation_time(index, *cts);
        }
        debug!(max_delta = reordered.max_delta, "reordered samples");

        let (width, height) = match &description.data {
            SampleEntryData::Visual(visual) => (u32::from(visual.width), u32::from(visual.height)),
            SampleEntryData::Other(_) => (0, 0),
        };
        self.samples.add_description(description);

        let media_timescale = self.options.media_timescale();
        let media_duration =
            self.samples.len() as u64 * u64::from(self.options.sample_duration);
        Ok(Track::builder()
            .kind(TrackKind::Video)
            .movie_timescale(self.options.movie_timescale)
            .media_timescale(media_timescale)
            .duration(convert_timescale(
                media_duration,
                media_timescale,
                self.options.movie_timescale,
            ))
            .media_duration(media_duration)
            .language(self.options.language)
            .width(width << 16)
            .height(height << 16)
            .samples(self.samples)
            .build())
    }
}

/// `avc1` entry carrying the stream's parameter sets.
fn sample_description(parameter_sets: &ParameterSets) -> Result<SampleEntry> {
    let sps = parameter_sets.first_sps().ok_or_else(|| {
        Error::new(
            ErrorKind::MissingCodecConfig,
            "no sequence parameter set in the elementary stream",
        )
    })?;
    let avcc = AvcDecoderConfiguration::builder()
        .profile_indication(sps.profile_idc)
        .profile_compatibility(sps.constraint_flags)
        .level_indication(sps.level_idc)
        .sequence_parameter_sets(parameter_sets.raw_sps().map(<[u8]>::to_vec).collect())
        .picture_parameter_sets(parameter_sets.raw_pps().map(<[u8]>::to_vec).collect())
        .build();
    let visual = VisualSampleEntry::builder()
        .width(u16::try_from(sps.width).unwrap_or(u16::MAX))
        .height(u16::try_from(sps.height).unwrap_or(u16::MAX))
        .compressor_name("h264")
        .extensions(vec![VisualExtension::Avcc(avcc)])
        .build();
    Ok(SampleEntry {
        entry_type: SAMPLE_ENTRY_AVC1,
        data_reference_index: 1,
        data: SampleEntryData::Visual(visual),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        access_unit::FeedResult,
        avc::{frame_parser::tests::annex_b_stream, AvcFrameParser},
    };

    /// Replays scripted access units, failing after them if `fail_after` is set.
    struct ScriptedParser {
        access_units: Vec<AccessUnit>,
        parameter_sets: ParameterSets,
        fail_after: bool,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("scripted failure")]
    struct ScriptedError;

    impl AccessUnitParser for ScriptedParser {
        type Error = ScriptedError;

        fn feed(&mut self, data: &[u8], _end_of_stream: bool) -> Result<FeedResult, ScriptedError> {
            if self.access_units.is_empty() && self.fail_after {
                return Err(ScriptedError);
            }
            Ok(FeedResult {
                bytes_consumed: data.len(),
                access_units: std::mem::take(&mut self.access_units),
            })
        }

        fn parameter_sets(&self) -> &ParameterSets {
            &self.parameter_sets
        }
    }

    fn access_unit(decode_order: u32, display_order: u32) -> AccessUnit {
        AccessUnit {
            units: vec![vec![0x65, decode_order as u8], vec![0x06, 1, 2]],
            decode_order,
            display_order,
            is_key_frame: display_order == 0,
        }
    }

    fn parameter_sets() -> ParameterSets {
        let mut parameter_sets = ParameterSets::default();
        parameter_sets.sps.insert(
            0,
            crate::access_unit::SequenceParameterSet {
                id: 0,
                profile_idc: 66,
                constraint_flags: 0xc0,
                level_idc: 30,
                width: 320,
                height: 240,
                raw: vec![0x67, 66, 0xc0, 30],
            },
        );
        parameter_sets.pps.insert(
            0,
            crate::access_unit::PictureParameterSet {
                id: 0,
                sps_id: 0,
                raw: vec![0x68, 0xce],
            },
        );
        parameter_sets
    }

    #[tokio::test]
    async fn test_reordered_presentation_times() {
        let dir = tempfile::tempdir().unwrap();
        let parser = ScriptedParser {
            access_units: [(0, 0), (1, 2), (2, 1), (3, 3), (4, 0)]
                .into_iter()
                .map(|(decode, display)| access_unit(decode, display))
                .collect(),
            parameter_sets: parameter_sets(),
            fail_after: false,
        };
        let storage = SampleStorage::create_in(dir.path()).unwrap();
        let track = TrackBuilder::new(parser, MuxOptions::default())
            .build(&b"ignored"[..], storage)
            .await
            .unwrap();

        let samples = track.samples.samples();
        assert_eq!(
            samples.iter().map(|s| s.cts()).collect::<Vec<_>>(),
            vec![1000, 3000, 2000, 4000, 5000]
        );
        assert_eq!(
            samples.iter().map(|s| s.dts).collect::<Vec<_>>(),
            vec![0, 1000, 2000, 3000, 4000]
        );
        assert_eq!(
            samples.iter().map(|s| s.is_sync).collect::<Vec<_>>(),
            vec![true, false, false, false, true]
        );
        // two length-prefixed units: 4 + 2 and 4 + 3 bytes
        assert!(samples.iter().all(|s| s.size == 13));
        assert_eq!(samples[1].offset, 13);

        assert_eq!(track.media_timescale, 24000);
        assert_eq!(track.media_duration, 5000);
        assert_eq!(track.duration, 208);
        assert_eq!((track.width, track.height), (320 << 16, 240 << 16));

        let avcc = track.samples.descriptions()[0].avc_config().unwrap();
        assert_eq!(avcc.profile_indication, 66);
        assert_eq!(avcc.profile_compatibility, 0xc0);
        assert_eq!(avcc.sequence_parameter_sets, vec![vec![0x67, 66, 0xc0, 30]]);
        assert_eq!(avcc.picture_parameter_sets, vec![vec![0x68, 0xce]]);

        let stored = std::fs::read(samples[0].source.path()).unwrap();
        assert_eq!(&stored[..13], &[0, 0, 0, 2, 0x65, 0, 0, 0, 0, 3, 0x06, 1, 2]);
    }

    #[tokio::test]
    async fn test_parse_failure_keeps_earlier_samples() {
        let dir = tempfile::tempdir().unwrap();
        let parser = ScriptedParser {
            access_units: vec![access_unit(0, 0), access_unit(1, 1)],
            parameter_sets: parameter_sets(),
            fail_after: true,
        };
        // enough input for several reads
        let input = vec![0u8; READ_SIZE * 3];
        let storage = SampleStorage::create_in(dir.path()).unwrap();
        let track = TrackBuilder::new(parser, MuxOptions::default())
            .build(&input[..], storage)
            .await
            .unwrap();
        assert_eq!(track.sample_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_parameter_sets() {
        let dir = tempfile::tempdir().unwrap();
        let parser = ScriptedParser {
            access_units: vec![access_unit(0, 0)],
            parameter_sets: ParameterSets::default(),
            fail_after: false,
        };
        let storage = SampleStorage::create_in(dir.path()).unwrap();
        let err = TrackBuilder::new(parser, MuxOptions::default())
            .build(&b""[..], storage)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCodecConfig);
        // the storage was released with the failed build
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_annex_b_stream() {
        let dir = tempfile::tempdir().unwrap();
        let stream = annex_b_stream(64, 48, &[(true, 0), (false, 4), (false, 2), (false, 6)]);
        let storage = SampleStorage::create_in(dir.path()).unwrap();
        let options = MuxOptions::builder().frame_rate(25).build();
        let track = TrackBuilder::new(AvcFrameParser::new(), options)
            .build(&stream[..], storage)
            .await
            .unwrap();

        assert_eq!(track.sample_count(), 4);
        assert_eq!(
            track
                .samples
                .samples()
                .iter()
                .map(|s| s.cts())
                .collect::<Vec<_>>(),
            vec![1000, 3000, 2000, 4000]
        );
        assert_eq!(track.duration, 160);
        assert_eq!((track.width >> 16, track.height >> 16), (64, 48));
        let entry = &track.samples.descriptions()[0];
        assert_eq!(entry.entry_type, SAMPLE_ENTRY_AVC1);
        assert_eq!(entry.data_reference_index, 1);
    }
}
