use std::{collections::VecDeque, ops::Range};

use crate::{atom::stsc::ChunkLayout, sample_table::Sample};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    pub track_index: usize,
    /// 1-based, within the track
    pub chunk_number: u32,
    /// Index into the track's sample descriptions
    pub description_index: usize,
    pub chunk_size: u64,
    pub sample_indices: Range<usize>,
}

impl ChunkInfo {
    pub fn layout(&self) -> ChunkLayout {
        ChunkLayout {
            samples_per_chunk: self.sample_indices.len() as u32,
            sample_description_index: self.description_index as u32 + 1,
        }
    }
}

#[derive(Clone)]
pub struct ChunkOffsetBuilderTrack<'a> {
    samples: &'a [Sample],
    samples_per_chunk: usize,
}

impl<'a> ChunkOffsetBuilderTrack<'a> {
    /// Splits the samples into chunks of up to `samples_per_chunk` samples sharing a description.
    pub fn build_chunk_info(&self, track_index: usize) -> impl Iterator<Item = ChunkInfo> + 'a {
        let samples = self.samples;
        let samples_per_chunk = self.samples_per_chunk.max(1);
        let mut start = 0;
        let mut chunk_number = 0;
        std::iter::from_fn(move || {
            let first = samples.get(start)?;
            let len = samples[start..]
                .iter()
                .take(samples_per_chunk)
                .take_while(|sample| sample.description_index == first.description_index)
                .count();
            let sample_indices = start..start + len;
            start += len;
            chunk_number += 1;
            Some(ChunkInfo {
                track_index,
                chunk_number,
                description_index: first.description_index,
                chunk_size: samples[sample_indices.clone()]
                    .iter()
                    .map(|sample| u64::from(sample.size))
                    .sum(),
                sample_indices,
            })
        })
    }
}

pub struct ChunkOffsetBuilder<'a> {
    tracks: Vec<ChunkOffsetBuilderTrack<'a>>,
    samples_per_chunk: usize,
}

impl<'a> ChunkOffsetBuilder<'a> {
    pub fn new(samples_per_chunk: u32) -> Self {
        Self {
            tracks: Vec::new(),
            samples_per_chunk: samples_per_chunk as usize,
        }
    }

    pub fn add_track(&mut self, samples: &'a [Sample]) {
        self.tracks.push(ChunkOffsetBuilderTrack {
            samples,
            samples_per_chunk: self.samples_per_chunk,
        })
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Build interleaved chunk information including sizes and sample mappings
    pub fn build_chunk_info(&self) -> impl Iterator<Item = ChunkInfo> + 'a {
        let mut iters = VecDeque::from_iter(
            self.tracks
                .clone()
                .into_iter()
                .enumerate()
                .map(|(track_index, track)| track.build_chunk_info(track_index)),
        );

        // round-robin chunks from each track
        std::iter::from_fn(move || {
            while let Some(mut it) = iters.pop_front() {
                if let Some(item) = it.next() {
                    iters.push_back(it);
                    return Some(item);
                }
            }
            None
        })
    }

    /// Build interleaved chunk offsets for each track given a starting offset
    pub fn build_chunk_offsets(&self, start_offset: u64) -> Vec<Vec<u64>> {
        let chunks: Vec<ChunkInfo> = self.build_chunk_info().collect();
        chunk_offsets(&chunks, self.tracks.len(), start_offset)
    }
}

/// Offsets of `chunks`, laid out back to back from `start_offset`, grouped per track.
pub fn chunk_offsets(chunks: &[ChunkInfo], track_count: usize, start_offset: u64) -> Vec<Vec<u64>> {
    let tracks: Vec<Vec<u64>> = (0..track_count).map(|_| Vec::new()).collect();

    let (_, chunk_offsets) = chunks.iter().fold(
        (start_offset, tracks),
        |(mut current_offset, mut tracks), chunk| {
            let chunk_offset = current_offset;
            current_offset += chunk.chunk_size;
            tracks[chunk.track_index].push(chunk_offset);
            (current_offset, tracks)
        },
    );

    chunk_offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_table::SampleSource;

    fn samples(sizes: &[u32]) -> Vec<Sample> {
        samples_with_descriptions(&sizes.iter().map(|size| (*size, 0)).collect::<Vec<_>>())
    }

    fn samples_with_descriptions(samples: &[(u32, usize)]) -> Vec<Sample> {
        let source = SampleSource::from_path("in.mp4");
        samples
            .iter()
            .map(|(size, description_index)| {
                Sample::builder()
                    .source(source.clone())
                    .offset(0)
                    .size(*size)
                    .duration(1000)
                    .description_index(*description_index)
                    .build()
            })
            .collect()
    }

    #[test]
    fn test_chunk_offset_calculation() {
        let samples = samples(&[100, 200, 150, 250, 300, 400, 500]);
        let mut builder = ChunkOffsetBuilder::new(3);
        builder.add_track(&samples);
        let offsets = builder.build_chunk_offsets(1000);

        // Chunk 1: samples 0..3 (450 bytes), chunk 2: samples 3..6 (950), chunk 3: sample 6
        assert_eq!(offsets, vec![vec![1000, 1450, 2400]]);
    }

    #[test]
    fn test_chunk_info_generation() {
        let samples = samples(&[100, 200, 300, 400, 500]);
        let mut builder = ChunkOffsetBuilder::new(2);
        builder.add_track(&samples);
        let chunk_info = builder.build_chunk_info().collect::<Vec<_>>();

        assert_eq!(chunk_info.len(), 3);
        assert_eq!(chunk_info[0].chunk_number, 1);
        assert_eq!(chunk_info[0].chunk_size, 300);
        assert_eq!(chunk_info[0].sample_indices, 0..2);
        assert_eq!(chunk_info[1].chunk_size, 700);
        assert_eq!(chunk_info[1].sample_indices, 2..4);
        assert_eq!(chunk_info[2].chunk_number, 3);
        assert_eq!(chunk_info[2].chunk_size, 500);
        assert_eq!(chunk_info[2].sample_indices, 4..5);
        assert_eq!(
            chunk_info[2].layout(),
            ChunkLayout {
                samples_per_chunk: 1,
                sample_description_index: 1,
            }
        );
    }

    #[test]
    fn test_chunks_split_at_description_change() {
        let samples = samples_with_descriptions(&[(10, 0), (10, 0), (10, 1), (10, 1), (10, 0)]);
        let mut builder = ChunkOffsetBuilder::new(10);
        builder.add_track(&samples);
        let chunks: Vec<_> = builder.build_chunk_info().collect();
        assert_eq!(
            chunks
                .iter()
                .map(|chunk| (chunk.sample_indices.clone(), chunk.description_index))
                .collect::<Vec<_>>(),
            vec![(0..2, 0), (2..4, 1), (4..5, 0)]
        );
    }

    #[test]
    fn test_edge_case_empty_samples() {
        let mut builder = ChunkOffsetBuilder::new(10);
        builder.add_track(&[]);
        assert_eq!(builder.build_chunk_info().count(), 0);
        assert_eq!(builder.build_chunk_offsets(0), vec![Vec::<u64>::new()]);
    }

    #[test]
    fn test_track_interleaving() {
        let track_1 = samples(&[100, 200, 150, 250]);
        let track_2 = samples(&[300, 400, 500]);
        let mut builder = ChunkOffsetBuilder::new(2);
        builder.add_track(&track_1);
        builder.add_track(&track_2);

        let chunk_info = builder.build_chunk_info().collect::<Vec<_>>();

        // T1C1, T2C1, T1C2, T2C2
        assert_eq!(
            chunk_info
                .iter()
                .map(|chunk| (chunk.track_index, chunk.chunk_number, chunk.chunk_size))
                .collect::<Vec<_>>(),
            vec![(0, 1, 300), (1, 1, 700), (0, 2, 400), (1, 2, 500)]
        );

        let offsets = builder.build_chunk_offsets(0);
        assert_eq!(offsets[0], vec![0, 1000]);
        assert_eq!(offsets[1], vec![300, 1400]);
    }
}
