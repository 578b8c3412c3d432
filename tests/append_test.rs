mod common;

use std::path::Path;

use futures_util::AsyncWriteExt;
use mp4_splice::{
    api::{append_files, append_files_status, mux_avc_file},
    movie::{read_movie, write_movie, Movie, WriteOptions},
    track_builder::MuxOptions,
    ErrorKind, TrackKind,
};
use tokio_util::compat::TokioAsyncWriteCompatExt;

use common::annex_b_stream;

async fn mux(dir: &Path, name: &str, pictures: &[(bool, u32)]) -> std::path::PathBuf {
    let input = dir.join(format!("{name}.h264"));
    let output = dir.join(format!("{name}.mp4"));
    std::fs::write(&input, annex_b_stream(64, 48, pictures)).unwrap();
    mux_avc_file(&input, &output, MuxOptions::default())
        .await
        .unwrap();
    output
}

fn sample_bytes(path: &Path, offset: u64, size: u32) -> Vec<u8> {
    let bytes = std::fs::read(path).unwrap();
    bytes[offset as usize..offset as usize + size as usize].to_vec()
}

#[tokio::test]
async fn test_append_video_files() {
    let dir = tempfile::tempdir().unwrap();
    let first = mux(
        dir.path(),
        "first",
        &[(true, 0), (false, 4), (false, 2), (false, 6)],
    )
    .await;
    let second = mux(dir.path(), "second", &[(true, 0), (false, 2), (false, 4)]).await;
    let output = dir.path().join("joined.mp4");

    append_files(&first, &second, &output).await.unwrap();

    let first_movie = read_movie(&first).await.unwrap();
    let second_movie = read_movie(&second).await.unwrap();
    let joined = read_movie(&output).await.unwrap();

    let file_type = joined.file_type.as_ref().unwrap();
    assert_eq!(file_type.minor_version, 0);
    assert_eq!(joined.tracks.len(), 1);

    let track = &joined.tracks[0];
    let first_track = &first_movie.tracks[0];
    let second_track = &second_movie.tracks[0];
    assert_eq!(track.kind, TrackKind::Video);
    assert_eq!(track.sample_count(), 7);
    assert_eq!(track.media_timescale, first_track.media_timescale);
    assert_eq!(track.media_duration, 7000);
    assert_eq!(track.duration, first_track.duration + second_track.duration);
    // identical SPS/PPS, so one shared description
    assert_eq!(track.samples.descriptions().len(), 1);

    let samples = track.samples.samples();
    assert_eq!(
        samples.iter().map(|s| s.dts).collect::<Vec<_>>(),
        (0..7).map(|i| i * 1000).collect::<Vec<_>>()
    );
    assert_eq!(
        samples.iter().map(|s| s.is_sync).collect::<Vec<_>>(),
        vec![true, false, false, false, true, false, false]
    );
    // composition offsets survive the join
    assert_eq!(samples[4].cts_delta, second_track.samples.samples()[0].cts_delta);

    for (joined, original) in samples[..4].iter().zip(first_track.samples.samples()) {
        assert_eq!(
            sample_bytes(&output, joined.offset, joined.size),
            sample_bytes(&first, original.offset, original.size)
        );
    }
    for (joined, original) in samples[4..].iter().zip(second_track.samples.samples()) {
        assert_eq!(
            sample_bytes(&output, joined.offset, joined.size),
            sample_bytes(&second, original.offset, original.size)
        );
    }
}

#[tokio::test]
async fn test_append_without_common_tracks() {
    let dir = tempfile::tempdir().unwrap();
    let video = mux(dir.path(), "video", &[(true, 0), (false, 2)]).await;

    let empty = dir.path().join("empty.mp4");
    let file = tokio::fs::File::create(&empty).await.unwrap();
    let mut file = write_movie(&Movie::new(1000), file.compat_write(), &WriteOptions::default())
        .await
        .unwrap();
    file.close().await.unwrap();

    let output = dir.path().join("joined.mp4");
    let err = append_files(&video, &empty, &output).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingTrack);
    assert!(!output.exists());

    let status = append_files_status(&video, &empty, &output).await;
    assert!(status.starts_with("error: no matching track"), "{status}");
}

#[tokio::test]
async fn test_append_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let video = mux(dir.path(), "video", &[(true, 0)]).await;
    let output = dir.path().join("joined.mp4");

    let err = append_files(&video, &dir.path().join("missing.mp4"), &output)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);

    let status = append_files_status(&video, &video, &output).await;
    assert_eq!(
        status,
        format!(
            "appended {} to {} into {}",
            video.display(),
            video.display(),
            output.display()
        )
    );
    assert_eq!(read_movie(&output).await.unwrap().tracks[0].sample_count(), 2);
}
