mod common;

use std::{
    path::Path,
    process::{Command, Output},
};

use escargot::CargoBuild;
use mp4_splice::movie::read_movie;

use common::{annex_b_stream, track_file};

fn mp4splice() -> Command {
    CargoBuild::new()
        .bin("mp4splice")
        .run()
        .expect("error building mp4splice")
        .command()
}

fn run(args: &[&str]) -> Output {
    mp4splice().args(args).output().expect("failed to run mp4splice")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn path(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[tokio::test]
async fn test_mux_then_edit() {
    let dir = tempfile::tempdir().unwrap();
    let stream = dir.path().join("in.h264");
    let muxed = dir.path().join("muxed.mp4");
    let new_track = dir.path().join("newtrak.bin");
    let edited = dir.path().join("edited.mp4");
    std::fs::write(&stream, annex_b_stream(32, 32, &[(true, 0), (false, 2)])).unwrap();
    std::fs::write(&new_track, track_file(9, 16)).unwrap();

    let output = run(&["mux", path(&stream), path(&muxed), "--frame-rate", "30"]);
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).starts_with("muxed "), "{output:?}");
    let movie = read_movie(&muxed).await.unwrap();
    assert_eq!(movie.tracks[0].media_timescale, 30_000);

    // only succeeds if the insert runs before the remove
    let insert = format!("moov:{}", path(&new_track));
    let output = run(&[
        "edit",
        path(&muxed),
        path(&edited),
        "--insert",
        &insert,
        "--remove",
        "moov/trak[1]",
    ]);
    assert!(output.status.success(), "{output:?}");
    assert!(
        stdout(&output).contains("applied 2 command(s)"),
        "{output:?}"
    );

    let movie = read_movie(&edited).await.unwrap();
    assert_eq!(movie.tracks.len(), 1);
    assert_eq!(movie.tracks[0].sample_count(), 2);
}

#[test]
fn test_failure_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("out.mp4");

    let output = run(&[
        "append",
        path(&dir.path().join("a.mp4")),
        path(&dir.path().join("b.mp4")),
        path(&output_path),
    ]);
    assert!(!output.status.success());
    assert!(stdout(&output).starts_with("error: I/O failure"), "{output:?}");
    assert!(!output_path.exists());
}

#[test]
fn test_invalid_edit_command_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&[
        "edit",
        path(&dir.path().join("in.mp4")),
        path(&dir.path().join("out.mp4")),
        "--replace",
        "moov/trak",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("PATH:FILE"));
}
