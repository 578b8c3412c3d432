mod common;

use std::path::Path;

use mp4_splice::{
    api::{edit_file, edit_file_status},
    atom::{MoovAtomRef, MDAT, MOOV, MVHD, TRAK},
    parser::parse_atoms_from_slice,
    Atom, EditCommand, EditOptions, ErrorKind,
};

use common::{movie_file, track_file, MEDIA_PAYLOAD};

fn parse(path: &Path) -> (Vec<u8>, Vec<Atom>) {
    let bytes = std::fs::read(path).unwrap();
    let atoms = parse_atoms_from_slice(&bytes, 0).unwrap();
    (bytes, atoms)
}

fn chunk_offsets(atoms: &[Atom]) -> Vec<Vec<u64>> {
    let moov = atoms.iter().find(|atom| atom.atom_type() == MOOV).unwrap();
    MoovAtomRef::new(moov)
        .tracks()
        .map(|trak| {
            trak.media()
                .sample_table()
                .chunk_offset()
                .map(|stco| stco.chunk_offsets.to_vec())
                .unwrap_or_default()
        })
        .collect()
}

fn track_ids(atoms: &[Atom]) -> Vec<u32> {
    let moov = atoms.iter().find(|atom| atom.atom_type() == MOOV).unwrap();
    MoovAtomRef::new(moov)
        .tracks()
        .filter_map(|trak| trak.track_id())
        .collect()
}

fn payload_at(bytes: &[u8], offset: u64) -> &[u8] {
    let offset = offset as usize;
    &bytes[offset..offset + MEDIA_PAYLOAD.len()]
}

#[tokio::test]
async fn test_remove_and_insert_track() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let new_track = dir.path().join("newtrak.bin");
    let output = dir.path().join("out.mp4");
    std::fs::write(&input, movie_file()).unwrap();
    std::fs::write(&new_track, track_file(3, 100)).unwrap();

    let (_, before) = parse(&input);
    let old_offset = chunk_offsets(&before)[0][0];

    let commands = vec![
        EditCommand::parse_remove("moov/trak[1]").unwrap(),
        EditCommand::Insert {
            path: "moov".parse().unwrap(),
            file: new_track.clone(),
            position: Some(0),
        },
    ];
    edit_file(&input, &output, &commands, EditOptions::default())
        .await
        .unwrap();

    let (bytes, atoms) = parse(&output);
    let moov = atoms.iter().find(|atom| atom.atom_type() == MOOV).unwrap();
    assert_eq!(
        moov.children
            .iter()
            .map(|atom| atom.atom_type())
            .collect::<Vec<_>>(),
        vec![TRAK, MVHD, TRAK]
    );
    assert_eq!(track_ids(&atoms), vec![3, 1]);

    // the new track is 108 bytes larger than the removed one, pushing mdat back
    let offsets = chunk_offsets(&atoms);
    assert_eq!(offsets[1], vec![old_offset + 108]);
    assert_eq!(payload_at(&bytes, offsets[1][0]), MEDIA_PAYLOAD);

    let mdat = atoms.iter().find(|atom| atom.atom_type() == MDAT).unwrap();
    assert_eq!(mdat.header.data_offset(), Some(offsets[1][0]));
}

#[tokio::test]
async fn test_edit_without_relocation_keeps_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let new_track = dir.path().join("newtrak.bin");
    let output = dir.path().join("out.mp4");
    std::fs::write(&input, movie_file()).unwrap();
    std::fs::write(&new_track, track_file(3, 40)).unwrap();

    let commands = vec![EditCommand::parse_insert(&format!(
        "moov:{}",
        new_track.display()
    ))
    .unwrap()];
    let options = EditOptions::builder().relocate_chunk_offsets(false).build();
    edit_file(&input, &output, &commands, options).await.unwrap();

    let (_, before) = parse(&input);
    let (_, after) = parse(&output);
    assert_eq!(track_ids(&after), vec![1, 2, 3]);
    assert_eq!(chunk_offsets(&after)[0], chunk_offsets(&before)[0]);
}

#[tokio::test]
async fn test_replace_keeps_position() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let new_track = dir.path().join("newtrak.bin");
    let output = dir.path().join("out.mp4");
    std::fs::write(&input, movie_file()).unwrap();
    std::fs::write(&new_track, track_file(7, 0)).unwrap();

    let commands = vec![EditCommand::Replace {
        path: "moov/trak".parse().unwrap(),
        file: new_track,
    }];
    edit_file(&input, &output, &commands, EditOptions::default())
        .await
        .unwrap();

    let (bytes, atoms) = parse(&output);
    assert_eq!(track_ids(&atoms), vec![7, 2]);
    // the media data is still intact, even if nothing points at it anymore
    let mdat = atoms.iter().find(|atom| atom.atom_type() == MDAT).unwrap();
    let offset = mdat.header.data_offset().unwrap();
    assert_eq!(payload_at(&bytes, offset), MEDIA_PAYLOAD);
}

#[tokio::test]
async fn test_failed_edit_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.mp4");
    std::fs::write(&input, movie_file()).unwrap();

    let commands = vec![EditCommand::parse_remove("moov/trak[5]").unwrap()];
    let err = edit_file(&input, &output, &commands, EditOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let status = edit_file_status(&input, &output, &commands, EditOptions::default()).await;
    assert!(status.starts_with("error: atom not found"), "{status}");

    let names = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["in.mp4"]);
}

#[tokio::test]
async fn test_insert_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.mp4");
    std::fs::write(&input, movie_file()).unwrap();

    let commands = vec![EditCommand::Insert {
        path: "moov".parse().unwrap(),
        file: dir.path().join("missing.bin"),
        position: None,
    }];
    let err = edit_file(&input, &output, &commands, EditOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(!output.exists());
}
