/*!
 * Entry points working on files.
 *
 * Each writes its output to a temporary file next to the destination and moves it into place only
 * once everything succeeded, so the destination is either complete or untouched. The `*_status`
 * variants report the outcome as a human readable line instead of a [`Result`].
 */

use futures_util::{
    io::{BufReader, BufWriter},
    AsyncWriteExt,
};
use std::{
    error::Error as _,
    path::{Path, PathBuf},
};
use tempfile::TempPath;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};
use tracing::{info, warn};

use crate::{
    avc::AvcFrameParser,
    concat::concat_tracks,
    edit::{EditCommand, EditOptions, EditProcessor},
    error::{Error, ErrorKind, Result, ResultExt},
    movie::{read_movie, write_movie, Movie, TrackKind, WriteOptions},
    sample_storage::SampleStorage,
    track_builder::{MuxOptions, TrackBuilder},
    Mp4Writer, Parser,
};

/// Applies `commands` to the atoms of `input` and writes the result to `output`.
pub async fn edit_file(
    input: &Path,
    output: &Path,
    commands: &[EditCommand],
    options: EditOptions,
) -> Result<()> {
    let file = tokio::fs::File::open(input)
        .await
        .context_for(input.display())?;
    let atoms = Parser::new(BufReader::new(file.compat()))
        .defer_media_data(true)
        .parse_atoms()
        .await
        .context_for(input.display())?;

    let mut processor = EditProcessor::new(atoms, options);
    processor.apply_all(commands).await?;
    let atoms = processor.into_atoms();

    let mut source = BufReader::new(
        tokio::fs::File::open(input)
            .await
            .context_for(input.display())?
            .compat(),
    );
    let mut out = OutputFile::create(output)?;
    let mut writer = Mp4Writer::new(out.writer());
    for atom in atoms {
        writer
            .write_atom_from(atom, &mut source)
            .await
            .context_for(output.display())?;
    }
    out.commit().await?;
    info!(
        input = %input.display(),
        output = %output.display(),
        commands = commands.len(),
        "edited file"
    );
    Ok(())
}

/// Muxes the H.264 Annex-B stream in `input` into a single-track movie at `output`.
pub async fn mux_avc_file(input: &Path, output: &Path, options: MuxOptions) -> Result<()> {
    let file = tokio::fs::File::open(input)
        .await
        .context_for(input.display())?;
    let storage = SampleStorage::create_in(output_dir(output)).context_for(output.display())?;
    let track = TrackBuilder::new(AvcFrameParser::new(), options)
        .build(BufReader::new(file.compat()), storage)
        .await
        .context_for(input.display())?;
    let samples = track.sample_count();

    let mut movie = Movie::new(options.movie_timescale);
    movie.add_track(track);
    write_output(&movie, output, &WriteOptions::mux()).await?;
    info!(
        input = %input.display(),
        output = %output.display(),
        samples,
        "muxed elementary stream"
    );
    Ok(())
}

/// Writes the tracks of `second` after those of `first` into `output`.
///
/// Video and audio are joined separately. A kind present in only one input is left out.
pub async fn append_files(first: &Path, second: &Path, output: &Path) -> Result<()> {
    let first_movie = read_movie(first).await?;
    let second_movie = read_movie(second).await?;

    let mut movie = Movie::new(first_movie.timescale);
    for kind in [TrackKind::Video, TrackKind::Audio] {
        match (first_movie.track(kind), second_movie.track(kind)) {
            (Some(a), Some(b)) => movie.add_track(concat_tracks(a, b)?),
            (None, None) => {}
            (a, _) => {
                let missing_from = if a.is_none() { first } else { second };
                warn!(
                    %kind,
                    missing_from = %missing_from.display(),
                    "track missing from one input, skipping it"
                );
            }
        }
    }
    if movie.tracks.is_empty() {
        return Err(Error::new(
            ErrorKind::MissingTrack,
            format!(
                "{} and {} have no video or audio track in common",
                first.display(),
                second.display()
            ),
        ));
    }

    write_output(&movie, output, &WriteOptions::append()).await?;
    info!(
        output = %output.display(),
        tracks = movie.tracks.len(),
        "appended files"
    );
    Ok(())
}

pub async fn edit_file_status(
    input: &Path,
    output: &Path,
    commands: &[EditCommand],
    options: EditOptions,
) -> String {
    report(&edit_file(input, output, commands, options).await, || {
        format!(
            "edited {}: applied {} command(s), wrote {}",
            input.display(),
            commands.len(),
            output.display()
        )
    })
}

pub async fn mux_avc_file_status(input: &Path, output: &Path, options: MuxOptions) -> String {
    report(&mux_avc_file(input, output, options).await, || {
        format!("muxed {} into {}", input.display(), output.display())
    })
}

pub async fn append_files_status(first: &Path, second: &Path, output: &Path) -> String {
    report(&append_files(first, second, output).await, || {
        format!(
            "appended {} to {} into {}",
            second.display(),
            first.display(),
            output.display()
        )
    })
}

/// Describes `err` along with every error in its source chain.
pub fn error_report(err: &Error) -> String {
    let mut report = err.to_string();
    let mut source = err.source();
    while let Some(err) = source {
        report.push_str(": ");
        report.push_str(&err.to_string());
        source = err.source();
    }
    report
}

/// Status line for the outcome of an entry point: `success()` or the error report.
pub fn report(result: &Result<()>, success: impl FnOnce() -> String) -> String {
    match result {
        Ok(()) => success(),
        Err(err) => format!("error: {}", error_report(err)),
    }
}

async fn write_output(movie: &Movie, output: &Path, options: &WriteOptions) -> Result<()> {
    let mut out = OutputFile::create(output)?;
    write_movie(movie, out.writer(), options)
        .await
        .context_for(output.display())?;
    out.commit().await
}

fn output_dir(output: &Path) -> &Path {
    match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Temporary file that replaces `path` on [`OutputFile::commit`] and is removed otherwise.
struct OutputFile {
    writer: BufWriter<Compat<tokio::fs::File>>,
    temp_path: TempPath,
    path: PathBuf,
}

impl OutputFile {
    fn create(path: &Path) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(".mp4splice-")
            .suffix(".tmp")
            .tempfile_in(output_dir(path))
            .context_for(path.display())?;
        let (file, temp_path) = file.into_parts();
        Ok(Self {
            writer: BufWriter::new(tokio::fs::File::from_std(file).compat_write()),
            temp_path,
            path: path.to_path_buf(),
        })
    }

    fn writer(&mut self) -> &mut BufWriter<Compat<tokio::fs::File>> {
        &mut self.writer
    }

    async fn commit(mut self) -> Result<()> {
        self.writer.flush().await.context_for(self.path.display())?;
        self.writer.close().await.context_for(self.path.display())?;
        self.temp_path
            .persist(&self.path)
            .map_err(|err| err.error)
            .context_for(self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_report_includes_sources() {
        let io: Result<()> = Err(std::io::Error::other("permission denied")).context_for("out.mp4");
        let status = report(&io, || unreachable!());
        assert_eq!(status, "error: I/O failure: out.mp4: permission denied");
    }

    #[test]
    fn test_output_dir() {
        assert_eq!(output_dir(Path::new("out.mp4")), Path::new("."));
        assert_eq!(output_dir(Path::new("a/out.mp4")), Path::new("a"));
    }

    #[tokio::test]
    async fn test_failed_output_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let err = mux_avc_file(&dir.path().join("missing.h264"), &output, MuxOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);

        let out = OutputFile::create(&output).unwrap();
        drop(out);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
