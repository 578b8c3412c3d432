use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::{ArgMatches, Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use mp4_splice::{
    api::{self, append_files, edit_file, mux_avc_file},
    track_builder::MuxOptions,
    EditCommand, EditOptions,
};
use tracing_subscriber::EnvFilter;

/// Edit MP4 atoms, mux H.264 streams and join MP4 files
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert, remove or replace atoms, in the order given
    Edit(EditArgs),
    /// Wrap an H.264 Annex-B stream in an MP4 file
    Mux {
        input: PathBuf,
        output: PathBuf,
        /// Frames per second of the stream
        #[arg(long, default_value_t = 24)]
        frame_rate: u32,
    },
    /// Play SECOND right after FIRST
    Append {
        first: PathBuf,
        second: PathBuf,
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct EditArgs {
    input: PathBuf,
    output: PathBuf,
    /// Attach the atom stored in FILE under PATH, at POS or at the end
    #[arg(long, value_name = "PATH:FILE[:POS]", value_parser = EditCommand::parse_insert)]
    insert: Vec<EditCommand>,
    /// Detach the atom at PATH
    #[arg(long, value_name = "PATH", value_parser = EditCommand::parse_remove)]
    remove: Vec<EditCommand>,
    /// Swap the atom at PATH for the one stored in FILE
    #[arg(long, value_name = "PATH:FILE", value_parser = EditCommand::parse_replace)]
    replace: Vec<EditCommand>,
    /// Leave stco/co64 entries untouched
    #[arg(long)]
    no_relocate: bool,
}

impl EditArgs {
    /// Commands in command-line order, whatever flag introduced them.
    fn commands(&self, matches: &ArgMatches) -> Vec<EditCommand> {
        let mut commands = Vec::new();
        for (id, values) in [
            ("insert", &self.insert),
            ("remove", &self.remove),
            ("replace", &self.replace),
        ] {
            let indices = matches.indices_of(id).into_iter().flatten();
            commands.extend(indices.zip(values.iter().cloned()));
        }
        commands.sort_by_key(|(index, _)| *index);
        commands.into_iter().map(|(_, command)| command).collect()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if cli.verbose => EnvFilter::try_new("mp4_splice=debug")?,
        Err(_) => EnvFilter::try_new("mp4_splice=warn")?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let (result, success) = match &cli.command {
        Command::Edit(args) => {
            let edit_matches = matches
                .subcommand_matches("edit")
                .context("edit arguments")?;
            let commands = args.commands(edit_matches);
            let options = EditOptions::builder()
                .relocate_chunk_offsets(!args.no_relocate)
                .build();
            let result = edit_file(&args.input, &args.output, &commands, options).await;
            let success = format!(
                "edited {}: applied {} command(s), wrote {}",
                args.input.display(),
                commands.len(),
                args.output.display()
            );
            (result, success)
        }
        Command::Mux {
            input,
            output,
            frame_rate,
        } => {
            let options = MuxOptions::builder().frame_rate(*frame_rate).build();
            let result = mux_avc_file(input, output, options).await;
            let success = format!("muxed {} into {}", input.display(), output.display());
            (result, success)
        }
        Command::Append {
            first,
            second,
            output,
        } => {
            let result = append_files(first, second, output).await;
            let success = format!(
                "appended {} to {} into {}",
                second.display(),
                first.display(),
                output.display()
            );
            (result, success)
        }
    };

    println!("{}", api::report(&result, || success));
    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
