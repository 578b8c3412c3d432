/*!
 * Structural edits of an atom tree: insert, remove and replace atoms addressed by [`AtomPath`].
 *
 * Commands run in order and processing stops at the first failure. A command whose path doesn't
 * resolve leaves the tree untouched, but commands applied before a failing one stay applied.
 */

pub mod relocate;

use bon::Builder;
use futures_util::io::BufReader;
use std::{
    fmt,
    path::{Path, PathBuf},
};
use tokio_util::compat::TokioAsyncReadCompatExt;
use tracing::debug;

use crate::{
    atom::{atom_ref::AtomRefMut, path::children_at_mut, AtomPath},
    error::{Error, ErrorKind, Result, ResultExt},
    Atom, Parser,
};

use self::relocate::MediaDataLayout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommand {
    /// Parse the single atom stored in `file` and attach it under `path`.
    ///
    /// `position` of `None` appends after the existing children.
    Insert {
        path: AtomPath,
        file: PathBuf,
        position: Option<usize>,
    },
    Remove {
        path: AtomPath,
    },
    /// Swap the atom at `path` for the one stored in `file`, keeping its position.
    Replace {
        path: AtomPath,
        file: PathBuf,
    },
}

impl EditCommand {
    pub fn path(&self) -> &AtomPath {
        match self {
            EditCommand::Insert { path, .. }
            | EditCommand::Remove { path }
            | EditCommand::Replace { path, .. } => path,
        }
    }

    /// Parses `PATH:FILE[:POSITION]`, where a position of `-1` appends.
    pub fn parse_insert(arg: &str) -> Result<Self> {
        let (path, rest) = split_path(arg)?;
        let (file, position) = match rest.rsplit_once(':') {
            Some((file, position)) if looks_numeric(position) => {
                let position = match position.parse::<i64>() {
                    Ok(-1) => None,
                    Ok(position) => Some(usize::try_from(position).map_err(|_| {
                        Error::new(
                            ErrorKind::InvalidCommand,
                            format!("invalid insert position {position} in {arg:?}"),
                        )
                    })?),
                    Err(err) => {
                        return Err(Error::new(
                            ErrorKind::InvalidCommand,
                            format!("invalid insert position in {arg:?}"),
                        )
                        .with_source(err))
                    }
                };
                (file, position)
            }
            _ => (rest, None),
        };
        Ok(EditCommand::Insert {
            path,
            file: non_empty_file(file, arg)?,
            position,
        })
    }

    pub fn parse_remove(arg: &str) -> Result<Self> {
        let path: AtomPath = arg.parse()?;
        if path.is_root() {
            return Err(Error::new(
                ErrorKind::InvalidCommand,
                "the top level can't be removed",
            ));
        }
        Ok(EditCommand::Remove { path })
    }

    /// Parses `PATH:FILE`.
    pub fn parse_replace(arg: &str) -> Result<Self> {
        let (path, file) = split_path(arg)?;
        if path.is_root() {
            return Err(Error::new(
                ErrorKind::InvalidCommand,
                format!("replace needs an atom path in {arg:?}"),
            ));
        }
        Ok(EditCommand::Replace {
            path,
            file: non_empty_file(file, arg)?,
        })
    }
}

impl fmt::Display for EditCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditCommand::Insert {
                path,
                file,
                position,
            } => {
                write!(f, "insert {} into /{path}", file.display())?;
                match position {
                    Some(position) => write!(f, " at {position}"),
                    None => Ok(()),
                }
            }
            EditCommand::Remove { path } => write!(f, "remove /{path}"),
            EditCommand::Replace { path, file } => {
                write!(f, "replace /{path} with {}", file.display())
            }
        }
    }
}

fn split_path(arg: &str) -> Result<(AtomPath, &str)> {
    let (path, rest) = arg.split_once(':').ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidCommand,
            format!("expected PATH:FILE, got {arg:?}"),
        )
    })?;
    Ok((path.parse()?, rest))
}

fn looks_numeric(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn non_empty_file(file: &str, arg: &str) -> Result<PathBuf> {
    if file.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidCommand,
            format!("missing file name in {arg:?}"),
        ));
    }
    Ok(PathBuf::from(file))
}

#[derive(Debug, Clone, Builder)]
pub struct EditOptions {
    /// Shift `stco`/`co64` entries so they keep pointing at their samples once atoms ahead of
    /// `mdat` change size.
    #[builder(default = true)]
    pub relocate_chunk_offsets: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Applies [`EditCommand`]s to the top level of a parsed file.
pub struct EditProcessor {
    atoms: Vec<Atom>,
    layout: MediaDataLayout,
    options: EditOptions,
}

impl EditProcessor {
    pub fn new(atoms: Vec<Atom>, options: EditOptions) -> Self {
        let layout = MediaDataLayout::snapshot(&atoms);
        Self {
            atoms,
            layout,
            options,
        }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Runs `commands` in order, stopping at the first one that fails.
    pub async fn apply_all<'a>(
        &mut self,
        commands: impl IntoIterator<Item = &'a EditCommand>,
    ) -> Result<()> {
        for command in commands {
            self.apply(command).await?;
        }
        Ok(())
    }

    pub async fn apply(&mut self, command: &EditCommand) -> Result<()> {
        debug!(%command, "applying edit");
        match command {
            EditCommand::Insert {
                path,
                file,
                position,
            } => {
                // resolve before touching the file so a bad path reports NotFound
                self.container_positions(path)?;
                let atom = load_atom_file(file).await?;
                self.insert(path, atom, *position)?;
            }
            EditCommand::Remove { path } => {
                self.remove(path)?;
            }
            EditCommand::Replace { path, file } => {
                self.locate(path)?;
                let atom = load_atom_file(file).await?;
                self.replace(path, atom)?;
            }
        }
        Ok(())
    }

    /// Attaches `atom` as a child of the container at `path` (the top level when `path` is empty).
    ///
    /// Returns the position the atom was attached at.
    pub fn insert(
        &mut self,
        path: &AtomPath,
        mut atom: Atom,
        position: Option<usize>,
    ) -> Result<usize> {
        let positions = self.container_positions(path)?;
        atom.forget_offsets();

        let index = match positions.split_last() {
            None => {
                let len = self.atoms.len();
                match position {
                    Some(index) if index > len => None,
                    Some(index) => {
                        self.atoms.insert(index, atom);
                        Some(index)
                    }
                    None => {
                        self.atoms.push(atom);
                        Some(len)
                    }
                }
            }
            Some((last, ancestors)) => {
                let parent = children_at_mut(&mut self.atoms, ancestors)
                    .and_then(|children| children.get_mut(*last))
                    .ok_or_else(|| not_found(path))?;
                AtomRefMut(parent).insert_child(position, atom)
            }
        };
        let index = index.ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidCommand,
                format!(
                    "insert position {} is past the end of {}",
                    position.unwrap_or_default(),
                    display_path(path)
                ),
            )
        })?;
        debug!(path = %path, index, "inserted atom");
        Ok(index)
    }

    /// Detaches the atom at `path` and hands it to the caller.
    pub fn remove(&mut self, path: &AtomPath) -> Result<Atom> {
        let positions = self.locate(path)?;
        let (last, ancestors) = positions.split_last().ok_or_else(|| not_found(path))?;
        let removed = match ancestors.split_last() {
            None => self.atoms.remove(*last),
            Some((parent, ancestors)) => {
                let parent = children_at_mut(&mut self.atoms, ancestors)
                    .and_then(|children| children.get_mut(*parent))
                    .ok_or_else(|| not_found(path))?;
                AtomRefMut(parent)
                    .detach_child(*last)
                    .ok_or_else(|| not_found(path))?
            }
        };
        debug!(path = %path, atom_type = %removed.atom_type(), "removed atom");
        Ok(removed)
    }

    /// Puts `atom` in the slot of the atom at `path`, returning the atom it displaced.
    pub fn replace(&mut self, path: &AtomPath, mut atom: Atom) -> Result<Atom> {
        let positions = self.locate(path)?;
        let (last, ancestors) = positions.split_last().ok_or_else(|| not_found(path))?;
        atom.forget_offsets();
        let siblings = children_at_mut(&mut self.atoms, ancestors).ok_or_else(|| not_found(path))?;
        let replaced = std::mem::replace(&mut siblings[*last], atom);
        debug!(path = %path, position = *last, "replaced atom");
        Ok(replaced)
    }

    /// Finishes editing, fixing up chunk offsets when enabled.
    pub fn into_atoms(mut self) -> Vec<Atom> {
        if self.options.relocate_chunk_offsets {
            self.layout.relocate(&mut self.atoms);
        }
        self.atoms
    }

    fn locate(&self, path: &AtomPath) -> Result<Vec<usize>> {
        if path.is_root() {
            return Err(Error::new(
                ErrorKind::InvalidCommand,
                "the top level isn't an atom",
            ));
        }
        path.locate(&self.atoms).ok_or_else(|| not_found(path))
    }

    fn container_positions(&self, path: &AtomPath) -> Result<Vec<usize>> {
        if path.is_root() {
            return Ok(Vec::new());
        }
        let positions = path.locate(&self.atoms).ok_or_else(|| not_found(path))?;
        let target = path.resolve(&self.atoms).ok_or_else(|| not_found(path))?;
        if !target.is_container() && target.children.is_empty() {
            return Err(Error::new(ErrorKind::NotAContainer, path.to_string()));
        }
        Ok(positions)
    }
}

fn not_found(path: &AtomPath) -> Error {
    Error::new(ErrorKind::NotFound, path.to_string())
}

fn display_path(path: &AtomPath) -> String {
    if path.is_root() {
        "the top level".to_string()
    } else {
        path.to_string()
    }
}

/// Reads a file holding exactly one serialized atom.
pub async fn load_atom_file(path: &Path) -> Result<Atom> {
    let file = tokio::fs::File::open(path)
        .await
        .context_for(path.display())?;
    let mut atom = Parser::new(BufReader::new(file.compat()))
        .parse_single_atom()
        .await
        .context_for(path.display())?;
    atom.forget_offsets();
    Ok(atom)
}
