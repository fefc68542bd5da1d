//! Loading drovefiles from disk with recursive import resolution.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::file::Drovefile;
use crate::FILE_EXTENSION;

/// Loads a drovefile and resolves its imports recursively.
///
/// Import paths resolve against the importing file's directory and
/// default to the drovefile extension. Each imported file's phase
/// lists are appended after the importer's; defaults union with the
/// importer winning. Cycles are detected against the canonicalized
/// paths currently on the resolution stack.
pub fn load(path: impl AsRef<Path>) -> Result<Drovefile> {
    let path = path.as_ref();

    let data = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut file = Drovefile::parse(&data).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    file.path = path.to_path_buf();

    let mut stack = vec![fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())];
    resolve_imports(&mut file, &mut stack)?;

    Ok(file)
}

fn resolve_imports(file: &mut Drovefile, stack: &mut Vec<PathBuf>) -> Result<()> {
    let dir = file
        .path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    for import in std::mem::take(&mut file.imports) {
        let mut target = dir.join(&import);
        if target.extension().is_none() {
            target.set_extension(FILE_EXTENSION);
        }

        let canonical = fs::canonicalize(&target).map_err(|source| Error::ImportNotFound {
            path: target.clone(),
            source,
        })?;
        if stack.contains(&canonical) {
            return Err(Error::ImportCycle { path: target });
        }

        let data = fs::read_to_string(&canonical).map_err(|source| Error::ImportNotFound {
            path: target.clone(),
            source,
        })?;
        let mut imported = Drovefile::parse(&data).map_err(|source| Error::Parse {
            path: target.clone(),
            source,
        })?;
        imported.path = target;

        stack.push(canonical);
        resolve_imports(&mut imported, stack)?;
        stack.pop();

        file.merge(imported);
    }

    Ok(())
}
