//! Writing the output tree.
//!
//! Every output file of a build is registered with a `SiteWriter` first, so
//! collisions surface before anything touches the disk. Committing stages
//! all files in a temporary directory next to the output directory, checks
//! that nothing in the output directory is in the way, then renames them into
//! place.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

pub const STAGING_PREFIX: &str = ".quire-staging-";

#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    #[error("write failure: {output} is produced by both {first} and {second}")]
    Collision {
        output: PathBuf,
        first: String,
        second: String,
    },

    #[error("write failure: output path {0} is not inside the output directory")]
    InvalidPath(PathBuf),

    #[error("write failure: {path} is in the way of {output}")]
    Blocked { path: PathBuf, output: PathBuf },

    #[error("write failure: failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

impl WriteError {
    fn io(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| WriteError::Io {
            action,
            path,
            source,
        }
    }
}

/// What goes into an output file.
#[derive(Debug, Clone)]
pub enum OutputContents {
    /// Rendered bytes
    Bytes(Vec<u8>),
    /// A file copied verbatim from this path
    Copy(PathBuf),
}

/// One file of the output tree.
#[derive(Debug, Clone)]
pub struct OutputFile {
    /// Path relative to the output directory
    pub path: PathBuf,
    /// Source path, or a synthetic origin like `tags/rust`
    pub origin: String,
    pub contents: OutputContents,
}

impl OutputFile {
    pub fn bytes(path: impl Into<PathBuf>, origin: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            origin: origin.into(),
            contents: OutputContents::Bytes(bytes),
        }
    }

    pub fn copy(path: impl Into<PathBuf>, origin: impl Into<String>, from: PathBuf) -> Self {
        Self {
            path: path.into(),
            origin: origin.into(),
            contents: OutputContents::Copy(from),
        }
    }
}

/// Collects the output files of one build and writes them atomically.
#[derive(Debug)]
pub struct SiteWriter {
    output_dir: PathBuf,
    files: BTreeMap<PathBuf, OutputFile>,
}

impl SiteWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            files: BTreeMap::new(),
        }
    }

    /// Register an output file.
    ///
    /// Fails if another file already claimed the same output path.
    pub fn add(&mut self, file: OutputFile) -> Result<(), WriteError> {
        let relative = file.path.components().all(|c| matches!(c, Component::Normal(_)));
        if !relative || file.path.as_os_str().is_empty() {
            return Err(WriteError::InvalidPath(file.path));
        }

        if let Some(existing) = self.files.get(&file.path) {
            return Err(WriteError::Collision {
                output: file.path.clone(),
                first: existing.origin.clone(),
                second: file.origin,
            });
        }

        self.files.insert(file.path.clone(), file);
        Ok(())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Write every registered file into the output directory.
    ///
    /// Files are staged first, and every target is checked before the first
    /// one is moved, so a failure leaves the output directory exactly as it
    /// was. Files already in the output directory that this build doesn't
    /// produce are kept, unless `clean` is set, in which case the staged tree
    /// replaces the whole directory.
    pub fn commit(self, clean: bool) -> Result<usize, WriteError> {
        let parent = match self.output_dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(WriteError::io("create", &parent))?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&parent)
            .map_err(WriteError::io("create staging directory in", &parent))?;
        let site = staging.path().join("site");
        std::fs::create_dir_all(&site).map_err(WriteError::io("create", &site))?;

        for (relative, file) in &self.files {
            let staged = site.join(relative);
            if let Some(dir) = staged.parent() {
                std::fs::create_dir_all(dir).map_err(WriteError::io("create", dir))?;
            }
            match &file.contents {
                OutputContents::Bytes(bytes) => {
                    std::fs::write(&staged, bytes).map_err(WriteError::io("stage", relative))?
                }
                OutputContents::Copy(from) => {
                    std::fs::copy(from, &staged).map_err(WriteError::io("copy", from))?;
                }
            }
        }
        tracing::debug!(files = self.files.len(), staging = %staging.path().display(), "staged output");

        if self.output_dir.exists() && !self.output_dir.is_dir() {
            return Err(WriteError::Blocked {
                path: self.output_dir.clone(),
                output: self.output_dir.clone(),
            });
        }

        if clean {
            let previous = staging.path().join("previous");
            if let Err(e) = self.swap_in(&site, &previous) {
                if previous.exists() {
                    let kept = staging.keep();
                    tracing::error!(backup = %kept.join("previous").display(), "previous output kept");
                }
                return Err(e);
            }
            return Ok(self.files.len());
        }

        self.check_targets()?;
        std::fs::create_dir_all(&self.output_dir)
            .map_err(WriteError::io("create", &self.output_dir))?;

        for relative in self.files.keys() {
            let target = self.output_dir.join(relative);
            if let Some(dir) = target.parent() {
                std::fs::create_dir_all(dir).map_err(WriteError::io("create", dir))?;
            }
            std::fs::rename(site.join(relative), &target)
                .map_err(WriteError::io("move into place", &target))?;
        }

        Ok(self.files.len())
    }

    /// Fail if an existing entry would stop a file from being moved in: a
    /// file where a directory is needed, or a directory where the file goes.
    fn check_targets(&self) -> Result<(), WriteError> {
        for relative in self.files.keys() {
            let mut current = self.output_dir.clone();
            let mut components = relative.components().peekable();
            while let Some(component) = components.next() {
                current.push(component);
                let is_last = components.peek().is_none();
                let blocked = if is_last {
                    current.is_dir()
                } else {
                    current.exists() && !current.is_dir()
                };
                if blocked {
                    return Err(WriteError::Blocked {
                        path: current,
                        output: relative.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Replace the output directory with the staged tree.
    ///
    /// The old directory is moved aside first and moved back if the staged
    /// tree can't take its place.
    fn swap_in(&self, site: &Path, previous: &Path) -> Result<(), WriteError> {
        let existed = self.output_dir.exists();
        if existed {
            tracing::debug!(path = %self.output_dir.display(), "replacing output directory");
            std::fs::rename(&self.output_dir, previous)
                .map_err(WriteError::io("move aside", &self.output_dir))?;
        }

        if let Err(source) = std::fs::rename(site, &self.output_dir) {
            if existed && let Err(e) = std::fs::rename(previous, &self.output_dir) {
                tracing::error!(path = %self.output_dir.display(), "failed to restore output directory: {e}");
            }
            return Err(WriteError::Io {
                action: "move into place",
                path: self.output_dir.clone(),
                source,
            });
        }
        Ok(())
    }
}
