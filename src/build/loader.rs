//! Content discovery.
//!
//! Walks the content directory and yields documents (Markdown files, with
//! their raw bytes) and static files (everything else, copied as-is).

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use super::document::{ContentItem, SourceFile, StaticFile};

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum LoaderError {
    #[error("content path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("content path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

// =============================================================================
// Loader
// =============================================================================

/// Discovers content under a root directory.
#[derive(Debug, Clone)]
pub struct ContentLoader {
    root: PathBuf,
}

impl ContentLoader {
    /// Create a loader for a content directory, which must exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, LoaderError> {
        let root = root.into();
        if !root.exists() {
            return Err(LoaderError::NotFound(root));
        }
        if !root.is_dir() {
            return Err(LoaderError::NotADirectory(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh walk over the content directory.
    ///
    /// The walk is lazy: directories are listed and documents read only as the
    /// iterator advances. Every call starts over, and entries come out in the
    /// same order each time.
    pub fn scan(&self) -> ContentWalk {
        ContentWalk {
            root: self.root.clone(),
            pending_dirs: vec![PathBuf::new()],
            ready: VecDeque::new(),
        }
    }
}

/// Returns true for markdown documents.
pub fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_lowercase().as_str(), "md" | "markdown"))
}

/// Skip hidden files and common non-content directories.
fn is_ignored(file_name: &str, is_dir: bool) -> bool {
    file_name.starts_with('.')
        || (is_dir && matches!(file_name, "node_modules" | "target" | "__pycache__"))
}

/// Lazy, depth-first walk over a content directory.
pub struct ContentWalk {
    root: PathBuf,
    /// Directories still to list, relative to the root; popped from the end.
    pending_dirs: Vec<PathBuf>,
    /// Files found in the last listed directory, relative to the root.
    ready: VecDeque<PathBuf>,
}

impl ContentWalk {
    /// List one directory, queueing its files and subdirectories in name order.
    fn list(&mut self, relative_dir: &Path) -> Result<(), LoaderError> {
        let dir = self.root.join(relative_dir);
        let read_dir = |source: std::io::Error| LoaderError::ReadDir {
            path: dir.clone(),
            source,
        };

        let mut entries = std::fs::read_dir(&dir)
            .map_err(read_dir)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_dir)?;
        entries.sort_by_key(|entry| entry.file_name());

        let mut subdirs = Vec::new();
        for entry in entries {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            let path = entry.path();
            let is_dir = path.is_dir();

            if is_ignored(&name, is_dir) {
                continue;
            }

            let relative = relative_dir.join(&file_name);
            if is_dir {
                subdirs.push(relative);
            } else if path.is_file() {
                self.ready.push_back(relative);
            }
        }

        // Reverse so the alphabetically first subdirectory is popped next.
        self.pending_dirs.extend(subdirs.into_iter().rev());
        Ok(())
    }

    fn load(&self, relative: PathBuf) -> Result<ContentItem, LoaderError> {
        let full_path = self.root.join(&relative);

        if is_document(&relative) {
            let bytes = std::fs::read(&full_path).map_err(|source| LoaderError::ReadFile {
                path: relative.clone(),
                source,
            })?;
            Ok(ContentItem::Document(SourceFile {
                path: relative,
                bytes,
            }))
        } else {
            Ok(ContentItem::Static(StaticFile::new(relative, full_path)))
        }
    }
}

impl Iterator for ContentWalk {
    type Item = Result<ContentItem, LoaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(relative) = self.ready.pop_front() {
                return Some(self.load(relative));
            }

            let dir = self.pending_dirs.pop()?;
            if let Err(e) = self.list(&dir) {
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn listing(loader: &ContentLoader) -> Vec<String> {
        loader
            .scan()
            .map(|item| {
                let item = item.unwrap();
                let kind = match item {
                    ContentItem::Document(_) => "doc",
                    ContentItem::Static(_) => "static",
                };
                format!("{kind}:{}", item.source_path().display())
            })
            .collect()
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ContentLoader::new(dir.path().join("content")),
            Err(LoaderError::NotFound(_))
        ));
    }

    #[test]
    fn test_file_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "post.md", "x");
        assert!(matches!(
            ContentLoader::new(dir.path().join("post.md")),
            Err(LoaderError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_scan_classifies_and_orders() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b-post.md", "# B");
        write(dir.path(), "a-post.markdown", "# A");
        write(dir.path(), "images/diagram.png", "png");
        write(dir.path(), "2020/hello.md", "# Hello");
        write(dir.path(), ".hidden.md", "# Hidden");
        write(dir.path(), ".git/config", "x");
        write(dir.path(), "node_modules/pkg/readme.md", "x");

        let loader = ContentLoader::new(dir.path()).unwrap();

        assert_eq!(
            listing(&loader),
            vec![
                "doc:a-post.markdown",
                "doc:b-post.md",
                "doc:2020/hello.md",
                "static:images/diagram.png",
            ]
        );
    }

    #[test]
    fn test_scan_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "one.md", "1");
        write(dir.path(), "nested/two.md", "2");

        let loader = ContentLoader::new(dir.path()).unwrap();
        assert_eq!(listing(&loader), listing(&loader));
    }

    #[test]
    fn test_documents_carry_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "post.md", "---\ntitle: A\n---\nbody");

        let loader = ContentLoader::new(dir.path()).unwrap();
        let item = loader.scan().next().unwrap().unwrap();
        match item {
            ContentItem::Document(file) => {
                assert_eq!(file.bytes, b"---\ntitle: A\n---\nbody");
            }
            ContentItem::Static(_) => panic!("expected a document"),
        }
    }

    #[test]
    fn test_is_document() {
        assert!(is_document(Path::new("post.md")));
        assert!(is_document(Path::new("POST.MD")));
        assert!(!is_document(Path::new("style.css")));
    }
}
