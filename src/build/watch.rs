//! File watching for automatic rebuilds.
//!
//! Uses `notify-debouncer-full` to watch the content directory, layouts,
//! and the config file for changes. `SourceStamp` is the cheap check the
//! preview server runs before each request, watcher or not.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{
    Config as NotifyConfig, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher,
};
use notify_debouncer_full::{
    DebounceEventResult, Debouncer, RecommendedCache, new_debouncer, new_debouncer_opt,
};

use super::loader::is_document;
use crate::config::WatchConfig;

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}

// =============================================================================
// Watch events
// =============================================================================

/// What kind of source changed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    /// A markdown post was created, modified or deleted
    Post { path: PathBuf, deleted: bool },
    /// A static file in the content directory
    Asset { path: PathBuf, deleted: bool },
    /// A layout template
    Layout { path: PathBuf },
    /// The site config file
    Config,
}

/// Events sent from the file watcher.
#[derive(Debug)]
pub enum WatchEvent {
    /// Files changed, rebuild needed.
    FilesChanged(Vec<ChangeKind>),
    /// Watcher error occurred.
    Error(String),
}

// =============================================================================
// Path classification
// =============================================================================

/// Paths to watch for changes.
#[derive(Debug, Clone)]
pub struct WatchPaths {
    /// Content directory (posts and static files).
    pub content_dir: PathBuf,
    /// Layouts directory (for template changes).
    pub layouts_dir: PathBuf,
    /// Config file path.
    pub config_path: PathBuf,
}

/// Classifies file paths into change types.
#[derive(Clone)]
pub struct PathClassifier {
    paths: WatchPaths,
    /// Output directory; changes there come from our own builds.
    output_dir: PathBuf,
}

impl PathClassifier {
    /// Create a new path classifier.
    pub fn new(paths: WatchPaths, output_dir: PathBuf) -> Self {
        Self { paths, output_dir }
    }

    /// Classify a changed path into a ChangeKind.
    pub fn classify(&self, path: &Path, deleted: bool) -> Option<ChangeKind> {
        if path.starts_with(&self.output_dir) {
            return None;
        }

        if path == self.paths.config_path {
            return Some(ChangeKind::Config);
        }

        if let Ok(relative) = path.strip_prefix(&self.paths.layouts_dir) {
            if is_hidden(relative) || path.extension().is_none_or(|e| e != "html") {
                return None;
            }
            return Some(ChangeKind::Layout {
                path: path.to_path_buf(),
            });
        }

        if let Ok(relative) = path.strip_prefix(&self.paths.content_dir) {
            if is_hidden(relative) {
                return None;
            }
            let path = path.to_path_buf();
            return if is_document(&path) {
                Some(ChangeKind::Post { path, deleted })
            } else {
                Some(ChangeKind::Asset { path, deleted })
            };
        }

        None // Unknown path, ignore
    }
}

/// Hidden files and directories (editor swap files, staging directories).
fn is_hidden(relative: &Path) -> bool {
    relative
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

// =============================================================================
// File watcher
// =============================================================================

/// A file watcher that can use either native or polling backend.
pub enum FileWatcher {
    /// Native file system watcher (recommended for local development).
    Native {
        _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
        rx: Receiver<WatchEvent>,
    },
    /// Polling-based watcher (for network filesystems, Docker, etc.).
    Polling {
        _debouncer: Debouncer<PollWatcher, RecommendedCache>,
        rx: Receiver<WatchEvent>,
    },
}

impl FileWatcher {
    /// Create a new file watcher.
    pub fn new(
        config: &WatchConfig,
        paths: &WatchPaths,
        classifier: PathClassifier,
    ) -> Result<Self, WatchError> {
        let debounce_timeout = Duration::from_millis(config.debounce_ms);

        // Create channel for events
        let (tx, rx) = mpsc::channel();

        // Callback to convert notify events to our WatchEvent type
        let callback = move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let changes: Vec<ChangeKind> = events
                        .iter()
                        .filter_map(|event| {
                            let deleted = matches!(event.kind, EventKind::Remove(_));
                            // Only process events for actual file changes
                            if !is_relevant_event(&event.kind) {
                                return None;
                            }
                            // Classify the first path (usually there's only one)
                            event
                                .paths
                                .first()
                                .and_then(|p| classifier.classify(p, deleted))
                        })
                        .collect();

                    if !changes.is_empty() {
                        let _ = tx.send(WatchEvent::FilesChanged(changes));
                    }
                }
                Err(errors) => {
                    for e in errors {
                        let _ = tx.send(WatchEvent::Error(e.to_string()));
                    }
                }
            }
        };

        if config.poll {
            // Use polling watcher
            let poll_interval = Duration::from_millis(config.poll_interval_ms);
            let notify_config = NotifyConfig::default().with_poll_interval(poll_interval);

            let mut debouncer = new_debouncer_opt::<_, PollWatcher, RecommendedCache>(
                debounce_timeout,
                None,
                callback,
                RecommendedCache::default(),
                notify_config,
            )
            .map_err(WatchError::Notify)?;

            add_watch_paths_to_debouncer(&mut debouncer, paths)?;

            Ok(FileWatcher::Polling {
                _debouncer: debouncer,
                rx,
            })
        } else {
            // Use native watcher
            let mut debouncer =
                new_debouncer(debounce_timeout, None, callback).map_err(WatchError::Notify)?;

            add_watch_paths_to_debouncer(&mut debouncer, paths)?;

            Ok(FileWatcher::Native {
                _debouncer: debouncer,
                rx,
            })
        }
    }

    /// Receive the next watch event (blocking).
    pub fn recv(&self) -> Option<WatchEvent> {
        match self {
            FileWatcher::Native { rx, .. } => rx.recv().ok(),
            FileWatcher::Polling { rx, .. } => rx.recv().ok(),
        }
    }
}

/// Add watch paths to a debouncer.
fn add_watch_paths_to_debouncer<W: Watcher, C: notify_debouncer_full::FileIdCache>(
    debouncer: &mut Debouncer<W, C>,
    paths: &WatchPaths,
) -> Result<(), WatchError> {
    // Watch the content directory
    if paths.content_dir.exists() {
        debouncer.watch(&paths.content_dir, RecursiveMode::Recursive)?;
    }

    // Watch layouts directory for template changes
    if paths.layouts_dir.exists() {
        debouncer.watch(&paths.layouts_dir, RecursiveMode::Recursive)?;
    }

    // Watch config file's parent directory (to catch config changes)
    if let Some(parent) = paths.config_path.parent()
        && parent.exists()
    {
        debouncer.watch(parent, RecursiveMode::NonRecursive)?;
    }

    Ok(())
}

/// Check if an event kind is relevant for rebuilds.
fn is_relevant_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
    )
}

// =============================================================================
// Source stamps
// =============================================================================

/// A fingerprint of every source a build reads.
///
/// Hashes the path, size and modification time of each file under the
/// content and layouts directories, plus the config file. File contents
/// aren't read, so computing a stamp is cheap enough to do per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStamp(u64);

impl SourceStamp {
    pub fn scan(paths: &WatchPaths) -> Self {
        let mut hasher = DefaultHasher::new();
        stamp_file(&paths.config_path, &mut hasher);
        for dir in [&paths.content_dir, &paths.layouts_dir] {
            dir.hash(&mut hasher);
            stamp_dir(dir, &mut hasher);
        }
        SourceStamp(hasher.finish())
    }
}

fn stamp_file(path: &Path, hasher: &mut DefaultHasher) {
    path.hash(hasher);
    match std::fs::metadata(path) {
        Ok(meta) => {
            meta.len().hash(hasher);
            meta.modified().ok().hash(hasher);
        }
        Err(_) => "missing".hash(hasher),
    }
}

fn stamp_dir(dir: &Path, hasher: &mut DefaultHasher) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        "missing".hash(hasher);
        return;
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path())
        .collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            path.hash(hasher);
            stamp_dir(&path, hasher);
        } else {
            stamp_file(&path, hasher);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watch_paths(root: &Path) -> WatchPaths {
        WatchPaths {
            content_dir: root.join("content"),
            layouts_dir: root.join("layouts"),
            config_path: root.join("quire.yaml"),
        }
    }

    fn classifier(root: &Path) -> PathClassifier {
        PathClassifier::new(watch_paths(root), root.join("_site"))
    }

    #[test]
    fn test_classify() {
        let root = Path::new("/blog");
        let c = classifier(root);

        assert_eq!(
            c.classify(&root.join("content/2020-01-01-a.md"), false),
            Some(ChangeKind::Post {
                path: root.join("content/2020-01-01-a.md"),
                deleted: false
            })
        );
        assert_eq!(
            c.classify(&root.join("content/img/a.png"), true),
            Some(ChangeKind::Asset {
                path: root.join("content/img/a.png"),
                deleted: true
            })
        );
        assert_eq!(
            c.classify(&root.join("layouts/post.html"), false),
            Some(ChangeKind::Layout {
                path: root.join("layouts/post.html")
            })
        );
        assert_eq!(c.classify(&root.join("quire.yaml"), false), Some(ChangeKind::Config));
    }

    #[test]
    fn test_classify_ignores_output_and_hidden() {
        let root = Path::new("/blog");
        let c = classifier(root);

        assert_eq!(c.classify(&root.join("_site/index.html"), false), None);
        assert_eq!(c.classify(&root.join("content/.draft.md.swp"), false), None);
        assert_eq!(c.classify(&root.join("content/.quire-staging-x/a.md"), false), None);
        assert_eq!(c.classify(&root.join("layouts/notes.txt"), false), None);
        assert_eq!(c.classify(&root.join("README.md"), false), None);
    }

    #[test]
    fn test_source_stamp_tracks_changes() {
        let dir = tempfile::tempdir().unwrap();
        let paths = watch_paths(dir.path());
        std::fs::create_dir_all(&paths.content_dir).unwrap();
        std::fs::create_dir_all(&paths.layouts_dir).unwrap();
        std::fs::write(&paths.config_path, "site:\n  title: x\n").unwrap();
        std::fs::write(paths.content_dir.join("a.md"), "one").unwrap();

        let first = SourceStamp::scan(&paths);
        assert_eq!(first, SourceStamp::scan(&paths));

        std::fs::write(paths.content_dir.join("a.md"), "one more").unwrap();
        let second = SourceStamp::scan(&paths);
        assert_ne!(first, second);

        std::fs::write(paths.layouts_dir.join("post.html"), "{{ content }}").unwrap();
        assert_ne!(second, SourceStamp::scan(&paths));
    }

    #[test]
    fn test_source_stamp_ignores_hidden_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = watch_paths(dir.path());
        std::fs::create_dir_all(&paths.content_dir).unwrap();

        let before = SourceStamp::scan(&paths);
        std::fs::write(paths.content_dir.join(".swap"), "x").unwrap();
        assert_eq!(before, SourceStamp::scan(&paths));
    }
}

