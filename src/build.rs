mod blocks;
mod builder;
mod document;
mod frontmatter;
mod highlight;
mod index;
mod loader;
mod markdown;
mod output;
mod paths;
pub mod pipeline;
mod render;
mod watch;

pub use builder::{BuildOptions, BuildResult, Builder};
pub use frontmatter::{FieldValue, FrontMatter};
pub use output::STAGING_PREFIX;
pub use watch::{FileWatcher, PathClassifier, SourceStamp, WatchEvent, WatchPaths};
