//! Pipeline error types.

use std::fmt;
use std::path::PathBuf;

use crate::build::blocks::UnterminatedBlock;
use crate::build::frontmatter::FrontMatterError;
use crate::build::render::RenderError;

/// Errors that fail a single post. The rest of the build carries on.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("failed to read source: {0}")]
    Read(#[source] std::io::Error),

    #[error("source is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("malformed front matter: {0}")]
    MalformedFrontMatter(#[from] FrontMatterError),

    #[error(transparent)]
    UnterminatedBlock(#[from] UnterminatedBlock),

    #[error("unknown layout '{layout}' (available: {})", .available.join(", "))]
    UnknownLayout {
        layout: String,
        available: Vec<String>,
    },

    #[error("permalink '{0}' points outside the site")]
    InvalidPermalink(String),

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },
}

impl PipelineError {
    /// Create a stage-specific error.
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// A post that could not be built, and why.
#[derive(Debug)]
pub struct PostFailure {
    /// Source path relative to the content root
    pub path: PathBuf,
    pub error: PipelineError,
}

impl PostFailure {
    pub fn new(path: impl Into<PathBuf>, error: PipelineError) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }
}

impl fmt::Display for PostFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}
