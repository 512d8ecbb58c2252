//! Pipeline context for sharing state across stages.

use pulldown_cmark::Options;

use crate::build::highlight::SyntaxHighlighter;
use crate::build::index::IndexContext;
use crate::build::render::{QuireContext, Renderer, SiteContext};
use crate::config::Config;

/// Shared, read-only context for pipeline stages.
///
/// Built by the builder for each pipeline run. Stages never mutate it, so
/// one post can't influence how another is processed.
pub struct PipelineContext<'a> {
    pub config: &'a Config,

    /// Site metadata passed to layouts
    pub site: &'a SiteContext,

    // === Services ===
    /// Syntax highlighter for code blocks
    pub highlighter: &'a SyntaxHighlighter,

    /// Layout renderer, loaded once per build
    pub renderer: &'a Renderer,

    /// Markdown extensions from the config
    pub markdown_options: Options,

    /// Tag/category indexes; empty until every post has been routed
    pub index: &'a IndexContext,

    /// Quire context (dev mode, live reload, version)
    pub quire: &'a QuireContext,
}
