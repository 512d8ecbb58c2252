//! Document types for pipeline processing.

use crate::build::document::Post;
use crate::build::paths::with_base_path;
use crate::build::render::{PostSummary, TocEntry};

/// Where a post is published and which layout wraps it.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub layout: String,
    /// Root-relative URL, without the site base path
    pub url_path: String,
}

/// A post being processed through the pipeline.
///
/// Wraps the parsed `Post` with state that evolves through the stages:
///
/// 1. Initially: `content` = markdown body, `toc` = empty
/// 2. After markdown: `content` = HTML fragment, `toc` and `excerpt` populated
/// 3. After route: `route` = layout and URL
/// 4. After template: `output_html` = final page HTML
#[derive(Debug)]
pub struct ProcessingDocument {
    /// The parsed post (metadata and raw body)
    pub post: Post,

    /// Markdown until the markdown stage, HTML afterwards.
    pub content: String,

    /// Table of contents extracted during markdown rendering.
    pub toc: Vec<TocEntry>,

    /// Front matter excerpt, or the first rendered paragraph.
    pub excerpt: Option<String>,

    /// None until the route stage populates it.
    pub route: Option<Route>,

    /// None until the template stage populates it.
    pub output_html: Option<String>,
}

impl ProcessingDocument {
    pub fn new(post: Post) -> Self {
        let content = post.body.clone();
        Self {
            post,
            content,
            toc: Vec::new(),
            excerpt: None,
            route: None,
            output_html: None,
        }
    }

    /// Get the root-relative URL, once routed.
    pub fn url_path(&self) -> Option<&str> {
        self.route.as_ref().map(|r| r.url_path.as_str())
    }

    /// Summary for indexes and listings, once routed.
    pub fn summary(&self, base_path: &str) -> Option<PostSummary> {
        let url_path = self.url_path()?;
        Some(
            self.post
                .summary(&with_base_path(base_path, url_path), self.excerpt.clone()),
        )
    }
}
