use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;
use tera::{Context, Tera};

use super::frontmatter::FrontMatter;
use super::index::IndexContext;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("layouts directory not found: {0}")]
    LayoutsNotFound(String),

    #[error("unknown layout '{0}'")]
    UnknownLayout(String),
}

/// The layout renderer, wrapping Tera.
///
/// Built once per build and shared by reference; rendering never mutates it.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Load every `*.html` template under the layouts directory.
    ///
    /// A layout's name is its path relative to the directory without the
    /// `.html` suffix, so `layouts/post.html` is the `post` layout.
    pub fn new(layouts_path: &Path) -> Result<Self, RenderError> {
        if !layouts_path.is_dir() {
            return Err(RenderError::LayoutsNotFound(
                layouts_path.display().to_string(),
            ));
        }

        let glob = layouts_path.join("**/*.html");
        let glob_str = glob.to_string_lossy();
        let tera = Tera::new(&glob_str)?;

        Ok(Self { tera })
    }

    /// Build a renderer from in-memory templates, keyed by file name (`post.html`).
    #[cfg(test)]
    pub fn from_templates(templates: &[(&str, &str)]) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(templates.iter().copied())?;
        Ok(Self { tera })
    }

    /// Returns true if a layout with this name was loaded.
    pub fn has_layout(&self, name: &str) -> bool {
        let file_name = template_name(name);
        self.tera.get_template_names().any(|n| n == file_name)
    }

    /// Names of all loaded layouts, sorted.
    pub fn layout_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tera
            .get_template_names()
            .map(|n| n.trim_end_matches(".html").to_string())
            .collect();
        names.sort();
        names
    }

    /// Render a post with its layout.
    pub fn render_post(&self, layout: &str, context: &PostContext) -> Result<String, RenderError> {
        let mut tera_context = Context::new();
        tera_context.insert("site", &context.site);
        tera_context.insert("page", &context.page);
        tera_context.insert("content", &context.content);
        tera_context.insert("toc", &context.toc);
        tera_context.insert("index", &context.index);
        tera_context.insert("quire", &context.quire);

        self.render(layout, &tera_context)
    }

    /// Render a generated listing page (home, tag, category).
    pub fn render_listing(
        &self,
        layout: &str,
        context: &ListingContext,
    ) -> Result<String, RenderError> {
        let mut tera_context = Context::new();
        tera_context.insert("site", &context.site);
        tera_context.insert("page", &context.page);
        tera_context.insert("posts", &context.posts);
        tera_context.insert("index", &context.index);
        tera_context.insert("quire", &context.quire);

        self.render(layout, &tera_context)
    }

    fn render(&self, layout: &str, context: &Context) -> Result<String, RenderError> {
        if !self.has_layout(layout) {
            return Err(RenderError::UnknownLayout(layout.to_string()));
        }
        Ok(self.tera.render(&template_name(layout), context)?)
    }
}

fn template_name(layout: &str) -> String {
    format!("{layout}.html")
}

/// Context passed to post layouts.
#[derive(Debug, Serialize)]
pub struct PostContext<'a> {
    pub site: &'a SiteContext,
    pub page: PageInfo,
    pub content: &'a str,
    /// Table of contents for the current page
    pub toc: &'a [TocEntry],
    pub index: &'a IndexContext,
    pub quire: &'a QuireContext,
}

/// Context passed to listing layouts.
#[derive(Debug, Serialize)]
pub struct ListingContext<'a> {
    pub site: &'a SiteContext,
    pub page: ListingInfo,
    /// Posts on this page, newest first
    pub posts: Vec<&'a PostSummary>,
    pub index: &'a IndexContext,
    pub quire: &'a QuireContext,
}

/// Site-level information, built once from the config.
#[derive(Debug, Clone, Serialize)]
pub struct SiteContext {
    pub title: String,
    pub url: Option<String>,
    pub base_path: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub params: serde_json::Value,
}

/// Generator flags exposed to layouts as `quire.*`.
#[derive(Debug, Clone, Serialize)]
pub struct QuireContext {
    /// True while serving locally
    pub dev: bool,
    /// Layouts should include the live reload script when true
    pub live_reload: bool,
    pub version: String,
}

/// Information about the current post.
#[derive(Debug, Serialize)]
pub struct PageInfo {
    pub title: String,
    pub url: String,
    pub layout: String,
    /// `YYYY-MM-DD`, absent for undated pages
    pub date: Option<String>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    /// `tags` with the URLs of their listing pages
    pub tag_links: Vec<NameLink>,
    pub category_links: Vec<NameLink>,
    pub excerpt: Option<String>,
    pub comments: bool,
    pub source_path: String,
    /// Every front matter field as written, e.g. `page.front_matter.author`
    pub front_matter: FrontMatter,
}

/// A tag or category name and its listing page.
#[derive(Debug, Clone, Serialize)]
pub struct NameLink {
    pub name: String,
    /// Absent when the listing layout isn't loaded or the name has no slug
    pub url: Option<String>,
}

/// Information about a generated listing page.
#[derive(Debug, Serialize)]
pub struct ListingInfo {
    pub title: String,
    pub url: String,
    /// `home`, `tag` or `category`
    pub kind: &'static str,
    /// The tag or category name
    pub name: Option<String>,
}

/// A post as seen from listings and indexes.
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub title: String,
    pub url: String,
    pub date: Option<String>,
    pub excerpt: Option<String>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub source_path: String,
    #[serde(skip)]
    pub sort_key: Option<NaiveDateTime>,
}

/// Posts grouped under a tag or category name.
pub type PostGroups = BTreeMap<String, Vec<PostSummary>>;

/// A table of contents entry for the current page.
#[derive(Debug, Clone, Serialize)]
pub struct TocEntry {
    /// The heading text
    pub text: String,
    /// The heading id (for anchor links)
    pub id: String,
    /// The heading level (1-6)
    pub level: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_names_and_lookup() {
        let renderer = Renderer::from_templates(&[
            ("post.html", "{{ content | safe }}"),
            ("partials/head.html", "<head></head>"),
        ])
        .unwrap();

        assert!(renderer.has_layout("post"));
        assert!(renderer.has_layout("partials/head"));
        assert!(!renderer.has_layout("missing"));
        assert_eq!(renderer.layout_names(), vec!["partials/head", "post"]);
    }

    #[test]
    fn test_missing_layouts_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Renderer::new(&dir.path().join("layouts")),
            Err(RenderError::LayoutsNotFound(_))
        ));
    }

    #[test]
    fn test_load_layouts_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("post.html"), "<main>{{ content | safe }}</main>").unwrap();

        let renderer = Renderer::new(dir.path()).unwrap();
        assert!(renderer.has_layout("post"));
    }
}
