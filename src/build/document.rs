use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

use super::frontmatter::{FrontMatter, FrontMatterError, parse_front_matter};
use super::pipeline::PipelineError;
use super::render::PostSummary;
use crate::util::{slugify, title_case};

/// `2020-01-05-hello-world` -> date and slug.
static DATED_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})-(.+)$").expect("valid dated file name regex")
});

// =============================================================================
// Content items (documents and static files)
// =============================================================================

/// A content item discovered in the content directory.
#[derive(Debug, Clone)]
pub enum ContentItem {
    /// A markdown document that will be rendered to HTML
    Document(SourceFile),
    /// A static file that will be copied as-is
    Static(StaticFile),
}

impl ContentItem {
    /// Get the content-relative path.
    pub fn source_path(&self) -> &Path {
        match self {
            ContentItem::Document(file) => &file.path,
            ContentItem::Static(file) => &file.source_path,
        }
    }
}

/// A document's path and raw contents, as read from disk.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the content root; unique within a build
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// A static file (image, CSS, JS, etc.) that gets copied to output.
#[derive(Debug, Clone)]
pub struct StaticFile {
    /// Path relative to the content root (e.g., "images/diagram.png")
    pub source_path: PathBuf,
    /// Absolute path to read from
    pub full_path: PathBuf,
}

impl StaticFile {
    pub fn new(source_path: PathBuf, full_path: PathBuf) -> Self {
        Self {
            source_path,
            full_path,
        }
    }
}

// =============================================================================
// Posts
// =============================================================================

/// A parsed post: front matter checked, body split off.
///
/// Posts are immutable once parsed; later stages only read them.
#[derive(Debug, Clone)]
pub struct Post {
    /// Path relative to the content root
    pub source_path: PathBuf,
    pub front_matter: FrontMatter,
    /// Markdown body, without the front matter block
    pub body: String,
    /// Line of the original file the body starts on
    pub body_line: usize,
    /// From the `date` field, or a `YYYY-MM-DD-` file name prefix
    pub date: Option<NaiveDateTime>,
    pub slug: String,
    title: Option<String>,
    layout: Option<String>,
    permalink: Option<String>,
    excerpt: Option<String>,
    tags: Vec<String>,
    categories: Vec<String>,
    comments: bool,
    draft: bool,
}

impl Post {
    /// Parse a post from its raw bytes.
    pub fn parse(file: &SourceFile) -> Result<Self, PipelineError> {
        let text = std::str::from_utf8(&file.bytes)?;
        let parsed = parse_front_matter(text)?;
        let front_matter = parsed.front_matter;

        let stem = file
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (file_date, file_slug) = match DATED_FILE_NAME.captures(&stem) {
            Some(captures) => (Some(captures[1].to_string()), captures[2].to_string()),
            None => (None, stem.clone()),
        };

        let date = match front_matter.text("date")?.map(str::to_string).or(file_date) {
            Some(raw) => Some(parse_date(&raw).ok_or(FrontMatterError::InvalidDate(raw))?),
            None => None,
        };

        let slug = match front_matter.text("slug")? {
            Some(slug) => slugify(slug),
            None => slugify(&file_slug),
        };

        let draft = front_matter.flag("draft")?.unwrap_or(false)
            || !front_matter.flag("published")?.unwrap_or(true);

        Ok(Self {
            source_path: file.path.clone(),
            title: front_matter.text("title")?.map(str::to_string),
            layout: front_matter.text("layout")?.map(str::to_string),
            permalink: front_matter.text("permalink")?.map(str::to_string),
            excerpt: front_matter.text("excerpt")?.map(str::to_string),
            tags: front_matter.names("tags")?,
            categories: front_matter.names("categories")?,
            comments: front_matter.flag("comments")?.unwrap_or(false),
            draft,
            body: parsed.body.to_string(),
            body_line: parsed.body_line,
            front_matter,
            date,
            slug,
        })
    }

    /// Get the post title, falling back to the slug if not in front matter.
    pub fn title(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            if self.slug.is_empty() {
                "Untitled".to_string()
            } else {
                title_case(&self.slug)
            }
        })
    }

    /// The layout named in front matter, if any.
    pub fn layout(&self) -> Option<&str> {
        self.layout.as_deref()
    }

    /// A front matter permalink overriding the configured pattern.
    pub fn permalink(&self) -> Option<&str> {
        self.permalink.as_deref()
    }

    /// The excerpt written in front matter, if any.
    pub fn excerpt(&self) -> Option<&str> {
        self.excerpt.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn comments(&self) -> bool {
        self.comments
    }

    /// Drafts (`draft: true` or `published: false`) are only built on request.
    pub fn is_draft(&self) -> bool {
        self.draft
    }

    /// Date as `YYYY-MM-DD`.
    pub fn date_string(&self) -> Option<String> {
        self.date.map(|d| d.format("%Y-%m-%d").to_string())
    }

    /// Source path with forward slashes, as shown to templates and in reports.
    pub fn source_path_string(&self) -> String {
        self.source_path.to_string_lossy().replace('\\', "/")
    }

    /// A summary for listings and indexes.
    pub fn summary(&self, url: &str, excerpt: Option<String>) -> PostSummary {
        PostSummary {
            title: self.title(),
            url: url.to_string(),
            date: self.date_string(),
            excerpt,
            tags: self.tags.clone(),
            categories: self.categories.clone(),
            source_path: self.source_path_string(),
            sort_key: self.date,
        }
    }
}

/// Parse a front matter date.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]` (space or `T`), an optional
/// trailing UTC offset, and RFC 3339. Offsets are dropped after parsing: the
/// date is kept as written, which is what URLs are built from.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.naive_local());
    }
    for format in ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M %z"] {
        if let Ok(date) = DateTime::parse_from_str(raw, format) {
            return Some(date.naive_local());
        }
    }
    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(date) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
