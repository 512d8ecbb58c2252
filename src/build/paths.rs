//! Path and URL conversion utilities.
//!
//! This module handles conversions between:
//! - Source file paths (relative paths within the content directory)
//! - URL paths (the URL at which a post will be served, from its permalink)
//! - Output file paths (where files are written, relative to the output directory)

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDateTime};

use crate::util::slugify;

/// Values a permalink pattern can refer to.
pub struct PermalinkParts<'a> {
    pub date: Option<NaiveDateTime>,
    pub slug: &'a str,
    pub categories: &'a [String],
    pub source_path: &'a Path,
}

/// Expand a permalink pattern into a URL path.
///
/// Tokens: `:year`, `:month`, `:day`, `:title`/`:slug`, `:categories`, `:path`.
/// Unknown tokens are kept literally. Empty segments collapse, so
/// `/:categories/:title/` with no categories is `/<title>/`. A trailing slash
/// in the pattern gives a directory-style URL.
///
/// # Examples
/// ```ignore
/// expand_permalink("/:year/:month/:day/:title/", parts) => "/2020/01/05/hello-world/"
/// expand_permalink("/:path/", parts) => "/about/"
/// ```
pub fn expand_permalink(pattern: &str, parts: &PermalinkParts) -> String {
    let mut expanded = String::with_capacity(pattern.len() + 16);
    let mut chars = pattern.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c != ':' {
            expanded.push(c);
            continue;
        }

        let mut end = start + 1;
        while let Some(&(i, next)) = chars.peek() {
            if next.is_ascii_alphabetic() || next == '_' {
                end = i + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        let token = &pattern[start + 1..end];
        match token_value(token, parts) {
            Some(value) => expanded.push_str(&value),
            None => expanded.push_str(&pattern[start..end]),
        }
    }

    normalize_url(&expanded, pattern.ends_with('/'))
}

fn token_value(token: &str, parts: &PermalinkParts) -> Option<String> {
    let value = match token {
        "year" => parts
            .date
            .map(|d| format!("{:04}", d.year()))
            .unwrap_or_default(),
        "month" => parts
            .date
            .map(|d| format!("{:02}", d.month()))
            .unwrap_or_default(),
        "day" => parts
            .date
            .map(|d| format!("{:02}", d.day()))
            .unwrap_or_default(),
        "title" | "slug" => parts.slug.to_string(),
        "categories" => parts
            .categories
            .iter()
            .map(|c| slugify(c))
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("/"),
        "path" => source_path_to_url_path(parts.source_path),
        _ => return None,
    };
    Some(value)
}

/// Collapse empty segments and make the URL absolute.
fn normalize_url(url: &str, directory: bool) -> String {
    let segments: Vec<&str> = url.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut normalized = format!("/{}", segments.join("/"));
    if directory {
        normalized.push('/');
    }
    normalized
}

/// Convert a markdown file path to a URL path fragment, without slashes at either end.
///
/// Index files become their directory.
///
/// # Examples
/// ```ignore
/// source_path_to_url_path("about.md") => "about"
/// source_path_to_url_path("notes/index.md") => "notes"
/// source_path_to_url_path("index.md") => ""
/// ```
pub fn source_path_to_url_path(path: &Path) -> String {
    let path_str = path.with_extension("").to_string_lossy().replace('\\', "/");

    if path_str == "index" {
        String::new()
    } else if let Some(dir) = path_str.strip_suffix("/index") {
        dir.to_string()
    } else {
        path_str
    }
}

/// Convert a URL path to an output file path, relative to the output directory.
///
/// Directory-style URLs (trailing slash, or no extension on the last segment)
/// become `path/index.html`. URLs naming a file keep their path.
///
/// # Examples
/// ```ignore
/// url_to_output_path("/2020/01/05/hello/") => 2020/01/05/hello/index.html
/// url_to_output_path("/") => index.html
/// url_to_output_path("/feed.xml") => feed.xml
/// ```
pub fn url_to_output_path(url_path: &str) -> PathBuf {
    let trimmed = url_path.trim_matches('/');

    if trimmed.is_empty() {
        return PathBuf::from("index.html");
    }

    let last_segment = trimmed.rsplit('/').next().unwrap_or(trimmed);
    if !url_path.ends_with('/') && Path::new(last_segment).extension().is_some() {
        PathBuf::from(trimmed)
    } else {
        PathBuf::from(trimmed).join("index.html")
    }
}

/// Join a site's base path and a root-relative URL.
pub fn with_base_path(base_path: &str, url: &str) -> String {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() {
        url.to_string()
    } else {
        format!("{base}{url}")
    }
}

/// Root-relative URL of the listing page for a tag or category under `root`.
///
/// None when the name has no characters that survive slugifying.
pub fn listing_url(root: &str, name: &str) -> Option<String> {
    let slug = slugify(name);
    if slug.is_empty() {
        return None;
    }
    let root = root.trim_matches('/');
    if root.is_empty() {
        Some(format!("/{slug}/"))
    } else {
        Some(format!("/{root}/{slug}/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(y, m, d).and_then(|d| d.and_hms_opt(9, 30, 0))
    }

    fn expand(pattern: &str, date: Option<NaiveDateTime>, categories: &[&str], path: &str) -> String {
        let categories: Vec<String> = categories.iter().map(|c| c.to_string()).collect();
        expand_permalink(
            pattern,
            &PermalinkParts {
                date,
                slug: "hello-world",
                categories: &categories,
                source_path: Path::new(path),
            },
        )
    }

    #[test]
    fn test_date_permalink() {
        assert_eq!(
            expand("/:year/:month/:day/:title/", date(2020, 1, 5), &[], "2020-01-05-hello-world.md"),
            "/2020/01/05/hello-world/"
        );
    }

    #[test]
    fn test_categories_permalink() {
        assert_eq!(
            expand("/:categories/:title/", date(2020, 1, 5), &["Java", "Unit Testing"], "x.md"),
            "/java/unit-testing/hello-world/"
        );
        assert_eq!(
            expand("/:categories/:title/", date(2020, 1, 5), &[], "x.md"),
            "/hello-world/"
        );
    }

    #[test]
    fn test_path_permalink() {
        assert_eq!(expand("/:path/", None, &[], "about.md"), "/about/");
        assert_eq!(expand("/:path/", None, &[], "notes/index.md"), "/notes/");
        assert_eq!(expand("/:path/", None, &[], "index.md"), "/");
    }

    #[test]
    fn test_file_permalink_and_unknown_token() {
        assert_eq!(
            expand("/:year/:title.html", date(2021, 3, 9), &[], "x.md"),
            "/2021/hello-world.html"
        );
        assert_eq!(expand("/:nope/:slug", None, &[], "x.md"), "/:nope/hello-world");
    }

    #[test]
    fn test_source_path_to_url_path() {
        assert_eq!(source_path_to_url_path(Path::new("about.md")), "about");
        assert_eq!(
            source_path_to_url_path(Path::new("guides/junit.markdown")),
            "guides/junit"
        );
        assert_eq!(source_path_to_url_path(Path::new("guides/index.md")), "guides");
        assert_eq!(source_path_to_url_path(Path::new("index.md")), "");
    }

    #[test]
    fn test_url_to_output_path() {
        assert_eq!(
            url_to_output_path("/2020/01/05/hello/"),
            PathBuf::from("2020/01/05/hello/index.html")
        );
        assert_eq!(url_to_output_path("/"), PathBuf::from("index.html"));
        assert_eq!(url_to_output_path("/about"), PathBuf::from("about/index.html"));
        assert_eq!(url_to_output_path("/feed.xml"), PathBuf::from("feed.xml"));
        assert_eq!(
            url_to_output_path("/spring-boot-2.0/"),
            PathBuf::from("spring-boot-2.0/index.html")
        );
    }

    #[test]
    fn test_with_base_path() {
        assert_eq!(with_base_path("", "/a/"), "/a/");
        assert_eq!(with_base_path("/blog/", "/a/"), "/blog/a/");
    }

    #[test]
    fn test_listing_url() {
        assert_eq!(listing_url("/tags", "What's New").as_deref(), Some("/tags/whats-new/"));
        assert_eq!(listing_url("tags/", "Unit Testing").as_deref(), Some("/tags/unit-testing/"));
        assert_eq!(listing_url("", "rust").as_deref(), Some("/rust/"));
        assert_eq!(listing_url("/tags", "???"), None);
    }
}
