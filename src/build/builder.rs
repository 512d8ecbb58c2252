use std::path::PathBuf;

use crate::config::Config;

use super::document::{ContentItem, Post, StaticFile};
use super::highlight::SyntaxHighlighter;
use super::index::{IndexContext, NameIndex, SiteIndex};
use super::loader::{ContentLoader, LoaderError};
use super::markdown::{MarkdownError, markdown_options};
use super::output::{OutputFile, SiteWriter, WriteError};
use super::paths::{listing_url, url_to_output_path, with_base_path};
use super::pipeline::{Pipeline, PipelineContext, PipelineError, PostFailure, ProcessingDocument};
use super::render::{
    ListingContext, ListingInfo, PostSummary, QuireContext, RenderError, Renderer, SiteContext,
};

/// Where the highlighting stylesheet is written when highlighting is on.
pub const SYNTAX_CSS_PATH: &str = "assets/syntax.css";

/// Errors that abort a build before the output directory is touched.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error("layout error: {0}")]
    Render(#[from] RenderError),

    #[error("invalid markdown config: {0}")]
    Markdown(#[from] MarkdownError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Flags for a single build pass.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Empty the output directory before writing
    pub clean: bool,
    /// Include posts marked as drafts
    pub drafts: bool,
    /// Building for the preview server
    pub dev: bool,
    /// Layouts should include the live reload script (dev only)
    pub live_reload: bool,
}

#[derive(Debug)]
pub struct BuildResult {
    pub output_dir: PathBuf,
    pub posts: usize,
    pub listings: usize,
    pub static_files: usize,
    pub drafts_skipped: usize,
    /// Posts that could not be built; everything else was written
    pub failures: Vec<PostFailure>,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Builder {
    config: Config,
    /// Base path for resolving relative paths (typically the config file's directory)
    base_path: PathBuf,
}

impl Builder {
    pub fn new(config: Config, base_path: PathBuf) -> Self {
        Self { config, base_path }
    }

    pub fn content_dir(&self) -> PathBuf {
        self.base_path.join(&self.config.content)
    }

    pub fn layouts_dir(&self) -> PathBuf {
        self.base_path.join(&self.config.layouts)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.base_path.join(&self.config.site.output)
    }

    /// Run one full build pass.
    ///
    /// Per-post problems end up in `BuildResult::failures` and don't stop
    /// the pass. A `BuildError` means nothing in the output directory changed.
    pub fn build(&self, options: &BuildOptions) -> Result<BuildResult, BuildError> {
        // Build pipeline:
        // 1. Load content -> posts + static files
        // 2. Markdown + routing, per post
        // 3. Tag/category index over the routed posts
        // 4. Layouts, per post
        // 5. Listing pages, stylesheet, static copies
        // 6. Stage and commit the output tree

        let loader = ContentLoader::new(self.content_dir())?;
        let renderer = Renderer::new(&self.layouts_dir())?;
        let markdown_options = markdown_options(&self.config.markdown)?;
        let highlighter = SyntaxHighlighter::from_config(&self.config.markdown);

        // Step 1: Load and parse
        let mut failures = Vec::new();
        let mut docs = Vec::new();
        let mut static_files = Vec::new();
        let mut drafts_skipped = 0;

        for item in loader.scan() {
            match item {
                Ok(ContentItem::Document(file)) => match Post::parse(&file) {
                    Ok(post) if post.is_draft() && !options.drafts => {
                        tracing::debug!(path = %file.path.display(), "skipping draft");
                        drafts_skipped += 1;
                    }
                    Ok(post) => docs.push(ProcessingDocument::new(post)),
                    Err(error) => failures.push(PostFailure::new(file.path, error)),
                },
                Ok(ContentItem::Static(file)) => static_files.push(file),
                Err(LoaderError::ReadFile { path, source }) => {
                    failures.push(PostFailure::new(path, PipelineError::Read(source)));
                }
                Err(e) => return Err(e.into()),
            }
        }
        tracing::info!(
            posts = docs.len(),
            static_files = static_files.len(),
            "loaded content from {}",
            loader.root().display()
        );

        let site = self.site_context();
        let quire = QuireContext {
            dev: options.dev,
            live_reload: options.dev && options.live_reload,
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let base_path = &self.config.site.base_path;

        // Step 2: Markdown and routing
        let empty_index = SiteIndex::default().context();
        let ctx = PipelineContext {
            config: &self.config,
            site: &site,
            highlighter: &highlighter,
            renderer: &renderer,
            markdown_options,
            index: &empty_index,
            quire: &quire,
        };
        let docs = Pipeline::prepare().run(docs, &ctx, &mut failures);

        // Step 3: Index
        let index = SiteIndex::build(docs.iter().filter_map(|d| d.summary(base_path)));
        let index_context = index.context();
        tracing::debug!(
            tags = index.tags.len(),
            categories = index.categories.len(),
            "built site index"
        );

        // Step 4: Layouts
        let ctx = PipelineContext {
            index: &index_context,
            ..ctx
        };
        let rendered_before = docs.len();
        let docs = Pipeline::render().run(docs, &ctx, &mut failures);

        // Listings only link to posts that were actually written.
        let (index, index_context) = if docs.len() == rendered_before {
            (index, index_context)
        } else {
            let index = SiteIndex::build(docs.iter().filter_map(|d| d.summary(base_path)));
            let context = index.context();
            (index, context)
        };

        // Step 5: Collect output
        let mut writer = SiteWriter::new(self.output_dir());
        let posts = docs.len();
        for doc in docs {
            let origin = doc.post.source_path_string();
            if let (Some(route), Some(html)) = (doc.route, doc.output_html) {
                writer.add(OutputFile::bytes(
                    url_to_output_path(&route.url_path),
                    origin,
                    html.into_bytes(),
                ))?;
            }
        }

        let listings = ListingRenderer {
            config: &self.config,
            renderer: &renderer,
            site: &site,
            quire: &quire,
            index: &index,
            index_context: &index_context,
        }
        .render_all(&mut writer, &mut failures)?;

        match highlighter.generate_css() {
            Some(css) => writer.add(OutputFile::bytes(
                SYNTAX_CSS_PATH,
                "syntax highlighting theme",
                css.into_bytes(),
            ))?,
            None if self.config.markdown.highlight => tracing::warn!(
                theme = %self.config.markdown.highlight_theme,
                "unknown highlight theme, no stylesheet written"
            ),
            None => {}
        }

        let static_count = static_files.len();
        for StaticFile {
            source_path,
            full_path,
        } in static_files
        {
            let origin = source_path.to_string_lossy().replace('\\', "/");
            writer.add(OutputFile::copy(source_path, origin, full_path))?;
        }

        // Step 6: Commit
        let output_dir = self.output_dir();
        let written = writer.commit(options.clean)?;
        tracing::info!(
            files = written,
            failures = failures.len(),
            "wrote site to {}",
            output_dir.display()
        );

        Ok(BuildResult {
            output_dir,
            posts,
            listings,
            static_files: static_count,
            drafts_skipped,
            failures,
        })
    }

    fn site_context(&self) -> SiteContext {
        let site = &self.config.site;
        SiteContext {
            title: site.title.clone(),
            url: site.url.clone(),
            base_path: site.base_path.trim_end_matches('/').to_string(),
            description: site.description.clone(),
            author: site.author.clone(),
            params: self.config.params.clone(),
        }
    }
}

/// Renders the generated pages: home, one per tag, one per category.
///
/// Each kind is skipped when its layout isn't loaded.
struct ListingRenderer<'a> {
    config: &'a Config,
    renderer: &'a Renderer,
    site: &'a SiteContext,
    quire: &'a QuireContext,
    index: &'a SiteIndex,
    index_context: &'a IndexContext,
}

impl ListingRenderer<'_> {
    fn render_all(
        &self,
        writer: &mut SiteWriter,
        failures: &mut Vec<PostFailure>,
    ) -> Result<usize, WriteError> {
        let listings = &self.config.listings;
        let mut count = 0;

        if self.renderer.has_layout(&listings.home_layout) {
            let info = ListingInfo {
                title: self.site.title.clone(),
                url: with_base_path(&self.site.base_path, "/"),
                kind: "home",
                name: None,
            };
            count += self.render_one(
                writer,
                failures,
                &listings.home_layout,
                "/",
                "home".to_string(),
                info,
                self.index.dated_posts(),
            )?;
        }

        for (kind, layout, root, names) in [
            ("tag", &listings.tag_layout, &listings.tags_path, &self.index.tags),
            (
                "category",
                &listings.category_layout,
                &listings.categories_path,
                &self.index.categories,
            ),
        ] {
            if !self.renderer.has_layout(layout) {
                continue;
            }
            count += self.render_group(writer, failures, kind, layout, root, names)?;
        }

        Ok(count)
    }

    fn render_group(
        &self,
        writer: &mut SiteWriter,
        failures: &mut Vec<PostFailure>,
        kind: &'static str,
        layout: &str,
        root: &str,
        names: &NameIndex,
    ) -> Result<usize, WriteError> {
        let root = root.trim_matches('/');
        let mut count = 0;

        for name in names.keys() {
            let Some(url_path) = listing_url(root, name) else {
                tracing::warn!(kind, name = %name, "no listing page for a name without a usable slug");
                continue;
            };
            let info = ListingInfo {
                title: name.clone(),
                url: with_base_path(&self.site.base_path, &url_path),
                kind,
                name: Some(name.clone()),
            };
            count += self.render_one(
                writer,
                failures,
                layout,
                &url_path,
                format!("{root}/{name}"),
                info,
                self.index.posts_for(names, name),
            )?;
        }

        Ok(count)
    }

    #[allow(clippy::too_many_arguments)]
    fn render_one(
        &self,
        writer: &mut SiteWriter,
        failures: &mut Vec<PostFailure>,
        layout: &str,
        url_path: &str,
        origin: String,
        page: ListingInfo,
        posts: Vec<&PostSummary>,
    ) -> Result<usize, WriteError> {
        let context = ListingContext {
            site: self.site,
            page,
            posts,
            index: self.index_context,
            quire: self.quire,
        };

        match self.renderer.render_listing(layout, &context) {
            Ok(html) => {
                writer.add(OutputFile::bytes(
                    url_to_output_path(url_path),
                    origin,
                    html.into_bytes(),
                ))?;
                Ok(1)
            }
            Err(error) => {
                failures.push(PostFailure::new(origin, PipelineError::Render(error)));
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use pretty_assertions::assert_eq;

    const POST_LAYOUT: &str = "<html><head><title>{{ page.title }}</title></head>\
<body>{{ content | safe }}<ul>{% for tag in page.tags %}<li>{{ tag }}</li>{% endfor %}</ul></body></html>";

    const TAG_LAYOUT: &str = "<h1>{{ page.name }}</h1>\
{% for post in posts %}<a href=\"{{ post.url | safe }}\">{{ post.title }}</a>{% endfor %}";

    const HOME_LAYOUT: &str =
        "{% for post in posts %}<a href=\"{{ post.url | safe }}\">{{ post.title }}</a>\n{% endfor %}";

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn site(root: &Path) -> Builder {
        write(root, "layouts/post.html", POST_LAYOUT);
        write(root, "layouts/tag.html", TAG_LAYOUT);
        write(root, "layouts/home.html", HOME_LAYOUT);
        let mut config = Config::starter("Test Blog");
        config.markdown.highlight = false;
        Builder::new(config, root.to_path_buf())
    }

    fn read(root: &Path, relative: &str) -> String {
        std::fs::read_to_string(root.join("_site").join(relative)).unwrap()
    }

    fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
        let mut files = Vec::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            for entry in std::fs::read_dir(&current).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    let relative = path.strip_prefix(dir).unwrap().display().to_string();
                    files.push((relative, std::fs::read(&path).unwrap()));
                }
            }
        }
        files.sort();
        files
    }

    #[test]
    fn test_hello_post_is_rendered_and_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let builder = site(dir.path());
        write(
            dir.path(),
            "content/hello.md",
            "---\ntitle: \"Hello\"\ndate: \"2020-01-01\"\ntags: [a, b]\n---\n# Hi\n",
        );

        let result = builder.build(&BuildOptions::default()).unwrap();
        assert!(result.is_success(), "{:?}", result.failures);
        assert_eq!(result.posts, 1);

        let html = read(dir.path(), "2020/01/01/hello/index.html");
        assert!(html.contains("<title>Hello</title>"));
        assert!(html.contains("<h1 id=\"hi\">Hi"));

        for tag in ["a", "b"] {
            let listing = read(dir.path(), &format!("tags/{tag}/index.html"));
            assert!(listing.contains("<a href=\"/2020/01/01/hello/\">Hello</a>"));
        }
        assert!(read(dir.path(), "index.html").contains("Hello"));
    }

    #[test]
    fn test_unknown_layout_fails_post_but_writes_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let builder = site(dir.path());
        write(dir.path(), "content/about.md", "---\ntitle: About\n---\nAbout me\n");
        write(dir.path(), "content/broken.md", "---\nlayout: missing\n---\nx\n");

        let result = builder.build(&BuildOptions::default()).unwrap();

        assert!(!result.is_success());
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].path, PathBuf::from("broken.md"));
        assert!(matches!(
            result.failures[0].error,
            PipelineError::UnknownLayout { ref layout, .. } if layout == "missing"
        ));
        assert!(read(dir.path(), "about/index.html").contains("About me"));
        assert!(!dir.path().join("_site/broken").exists());
    }

    #[test]
    fn test_malformed_front_matter_is_absent_from_output() {
        let dir = tempfile::tempdir().unwrap();
        let builder = site(dir.path());
        write(dir.path(), "content/open.md", "---\ntitle: Never closed\n# Body\n");
        write(dir.path(), "content/ok.md", "Fine\n");

        let result = builder.build(&BuildOptions::default()).unwrap();

        assert_eq!(result.failures.len(), 1);
        assert!(matches!(
            result.failures[0].error,
            PipelineError::MalformedFrontMatter(_)
        ));
        assert!(!dir.path().join("_site/open").exists());
        assert!(dir.path().join("_site/ok/index.html").exists());
    }

    #[test]
    fn test_colliding_outputs_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let builder = site(dir.path());
        write(dir.path(), "content/about.md", "one\n");
        write(dir.path(), "content/about/index.md", "two\n");

        let err = builder.build(&BuildOptions::default()).unwrap_err();

        match &err {
            BuildError::Write(WriteError::Collision { first, second, .. }) => {
                assert_eq!(first, "about.md");
                assert_eq!(second, "about/index.md");
            }
            other => panic!("expected a collision, got {other:?}"),
        }
        assert!(err.to_string().contains("about.md"));
        assert!(err.to_string().contains("about/index.md"));
        assert!(!dir.path().join("_site").exists());
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let builder = site(dir.path());
        write(
            dir.path(),
            "content/2020-01-05-first.md",
            "---\ntags: rust testing\ncategories: [java]\n---\n## One\n\n## One\n",
        );
        write(
            dir.path(),
            "content/2021-02-01-second.md",
            "---\ntags: [rust]\n---\n{% highlight rust %}\nfn main() {}\n{% endhighlight %}\n",
        );
        write(dir.path(), "content/images/logo.svg", "<svg/>");

        let options = BuildOptions {
            clean: true,
            ..Default::default()
        };
        builder.build(&options).unwrap();
        let first = snapshot(&dir.path().join("_site"));
        builder.build(&options).unwrap();
        let second = snapshot(&dir.path().join("_site"));

        assert_eq!(first, second);
        assert!(first.iter().any(|(path, _)| path == "images/logo.svg"));
    }

    #[test]
    fn test_drafts_are_skipped_unless_requested() {
        let dir = tempfile::tempdir().unwrap();
        let builder = site(dir.path());
        write(dir.path(), "content/wip.md", "---\ndraft: true\n---\nsoon\n");

        let result = builder.build(&BuildOptions::default()).unwrap();
        assert_eq!(result.drafts_skipped, 1);
        assert!(!dir.path().join("_site/wip").exists());

        let options = BuildOptions {
            drafts: true,
            ..Default::default()
        };
        let result = builder.build(&options).unwrap();
        assert_eq!(result.posts, 1);
        assert!(dir.path().join("_site/wip/index.html").exists());
    }

    #[test]
    fn test_syntax_css_written_when_highlighting() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = site(dir.path());
        builder.config.markdown.highlight = true;
        write(dir.path(), "content/post.md", "```rust\nfn main() {}\n```\n");

        let result = builder.build(&BuildOptions::default()).unwrap();
        assert!(result.is_success());
        assert!(dir.path().join("_site").join(SYNTAX_CSS_PATH).exists());
    }

    #[test]
    fn test_missing_content_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let builder = site(dir.path());

        assert!(matches!(
            builder.build(&BuildOptions::default()),
            Err(BuildError::Loader(LoaderError::NotFound(_)))
        ));
    }

    #[test]
    fn test_escaping_permalink_fails_only_that_post() {
        let dir = tempfile::tempdir().unwrap();
        let builder = site(dir.path());
        write(dir.path(), "content/good.md", "---
title: Good
---
fine
");
        write(dir.path(), "content/bad.md", "---
permalink: /../escape/
---
nope
");

        let result = builder.build(&BuildOptions::default()).unwrap();

        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].path, PathBuf::from("bad.md"));
        assert!(matches!(
            result.failures[0].error,
            PipelineError::InvalidPermalink(ref url) if url == "/../escape/"
        ));
        assert!(read(dir.path(), "good/index.html").contains("fine"));
        assert!(!dir.path().join("escape").exists());
    }

    #[test]
    fn test_tags_without_a_slug_get_no_page() {
        let dir = tempfile::tempdir().unwrap();
        let builder = site(dir.path());
        write(
            dir.path(),
            "content/2020-01-01-one.md",
            "---\ntags: [\"???\", rust]\n---\none\n",
        );
        write(dir.path(), "content/2020-01-02-two.md", "---\ntags: [\"!!!\"]\n---\ntwo\n");

        let result = builder.build(&BuildOptions::default()).unwrap();

        assert!(result.is_success(), "{:?}", result.failures);
        assert_eq!(result.listings, 2);
        assert!(read(dir.path(), "tags/rust/index.html").contains("/2020/01/01/one/"));
        assert!(!dir.path().join("_site/tags/index.html").exists());
    }
}
