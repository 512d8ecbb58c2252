//! Markdown rendering with syntax highlighting and TOC extraction.

use std::collections::HashSet;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};

use super::blocks::{UnterminatedBlock, prepare_body};
use super::highlight::SyntaxHighlighter;
use super::render::TocEntry;
use crate::config::MarkdownConfig;
use crate::util::{html_escape, slugify};

#[derive(thiserror::Error, Debug)]
pub enum MarkdownError {
    #[error("invalid markdown extension: {0}")]
    InvalidExtension(String),
}

/// Result of rendering markdown, containing both HTML and table of contents.
#[derive(Debug)]
pub struct MarkdownOutput {
    pub html: String,
    pub toc: Vec<TocEntry>,
    /// The first paragraph of the rendered HTML
    pub excerpt: Option<String>,
}

/// Translate configured extension names into pulldown-cmark options.
pub fn markdown_options(config: &MarkdownConfig) -> Result<Options, MarkdownError> {
    let mut options = Options::empty();
    for extension in &config.extensions {
        match extension.as_str() {
            "definition_lists" => options.insert(Options::ENABLE_DEFINITION_LIST),
            "footnotes" => options.insert(Options::ENABLE_FOOTNOTES),
            "gfm" => options.insert(Options::ENABLE_GFM),
            "heading_attributes" => options.insert(Options::ENABLE_HEADING_ATTRIBUTES),
            "smart_punctuation" => options.insert(Options::ENABLE_SMART_PUNCTUATION),
            "strikethrough" => options.insert(Options::ENABLE_STRIKETHROUGH),
            "tables" => options.insert(Options::ENABLE_TABLES),
            "tasklists" => options.insert(Options::ENABLE_TASKLISTS),
            other => return Err(MarkdownError::InvalidExtension(other.to_string())),
        }
    }
    Ok(options)
}

/// A heading being collected so it can be re-emitted with an id and permalink.
struct HeadingState<'a> {
    level: HeadingLevel,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
    text: String,
    inner: Vec<Event<'a>>,
}

/// Render a post body to HTML.
///
/// Fails if a fenced or highlight region is never closed. Code block contents
/// go to the highlighter as-is.
pub fn render_markdown(
    markdown: &str,
    highlighter: &SyntaxHighlighter,
    options: Options,
) -> Result<MarkdownOutput, UnterminatedBlock> {
    let prepared = prepare_body(markdown, options)?;
    let parser = Parser::new_ext(&prepared, options);

    let mut in_code_block = false;
    let mut code_language = String::new();
    let mut code_content = String::new();

    let mut heading: Option<HeadingState> = None;
    let mut used_heading_ids: HashSet<String> = HashSet::new();
    let mut toc_entries: Vec<TocEntry> = Vec::new();

    let mut events: Vec<Event> = Vec::new();

    for event in parser {
        match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                heading = Some(HeadingState {
                    level,
                    id: id.map(|id| id.to_string()),
                    classes: classes.iter().map(|c| c.to_string()).collect(),
                    attrs: attrs
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.as_ref().map(|v| v.to_string())))
                        .collect(),
                    text: String::new(),
                    inner: Vec::new(),
                });
            }
            Event::End(TagEnd::Heading(_)) => {
                let Some(state) = heading.take() else {
                    continue;
                };

                let id = match state.id {
                    Some(id) => id,
                    None => unique_id(&state.text, &used_heading_ids),
                };
                used_heading_ids.insert(id.clone());

                toc_entries.push(TocEntry {
                    text: state.text.clone(),
                    id: id.clone(),
                    level: state.level as u8,
                });

                let mut inner_html = String::new();
                html::push_html(&mut inner_html, state.inner.into_iter());

                events.push(Event::Html(
                    heading_html(state.level, &id, &state.classes, &state.attrs, &inner_html).into(),
                ));
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                code_language = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().unwrap_or_default().to_string()
                    }
                    CodeBlockKind::Indented => String::new(),
                };
                code_content.clear();
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                let highlighted = highlighter.highlight(&code_content, &code_language);
                events.push(Event::Html(highlighted.into()));
            }
            Event::Text(text) if in_code_block => {
                code_content.push_str(&text);
            }
            other => match heading.as_mut() {
                Some(state) => {
                    if let Event::Text(text) | Event::Code(text) = &other {
                        state.text.push_str(text);
                    }
                    state.inner.push(other);
                }
                None => events.push(other),
            },
        }
    }

    let mut html_output = String::new();
    html::push_html(&mut html_output, events.into_iter());

    let excerpt = first_paragraph(&html_output);

    Ok(MarkdownOutput {
        html: html_output,
        toc: toc_entries,
        excerpt,
    })
}

/// Derive an id from heading text that isn't used yet on this page.
fn unique_id(text: &str, used: &HashSet<String>) -> String {
    let base_id = match slugify(text) {
        slug if slug.is_empty() => "section".to_string(),
        slug => slug,
    };
    let mut id = base_id.clone();
    let mut suffix = 1;
    while used.contains(&id) {
        id = format!("{}-{}", base_id, suffix);
        suffix += 1;
    }
    id
}

fn heading_html(
    level: HeadingLevel,
    id: &str,
    classes: &[String],
    attrs: &[(String, Option<String>)],
    inner_html: &str,
) -> String {
    let class_attr = if classes.is_empty() {
        String::new()
    } else {
        format!(" class=\"{}\"", html_escape(&classes.join(" ")))
    };

    let extra_attrs = attrs
        .iter()
        .map(|(k, v)| match v {
            Some(val) => format!(" {}=\"{}\"", k, html_escape(val)),
            None => format!(" {}", k),
        })
        .collect::<String>();

    let id = html_escape(id);
    let permalink = format!(
        "<a class=\"header-anchor\" href=\"#{}\" aria-label=\"Link to this heading\">#</a>",
        id
    );
    format!(
        "<h{level} id=\"{id}\"{class_attr}{extra_attrs}>{inner_html} {permalink}</h{level}>\n",
        level = level as usize,
    )
}

/// The first `<p>` element of rendered HTML, used as the default excerpt.
fn first_paragraph(html: &str) -> Option<String> {
    let start = html.find("<p>")?;
    let end = html[start..].find("</p>")? + start + "</p>".len();
    Some(html[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(markdown: &str) -> MarkdownOutput {
        let options = markdown_options(&MarkdownConfig::default()).unwrap();
        render_markdown(markdown, &SyntaxHighlighter::plain(), options).unwrap()
    }

    #[test]
    fn test_render_basic_markdown() {
        let output = render("# Hello\n\nWorld");

        assert!(output.html.contains("<h1 id=\"hello\">Hello "));
        assert!(output.html.contains("<p>World</p>"));
        assert_eq!(output.toc.len(), 1);
        assert_eq!(output.toc[0].text, "Hello");
        assert_eq!(output.toc[0].level, 1);
        assert_eq!(output.excerpt.as_deref(), Some("<p>World</p>"));
    }

    #[test]
    fn test_heading_with_inline_markup() {
        let output = render("## Using `@MockBean` *carefully*");

        assert!(output.html.contains(
            "<h2 id=\"using-mockbean-carefully\">Using <code>@MockBean</code> <em>carefully</em> "
        ));
        assert_eq!(output.toc[0].text, "Using @MockBean carefully");
    }

    #[test]
    fn test_duplicate_heading_ids() {
        let output = render("## Setup\n\n## Setup\n");
        let ids: Vec<&str> = output.toc.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["setup", "setup-1"]);
    }

    #[test]
    fn test_explicit_heading_id() {
        let output = render("## Setup {#install}\n\n## Install\n");
        let ids: Vec<&str> = output.toc.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["install", "install-1"]);
    }

    #[test]
    fn test_code_block_contents_preserved() {
        let code = "**not bold** <T> & _x_\n\n  # not a heading\n";
        let output = render(&format!("Text\n\n```java\n{code}```\n"));

        assert!(output.html.contains(&format!(
            "<pre><code class=\"language-java\">{}</code></pre>",
            html_escape(code)
        )));
        assert!(!output.html.contains("<strong>"));
    }

    #[test]
    fn test_highlight_region_rendered_as_code() {
        let output = render("{% highlight yaml %}\nsecurity:\n  enable-csrf: true\n{% endhighlight %}\n");
        assert_eq!(
            output.html,
            "<pre><code class=\"language-yaml\">security:\n  enable-csrf: true\n</code></pre>"
        );
    }

    #[test]
    fn test_info_string_attributes_ignored_for_language() {
        let output = render("```java title=\"A.java\"\nclass A {}\n```\n");
        assert!(output.html.contains("language-java\""));
    }

    #[test]
    fn test_unterminated_fence_fails() {
        let options = markdown_options(&MarkdownConfig::default()).unwrap();
        let result = render_markdown(
            "# Title\n\n```bash\nmvn test\n",
            &SyntaxHighlighter::plain(),
            options,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_highlighted_code_block() {
        let options = markdown_options(&MarkdownConfig::default()).unwrap();
        let output =
            render_markdown("```rust\nlet x = 1;\n```", &SyntaxHighlighter::default(), options)
                .unwrap();

        assert!(output.html.contains("let"));
        assert!(output.html.contains("<pre"));
    }

    #[test]
    fn test_invalid_extension() {
        let config = MarkdownConfig {
            extensions: vec!["not_a_real_extension".to_string()],
            ..MarkdownConfig::default()
        };

        assert!(markdown_options(&config).is_err());
    }

    #[test]
    fn test_no_paragraph_no_excerpt() {
        assert_eq!(render("# Only a heading").excerpt, None);
    }
}
