use autumnus::{HtmlLinkedBuilder, formatter::Formatter, languages::Language, themes};

use crate::config::MarkdownConfig;
use crate::util::html_escape;

/// A syntax highlighter using autumnus (tree-sitter based).
pub struct SyntaxHighlighter {
    /// Theme name for CSS generation.
    theme_name: String,
    /// When false every block is emitted as escaped plain code.
    enabled: bool,
}

impl SyntaxHighlighter {
    /// Create a new syntax highlighter with the given theme.
    pub fn new(theme_name: &str) -> Self {
        Self {
            theme_name: theme_name.to_string(),
            enabled: true,
        }
    }

    /// Create a highlighter that never highlights, only escapes.
    pub fn plain() -> Self {
        Self {
            theme_name: String::new(),
            enabled: false,
        }
    }

    pub fn from_config(config: &MarkdownConfig) -> Self {
        if config.highlight {
            Self::new(&config.highlight_theme)
        } else {
            Self::plain()
        }
    }

    /// Highlight code and return HTML with CSS classes.
    /// Returns the original code wrapped in a plain `<code>` if the language is not supported.
    pub fn highlight(&self, code: &str, language: &str) -> String {
        if !self.enabled {
            return Self::plain_code_block(code, language);
        }

        // Use Language::guess which handles language detection from name or extension
        let lang = Language::guess(language, code);

        // Check if it's the Plaintext/unknown fallback
        if matches!(lang, Language::PlainText)
            && !language.is_empty()
            && language != "plaintext"
            && language != "text"
        {
            return Self::plain_code_block(code, language);
        }

        let formatter = HtmlLinkedBuilder::new().source(code).lang(lang).build();

        match formatter {
            Ok(f) => {
                let mut output: Vec<u8> = Vec::new();
                if f.format(&mut output).is_ok() {
                    String::from_utf8(output)
                        .unwrap_or_else(|_| Self::plain_code_block(code, language))
                } else {
                    Self::plain_code_block(code, language)
                }
            }
            Err(_) => Self::plain_code_block(code, language),
        }
    }

    /// Generate CSS for the current theme, if highlighting is on.
    pub fn generate_css(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let theme = themes::get(&self.theme_name).ok()?;
        Some(theme.css(false)) // false = don't enable italic
    }

    /// Create a plain code block without highlighting.
    fn plain_code_block(code: &str, language: &str) -> String {
        let escaped = html_escape(code);
        if language.is_empty() {
            format!("<pre><code>{}</code></pre>", escaped)
        } else {
            format!(
                "<pre><code class=\"language-{}\">{}</code></pre>",
                html_escape(language),
                escaped
            )
        }
    }
}

impl Default for SyntaxHighlighter {
    fn default() -> Self {
        Self::new("dracula")
    }
}
