//! Markdown rendering stage.

use crate::build::markdown::render_markdown;
use crate::build::pipeline::{PipelineContext, PipelineError, ProcessingDocument, Stage};

/// Stage that renders the post body to HTML.
///
/// After this stage, `doc.content` contains HTML, `doc.toc` the extracted
/// headings and `doc.excerpt` the front matter excerpt or first paragraph.
pub struct MarkdownStage;

impl Stage for MarkdownStage {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn process(
        &self,
        doc: &mut ProcessingDocument,
        ctx: &PipelineContext,
    ) -> Result<(), PipelineError> {
        let output = render_markdown(&doc.content, ctx.highlighter, ctx.markdown_options)
            .map_err(|mut e| {
                // Report the line in the source file, not in the body
                e.line += doc.post.body_line - 1;
                e
            })?;

        doc.content = output.html;
        doc.toc = output.toc;
        doc.excerpt = doc.post.excerpt().map(str::to_string).or(output.excerpt);

        Ok(())
    }
}
