//! Routing stage.

use crate::build::paths::{PermalinkParts, expand_permalink};
use crate::build::pipeline::{PipelineContext, PipelineError, ProcessingDocument, Route, Stage};

/// Stage that resolves a post's layout and URL.
///
/// The layout is the post's `layout` or the configured default and must be
/// loaded. The URL comes from the post's `permalink`, else the posts pattern
/// for dated posts or the pages pattern for undated ones, and must stay
/// inside the output directory.
pub struct RouteStage;

impl Stage for RouteStage {
    fn name(&self) -> &'static str {
        "route"
    }

    fn process(
        &self,
        doc: &mut ProcessingDocument,
        ctx: &PipelineContext,
    ) -> Result<(), PipelineError> {
        let post = &doc.post;
        let layout = post.layout().unwrap_or(&ctx.config.defaults.layout);
        if !ctx.renderer.has_layout(layout) {
            return Err(PipelineError::UnknownLayout {
                layout: layout.to_string(),
                available: ctx.renderer.layout_names(),
            });
        }

        let pattern: &str = match post.permalink() {
            Some(permalink) => permalink,
            None if post.date.is_some() => &ctx.config.permalink.posts,
            None => &ctx.config.permalink.pages,
        };
        let url_path = expand_permalink(
            pattern,
            &PermalinkParts {
                date: post.date,
                slug: &post.slug,
                categories: post.categories(),
                source_path: &post.source_path,
            },
        );
        if url_path.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(PipelineError::InvalidPermalink(url_path));
        }

        doc.route = Some(Route {
            layout: layout.to_string(),
            url_path,
        });
        Ok(())
    }
}
