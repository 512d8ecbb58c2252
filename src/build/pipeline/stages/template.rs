//! Layout rendering stage.

use crate::build::paths::{listing_url, with_base_path};
use crate::build::pipeline::{PipelineContext, PipelineError, ProcessingDocument, Stage};
use crate::build::render::{NameLink, PageInfo, PostContext};

/// Stage that applies the post's layout to rendered content.
///
/// After this stage, `doc.output_html` contains the complete HTML page.
pub struct TemplateStage;

impl Stage for TemplateStage {
    fn name(&self) -> &'static str {
        "template"
    }

    fn process(
        &self,
        doc: &mut ProcessingDocument,
        ctx: &PipelineContext,
    ) -> Result<(), PipelineError> {
        let route = doc
            .route
            .as_ref()
            .ok_or_else(|| PipelineError::stage("template", "post has no route (was route stage run?)"))?;
        let post = &doc.post;
        let listings = &ctx.config.listings;

        let page_info = PageInfo {
            title: post.title(),
            url: with_base_path(&ctx.site.base_path, &route.url_path),
            layout: route.layout.clone(),
            date: post.date_string(),
            tags: post.tags().to_vec(),
            categories: post.categories().to_vec(),
            tag_links: name_links(ctx, &listings.tag_layout, &listings.tags_path, post.tags()),
            category_links: name_links(
                ctx,
                &listings.category_layout,
                &listings.categories_path,
                post.categories(),
            ),
            excerpt: doc.excerpt.clone(),
            comments: post.comments(),
            source_path: post.source_path_string(),
            front_matter: post.front_matter.clone(),
        };

        let post_context = PostContext {
            site: ctx.site,
            page: page_info,
            content: &doc.content,
            toc: &doc.toc,
            index: ctx.index,
            quire: ctx.quire,
        };

        let html = ctx.renderer.render_post(&route.layout, &post_context)?;
        doc.output_html = Some(html);

        Ok(())
    }
}

/// Pair each name with its listing page URL, when that page is generated.
fn name_links(ctx: &PipelineContext, layout: &str, root: &str, names: &[String]) -> Vec<NameLink> {
    let generated = ctx.renderer.has_layout(layout);
    names
        .iter()
        .map(|name| NameLink {
            name: name.clone(),
            url: listing_url(root, name)
                .filter(|_| generated)
                .map(|url| with_base_path(&ctx.site.base_path, &url)),
        })
        .collect()
}
