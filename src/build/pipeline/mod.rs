//! Build pipeline for post processing.
//!
//! Posts move through a series of stages:
//! 1. Markdown rendering (to HTML with TOC and excerpt)
//! 2. Routing (layout check and permalink expansion)
//! 3. Template rendering (layout wrapper, needs the finished index)
//!
//! Stages run per post. A post that fails any stage is dropped from the run
//! and reported as a `PostFailure`; its siblings carry on.

mod context;
mod document;
mod error;
mod stages;

pub use context::PipelineContext;
pub use document::{ProcessingDocument, Route};
pub use error::{PipelineError, PostFailure};

use stages::{MarkdownStage, RouteStage, TemplateStage};

/// A stage in the post processing pipeline.
pub trait Stage: Send + Sync {
    /// Unique name for this stage (used in logs).
    fn name(&self) -> &'static str;

    /// Process one post.
    ///
    /// Posts are passed by mutable reference so stages can transform
    /// their content in place. The `ctx` provides access to shared resources
    /// like the renderer and highlighter.
    fn process(
        &self,
        doc: &mut ProcessingDocument,
        ctx: &PipelineContext,
    ) -> Result<(), PipelineError>;
}

/// The post processing pipeline.
///
/// Building runs two pipelines: `prepare` (markdown → route) over every post,
/// then `render` (template) once the tag and category indexes exist.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Create an empty pipeline with no stages.
    fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Stages that don't depend on other posts: markdown → route
    pub fn prepare() -> Self {
        let mut pipeline = Self::new();
        pipeline.add_stage(MarkdownStage);
        pipeline.add_stage(RouteStage);
        pipeline
    }

    /// Stages that read the site index: template
    pub fn render() -> Self {
        let mut pipeline = Self::new();
        pipeline.add_stage(TemplateStage);
        pipeline
    }

    /// Add a stage to the end of the pipeline.
    pub fn add_stage<S: Stage + 'static>(&mut self, stage: S) -> &mut Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Run the pipeline on a set of posts.
    ///
    /// Returns the posts that made it through every stage, in their original
    /// order. The rest are appended to `failures`.
    pub fn run(
        &self,
        docs: Vec<ProcessingDocument>,
        ctx: &PipelineContext,
        failures: &mut Vec<PostFailure>,
    ) -> Vec<ProcessingDocument> {
        let mut survivors = Vec::with_capacity(docs.len());

        'docs: for mut doc in docs {
            for stage in &self.stages {
                if let Err(error) = stage.process(&mut doc, ctx) {
                    tracing::debug!(
                        stage = stage.name(),
                        path = %doc.post.source_path.display(),
                        "post failed"
                    );
                    failures.push(PostFailure::new(doc.post.source_path.clone(), error));
                    continue 'docs;
                }
            }
            survivors.push(doc);
        }

        survivors
    }

    /// Get the names of all stages in order.
    #[cfg(test)]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}
