//! Default pipeline stages.
//!
//! 1. **MarkdownStage** - Convert markdown to HTML with syntax highlighting
//! 2. **RouteStage** - Check the layout and expand the permalink
//! 3. **TemplateStage** - Wrap content in the post's layout

mod markdown;
mod route;
mod template;

pub use markdown::MarkdownStage;
pub use route::RouteStage;
pub use template::TemplateStage;
