mod context;
mod format;

pub use context::TemplateContext;
pub use format::format_answer;
