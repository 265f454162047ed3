// schoolcanon-core/src/ports/mod.rs

// What the pipeline needs from the outside world, without knowing how it's done.

pub mod renderer;
pub mod sink;
pub mod source;

pub use renderer::TemplateEngine;
pub use sink::DatasetSink;
pub use source::RawSource;
