//! Steps built-in.
pub mod command;
pub mod manifest;
pub mod template;

pub use command::CommandStep;
pub use manifest::ManifestStep;
pub use template::TemplateStep;
