//! Built-in plugins
pub mod apt;
pub mod jvm;

pub use apt::{AnnotationProcessingPlugin, AptConfig, KaptConfig, KaptDirs};
pub use jvm::JvmPlugin;
