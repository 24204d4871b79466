//! Image-build compiler
//!
//! Stages are assembled through validated setters, grouped into a
//! [`Template`] and rendered as a multi-stage build script.

pub mod definition;
pub mod instruction;
pub mod macros;
pub mod stage;
pub mod template;
pub mod user;

pub use definition::{BuildDefinition, TemplateParser};
pub use instruction::{BuildInstruction, Protocol};
pub use macros::{Macro, PackageManager};
pub use stage::{FileCopy, Stage};
pub use template::Template;
pub use user::UserSpec;
