//! Stackwright - validated container stacks and build scripts
//!
//! Stackwright models a multi-service container application as a typed,
//! validated object graph and compiles it into text artifacts:
//!
//! - A Compose-style orchestration manifest ([`Stack::render_manifest`])
//! - Multi-stage build scripts ([`Template::render`])
//! - Declarative YAML definitions for both ([`StackParser`], [`TemplateParser`])
//!
//! Every reference between entities is checked when it is added, so a stack
//! that was built without errors always renders.

pub mod command;
pub mod compose;
pub mod error;
pub mod fs;
pub mod image;
pub mod network;
pub mod render;
pub mod storage;

pub use command::Command;
pub use compose::{EntityLookup, Service, ServiceSpec, Stack, StackDefinition, StackParser};
pub use error::{EntityKind, Result, StackError};
pub use fs::{ArtifactWriter, FsArtifactWriter, FsPathOracle, PathOracle, StaticPathOracle};
pub use image::{Stage, Template, TemplateParser};
pub use network::Network;
pub use storage::{ConfigFile, Secret, Volume};
