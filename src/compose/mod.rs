//! Stack model and orchestration manifest
//!
//! Entities are validated as they are built; the [`Stack`] owns them in
//! name-keyed registries and renders the Compose-style manifest.

pub mod build;
pub mod common;
pub mod config;
pub mod deploy;
pub mod healthcheck;
pub mod logging;
pub mod lookup;
pub mod manifest;
pub mod options;
pub mod parser;
pub mod permissions;
pub mod registry;
pub mod restart;
pub mod service;
pub mod stack;

pub use config::{ServiceSpec, StackDefinition};
pub use lookup::EntityLookup;
pub use manifest::ManifestSerializer;
pub use parser::StackParser;
pub use registry::{Named, Registry};
pub use service::Service;
pub use stack::Stack;
