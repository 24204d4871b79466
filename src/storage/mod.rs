//! Stack storage entities
//!
//! Volumes, secrets and config files: the resources services mount.

pub mod config_file;
pub mod secret;
pub mod volume;

pub use config_file::ConfigFile;
pub use secret::{Secret, SecretSource};
pub use volume::{Volume, VolumeDriverOptions};
