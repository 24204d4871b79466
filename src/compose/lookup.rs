//! Read-only lookup capability handed to entity setters
//!
//! Entities never hold a pointer back into their stack. Setters that need to
//! check a cross-entity reference receive an [`EntityLookup`] for the
//! duration of the call.

use std::path::Path;

/// Existence checks used by referential-integrity validation
pub trait EntityLookup {
    fn has_service(&self, name: &str) -> bool;

    fn has_network(&self, name: &str) -> bool;

    fn has_volume(&self, name: &str) -> bool;

    fn has_secret(&self, name: &str) -> bool;

    fn has_config(&self, name: &str) -> bool;

    /// Whether a referenced file exists
    fn path_exists(&self, path: &Path) -> bool;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    /// In-memory lookup for entity tests
    #[derive(Debug, Default)]
    pub(crate) struct FakeLookup {
        pub services: HashSet<String>,
        pub networks: HashSet<String>,
        pub volumes: HashSet<String>,
        pub secrets: HashSet<String>,
        pub configs: HashSet<String>,
        pub paths: HashSet<PathBuf>,
    }

    impl FakeLookup {
        pub fn with_service(mut self, name: &str) -> Self {
            self.services.insert(name.to_string());
            self
        }

        pub fn with_network(mut self, name: &str) -> Self {
            self.networks.insert(name.to_string());
            self
        }

        pub fn with_volume(mut self, name: &str) -> Self {
            self.volumes.insert(name.to_string());
            self
        }

        pub fn with_secret(mut self, name: &str) -> Self {
            self.secrets.insert(name.to_string());
            self
        }

        pub fn with_config(mut self, name: &str) -> Self {
            self.configs.insert(name.to_string());
            self
        }

        pub fn with_path(mut self, path: &str) -> Self {
            self.paths.insert(PathBuf::from(path));
            self
        }
    }

    impl EntityLookup for FakeLookup {
        fn has_service(&self, name: &str) -> bool {
            self.services.contains(name)
        }

        fn has_network(&self, name: &str) -> bool {
            self.networks.contains(name)
        }

        fn has_volume(&self, name: &str) -> bool {
            self.volumes.contains(name)
        }

        fn has_secret(&self, name: &str) -> bool {
            self.secrets.contains(name)
        }

        fn has_config(&self, name: &str) -> bool {
            self.configs.contains(name)
        }

        fn path_exists(&self, path: &Path) -> bool {
            self.paths.contains(path)
        }
    }
}
