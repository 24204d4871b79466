//! Stack config files

use crate::compose::config::ConfigSpec;
use crate::compose::lookup::EntityLookup;
use crate::compose::registry::{validate_name, Named};
use crate::error::{EntityKind, Result, StackError};
use std::path::Path;

/// Config file mounted into services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    name: String,
    file: String,
}

impl Named for ConfigFile {
    const KIND: EntityKind = EntityKind::Config;

    fn name(&self) -> &str {
        &self.name
    }
}

impl ConfigFile {
    /// The source file must exist
    pub fn new(name: &str, file: &str, lookup: &dyn EntityLookup) -> Result<Self> {
        validate_name(EntityKind::Config, name)?;
        if file.trim().is_empty() {
            return Err(StackError::missing(format!("config '{}'", name), "file"));
        }
        if !lookup.path_exists(Path::new(file)) {
            return Err(StackError::unknown(
                format!("config '{}'", name),
                EntityKind::File,
                file,
            ));
        }
        Ok(Self {
            name: name.to_string(),
            file: file.to_string(),
        })
    }

    pub fn from_spec(name: &str, spec: &ConfigSpec, lookup: &dyn EntityLookup) -> Result<Self> {
        let file = spec
            .file
            .as_deref()
            .ok_or_else(|| StackError::missing(format!("config '{}'", name), "file"))?;
        Self::new(name, file, lookup)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file(&self) -> &str {
        &self.file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::lookup::tests::FakeLookup;

    #[test]
    fn test_config_file() {
        let lookup = FakeLookup::default().with_path("./nginx.conf");
        let config = ConfigFile::new("nginx_conf", "./nginx.conf", &lookup).unwrap();
        assert_eq!(config.file(), "./nginx.conf");

        assert!(matches!(
            ConfigFile::from_spec("nginx_conf", &ConfigSpec::default(), &lookup),
            Err(StackError::MissingField { .. })
        ));
        assert!(matches!(
            ConfigFile::new("nginx_conf", "./other.conf", &lookup),
            Err(StackError::ReferentialIntegrity { .. })
        ));
    }
}
