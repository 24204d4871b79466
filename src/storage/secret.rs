//! Stack secrets

use crate::compose::config::SecretSpec;
use crate::compose::lookup::EntityLookup;
use crate::compose::registry::{validate_name, Named};
use crate::error::{EntityKind, Result, StackError};
use std::path::Path;

/// Where a secret's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Read from a file next to the stack
    File(String),
    /// Created outside the stack
    External,
}

/// Stack secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    name: String,
    source: SecretSource,
}

impl Named for Secret {
    const KIND: EntityKind = EntityKind::Secret;

    fn name(&self) -> &str {
        &self.name
    }
}

impl Secret {
    /// Secret backed by a file; the file must exist
    pub fn from_file(name: &str, path: &str, lookup: &dyn EntityLookup) -> Result<Self> {
        validate_name(EntityKind::Secret, name)?;
        if path.trim().is_empty() {
            return Err(StackError::missing(format!("secret '{}'", name), "file"));
        }
        if !lookup.path_exists(Path::new(path)) {
            return Err(StackError::unknown(
                format!("secret '{}'", name),
                EntityKind::File,
                path,
            ));
        }
        Ok(Self {
            name: name.to_string(),
            source: SecretSource::File(path.to_string()),
        })
    }

    /// Secret managed outside the stack
    pub fn external(name: &str) -> Result<Self> {
        validate_name(EntityKind::Secret, name)?;
        Ok(Self {
            name: name.to_string(),
            source: SecretSource::External,
        })
    }

    /// Exactly one of `file` and `external: true` must be given
    pub fn from_spec(name: &str, spec: &SecretSpec, lookup: &dyn EntityLookup) -> Result<Self> {
        match (&spec.file, spec.external.unwrap_or(false)) {
            (Some(_), true) => Err(StackError::shape(
                format!("secret '{}'", name),
                "'file' and 'external' are mutually exclusive",
            )),
            (Some(path), false) => Self::from_file(name, path, lookup),
            (None, true) => Self::external(name),
            (None, false) => Err(StackError::missing(
                format!("secret '{}'", name),
                "file or external",
            )),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &SecretSource {
        &self.source
    }
}
