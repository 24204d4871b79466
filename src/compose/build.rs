//! Service build configuration

use super::common::validate_env_key;
use super::config::BuildSpec;
use super::lookup::EntityLookup;
use crate::error::{EntityKind, Result, StackError};
use indexmap::IndexMap;
use std::path::Path;

/// Build configuration of a service that is built rather than pulled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBuild {
    context: String,
    dockerfile: Option<String>,
    target: Option<String>,
    args: IndexMap<String, String>,
    ssh: IndexMap<String, String>,
}

impl ServiceBuild {
    pub fn new(context: &str) -> Result<Self> {
        if context.trim().is_empty() {
            return Err(StackError::missing("build", "context"));
        }
        Ok(Self {
            context: context.to_string(),
            dockerfile: None,
            target: None,
            args: IndexMap::new(),
            ssh: IndexMap::new(),
        })
    }

    pub fn dockerfile(mut self, dockerfile: &str) -> Result<Self> {
        if dockerfile.trim().is_empty() {
            return Err(StackError::missing("build", "dockerfile"));
        }
        self.dockerfile = Some(dockerfile.to_string());
        Ok(self)
    }

    pub fn target(mut self, target: &str) -> Result<Self> {
        if target.trim().is_empty() {
            return Err(StackError::missing("build", "target"));
        }
        self.target = Some(target.to_string());
        Ok(self)
    }

    pub fn arg(mut self, key: &str, value: &str) -> Result<Self> {
        validate_env_key(key)?;
        self.args.insert(key.to_string(), value.to_string());
        Ok(self)
    }

    /// SSH key made available to the build; the path must exist
    pub fn ssh_key(mut self, id: &str, path: &str, lookup: &dyn EntityLookup) -> Result<Self> {
        if id.trim().is_empty() {
            return Err(StackError::missing("build ssh", "id"));
        }
        if !lookup.path_exists(Path::new(path)) {
            return Err(StackError::unknown(
                format!("build ssh key '{}'", id),
                EntityKind::File,
                path,
            ));
        }
        self.ssh.insert(id.to_string(), path.to_string());
        Ok(self)
    }

    pub fn from_spec(spec: &BuildSpec, lookup: &dyn EntityLookup) -> Result<Self> {
        match spec {
            BuildSpec::Context(context) => Self::new(context),
            BuildSpec::Full(full) => {
                let context = full
                    .context
                    .as_deref()
                    .ok_or_else(|| StackError::missing("build", "context"))?;
                let mut build = Self::new(context)?;
                if let Some(dockerfile) = &full.dockerfile {
                    build = build.dockerfile(dockerfile)?;
                }
                if let Some(target) = &full.target {
                    build = build.target(target)?;
                }
                for (key, value) in &full.args {
                    build = build.arg(key, value)?;
                }
                for (id, path) in &full.ssh {
                    build = build.ssh_key(id, path, lookup)?;
                }
                Ok(build)
            }
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn dockerfile_path(&self) -> Option<&str> {
        self.dockerfile.as_deref()
    }

    pub fn target_stage(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn args(&self) -> &IndexMap<String, String> {
        &self.args
    }

    pub fn ssh(&self) -> &IndexMap<String, String> {
        &self.ssh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::config::BuildSpecFull;
    use crate::compose::lookup::tests::FakeLookup;

    #[test]
    fn test_context_required() {
        assert!(ServiceBuild::new("").is_err());
        let full = BuildSpec::Full(BuildSpecFull::default());
        assert!(matches!(
            ServiceBuild::from_spec(&full, &FakeLookup::default()),
            Err(StackError::MissingField { .. })
        ));
    }

    #[test]
    fn test_ssh_key_must_exist() {
        let lookup = FakeLookup::default().with_path("/home/dev/.ssh/id_ed25519");
        let build = ServiceBuild::new("./api").unwrap();
        assert!(build
            .clone()
            .ssh_key("default", "/home/dev/.ssh/id_ed25519", &lookup)
            .is_ok());
        assert!(matches!(
            build.ssh_key("default", "/nope", &lookup),
            Err(StackError::ReferentialIntegrity {
                kind: EntityKind::File,
                ..
            })
        ));
    }

    #[test]
    fn test_from_full_spec() {
        let mut args = IndexMap::new();
        args.insert("NODE_ENV".to_string(), "production".to_string());
        let spec = BuildSpec::Full(BuildSpecFull {
            context: Some("./web".to_string()),
            dockerfile: Some("Dockerfile.prod".to_string()),
            target: Some("runtime".to_string()),
            args,
            ssh: IndexMap::new(),
        });
        let build = ServiceBuild::from_spec(&spec, &FakeLookup::default()).unwrap();
        assert_eq!(build.context(), "./web");
        assert_eq!(build.dockerfile_path(), Some("Dockerfile.prod"));
        assert_eq!(build.target_stage(), Some("runtime"));
        assert_eq!(build.args()["NODE_ENV"], "production");
    }
}
