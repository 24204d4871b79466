//! Stack definition file parser

use super::config::{DependsOnSpec, StackDefinition};
use super::service::NetworkMode;
use super::stack::Stack;
use crate::error::{EntityKind, Result, StackError};
use crate::fs::PathOracle;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default stack definition file names
pub const DEFAULT_STACK_FILES: &[&str] = &["stack.yaml", "stack.yml"];

/// Stack definition parser
pub struct StackParser;

impl StackParser {
    /// Find a stack definition in `dir`
    pub fn find_stack_file(dir: &Path) -> Option<PathBuf> {
        DEFAULT_STACK_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Parse a stack definition file
    pub fn parse_file(path: &Path) -> Result<StackDefinition> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("Parsing stack definition {}", path.display());
        Self::parse_str(&content)
    }

    /// Parse a stack definition document
    pub fn parse_str(content: &str) -> Result<StackDefinition> {
        serde_yaml::from_str(content)
            .map_err(|e| StackError::shape("stack definition", e.to_string()))
    }

    /// Build a validated stack from a definition.
    ///
    /// Services are created after every other entity, and service-to-service
    /// references are applied once all services exist, so declaration order
    /// inside the document does not matter.
    pub fn build(definition: &StackDefinition, oracle: Arc<dyn PathOracle>) -> Result<Stack> {
        let name = definition
            .name
            .as_deref()
            .ok_or_else(|| StackError::missing("stack definition", "name"))?;
        if let Some(dependency) = undeclared_dependencies(definition).first() {
            return Err(StackError::unknown(
                format!("stack definition '{}'", name),
                EntityKind::Service,
                dependency.as_str(),
            ));
        }
        let mut stack = Stack::with_oracle(name, oracle)?;

        for (key, value) in &definition.environment {
            stack.set_env(key, value)?;
        }
        for path in &definition.env_files {
            stack.add_env_file(path)?;
        }
        for (name, spec) in &definition.networks {
            stack.create_network(name, spec)?;
        }
        for (name, spec) in &definition.volumes {
            stack.create_volume(name, spec)?;
        }
        for (name, spec) in &definition.secrets {
            stack.create_secret(name, spec)?;
        }
        for (name, spec) in &definition.configs {
            stack.create_config(name, spec)?;
        }

        let mut deferred = Vec::new();
        for (name, spec) in &definition.services {
            let mut first_pass = spec.clone();
            first_pass.depends_on.clear();
            let mode = match first_pass.network_mode.take() {
                Some(mode) => Some(NetworkMode::parse(&mode)?),
                None => None,
            };
            if let Some(mode) = mode.as_ref().filter(|m| !matches!(m, NetworkMode::Service(_))) {
                first_pass.network_mode = Some(mode.to_string());
            }
            stack.create_service(name, &first_pass)?;
            deferred.push((name, &spec.depends_on, mode));
        }

        for (name, depends_on, mode) in deferred {
            if depends_on.is_empty() && !matches!(mode, Some(NetworkMode::Service(_))) {
                continue;
            }
            stack.update_service(name, |service, lookup| {
                for dependency in depends_on {
                    service.add_dependency_spec(dependency, lookup)?;
                }
                if let Some(mode @ NetworkMode::Service(_)) = mode {
                    service.set_network_mode(mode, lookup)?;
                }
                Ok(())
            })?;
        }

        tracing::info!(
            "Built stack {} from definition ({} services)",
            stack.name(),
            stack.services().len()
        );
        Ok(stack)
    }

    /// Parse and build in one step; relative paths resolve against the
    /// file's directory
    pub fn load(path: &Path) -> Result<Stack> {
        let definition = Self::parse_file(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::build(
            &definition,
            Arc::new(crate::fs::FsPathOracle::with_base_dir(base)),
        )
    }
}

/// Names of services a definition depends on but does not declare
fn undeclared_dependencies(definition: &StackDefinition) -> Vec<String> {
    let mut missing = Vec::new();
    for spec in definition.services.values() {
        for dependency in spec.depends_on.iter().map(DependsOnSpec::service) {
            if !definition.services.contains_key(dependency)
                && !missing.iter().any(|m| m == dependency)
            {
                missing.push(dependency.to_string());
            }
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::StaticPathOracle;

    const SHOP: &str = r#"
name: shop
environment:
  TZ: UTC
services:
  web:
    main: true
    image: nginx:1.25
    depends_on:
      - api
    ports:
      - internal: 80
        external: 8080
    networks: [front]
  api:
    build: ./api
    depends_on:
      - service: db
        condition: service_healthy
    networks: [front, back]
  db:
    image: postgres:16
    volumes:
      - name: data
        container_path: /var/lib/postgresql/data
    networks: [back]
    healthcheck:
      test: ["pg_isready", "-U", "postgres"]
      interval: 10s
      retries: 5
networks:
  front: {}
  back:
    internal: true
volumes:
  data: {}
"#;

    fn allow_all() -> Arc<dyn PathOracle> {
        Arc::new(StaticPathOracle::allow_all())
    }

    #[test]
    fn test_parse_and_build() {
        let definition = StackParser::parse_str(SHOP).unwrap();
        assert_eq!(definition.services.len(), 3);

        let stack = StackParser::build(&definition, allow_all()).unwrap();
        assert_eq!(stack.main_service().map(|s| s.name()), Some("web"));
        assert!(stack.service("web").unwrap().depends_on().contains_key("api"));

        let manifest = stack.render_manifest().unwrap();
        assert!(manifest.starts_with("services:\n  web:\n"));
        assert!(manifest.contains("      db:\n        condition: service_healthy\n"));
        assert!(manifest.contains("      test: [\"CMD\", \"pg_isready\", \"-U\", \"postgres\"]\n"));
    }

    #[test]
    fn test_forward_network_mode_reference() {
        let yaml = r#"
name: vpn
services:
  app:
    image: alpine
    network_mode: service:tunnel
  tunnel:
    image: wireguard
"#;
        let definition = StackParser::parse_str(yaml).unwrap();
        let stack = StackParser::build(&definition, allow_all()).unwrap();
        assert!(stack
            .render_manifest()
            .unwrap()
            .contains("    network_mode: service:tunnel\n"));
    }

    #[test]
    fn test_unknown_dependency() {
        let yaml = r#"
name: broken
services:
  web:
    image: nginx
    depends_on: [cache]
  worker:
    image: busybox
    depends_on:
      - web
      - service: queue
"#;
        let definition = StackParser::parse_str(yaml).unwrap();
        assert_eq!(
            undeclared_dependencies(&definition),
            vec!["cache".to_string(), "queue".to_string()]
        );
        match StackParser::build(&definition, allow_all()) {
            Err(StackError::ReferentialIntegrity { owner, kind, name }) => {
                assert_eq!(owner, "stack definition 'broken'");
                assert_eq!(kind, EntityKind::Service);
                assert_eq!(name, "cache");
            }
            other => panic!("expected an unknown service error, got {:?}", other),
        }
    }

    #[test]
    fn test_shape_errors() {
        assert!(matches!(
            StackParser::parse_str("name: x\nservices:\n  web:\n    ports: 80\n"),
            Err(StackError::Shape { .. })
        ));
        assert!(matches!(
            StackParser::parse_str("name: x\nservices:\n  web:\n    imagee: nginx\n"),
            Err(StackError::Shape { .. })
        ));
        let unnamed = StackParser::parse_str("services: {}\n").unwrap();
        assert!(matches!(
            StackParser::build(&unnamed, allow_all()),
            Err(StackError::MissingField { .. })
        ));
    }

    #[test]
    fn test_find_and_load() {
        let dir = tempfile::tempdir().unwrap();
        assert!(StackParser::find_stack_file(dir.path()).is_none());

        std::fs::write(dir.path().join("db.txt"), "hunter2").unwrap();
        std::fs::write(
            dir.path().join("stack.yml"),
            "name: app\nservices:\n  web:\n    image: nginx\n    secrets: [db]\nsecrets:\n  db:\n    file: db.txt\n",
        )
        .unwrap();
        let path = StackParser::find_stack_file(dir.path()).unwrap();
        let stack = StackParser::load(&path).unwrap();
        assert!(stack.render_manifest().unwrap().contains("    file: db.txt\n"));
    }
}
